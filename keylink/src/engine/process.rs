//! Panic containment for rewrite passes.
use log::error;

/// Run `processor_fn` over `content`, falling back if it panics.
///
/// The DOM library may panic on input it cannot cope with. Rewriting is an
/// enhancement, so a panic is logged and `fallback` produces the result from
/// the untouched content instead.
///
/// # Arguments
///
/// * `content` - The content to process
/// * `processor_fn` - The processing function to apply
/// * `fallback` - Builds the result from the original content on failure
///
/// # Returns
///
/// The processed result or the fallback on panic
pub fn process_safe<T, F, G>(content: &str, processor_fn: F, fallback: G) -> T
where
  F: FnOnce(&str) -> T,
  G: FnOnce(&str) -> T,
{
  let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
    processor_fn(content)
  }));

  match result {
    Ok(processed) => processed,
    Err(e) => {
      if let Some(error_msg) = e.downcast_ref::<String>() {
        error!("Error rewriting content: {error_msg}");
      } else if let Some(error_msg) = e.downcast_ref::<&str>() {
        error!("Error rewriting content: {error_msg}");
      } else {
        error!("Unknown error occurred while rewriting content");
      }
      fallback(content)
    },
  }
}
