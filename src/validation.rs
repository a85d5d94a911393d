//! Error-accumulating results
//!
//! Compile-time passes do not stop at the first problem: each pass collects
//! every diagnostic it can find and only succeeds when the list is empty.

/// A result whose failure side carries every error a pass found
pub type Validation<T, E> = Result<T, Vec<E>>;

/// Combine per-item results into one result, concatenating the failures
pub fn sequence<T, E>(items: Vec<Validation<T, E>>) -> Validation<Vec<T>, E> {
    let mut values = Vec::new();
    let mut errors = Vec::new();
    for item in items {
        match item {
            Ok(value) => values.push(value),
            Err(mut item_errors) => errors.append(&mut item_errors),
        }
    }
    if errors.is_empty() { Ok(values) } else { Err(errors) }
}
