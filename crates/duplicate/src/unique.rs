//! Unique value search for duplicated columns
//!
//! A value that already exists gets `" (1)"`, `" (2)"`, ... appended to the
//! original until the existence check reports no collision. The suffix is
//! always applied to the original value, never stacked.

use async_trait::async_trait;
use tracing::debug;

use crate::error::{DuplicateError, DuplicateResult};

/// Answers "does a record already hold `value` in `column`?"
///
/// The scope of the question (whole table, rows of one parent, ...) belongs to
/// the implementation.
#[async_trait]
pub trait UniqueCheck: Send {
    async fn exists(&mut self, column: &str, value: &str) -> DuplicateResult<bool>;
}

#[async_trait]
impl<F> UniqueCheck for F
where
    F: FnMut(&str, &str) -> bool + Send,
{
    async fn exists(&mut self, column: &str, value: &str) -> DuplicateResult<bool> {
        Ok(self(column, value))
    }
}

/// Candidate value for the `attempt`-th suffix
pub fn suffixed(original: &str, attempt: u32) -> String {
    format!("{} ({})", original, attempt)
}

/// Find a value for `column` that `check` reports as free
pub async fn make_unique<C>(original: &str, column: &str, check: &mut C) -> DuplicateResult<String>
where
    C: UniqueCheck + ?Sized,
{
    make_unique_within(original, column, check, None).await
}

/// Like [`make_unique`], giving up after `max_attempts` suffixed candidates
pub async fn make_unique_within<C>(
    original: &str,
    column: &str,
    check: &mut C,
    max_attempts: Option<u32>,
) -> DuplicateResult<String>
where
    C: UniqueCheck + ?Sized,
{
    let mut value = original.to_string();
    let mut attempt: u32 = 0;

    while check.exists(column, &value).await? {
        if let Some(limit) = max_attempts {
            if attempt >= limit {
                return Err(DuplicateError::UniqueExhausted {
                    column: column.to_string(),
                    attempts: attempt,
                });
            }
        }

        attempt += 1;
        value = suffixed(original, attempt);
    }

    if attempt > 0 {
        debug!("Column '{}' made unique as '{}'", column, value);
    }

    Ok(value)
}
