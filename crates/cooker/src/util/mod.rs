//! Bounded-concurrency task mapping and small diagnostics helpers.

use std::future::Future;

use futures::stream::{self, StreamExt, TryStreamExt};

use crate::error::{CookError, Result};

/// Map a fallible async function over a collection with at most `limit` items
/// in flight.
///
/// Results come back in input order regardless of completion order. The first
/// error aborts the whole map; in-flight siblings are cancelled when the
/// underlying stream is dropped.
pub async fn pmap<T, U, F, Fut>(
    items: impl IntoIterator<Item = T>,
    limit: usize,
    f: F,
) -> Result<Vec<U>>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<U>>,
{
    stream::iter(items.into_iter().map(f))
        .buffered(limit.max(1))
        .try_collect()
        .await
}

/// Run a blocking closure on the blocking pool, surfacing panics as errors.
pub async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| CookError::TaskJoin {
            reason: e.to_string(),
        })?
}

/// Human-readable byte count for log lines.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.2} {}", UNITS[unit])
    }
}
