//! Chunked, bounded-concurrency execution.

use futures_util::future::join_all;
use std::future::Future;

/// Runs `requests` in chunks of `concurrency`, awaiting each chunk fully
/// before starting the next.
///
/// Every result is captured in input order; one failure never cancels its
/// siblings. A `concurrency` of zero is treated as one. Requests are lazy
/// futures, so at most `concurrency` of them are polled at any time.
pub async fn batch<I, Fut, T, E>(requests: I, concurrency: usize) -> Vec<Result<T, E>>
where
    I: IntoIterator<Item = Fut>,
    Fut: Future<Output = Result<T, E>>,
{
    let chunk_size = concurrency.max(1);
    let mut pending = requests.into_iter().peekable();
    let mut settled = Vec::new();
    while pending.peek().is_some() {
        let chunk: Vec<Fut> = pending.by_ref().take(chunk_size).collect();
        settled.extend(join_all(chunk).await);
    }
    settled
}
