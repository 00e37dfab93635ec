use std::future::Future;

use futures_util::stream::{self, StreamExt};

/// Default number of in-flight fetches.
pub const DEFAULT_THROTTLE_LIMIT: usize = 10;

/// Drive `tasks` with at most `limit` in flight and settle every one of them.
///
/// Tasks are admitted in order; whenever one completes the next is admitted.
/// A failing task (one that resolves to an `Err` or `None`) does not cancel
/// its siblings. Outputs are returned in admission order regardless of
/// completion order.
pub async fn throttle<F, T>(tasks: impl IntoIterator<Item = F>, limit: usize) -> Vec<T>
where
    F: Future<Output = T>,
{
    let mut settled = stream::iter(
        tasks
            .into_iter()
            .enumerate()
            .map(|(index, task)| async move { (index, task.await) }),
    )
    .buffer_unordered(limit.max(1))
    .collect::<Vec<_>>()
    .await;
    settled.sort_by_key(|(index, _)| *index);
    settled.into_iter().map(|(_, output)| output).collect()
}
