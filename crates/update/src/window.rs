use futures::StreamExt;
use futures::stream::FuturesUnordered;
use std::future::Future;

/// Drive `tasks` with at most `limit` in flight, returning their outputs in
/// completion order. Pending tasks are promoted FIFO as others finish.
pub(crate) async fn bounded<F: Future>(tasks: impl IntoIterator<Item = F>, limit: usize) -> Vec<F::Output> {
    let mut pending = tasks.into_iter();
    let mut in_flight: FuturesUnordered<F> = pending.by_ref().take(limit.max(1)).collect();
    let mut outputs = Vec::new();
    while let Some(output) = in_flight.next().await {
        outputs.push(output);
        if let Some(next) = pending.next() {
            in_flight.push(next);
        }
    }
    outputs
}
