use std::future::Future;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;

pub const DEFAULT_FANOUT_LIMIT: usize = 10;

/// Run every task with at most `limit` in flight and return the outputs in dispatch order.
///
/// Tasks run on the caller's task, so dropping the returned future (client disconnect,
/// deadline) drops every in-flight sub-task with it and nothing partial escapes.
pub async fn fan_out<I, Fut, T>(limit: usize, tasks: I) -> Vec<T>
where
    I: IntoIterator<Item = Fut>,
    Fut: Future<Output = T>,
{
    let semaphore = Semaphore::new(limit.max(1));
    let tasks: Vec<Fut> = tasks.into_iter().collect();
    let mut slots: Vec<Option<T>> = std::iter::repeat_with(|| None).take(tasks.len()).collect();

    let sem = &semaphore;
    let mut running: FuturesUnordered<_> = tasks
        .into_iter()
        .enumerate()
        .map(|(idx, task)| async move {
            // never closed, so acquire only waits
            let _permit = sem.acquire().await.ok();
            (idx, task.await)
        })
        .collect();

    while let Some((idx, value)) = running.next().await {
        slots[idx] = Some(value);
    }

    slots.into_iter().flatten().collect()
}

/// Like [`fan_out`] for fallible tasks. Every task runs to completion; the error of the
/// earliest dispatched failing task is returned.
pub async fn try_fan_out<I, Fut, T, E>(limit: usize, tasks: I) -> Result<Vec<T>, E>
where
    I: IntoIterator<Item = Fut>,
    Fut: Future<Output = Result<T, E>>,
{
    fan_out(limit, tasks).await.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_results_follow_dispatch_order() {
        let delays = [50u64, 10, 30, 0, 20];
        let tasks = delays.iter().enumerate().map(|(i, d)| async move {
            tokio::time::sleep(Duration::from_millis(*d)).await;
            i
        });
        let out = fan_out(3, tasks).await;
        assert_eq!(out, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_is_bounded() {
        let in_flight_counter = AtomicUsize::new(0);
        let peak_counter = AtomicUsize::new(0);
        let in_flight = &in_flight_counter;
        let peak = &peak_counter;

        let tasks = (0..25).map(move |_| async move {
            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            in_flight.fetch_sub(1, Ordering::SeqCst);
        });
        let out = fan_out(DEFAULT_FANOUT_LIMIT, tasks).await;

        assert_eq!(out.len(), 25);
        assert!(peak_counter.load(Ordering::SeqCst) <= DEFAULT_FANOUT_LIMIT);
        assert_eq!(in_flight_counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_errors_do_not_short_circuit() {
        let finished = AtomicUsize::new(0);
        let tasks = (0..6).map(|i| {
            let finished = &finished;
            async move {
                finished.fetch_add(1, Ordering::SeqCst);
                if i == 2 || i == 4 {
                    Err(format!("task {i} failed"))
                } else {
                    Ok(i)
                }
            }
        });
        let res = try_fan_out(2, tasks).await;
        assert_eq!(res.unwrap_err(), "task 2 failed");
        assert_eq!(finished.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let out: Vec<u8> = fan_out(4, Vec::<std::future::Ready<u8>>::new()).await;
        assert!(out.is_empty());
    }
}
