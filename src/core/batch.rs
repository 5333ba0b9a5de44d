use anyhow::Result;
use futures::future::join_all;
use futures::stream::{Stream, StreamExt};
use std::future::Future;

/// Feed a fallible stream through `processor` in batches of `concurrency`.
///
/// The next batch is not pulled from the stream until every future of the
/// current one has finished. The first error of a batch is returned once the
/// batch has settled and no further batches are started.
pub async fn process_in_batches<S, T, R, F, Fut>(items: S, concurrency: usize, processor: F) -> Result<Vec<R>>
where
    S: Stream<Item=Result<T>>,
    F: Fn(T) -> Fut,
    Fut: Future<Output=Result<R>>,
{
    let mut batches = std::pin::pin!(items.chunks(concurrency.max(1)));
    let mut outcomes = Vec::new();

    while let Some(batch) = batches.next().await {
        let batch = batch.into_iter().collect::<Result<Vec<T>>>()?;

        let results = join_all(batch.into_iter().map(&processor)).await;

        for result in results {
            outcomes.push(result?);
        }
    }

    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn numbers(n: usize) -> impl Stream<Item=Result<usize>> {
        futures::stream::iter((0..n).map(Ok))
    }

    #[tokio::test]
    async fn test_all_items_processed() {
        let outcomes = process_in_batches(numbers(7), 3, |n| async move { Ok(n * 2) }).await.unwrap();

        let mut sorted = outcomes.clone();
        sorted.sort();
        assert_eq!(sorted, vec![0, 2, 4, 6, 8, 10, 12]);
    }

    #[tokio::test]
    async fn test_in_flight_never_exceeds_concurrency() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        process_in_batches(numbers(10), 3, |_| {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .await
        .unwrap();

        assert_eq!(peak.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_batches_are_strictly_ordered() {
        let finished = Arc::new(Mutex::new(Vec::new()));

        process_in_batches(numbers(6), 2, |n| {
            let finished = finished.clone();
            async move {
                // Earlier items in a batch take longer
                tokio::time::sleep(Duration::from_millis(((6 - n) * 3) as u64)).await;
                finished.lock().unwrap().push(n);
                Ok(())
            }
        })
        .await
        .unwrap();

        let order = finished.lock().unwrap().clone();
        for (position, n) in order.iter().enumerate() {
            assert_eq!(n / 2, position / 2, "item {} finished outside its batch: {:?}", n, order);
        }
    }

    #[tokio::test]
    async fn test_error_stops_later_batches() {
        let processed = Arc::new(AtomicUsize::new(0));

        let result = process_in_batches(numbers(9), 3, |n| {
            let processed = processed.clone();
            async move {
                processed.fetch_add(1, Ordering::SeqCst);
                if n == 4 {
                    Err(anyhow!("boom"))
                } else {
                    Ok(())
                }
            }
        })
        .await;

        assert!(result.is_err());
        // Batch two settles fully, batch three never starts
        assert_eq!(processed.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_stream_error_propagates() {
        let items = futures::stream::iter(vec![Ok(1), Err(anyhow!("listing failed")), Ok(3)]);

        let result = process_in_batches(items, 10, |n: i32| async move { Ok(n) }).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_zero_concurrency_is_treated_as_one() {
        let outcomes = process_in_batches(numbers(3), 0, |n| async move { Ok(n) }).await.unwrap();
        assert_eq!(outcomes, vec![0, 1, 2]);
    }
}
