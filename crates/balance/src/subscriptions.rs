//! Upstream stream forwarding into the engine queue

use futures::stream::{BoxStream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::engine::EngineEvent;

/// Subscription generation; bumped on every wallet list change
pub type Generation = u64;

/// One upstream stream pumped into the engine queue by a background task
///
/// Dropping the subscription aborts the task, so nothing from the stream
/// reaches the engine afterwards.
pub struct Subscription {
    name: &'static str,
    handle: JoinHandle<()>,
}

impl Subscription {
    pub fn forward<T, F>(
        name: &'static str,
        mut stream: BoxStream<'static, T>,
        events: mpsc::Sender<EngineEvent>,
        to_event: F,
    ) -> Self
    where
        T: Send + 'static,
        F: Fn(T) -> EngineEvent + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            while let Some(value) = stream.next().await {
                if events.send(to_event(value)).await.is_err() {
                    break;
                }
            }
            debug!("{} stream ended", name);
        });

        Self { name, handle }
    }

    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        debug!("Cancelling {} subscription", self.name);
        self.handle.abort();
    }
}

/// Rate and adapter subscriptions installed for one wallet set
#[derive(Default)]
pub struct UpstreamSubscriptions {
    generation: Generation,
    subscriptions: Vec<Subscription>,
}

impl UpstreamSubscriptions {
    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        self.generation == generation
    }

    /// Cancel everything from the previous wallet set and open a new generation
    pub fn renew(&mut self) -> Generation {
        self.cancel();
        self.generation += 1;
        self.generation
    }

    pub fn push(&mut self, subscription: Subscription) {
        self.subscriptions.push(subscription);
    }

    pub fn cancel(&mut self) {
        self.subscriptions.clear();
    }

    pub fn active_count(&self) -> usize {
        self.subscriptions.iter().filter(|s| s.is_active()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::broadcast;
    use tokio_stream::wrappers::BroadcastStream;

    fn stream_of(rx: broadcast::Receiver<u64>) -> BoxStream<'static, u64> {
        BroadcastStream::new(rx)
            .filter_map(|value| async move { value.ok() })
            .boxed()
    }

    #[tokio::test]
    async fn test_forwarded_values_are_tagged() {
        let (source_tx, source_rx) = broadcast::channel(8);
        let (events_tx, mut events_rx) = mpsc::channel(8);

        let _subscription = Subscription::forward("test", stream_of(source_rx), events_tx, |_| {
            EngineEvent::AdaptersReady { generation: 7 }
        });

        source_tx.send(1).unwrap();
        let event = tokio::time::timeout(Duration::from_secs(1), events_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(event, EngineEvent::AdaptersReady { generation: 7 }));
    }

    #[tokio::test]
    async fn test_renew_cancels_previous_generation() {
        let (source_tx, source_rx) = broadcast::channel(8);
        let (events_tx, mut events_rx) = mpsc::channel(8);

        let mut upstream = UpstreamSubscriptions::default();
        let first = upstream.renew();
        upstream.push(Subscription::forward("test", stream_of(source_rx), events_tx, move |_| {
            EngineEvent::AdaptersReady { generation: first }
        }));
        tokio::task::yield_now().await;
        assert_eq!(upstream.active_count(), 1);

        let second = upstream.renew();
        assert_eq!(second, first + 1);
        assert!(upstream.is_current(second));
        assert!(!upstream.is_current(first));
        assert_eq!(upstream.active_count(), 0);

        // Nothing gets through once the forwarder is aborted
        let _ = source_tx.send(1);
        let received = tokio::time::timeout(Duration::from_millis(50), events_rx.recv()).await;
        assert!(matches!(received, Err(_) | Ok(None)));
    }
}
