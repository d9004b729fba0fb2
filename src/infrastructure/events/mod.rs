use crate::domain::errors::DomainResult;
use crate::domain::events::EmailEvent;
use crate::domain::ports::event_bus::{EventBus, EventStream};
use futures::Stream;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;

type Channels = Arc<Mutex<HashMap<String, broadcast::Sender<EmailEvent>>>>;

fn lock(channels: &Channels) -> MutexGuard<'_, HashMap<String, broadcast::Sender<EmailEvent>>> {
    // The map stays consistent even if a holder panicked; every critical
    // section is a single insert/remove.
    channels.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// In-process event bus with one broadcast channel per user.
///
/// Channels are created on first subscribe and pruned once the last
/// subscription goes away, so the registry only holds users with an open
/// stream.
#[derive(Clone)]
pub struct LocalEventBus {
    capacity: usize,
    channels: Channels,
}

impl LocalEventBus {
    /// `capacity` is the per-channel backlog before a slow subscriber lags.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            channels: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of users with at least one live channel.
    pub fn channel_count(&self) -> usize {
        lock(&self.channels).len()
    }
}

impl Default for LocalEventBus {
    fn default() -> Self {
        Self::new(100)
    }
}

impl EventBus for LocalEventBus {
    fn publish(&self, user_id: &str, event: EmailEvent) -> DomainResult<usize> {
        let event_type = event.event_type.as_str();
        let mut channels = lock(&self.channels);

        let Some(tx) = channels.get(user_id) else {
            tracing::debug!(user_id, event_type, "No subscribers for user, event dropped");
            metrics::counter!("mailsentry_events_dropped_total").increment(1);
            return Ok(0);
        };

        match tx.send(event) {
            Ok(delivered) => {
                metrics::counter!("mailsentry_events_published_total", "event_type" => event_type)
                    .increment(1);
                Ok(delivered)
            }
            Err(_) => {
                // Every receiver is gone; the entry is stale.
                channels.remove(user_id);
                tracing::debug!(user_id, event_type, "Subscribers gone, event dropped");
                metrics::counter!("mailsentry_events_dropped_total").increment(1);
                Ok(0)
            }
        }
    }

    fn subscribe(&self, user_id: &str) -> EventStream {
        let rx = {
            let mut channels = lock(&self.channels);
            channels
                .entry(user_id.to_string())
                .or_insert_with(|| broadcast::channel(self.capacity).0)
                .subscribe()
        };

        tracing::debug!(user_id, "Subscribed to event channel");

        Box::pin(Subscription {
            user_id: user_id.to_string(),
            inner: Some(Box::pin(BroadcastStream::new(rx))),
            channels: self.channels.clone(),
        })
    }

    fn subscriber_count(&self, user_id: &str) -> usize {
        lock(&self.channels)
            .get(user_id)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }
}

/// A live subscription. Dropping it releases the receiver and prunes the
/// user's channel when nobody else is listening.
struct Subscription {
    user_id: String,
    inner: Option<Pin<Box<BroadcastStream<EmailEvent>>>>,
    channels: Channels,
}

impl Stream for Subscription {
    type Item = Result<EmailEvent, u64>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let Some(inner) = this.inner.as_mut() else {
            return Poll::Ready(None);
        };

        match inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(event))) => Poll::Ready(Some(Ok(event))),
            Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(skipped)))) => {
                tracing::warn!(user_id = %this.user_id, skipped, "Subscriber lagged behind");
                Poll::Ready(Some(Err(skipped)))
            }
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // Release our receiver before inspecting the count.
        self.inner.take();

        let mut channels = lock(&self.channels);
        if let Some(tx) = channels.get(&self.user_id) {
            if tx.receiver_count() == 0 {
                channels.remove(&self.user_id);
                tracing::debug!(user_id = %self.user_id, "Pruned idle event channel");
            }
        }
    }
}
