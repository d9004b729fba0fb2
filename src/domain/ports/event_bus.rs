use crate::domain::errors::DomainResult;
use crate::domain::events::EmailEvent;
use futures::Stream;
use std::pin::Pin;

/// Item yielded by a subscription. `Err(n)` means the subscriber fell behind and
/// `n` events were skipped.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<EmailEvent, u64>> + Send>>;

pub trait EventBus: Send + Sync {
    /// Non-blocking. Returns how many subscribers the event reached; zero means
    /// it was dropped.
    fn publish(&self, user_id: &str, event: EmailEvent) -> DomainResult<usize>;

    /// Only events published after this call returns are delivered. Dropping the
    /// stream unsubscribes.
    fn subscribe(&self, user_id: &str) -> EventStream;

    fn subscriber_count(&self, user_id: &str) -> usize;
}
