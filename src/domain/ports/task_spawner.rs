use futures::future::BoxFuture;

/// Fire-and-forget dispatch onto the runtime's worker pool.
pub trait TaskSpawner: Send + Sync {
    fn spawn(&self, future: BoxFuture<'static, ()>);
}
