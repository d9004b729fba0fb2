use crate::domain::ports::task_spawner::TaskSpawner;
use futures::future::BoxFuture;

/// Spawns onto the ambient tokio runtime.
#[derive(Clone, Default)]
pub struct TokioTaskSpawner;

impl TokioTaskSpawner {
    pub fn new() -> Self {
        Self
    }
}

impl TaskSpawner for TokioTaskSpawner {
    fn spawn(&self, future: BoxFuture<'static, ()>) {
        tokio::spawn(future);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_spawned_future_runs_detached() {
        let (tx, rx) = oneshot::channel();
        TokioTaskSpawner::new().spawn(Box::pin(async move {
            let _ = tx.send(42);
        }));
        assert_eq!(rx.await.unwrap(), 42);
    }
}
