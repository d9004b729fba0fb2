use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::application::services::MonitoringJob;
use crate::domain::errors::DomainResult;
use crate::domain::ports::task_spawner::TaskSpawner;
use crate::domain::ports::user_directory::UserDirectory;

/// Periodic fan-out of monitoring jobs.
///
/// Each tick submits one job per active, monitoring-enabled user and returns
/// without waiting for any of them. Two jobs for the same user may overlap
/// when a scan outlives the interval; that only costs duplicate IMAP work.
#[derive(Clone)]
pub struct MonitorScheduler {
    directory: Arc<dyn UserDirectory>,
    job: MonitoringJob,
    spawner: Arc<dyn TaskSpawner>,
    interval: Duration,
    permits: Arc<Semaphore>,
}

impl MonitorScheduler {
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        job: MonitoringJob,
        spawner: Arc<dyn TaskSpawner>,
        interval: Duration,
        max_concurrent_jobs: usize,
    ) -> Self {
        Self {
            directory,
            job,
            spawner,
            interval,
            permits: Arc::new(Semaphore::new(max_concurrent_jobs.max(1))),
        }
    }

    /// Start the scheduler loop in the background.
    pub fn start(self, shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move { self.run(shutdown).await })
    }

    /// Tick until `shutdown` fires. The first tick is immediate.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Starting monitor scheduler"
        );
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Monitor scheduler stopped");
                    break;
                }
                _ = ticker.tick() => {
                    match self.tick().await {
                        Ok(dispatched) => debug!(dispatched, "Scheduler tick"),
                        Err(e) => error!("Failed to list monitoring users: {}", e),
                    }
                }
            }
        }
    }

    /// Submit one job per monitorable user; returns how many were submitted.
    pub async fn tick(&self) -> DomainResult<usize> {
        let users = self.directory.list_monitoring_users().await?;
        for user in &users {
            self.dispatch(user.id.clone());
        }
        Ok(users.len())
    }

    fn dispatch(&self, user_id: String) {
        let job = self.job.clone();
        let permits = self.permits.clone();

        self.spawner.spawn(Box::pin(async move {
            // Waits here, not in the scheduler, when the pool is saturated.
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            // Outcome already logged and counted by the job.
            let _ = job.run(&user_id).await;
        }));
    }
}
