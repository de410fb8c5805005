use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::sleep;

use crate::error::ProbeError;

/// Runs probe cycles back to back with a fixed pause in between.
pub struct Scheduler {
    interval: Duration,
    max_runs: Option<u64>,
}

impl Scheduler {
    pub fn new(interval_secs: u64, max_runs: Option<u64>) -> Self {
        Self {
            interval: Duration::from_secs(interval_secs),
            max_runs,
        }
    }

    /// job: async closure for each cycle, given the cycle number
    ///
    /// A cycle always completes before the next one starts. Stops after
    /// `max_runs` cycles, on the first error, or once `shutdown` flips to true.
    pub async fn run<J, F>(&self, mut shutdown: watch::Receiver<bool>, mut job: J) -> Result<u64, ProbeError>
    where
        J: FnMut(u64) -> F,
        F: Future<Output = Result<(), ProbeError>>,
    {
        let mut runs = 0;
        loop {
            if *shutdown.borrow() {
                break;
            }
            job(runs).await?;
            runs += 1;
            if Some(runs) == self.max_runs {
                break;
            }
            tokio::select! {
                _ = sleep(self.interval) => {}
                _ = stopped(&mut shutdown) => break,
            }
        }
        Ok(runs)
    }
}

async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    // a dropped sender can never stop us
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}
