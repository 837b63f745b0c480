//! Single-slot background execution of the pipeline.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};

use crate::pipeline::{Pipeline, RunReport};

/// Something the runner can execute. [`Pipeline`] in production.
#[async_trait::async_trait]
pub trait PipelineJob: Send + Sync {
    async fn run(&self) -> RunReport;
}

#[async_trait::async_trait]
impl PipelineJob for Pipeline {
    async fn run(&self) -> RunReport {
        Pipeline::run(self).await
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStatus {
    pub running: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub last_report: Option<RunReport>,
}

/// Process-wide run flag.
#[derive(Debug, Default)]
pub struct RunState {
    inner: Mutex<RunStatus>,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RunStatus> {
        // The status is plain data, a poisoned lock leaves it usable.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Claim the slot. False if a run is already in flight.
    pub fn try_start(&self) -> bool {
        let mut status = self.lock();
        if status.running {
            return false;
        }
        status.running = true;
        true
    }

    pub fn finish(&self, at: DateTime<Utc>) {
        let mut status = self.lock();
        status.running = false;
        status.last_run = Some(at);
    }

    fn record_report(&self, report: RunReport) {
        self.lock().last_report = Some(report);
    }

    pub fn snapshot(&self) -> RunStatus {
        self.lock().clone()
    }
}

/// Releases the slot when the run task ends, however it ends.
struct SlotGuard {
    state: Arc<RunState>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        if std::thread::panicking() {
            warn!("pipeline run panicked, releasing run slot");
        }
        self.state.finish(Utc::now());
    }
}

#[derive(Clone)]
pub struct PipelineRunner {
    state: Arc<RunState>,
    job: Arc<dyn PipelineJob>,
}

impl PipelineRunner {
    pub fn new(job: Arc<dyn PipelineJob>) -> Self {
        Self {
            state: Arc::new(RunState::new()),
            job,
        }
    }

    pub fn status(&self) -> RunStatus {
        self.state.snapshot()
    }

    /// Spawn a run unless one is active. Returns whether a run was started;
    /// a refused trigger changes nothing.
    pub fn start_if_idle(&self) -> bool {
        if !self.state.try_start() {
            info!("pipeline already running, trigger ignored");
            return false;
        }

        let guard = SlotGuard {
            state: self.state.clone(),
        };
        let job = self.job.clone();
        tokio::spawn(async move {
            let report = job.run().await;
            guard.state.record_report(report);
            drop(guard);
        });
        true
    }

    /// Run in the foreground, holding the same slot. None if a run is active.
    pub async fn run_now(&self) -> Option<RunReport> {
        if !self.state.try_start() {
            return None;
        }
        let guard = SlotGuard {
            state: self.state.clone(),
        };
        let report = self.job.run().await;
        guard.state.record_report(report.clone());
        drop(guard);
        Some(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_start_is_refused_until_finish() {
        let state = RunState::new();
        assert!(state.try_start());
        assert!(!state.try_start());
        assert!(state.snapshot().running);
        assert!(state.snapshot().last_run.is_none());

        let at = Utc::now();
        state.finish(at);
        let status = state.snapshot();
        assert!(!status.running);
        assert_eq!(status.last_run, Some(at));
        assert!(state.try_start());
    }

    struct Panicking;

    #[async_trait::async_trait]
    impl PipelineJob for Panicking {
        async fn run(&self) -> RunReport {
            panic!("boom");
        }
    }

    #[tokio::test]
    async fn panicking_run_releases_slot() {
        let runner = PipelineRunner::new(Arc::new(Panicking));
        assert!(runner.start_if_idle());
        for _ in 0..100 {
            if !runner.status().running {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        let status = runner.status();
        assert!(!status.running);
        assert!(status.last_run.is_some());
        assert!(status.last_report.is_none());
    }
}
