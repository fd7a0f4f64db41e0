//! Periodic trigger: runs the pipeline on a cron schedule.
//!
//! At most one trigger is active per `TriageTrigger`; installing again
//! replaces the previous one. Runs never overlap within one process because
//! the loop awaits each run before sleeping until the next fire time.

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use cron::Schedule;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::error::ConfigError;
use crate::pipeline::processor::TriagePipeline;

struct Installed {
    handle: JoinHandle<()>,
    shutdown: Arc<AtomicBool>,
}

/// Installable/removable schedule for `TriagePipeline::run`.
pub struct TriageTrigger {
    expression: String,
    schedule: Schedule,
    installed: Mutex<Option<Installed>>,
}

impl TriageTrigger {
    /// Parse `expression` (seconds-first cron, e.g. `0 */10 * * * *`).
    pub fn new(expression: &str) -> Result<Self, ConfigError> {
        let schedule = Schedule::from_str(expression).map_err(|e| ConfigError::InvalidValue {
            key: "TRIAGE_SCHEDULE".into(),
            message: format!("invalid cron expression '{expression}': {e}"),
        })?;
        Ok(Self {
            expression: expression.to_string(),
            schedule,
            installed: Mutex::new(None),
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Next fire time after now.
    pub fn next_fire(&self) -> Option<DateTime<Utc>> {
        self.schedule.upcoming(Utc).next()
    }

    /// Start the periodic loop, replacing any trigger already installed.
    pub fn install(&self, pipeline: Arc<TriagePipeline>) {
        let shutdown = Arc::new(AtomicBool::new(false));
        let handle = spawn_schedule_loop(self.schedule.clone(), pipeline, Arc::clone(&shutdown));

        let previous = self
            .installed
            .lock()
            .ok()
            .and_then(|mut slot| slot.replace(Installed { handle, shutdown }));
        if let Some(previous) = previous {
            stop(previous);
            info!(schedule = %self.expression, "Replaced existing triage trigger");
        } else {
            info!(schedule = %self.expression, "Triage trigger installed");
        }
    }

    /// Stop the installed trigger. Returns false when none was installed.
    pub fn remove(&self) -> bool {
        let previous = self.installed.lock().ok().and_then(|mut slot| slot.take());
        match previous {
            Some(previous) => {
                stop(previous);
                info!(schedule = %self.expression, "Triage trigger removed");
                true
            }
            None => false,
        }
    }

    pub fn is_installed(&self) -> bool {
        self.installed
            .lock()
            .map(|slot| slot.as_ref().is_some_and(|i| !i.handle.is_finished()))
            .unwrap_or(false)
    }
}

impl Drop for TriageTrigger {
    fn drop(&mut self) {
        self.remove();
    }
}

fn stop(installed: Installed) {
    installed.shutdown.store(true, Ordering::Relaxed);
    installed.handle.abort();
}

fn spawn_schedule_loop(
    schedule: Schedule,
    pipeline: Arc<TriagePipeline>,
    shutdown: Arc<AtomicBool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let Some(next) = schedule.upcoming(Utc).next() else {
                warn!("Cron schedule has no upcoming fire time, trigger stopping");
                return;
            };
            let wait = (next - Utc::now()).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;

            if shutdown.load(Ordering::Relaxed) {
                info!("Triage trigger shutting down");
                return;
            }

            if let Err(e) = pipeline.run().await {
                error!(error = %e, "Scheduled triage run failed");
            }
        }
    })
}
