// src/scheduler/mod.rs
//! Recurring-job register driven by an external tick.
//!
//! Each registered job carries its own cadence and an in-flight flag. A tick dispatches every
//! due job that is not already running as its own tokio task and moves its `next_run_at`
//! forward by one interval whatever the outcome. A job that is still running when it comes due
//! again is skipped and stays due, so at most one run per job is ever in flight.

use crate::clock::SharedClock;
use crate::error::{BotError, Result};
use crate::utils::timing::Timer;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use log::{debug, error, info, warn};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Unit of recurring work. Failures are logged by the scheduler and never retried before the
/// next interval.
#[async_trait]
pub trait ScheduledTask: Send + Sync {
    async fn run(&self) -> Result<()>;
}

struct JobSlot {
    interval: Duration,
    last_run_at: Option<DateTime<Utc>>,
    next_run_at: DateTime<Utc>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    task: Arc<dyn ScheduledTask>,
}

/// Clears the in-flight flag when the job task ends, including by panic or cancellation.
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct Scheduler {
    jobs: DashMap<String, JobSlot>,
    clock: SharedClock,
}

fn chrono_interval(interval: Duration) -> ChronoDuration {
    ChronoDuration::from_std(interval).unwrap_or_else(|_| ChronoDuration::days(365))
}

impl Scheduler {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            jobs: DashMap::new(),
            clock,
        }
    }

    /// Registers a job whose first run is due immediately.
    pub fn register_job(
        &self,
        name: &str,
        interval: Duration,
        task: Arc<dyn ScheduledTask>,
    ) -> Result<()> {
        if interval.is_zero() {
            return Err(BotError::ConfigError(format!(
                "Job '{}' needs a non-zero interval",
                name
            )));
        }
        if self.jobs.contains_key(name) {
            return Err(BotError::ConfigError(format!(
                "Job '{}' is already registered",
                name
            )));
        }

        self.jobs.insert(
            name.to_string(),
            JobSlot {
                interval,
                last_run_at: None,
                next_run_at: self.clock.now(),
                running: Arc::new(AtomicBool::new(false)),
                handle: None,
                task,
            },
        );
        info!("Registered job '{}' every {:?}", name, interval);
        Ok(())
    }

    fn dispatch(name: &str, slot: &mut JobSlot) {
        if let Some(handle) = slot.handle.take() {
            if !handle.is_finished() {
                debug!("Job '{}' previous handle still settling", name);
            }
        }

        slot.running.store(true, Ordering::SeqCst);
        let guard = RunningGuard(slot.running.clone());
        let task = slot.task.clone();
        let job_name = name.to_string();

        slot.handle = Some(tokio::spawn(async move {
            let _guard = guard;
            let timer = Timer::start(&format!("job '{}'", job_name));
            match task.run().await {
                Ok(()) => {
                    timer.finish();
                }
                Err(e) if e.is_soft() => {
                    warn!("Job '{}' finished with soft failure: {}", job_name, e);
                }
                Err(e) => {
                    error!("Job '{}' failed: {}", job_name, e);
                }
            }
        }));
    }

    /// Dispatches every due, idle job. Returns the names dispatched.
    pub fn tick(&self, now: DateTime<Utc>) -> Vec<String> {
        let mut dispatched = Vec::new();

        for mut entry in self.jobs.iter_mut() {
            let name = entry.key().clone();
            let slot = entry.value_mut();
            if slot.next_run_at > now {
                continue;
            }
            if slot.running.load(Ordering::SeqCst) {
                debug!("Job '{}' is due but still running, skipping", name);
                continue;
            }

            Self::dispatch(&name, slot);
            slot.last_run_at = Some(now);
            slot.next_run_at = now + chrono_interval(slot.interval);
            dispatched.push(name);
        }

        dispatched.sort();
        if !dispatched.is_empty() {
            debug!("Tick dispatched: {:?}", dispatched);
        }
        dispatched
    }

    /// Runs a job outside its cadence. The cadence itself is left alone.
    pub fn run_now(&self, name: &str) -> Result<()> {
        let mut slot = self
            .jobs
            .get_mut(name)
            .ok_or_else(|| BotError::UnknownJob(name.to_string()))?;

        if slot.running.load(Ordering::SeqCst) {
            return Err(BotError::JobAlreadyRunning(name.to_string()));
        }

        Self::dispatch(name, &mut slot);
        slot.last_run_at = Some(self.clock.now());
        info!("Job '{}' dispatched on demand", name);
        Ok(())
    }

    pub fn next_run_for(&self, name: &str) -> Option<DateTime<Utc>> {
        self.jobs.get(name).map(|slot| slot.next_run_at)
    }

    pub fn last_run_for(&self, name: &str) -> Option<DateTime<Utc>> {
        self.jobs.get(name).and_then(|slot| slot.last_run_at)
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.jobs
            .get(name)
            .map(|slot| slot.running.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    pub fn in_flight_count(&self) -> usize {
        self.jobs
            .iter()
            .filter(|slot| slot.running.load(Ordering::SeqCst))
            .count()
    }

    pub fn job_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.jobs.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Awaits every in-flight job task.
    pub async fn wait_idle(&self) {
        let handles: Vec<(String, JoinHandle<()>)> = self
            .jobs
            .iter_mut()
            .filter_map(|mut entry| {
                let name = entry.key().clone();
                entry.value_mut().handle.take().map(|h| (name, h))
            })
            .collect();

        for (name, handle) in handles {
            if let Err(e) = handle.await {
                error!("Job '{}' task ended abnormally: {}", name, e);
            }
        }
    }

    /// Ticks on `tick_every` until `shutdown` turns true. `after_tick` sees the scheduler and
    /// the jobs dispatched on each tick.
    pub async fn run<F>(
        &self,
        tick_every: Duration,
        mut shutdown: watch::Receiver<bool>,
        mut after_tick: F,
    ) where
        F: FnMut(&Scheduler, &[String]) + Send,
    {
        if *shutdown.borrow() {
            return;
        }
        info!("Scheduler loop started (tick every {:?})", tick_every);

        let mut interval = tokio::time::interval(tick_every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let dispatched = self.tick(self.clock.now());
                    after_tick(self, &dispatched);
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Scheduler loop stopped");
    }
}
