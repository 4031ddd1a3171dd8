// src/monitoring/health.rs
//! Health reporting for the engine.

use crate::generation::GenerationState;
use crate::stats::EngineStatus;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Overall system health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "HEALTHY",
            HealthStatus::Degraded => "DEGRADED",
            HealthStatus::Unhealthy => "UNHEALTHY",
        }
    }
}

/// What the engine knows about itself at the moment of the check
#[derive(Debug, Clone, Copy)]
pub struct HealthInputs {
    pub status: EngineStatus,
    pub scheduling_enabled: bool,
    pub scheduler_running: bool,
    pub in_flight_jobs: usize,
    pub generation: GenerationState,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub ok: bool,
    pub health: HealthStatus,
    pub status: EngineStatus,
    pub scheduler_running: bool,
    pub in_flight_jobs: usize,
    pub generation: GenerationState,
    pub checked_at: DateTime<Utc>,
    pub summary: String,
}

impl HealthReport {
    pub fn assess(inputs: HealthInputs, checked_at: DateTime<Utc>) -> Self {
        let health = match inputs.status {
            EngineStatus::Running if inputs.scheduling_enabled && !inputs.scheduler_running => {
                HealthStatus::Degraded
            }
            EngineStatus::Running => HealthStatus::Healthy,
            EngineStatus::Starting => HealthStatus::Degraded,
            EngineStatus::ShuttingDown | EngineStatus::Stopped => HealthStatus::Unhealthy,
        };

        let summary = format!(
            "{} | engine {} | scheduler {} | {} job(s) in flight | generation {:?}",
            health.as_str(),
            inputs.status.as_str(),
            if inputs.scheduler_running {
                "running"
            } else if inputs.scheduling_enabled {
                "stopped"
            } else {
                "disabled"
            },
            inputs.in_flight_jobs,
            inputs.generation
        );

        Self {
            ok: health == HealthStatus::Healthy,
            health,
            status: inputs.status,
            scheduler_running: inputs.scheduler_running,
            in_flight_jobs: inputs.in_flight_jobs,
            generation: inputs.generation,
            checked_at,
            summary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(status: EngineStatus, scheduler_running: bool) -> HealthInputs {
        HealthInputs {
            status,
            scheduling_enabled: true,
            scheduler_running,
            in_flight_jobs: 0,
            generation: GenerationState::Idle,
        }
    }

    #[test]
    fn test_health_assessment() {
        let now = Utc::now();
        assert!(HealthReport::assess(inputs(EngineStatus::Running, true), now).ok);

        let degraded = HealthReport::assess(inputs(EngineStatus::Running, false), now);
        assert!(!degraded.ok);
        assert_eq!(degraded.health, HealthStatus::Degraded);

        let stopped = HealthReport::assess(inputs(EngineStatus::Stopped, false), now);
        assert_eq!(stopped.health, HealthStatus::Unhealthy);
    }

    #[test]
    fn test_scheduler_may_be_disabled() {
        let report = HealthReport::assess(
            HealthInputs {
                scheduling_enabled: false,
                ..inputs(EngineStatus::Running, false)
            },
            Utc::now(),
        );
        assert!(report.ok);
        assert!(report.summary.contains("disabled"));
    }
}
