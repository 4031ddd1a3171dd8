//! Wall-time measurement for refresh runs and generation stages.

use log::{debug, info, warn};
use std::time::{Duration, Instant};

/// Measures one run and the stages inside it.
#[derive(Debug)]
pub struct Timer {
    label: String,
    started: Instant,
    stages: Vec<(String, Instant)>,
}

impl Timer {
    pub fn start(label: &str) -> Self {
        debug!("{} started", label);
        Self {
            label: label.to_string(),
            started: Instant::now(),
            stages: Vec::new(),
        }
    }

    /// Marks the end of a stage.
    pub fn stage(&mut self, name: &str) {
        let now = Instant::now();
        debug!(
            "{}: {} done at +{}ms",
            self.label,
            name,
            now.duration_since(self.started).as_millis()
        );
        self.stages.push((name.to_string(), now));
    }

    /// Logs the total and per-stage durations.
    pub fn finish(self) -> Duration {
        let total = self.started.elapsed();
        self.report(total);
        total
    }

    /// Like [`Timer::finish`], plus a warning when the run exceeded `budget`.
    pub fn finish_warn_over(self, budget: Duration) -> Duration {
        let total = self.started.elapsed();
        self.report(total);
        if total > budget {
            warn!(
                "{} was slow: {}ms against {}ms allowed",
                self.label,
                total.as_millis(),
                budget.as_millis()
            );
        }
        total
    }

    fn report(&self, total: Duration) {
        info!("{} finished in {}ms", self.label, total.as_millis());

        let mut previous = self.started;
        for (name, at) in &self.stages {
            debug!("  {}: {}ms", name, at.duration_since(previous).as_millis());
            previous = *at;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stages_are_recorded_in_order() {
        let mut timer = Timer::start("unit");
        timer.stage("fetch");
        timer.stage("write");
        let names: Vec<&str> = timer.stages.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["fetch", "write"]);
        assert!(timer.stages[0].1 <= timer.stages[1].1);
        assert!(timer.finish_warn_over(Duration::from_secs(60)) < Duration::from_secs(60));
    }
}
