use crate::pipeline::pipeline_executor::PipelineStats;

/// Cross-cutting logger for pipeline orchestration events.
///
/// Decouples use cases from specific output mechanisms (stdout, GUI signals,
/// log crate) so each caller can observe pipeline behavior without changing
/// the orchestration code.
pub trait PipelineLogger: Send {
    /// Called with the new percentage each time it increases.
    fn progress(&mut self, percent: u8);

    /// Log a human-readable status message.
    fn info(&mut self, message: &str);

    /// Emit an end-of-pipeline summary. Default: no-op.
    fn summary(&mut self, _stats: &PipelineStats) {}
}

/// Silent logger that discards all events.
///
/// Used by embedders with their own progress reporting and by tests.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn progress(&mut self, _percent: u8) {}
    fn info(&mut self, _message: &str) {}
}

/// CLI-oriented logger writing through the `log` facade.
///
/// Progress lines are throttled to every `step_percent` percent.
pub struct StdoutPipelineLogger {
    step_percent: u8,
    last_logged: Option<u8>,
    whitelist_size: usize,
}

impl StdoutPipelineLogger {
    pub fn new(step_percent: u8) -> Self {
        Self {
            step_percent: step_percent.clamp(1, 100),
            last_logged: None,
            whitelist_size: 0,
        }
    }

    /// Number of whitelisted identities, reported in the summary.
    pub fn with_whitelist_size(mut self, whitelist_size: usize) -> Self {
        self.whitelist_size = whitelist_size;
        self
    }

    fn should_log(&self, percent: u8) -> bool {
        match self.last_logged {
            None => true,
            Some(_) if percent >= 100 => true,
            Some(last) => percent / self.step_percent > last / self.step_percent,
        }
    }

    pub fn summary_string(&self, stats: &PipelineStats) -> String {
        let mut lines = vec![format!(
            "Pipeline summary ({} frames, {:.1}s total):",
            stats.units_written,
            stats.elapsed.as_secs_f64()
        )];
        if let Some(fps) = stats.throughput() {
            lines.push(format!("  Throughput: {fps:.1} fps"));
        }
        lines.push(format!("  Faces detected: {}", stats.faces_detected));
        lines.push(format!("  Failed frames: {}", stats.failed_units));
        lines.push(format!("  Whitelisted identities: {}", self.whitelist_size));
        lines.join("\n")
    }
}

impl Default for StdoutPipelineLogger {
    fn default() -> Self {
        Self::new(10)
    }
}

impl PipelineLogger for StdoutPipelineLogger {
    fn progress(&mut self, percent: u8) {
        if self.should_log(percent) {
            self.last_logged = Some(percent);
            log::info!("Processing: {percent}%");
        }
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&mut self, stats: &PipelineStats) {
        log::info!("\n\n{}", self.summary_string(stats));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn stats(units: usize, secs: u64) -> PipelineStats {
        PipelineStats {
            elapsed: Duration::from_secs(secs),
            units_written: units,
            faces_detected: 42,
            failed_units: 3,
        }
    }

    #[test]
    fn test_null_logger_all_methods_are_noop() {
        let mut logger = NullPipelineLogger;
        logger.progress(10);
        logger.info("hello");
        logger.summary(&stats(1, 1));
    }

    #[test]
    fn test_progress_throttled_to_steps() {
        let mut logger = StdoutPipelineLogger::new(10);
        let mut logged = Vec::new();
        for percent in 1..=100 {
            if logger.should_log(percent) {
                logged.push(percent);
                logger.progress(percent);
            }
        }
        assert_eq!(logged, vec![1, 10, 20, 30, 40, 50, 60, 70, 80, 90, 100]);
    }

    #[test]
    fn test_summary_includes_counts_and_fps() {
        let logger = StdoutPipelineLogger::default().with_whitelist_size(2);
        let summary = logger.summary_string(&stats(100, 4));
        assert!(summary.contains("Pipeline summary (100 frames"));
        assert!(summary.contains("Throughput: 25.0 fps"));
        assert!(summary.contains("Faces detected: 42"));
        assert!(summary.contains("Failed frames: 3"));
        assert!(summary.contains("Whitelisted identities: 2"));
    }

    #[test]
    fn test_summary_without_elapsed_time_omits_fps() {
        let logger = StdoutPipelineLogger::default();
        assert!(!logger.summary_string(&stats(5, 0)).contains("fps"));
    }

    #[test]
    fn test_default_step() {
        assert_eq!(StdoutPipelineLogger::default().step_percent, 10);
    }
}
