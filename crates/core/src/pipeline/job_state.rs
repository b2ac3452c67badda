use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};

/// Shared, lock-free state of one running job.
///
/// The cancellation flag and progress percent are the only things other
/// threads (a GUI, a signal handler) may touch while the job runs.
#[derive(Debug, Default)]
pub struct JobState {
    cancelled: AtomicBool,
    progress: AtomicU8,
    faces_detected: AtomicUsize,
    failed_units: AtomicUsize,
}

impl JobState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn progress(&self) -> u8 {
        self.progress.load(Ordering::Relaxed)
    }

    /// Records `done` of `total` units and returns the new percentage
    /// (`floor(done * 100 / total)`) only if it went up.
    pub fn record_progress(&self, done: usize, total: usize) -> Option<u8> {
        if total == 0 {
            return None;
        }
        let percent = (done.min(total) * 100 / total) as u8;
        let previous = self.progress.fetch_max(percent, Ordering::Relaxed);
        (percent > previous).then_some(percent)
    }

    pub fn add_faces(&self, count: usize) {
        self.faces_detected.fetch_add(count, Ordering::Relaxed);
    }

    pub fn faces_detected(&self) -> usize {
        self.faces_detected.load(Ordering::Relaxed)
    }

    pub fn record_failure(&self) {
        self.failed_units.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failed_units(&self) -> usize {
        self.failed_units.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::sync::Arc;

    #[test]
    fn test_cancel_is_idempotent() {
        let job = JobState::new();
        assert!(!job.is_cancelled());
        job.cancel();
        job.cancel();
        assert!(job.is_cancelled());
    }

    #[test]
    fn test_cancel_visible_across_threads() {
        let job = Arc::new(JobState::new());
        let remote = job.clone();
        std::thread::spawn(move || remote.cancel()).join().unwrap();
        assert!(job.is_cancelled());
    }

    #[rstest]
    #[case::first_unit(1, 300, None)]
    #[case::three_units(3, 300, Some(1))]
    #[case::floors(299, 300, Some(99))]
    #[case::done(300, 300, Some(100))]
    #[case::unknown_total(5, 0, None)]
    fn test_record_progress(
        #[case] done: usize,
        #[case] total: usize,
        #[case] expected: Option<u8>,
    ) {
        assert_eq!(JobState::new().record_progress(done, total), expected);
    }

    #[test]
    fn test_progress_reported_only_on_change_and_never_decreases() {
        let job = JobState::new();
        let reported: Vec<u8> = (1..=250)
            .filter_map(|done| job.record_progress(done, 250))
            .collect();
        assert_eq!(reported, (1..=100).collect::<Vec<u8>>());
        assert_eq!(job.record_progress(10, 250), None);
        assert_eq!(job.progress(), 100);
    }

    #[test]
    fn test_counters() {
        let job = JobState::new();
        job.add_faces(3);
        job.add_faces(2);
        job.record_failure();
        assert_eq!(job.faces_detected(), 5);
        assert_eq!(job.failed_units(), 1);
    }
}
