// Write-back metrics
//
// Lightweight counters for what a merge pass actually wrote

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Counters for output produced by a [`MergedResourceWriter`](crate::merge::MergedResourceWriter).
///
/// Uses atomic operations so per-item tasks can record without locks. Counters
/// accumulate across passes; [`log_summary`](Self::log_summary) runs at the
/// end of every pass.
#[derive(Debug)]
pub struct WriteMetrics {
    /// Files copied byte for byte
    pub files_copied: AtomicU64,

    /// XML files copied with a provenance comment appended
    pub xml_files_copied: AtomicU64,

    /// Images produced by the crunch tool
    pub files_crunched: AtomicU64,

    /// Single-file outputs deleted because their item went away
    pub outputs_removed: AtomicU64,

    /// Aggregated values files (re)generated
    pub aggregates_written: AtomicU64,

    /// Aggregated values files deleted because their group became empty
    pub aggregates_removed: AtomicU64,

    /// Times the pretty printer failed and plain serialization was used
    pub printer_fallbacks: AtomicU64,

    /// Per-item tasks that failed
    pub tasks_failed: AtomicU64,

    /// Completed passes
    pub passes: AtomicU64,

    start_time: Instant,
}

impl WriteMetrics {
    pub fn new() -> Self {
        Self {
            files_copied: AtomicU64::new(0),
            xml_files_copied: AtomicU64::new(0),
            files_crunched: AtomicU64::new(0),
            outputs_removed: AtomicU64::new(0),
            aggregates_written: AtomicU64::new(0),
            aggregates_removed: AtomicU64::new(0),
            printer_fallbacks: AtomicU64::new(0),
            tasks_failed: AtomicU64::new(0),
            passes: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_copy(&self) {
        self.files_copied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_xml_copy(&self) {
        self.xml_files_copied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_crunch(&self) {
        self.files_crunched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_output_removed(&self) {
        self.outputs_removed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_aggregate_written(&self) {
        self.aggregates_written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_aggregate_removed(&self) {
        self.aggregates_removed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_printer_fallback(&self) {
        self.printer_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_task_failed(&self) {
        self.tasks_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pass(&self) {
        self.passes.fetch_add(1, Ordering::Relaxed);
    }

    /// Total single-file outputs written, however they were produced
    pub fn single_outputs_written(&self) -> u64 {
        self.files_copied.load(Ordering::Relaxed)
            + self.xml_files_copied.load(Ordering::Relaxed)
            + self.files_crunched.load(Ordering::Relaxed)
    }

    pub fn log_summary(&self) {
        tracing::info!(
            "Write metrics after {} passes ({:.2}s): {} copied, {} xml, {} crunched, {} removed",
            self.passes.load(Ordering::Relaxed),
            self.start_time.elapsed().as_secs_f64(),
            self.files_copied.load(Ordering::Relaxed),
            self.xml_files_copied.load(Ordering::Relaxed),
            self.files_crunched.load(Ordering::Relaxed),
            self.outputs_removed.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Values files: {} written, {} removed, {} printer fallbacks; {} failed tasks",
            self.aggregates_written.load(Ordering::Relaxed),
            self.aggregates_removed.load(Ordering::Relaxed),
            self.printer_fallbacks.load(Ordering::Relaxed),
            self.tasks_failed.load(Ordering::Relaxed)
        );
    }
}

impl Default for WriteMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_metrics_creation() {
        let metrics = WriteMetrics::new();
        assert_eq!(metrics.single_outputs_written(), 0);
        assert_eq!(metrics.aggregates_written.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_single_outputs_written_sums_all_kinds() {
        let metrics = WriteMetrics::new();
        metrics.record_copy();
        metrics.record_xml_copy();
        metrics.record_crunch();
        metrics.record_crunch();
        assert_eq!(metrics.single_outputs_written(), 4);
    }

    #[test]
    fn test_concurrent_recording() {
        let metrics = Arc::new(WriteMetrics::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let metrics = Arc::clone(&metrics);
                thread::spawn(move || {
                    for _ in 0..100 {
                        metrics.record_copy();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(metrics.files_copied.load(Ordering::Relaxed), 800);
    }
}
