use extract::{PipelineReport, RunStatus};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

pub struct Metrics {
    // Runs by outcome
    runs_started: AtomicUsize,
    runs_completed: AtomicUsize,
    runs_cancelled: AtomicUsize,
    runs_failed: AtomicUsize,

    // Timing (in microseconds), finished runs only
    total_run_time_us: AtomicU64,

    // Counts
    total_chunks_processed: AtomicUsize,
    total_entities_extracted: AtomicUsize,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            runs_started: AtomicUsize::new(0),
            runs_completed: AtomicUsize::new(0),
            runs_cancelled: AtomicUsize::new(0),
            runs_failed: AtomicUsize::new(0),
            total_run_time_us: AtomicU64::new(0),
            total_chunks_processed: AtomicUsize::new(0),
            total_entities_extracted: AtomicUsize::new(0),
        })
    }

    pub fn record_start(&self) {
        self.runs_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_finish(
        &self,
        status: RunStatus,
        duration: Duration,
        report: Option<&PipelineReport>,
    ) {
        let counter = match status {
            RunStatus::Completed => &self.runs_completed,
            RunStatus::Cancelled => &self.runs_cancelled,
            RunStatus::Failed => &self.runs_failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.total_run_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);

        if let Some(report) = report {
            let (chunks, entities) = report_counts(report);
            self.total_chunks_processed.fetch_add(chunks, Ordering::Relaxed);
            self.total_entities_extracted
                .fetch_add(entities, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let completed = self.runs_completed.load(Ordering::Relaxed);
        let cancelled = self.runs_cancelled.load(Ordering::Relaxed);
        let failed = self.runs_failed.load(Ordering::Relaxed);
        let finished = completed + cancelled + failed;

        MetricsSnapshot {
            runs_started: self.runs_started.load(Ordering::Relaxed),
            runs_completed: completed,
            runs_cancelled: cancelled,
            runs_failed: failed,
            avg_run_time_ms: avg_time_ms(&self.total_run_time_us, finished),
            total_chunks_processed: self.total_chunks_processed.load(Ordering::Relaxed),
            total_entities_extracted: self.total_entities_extracted.load(Ordering::Relaxed),
        }
    }
}

/// Chunks and entities a completed report accounts for.
fn report_counts(report: &PipelineReport) -> (usize, usize) {
    match report {
        // Every chunk of a correction run comes back rewritten.
        PipelineReport::Correction {
            entities,
            corrected,
            ..
        } => (corrected.len(), entities.len()),
        PipelineReport::Consistency { chunks, entities, .. } => (*chunks, entities.len()),
        PipelineReport::Grammar { results } => (results.len(), 0),
    }
}

fn avg_time_ms(total_us: &AtomicU64, count: usize) -> f64 {
    let total = total_us.load(Ordering::Relaxed) as f64;
    if count > 0 {
        total / count as f64 / 1000.0
    } else {
        0.0
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub runs_started: usize,
    pub runs_completed: usize,
    pub runs_cancelled: usize,
    pub runs_failed: usize,
    pub avg_run_time_ms: f64,
    pub total_chunks_processed: usize,
    pub total_entities_extracted: usize,
}

pub struct TimedOperation {
    start: Instant,
}

impl TimedOperation {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
