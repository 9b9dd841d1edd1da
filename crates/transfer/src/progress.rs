use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::types::{SessionStatus, UploadSession};

/// Snapshot of an upload session's progress.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadProgress {
    pub upload_id: String,
    pub status: SessionStatus,
    pub total_chunks: u32,
    pub completed_chunks: u32,
    pub total_bytes: u64,
    pub uploaded_bytes: u64,
    pub elapsed: Option<Duration>,
    /// Recent transfer rate; 0.0 until measured.
    pub bytes_per_second: f64,
    /// Time left at the recent rate.
    pub eta: Option<Duration>,
    pub error: String,
}

impl UploadProgress {
    /// Fraction of requested bytes uploaded, in `0.0..=1.0`.
    pub fn fraction(&self) -> f64 {
        if self.total_bytes == 0 {
            return if self.completed_chunks >= self.total_chunks {
                1.0
            } else {
                0.0
            };
        }
        (self.uploaded_bytes as f64 / self.total_bytes as f64).min(1.0)
    }

    /// Bytes left to upload.
    pub fn remaining_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.uploaded_bytes)
    }
}

// ---------------------------------------------------------------------------
// SpeedCalculator
// ---------------------------------------------------------------------------

/// Upload rate over a sliding time window.
pub struct SpeedCalculator {
    inner: Mutex<SpeedInner>,
}

struct SpeedInner {
    samples: VecDeque<(Instant, u64)>,
    max_samples: usize,
    window: Duration,
}

impl Default for SpeedCalculator {
    fn default() -> Self {
        Self::new(Duration::from_secs(5), 100)
    }
}

impl SpeedCalculator {
    pub fn new(window: Duration, max_samples: usize) -> Self {
        Self {
            inner: Mutex::new(SpeedInner {
                samples: VecDeque::new(),
                max_samples: max_samples.max(2),
                window,
            }),
        }
    }

    /// Records `bytes` transferred now.
    pub fn record(&self, bytes: u64) {
        self.record_at(Instant::now(), bytes);
    }

    fn record_at(&self, at: Instant, bytes: u64) {
        let mut s = self.inner.lock().unwrap();
        s.samples.push_back((at, bytes));

        let window = s.window;
        while let Some(&(t, _)) = s.samples.front() {
            if at.duration_since(t) > window {
                s.samples.pop_front();
            } else {
                break;
            }
        }
        while s.samples.len() > s.max_samples {
            s.samples.pop_front();
        }
    }

    /// Average bytes per second over the window; 0.0 with fewer than 2 samples.
    pub fn bytes_per_second(&self) -> f64 {
        let s = self.inner.lock().unwrap();
        let (Some(&(first, _)), Some(&(last, _))) = (s.samples.front(), s.samples.back()) else {
            return 0.0;
        };
        let elapsed = last.duration_since(first);
        if s.samples.len() < 2 || elapsed.is_zero() {
            return 0.0;
        }
        // The first sample marks the window start; its bytes precede it.
        let bytes: u64 = s.samples.iter().skip(1).map(|&(_, b)| b).sum();
        bytes as f64 / elapsed.as_secs_f64()
    }

    /// Estimated time to upload `remaining` bytes at the current rate.
    pub fn eta(&self, remaining: u64) -> Option<Duration> {
        let speed = self.bytes_per_second();
        (speed > 0.0).then(|| Duration::from_secs_f64(remaining as f64 / speed))
    }
}

// ---------------------------------------------------------------------------
// ProgressTracker
// ---------------------------------------------------------------------------

/// Live progress of one upload: the session's chunk accounting plus the
/// recent transfer rate.
///
/// Shared by the chunk workers through `&self`.
pub struct ProgressTracker<'a> {
    session: &'a UploadSession,
    speed: SpeedCalculator,
}

impl<'a> ProgressTracker<'a> {
    /// Starts measuring from now.
    pub fn new(session: &'a UploadSession) -> Self {
        let speed = SpeedCalculator::default();
        speed.record(0);
        Self { session, speed }
    }

    /// Records a finished chunk and returns the updated progress.
    ///
    /// A chunk reported twice is counted once.
    pub fn chunk_done(&self, index: u32, bytes: u64) -> UploadProgress {
        if self.session.mark_chunk_done(index, bytes) {
            self.speed.record(bytes);
        }
        self.snapshot()
    }

    pub fn snapshot(&self) -> UploadProgress {
        let mut progress = self.session.progress();
        progress.bytes_per_second = self.speed.bytes_per_second();
        progress.eta = self.speed.eta(progress.remaining_bytes());
        progress
    }
}
