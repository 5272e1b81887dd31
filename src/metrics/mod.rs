//! Per-channel metric kernels: time-domain ("basic") and spectral ("ppsd").

pub mod basic;
pub mod ppsd;

/// A single-trace waveform segment: samples plus the absolute time of the
/// first sample and the sample rate.
#[derive(Debug, Clone)]
pub struct Trace {
    pub samples: Vec<f64>,
    pub start: chrono::DateTime<chrono::Utc>,
    pub sample_rate_hz: f64,
}

impl Trace {
    pub fn end(&self) -> chrono::DateTime<chrono::Utc> {
        if self.sample_rate_hz <= 0.0 || self.samples.is_empty() {
            return self.start;
        }
        let duration_s = (self.samples.len() as f64 - 1.0) / self.sample_rate_hz;
        self.start + chrono::Duration::milliseconds((duration_s * 1000.0) as i64)
    }
}

/// A stream is an ordered set of traces for one channel, possibly with gaps
/// and overlaps between consecutive traces.
#[derive(Debug, Clone, Default)]
pub struct Stream {
    pub traces: Vec<Trace>,
}

impl Stream {
    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }

    /// Deltas (seconds) between the end of trace `i` and the start of trace
    /// `i+1`; positive ⇒ gap, non-positive ⇒ overlap.
    pub fn gap_deltas(&self) -> Vec<f64> {
        let mut deltas = Vec::new();
        for pair in self.traces.windows(2) {
            let gap = (pair[1].start - pair[0].end()).num_milliseconds() as f64 / 1000.0;
            deltas.push(gap);
        }
        deltas
    }

    pub fn min_start(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.traces.iter().map(|t| t.start).min()
    }

    pub fn max_end(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.traces.iter().map(|t| t.end()).max()
    }
}
