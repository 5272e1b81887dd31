//! Time-domain ("basic") per-channel metrics: RMS, amplitude ratio,
//! availability, gap/overlap counts, and spike count.

use super::Stream;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const SPIKE_WINDOW: usize = 80;
const SPIKE_SIGMA: f64 = 10.0;
const SPIKE_EPS: f64 = 1e-9;
const CLAMP_MAX: f64 = 99_999.0;

/// Selects which spike-detection kernel `compute_basic` uses. Both are
/// required to agree on identical input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpikeEngine {
    Fast,
    Efficient,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BasicMetrics {
    pub rms: f64,
    pub ratioamp: f64,
    pub availability: f64,
    pub ngap: i64,
    pub nover: i64,
    pub n_spikes: i64,
}

/// `computeBasic(stream, windowStart, windowEnd, spikeEngine)`.
pub fn compute_basic(
    stream: &Stream,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    engine: SpikeEngine,
) -> BasicMetrics {
    if stream.is_empty() {
        return BasicMetrics {
            rms: 0.0,
            ratioamp: 1.0,
            availability: 0.0,
            ngap: 0,
            nover: 0,
            n_spikes: 0,
        };
    }

    let rms = compute_rms(stream);
    let (amp_max, amp_min) = compute_amplitude_extremes(stream);
    let ratioamp = compute_ratio(amp_max, amp_min);
    let availability = compute_availability(stream, window_start, window_end);
    let (ngap, nover) = compute_gap_overlap_counts(stream);
    let n_spikes = stream
        .traces
        .iter()
        .map(|t| count_spikes(&t.samples, engine))
        .sum();

    BasicMetrics {
        rms,
        ratioamp,
        availability,
        ngap,
        nover,
        n_spikes,
    }
}

fn compute_rms(stream: &Stream) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for trace in &stream.traces {
        let valid: Vec<f64> = trace.samples.iter().copied().filter(|x| !x.is_nan()).collect();
        if valid.is_empty() {
            continue;
        }
        let mean = valid.iter().sum::<f64>() / valid.len() as f64;
        let variance = valid.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / valid.len() as f64;
        sum += variance.sqrt();
        count += 1;
    }
    if count == 0 {
        return 0.0;
    }
    (sum / count as f64).min(CLAMP_MAX)
}

fn compute_amplitude_extremes(stream: &Stream) -> (f64, f64) {
    let mut amp_max = f64::NAN;
    let mut amp_min = f64::NAN;
    for trace in &stream.traces {
        for &x in &trace.samples {
            if x.is_nan() {
                continue;
            }
            amp_max = if amp_max.is_nan() { x } else { amp_max.max(x) };
            amp_min = if amp_min.is_nan() { x } else { amp_min.min(x) };
        }
    }
    (amp_max, amp_min)
}

fn compute_ratio(amp_max: f64, amp_min: f64) -> f64 {
    if amp_max.is_nan() || amp_min.is_nan() {
        return 0.0;
    }
    let hi = amp_max.abs().max(amp_min.abs());
    let lo = amp_max.abs().min(amp_min.abs());
    if lo == 0.0 {
        return 1.0;
    }
    (hi / lo).min(CLAMP_MAX)
}

fn compute_availability(stream: &Stream, window_start: DateTime<Utc>, window_end: DateTime<Utc>) -> f64 {
    let denom = (window_end - window_start).num_milliseconds() as f64 / 1000.0;
    if denom <= 0.0 {
        return 0.0;
    }
    let (Some(min_start), Some(max_end)) = (stream.min_start(), stream.max_end()) else {
        return 0.0;
    };
    let span = (max_end - min_start).num_milliseconds() as f64 / 1000.0;
    let gap_total: f64 = stream.gap_deltas().iter().filter(|&&d| d > 0.0).sum();
    let numerator = (span - gap_total).max(0.0);
    let availability = numerator / denom * 100.0;
    (availability.min(100.0) * 100.0).round() / 100.0
}

fn compute_gap_overlap_counts(stream: &Stream) -> (i64, i64) {
    let deltas = stream.gap_deltas();
    let ngap = deltas.iter().filter(|&&d| d > 0.0).count() as i64;
    let nover = deltas.iter().filter(|&&d| d <= 0.0).count() as i64;
    (ngap, nover)
}

fn count_spikes(samples: &[f64], engine: SpikeEngine) -> i64 {
    match engine {
        SpikeEngine::Fast => count_spikes_fast(samples),
        SpikeEngine::Efficient => count_spikes_efficient(samples),
    }
}

/// Materialises each center's window explicitly and sorts it for the median
/// and MAD — memory-heavy, allocation-per-window, but simple to verify.
fn count_spikes_fast(samples: &[f64]) -> i64 {
    let w = SPIKE_WINDOW;
    let half = w / 2;
    if samples.len() < w + 1 {
        return 0;
    }
    let mut count = 0;
    for center in half..samples.len() - half {
        let mut window: Vec<f64> = samples[center - half..=center + half].to_vec();
        let median = median_sorted(&mut window);
        let mut abs_dev: Vec<f64> = window.iter().map(|x| (x - median).abs()).collect();
        let mad = median_sorted(&mut abs_dev);
        let threshold = 1.4826 * SPIKE_SIGMA * mad + SPIKE_EPS;
        if (samples[center] - median).abs() > threshold {
            count += 1;
        }
    }
    count
}

/// Maintains the window as an incrementally updated sorted buffer (insert
/// the entering sample, remove the leaving one) instead of resorting from
/// scratch each step. Same contract as `count_spikes_fast`.
fn count_spikes_efficient(samples: &[f64]) -> i64 {
    let w = SPIKE_WINDOW;
    let half = w / 2;
    if samples.len() < w + 1 {
        return 0;
    }

    let mut sorted: Vec<f64> = samples[0..=w].to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let mut count = 0;
    let mut center = half;
    loop {
        let median = percentile_of_sorted(&sorted, 0.5);
        let mut abs_dev: Vec<f64> = sorted.iter().map(|x| (x - median).abs()).collect();
        abs_dev.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let mad = percentile_of_sorted(&abs_dev, 0.5);
        let threshold = 1.4826 * SPIKE_SIGMA * mad + SPIKE_EPS;
        if (samples[center] - median).abs() > threshold {
            count += 1;
        }

        if center + half + 1 >= samples.len() {
            break;
        }

        let leaving = samples[center - half];
        let entering = samples[center + half + 1];
        remove_sorted(&mut sorted, leaving);
        insert_sorted(&mut sorted, entering);
        center += 1;
    }
    count
}

fn median_sorted(values: &mut [f64]) -> f64 {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    percentile_of_sorted(values, 0.5)
}

fn percentile_of_sorted(sorted: &[f64], fraction: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[((n as f64 - 1.0) * fraction).round() as usize]
    } else {
        let mid = n / 2;
        (sorted[mid - 1] + sorted[mid]) / 2.0
    }
}

fn insert_sorted(sorted: &mut Vec<f64>, value: f64) {
    let pos = sorted
        .binary_search_by(|probe| probe.partial_cmp(&value).unwrap_or(std::cmp::Ordering::Equal))
        .unwrap_or_else(|e| e);
    sorted.insert(pos, value);
}

fn remove_sorted(sorted: &mut Vec<f64>, value: f64) {
    if let Ok(pos) =
        sorted.binary_search_by(|probe| probe.partial_cmp(&value).unwrap_or(std::cmp::Ordering::Equal))
    {
        sorted.remove(pos);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Trace;
    use chrono::Duration;

    fn day_window() -> (DateTime<Utc>, DateTime<Utc>) {
        let start = "2024-03-05T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        (start, start + Duration::seconds(86_400))
    }

    fn single_trace(samples: Vec<f64>) -> Stream {
        let (window_start, _) = day_window();
        Stream {
            traces: vec![Trace {
                samples,
                start: window_start,
                sample_rate_hz: 1.0,
            }],
        }
    }

    #[test]
    fn scenario_simple_ramp_trace() {
        let (window_start, window_end) = day_window();
        let stream = single_trace(vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        let metrics = compute_basic(&stream, window_start, window_end, SpikeEngine::Fast);
        assert!((metrics.rms - 1.71).abs() < 1e-2);
        assert_eq!(metrics.ratioamp, 1.0);
        assert!((metrics.availability - 0.01).abs() < 1e-2);
        assert_eq!(metrics.ngap, 0);
        assert_eq!(metrics.nover, 0);
        assert_eq!(metrics.n_spikes, 0);
    }

    #[test]
    fn spike_engines_agree_on_centered_spike() {
        let mut samples = vec![0.0; 1000];
        samples[500] = 100.0;
        assert_eq!(count_spikes_fast(&samples), 1);
        assert_eq!(count_spikes_efficient(&samples), 1);
    }

    #[test]
    fn spike_in_edge_zone_is_ignored_by_both_engines() {
        let mut samples = vec![0.0; 1000];
        samples[10] = 100.0;
        assert_eq!(count_spikes_fast(&samples), 0);
        assert_eq!(count_spikes_efficient(&samples), 0);
    }

    #[test]
    fn availability_capped_at_100() {
        let (window_start, window_end) = day_window();
        let stream = single_trace(vec![0.0; 90_000]);
        let metrics = compute_basic(&stream, window_start, window_end, SpikeEngine::Fast);
        assert!(metrics.availability <= 100.0);
    }

    #[test]
    fn empty_stream_yields_zero_availability() {
        let (window_start, window_end) = day_window();
        let stream = Stream::default();
        let metrics = compute_basic(&stream, window_start, window_end, SpikeEngine::Fast);
        assert_eq!(metrics.availability, 0.0);
    }
}
