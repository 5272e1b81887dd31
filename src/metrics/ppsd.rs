//! PPSD-derived per-channel metrics: percentage-outside-model, per-band
//! percentage-inside-model, dead-channel flags.
//!
//! The probabilistic PSD computation itself is explicitly out of scope for
//! this system — `PsdProvider` is the seam where a real PPSD implementation
//! plugs in. `PeriodogramPsdProvider` is a minimal in-crate implementation so
//! the kernel is exercisable end to end without an external service.

use super::Stream;
use crate::noise_model;
use crate::types::BandPct;

const MAX_PERIOD_S: f64 = 100.0;
const DCG_BAND: (f64, f64) = (4.0, 8.0);
const DCG_THRESHOLD_DB: f64 = 5.0;
const BAND_LONG: (f64, f64) = (20.0, 900.0);
const BAND_MICRO: (f64, f64) = (2.0, 25.0);
const BAND_SHORT: (f64, f64) = (0.1, 1.0);

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PpsdMetrics {
    pub pct_h: f64,
    pub pct_l: f64,
    pub dcl: f64,
    pub dcg: bool,
    pub band_pct: BandPct,
}

/// A period-vs-power curve, e.g. the percentile or mean curve obtained from
/// a probabilistic PSD.
#[derive(Debug, Clone, Default)]
pub struct PowerCurve {
    pub periods: Vec<f64>,
    pub power_db: Vec<f64>,
}

/// An opaque PPSD source: given a merged stream, produces the percentile
/// curve and the mean curve over period.
pub trait PsdProvider {
    fn compute(&self, stream: &Stream, sample_rate_hz: f64) -> Option<(PowerCurve, PowerCurve)>;
}

/// Minimal periodogram-based provider: splits each trace into overlapping
/// segments, takes a naive DFT per segment, and reduces across segments to a
/// percentile curve (median) and a mean curve.
pub struct PeriodogramPsdProvider {
    pub segment_len: usize,
}

impl Default for PeriodogramPsdProvider {
    fn default() -> Self {
        Self { segment_len: 256 }
    }
}

impl PsdProvider for PeriodogramPsdProvider {
    fn compute(&self, stream: &Stream, sample_rate_hz: f64) -> Option<(PowerCurve, PowerCurve)> {
        if sample_rate_hz <= 0.0 {
            return None;
        }
        let samples: Vec<f64> = stream.traces.iter().flat_map(|t| t.samples.iter().copied()).collect();
        if samples.len() < self.segment_len {
            return None;
        }

        let n = self.segment_len;
        let nyquist_bins = n / 2;
        let mut bin_powers: Vec<Vec<f64>> = vec![Vec::new(); nyquist_bins];

        let step = n / 2;
        let mut offset = 0;
        while offset + n <= samples.len() {
            let segment = &samples[offset..offset + n];
            let mean = segment.iter().sum::<f64>() / n as f64;
            for (k, bucket) in bin_powers.iter_mut().enumerate().take(nyquist_bins).skip(1) {
                let (mut re, mut im) = (0.0, 0.0);
                for (t, &x) in segment.iter().enumerate() {
                    let angle = -2.0 * std::f64::consts::PI * k as f64 * t as f64 / n as f64;
                    re += (x - mean) * angle.cos();
                    im += (x - mean) * angle.sin();
                }
                let power = (re * re + im * im) / n as f64;
                bucket.push(if power > 0.0 { 10.0 * power.log10() } else { -300.0 });
            }
            offset += step;
        }

        let mut periods = Vec::new();
        let mut mean_db = Vec::new();
        let mut median_db = Vec::new();
        for (k, bucket) in bin_powers.iter().enumerate().skip(1) {
            if bucket.is_empty() {
                continue;
            }
            let freq_hz = k as f64 * sample_rate_hz / n as f64;
            if freq_hz <= 0.0 {
                continue;
            }
            periods.push(1.0 / freq_hz);
            mean_db.push(bucket.iter().sum::<f64>() / bucket.len() as f64);
            let mut sorted = bucket.clone();
            sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            median_db.push(sorted[sorted.len() / 2]);
        }

        Some((
            PowerCurve {
                periods: periods.clone(),
                power_db: median_db,
            },
            PowerCurve {
                periods,
                power_db: mean_db,
            },
        ))
    }
}

/// `computePPSD(stream, inventory, plotPath?, npzPath?)`.
pub fn compute_ppsd<P: PsdProvider + ?Sized>(
    provider: &P,
    stream: &Stream,
    has_inventory: bool,
    sample_rate_hz: f64,
) -> Option<PpsdMetrics> {
    if !has_inventory {
        return None;
    }
    let has_enough_samples = stream
        .traces
        .iter()
        .any(|t| t.samples.len() as f64 > 3600.0 * sample_rate_hz);
    if !has_enough_samples {
        return None;
    }

    let (percentile_curve, mean_curve) = provider.compute(stream, sample_rate_hz)?;

    let (t_p, p_p) = drop_long_periods(&percentile_curve);
    let (t_m, p_m) = drop_long_periods(&mean_curve);

    let (nhnm, nlnm, idx) = noise_model::get_models(&t_p, &[]);
    if idx.is_empty() {
        return None;
    }
    let t_p: Vec<f64> = idx.iter().map(|&i| t_p[i]).collect();
    let p_p: Vec<f64> = idx.iter().map(|&i| p_p[i]).collect();

    let pct_h = round2(fraction_above(&p_p, &nhnm) * 100.0);
    let pct_l = round2(fraction_below(&p_p, &nlnm) * 100.0);

    let band_pct = BandPct {
        long: band_pct_inside(&t_p, &p_p, &nhnm, &nlnm, BAND_LONG),
        micro: band_pct_inside(&t_p, &p_p, &nhnm, &nlnm, BAND_MICRO),
        short: band_pct_inside(&t_p, &p_p, &nhnm, &nlnm, BAND_SHORT),
    };

    let dcg = compute_dcg(&t_p, &p_p, &nlnm);
    let dcl = compute_dcl(&t_m, &p_m, sample_rate_hz);

    Some(PpsdMetrics {
        pct_h,
        pct_l,
        dcl,
        dcg,
        band_pct,
    })
}

fn drop_long_periods(curve: &PowerCurve) -> (Vec<f64>, Vec<f64>) {
    let mut periods = Vec::new();
    let mut power = Vec::new();
    for (&t, &p) in curve.periods.iter().zip(curve.power_db.iter()) {
        if t <= MAX_PERIOD_S {
            periods.push(t);
            power.push(p);
        }
    }
    (periods, power)
}

fn fraction_above(power: &[f64], model: &[f64]) -> f64 {
    if power.is_empty() {
        return 0.0;
    }
    let n = power.iter().zip(model).filter(|(p, m)| p > m).count();
    n as f64 / power.len() as f64
}

fn fraction_below(power: &[f64], model: &[f64]) -> f64 {
    if power.is_empty() {
        return 0.0;
    }
    let n = power.iter().zip(model).filter(|(p, m)| p < m).count();
    n as f64 / power.len() as f64
}

fn band_pct_inside(
    periods: &[f64],
    power: &[f64],
    nhnm: &[f64],
    nlnm: &[f64],
    (t0, t1): (f64, f64),
) -> f64 {
    let mut total = 0usize;
    let mut inside = 0usize;
    for i in 0..periods.len() {
        if periods[i] > t0 && periods[i] < t1 {
            total += 1;
            if power[i] >= nlnm[i] && power[i] <= nhnm[i] {
                inside += 1;
            }
        }
    }
    if total == 0 {
        return 0.0;
    }
    round2(inside as f64 / total as f64 * 100.0)
}

fn compute_dcg(periods: &[f64], power: &[f64], nlnm: &[f64]) -> bool {
    let deviations: Vec<f64> = (0..periods.len())
        .filter(|&i| periods[i] > DCG_BAND.0 && periods[i] < DCG_BAND.1)
        .map(|i| nlnm[i] - power[i])
        .collect();
    if deviations.is_empty() {
        return false;
    }
    let mean = deviations.iter().sum::<f64>() / deviations.len() as f64;
    mean > DCG_THRESHOLD_DB
}

fn compute_dcl(periods: &[f64], power: &[f64], sample_rate_hz: f64) -> f64 {
    if sample_rate_hz <= 0.0 {
        return 0.0;
    }
    let lower = 4.0 / sample_rate_hz;
    let points: Vec<(f64, f64)> = periods
        .iter()
        .zip(power.iter())
        .filter(|(&t, _)| t > lower && t < MAX_PERIOD_S)
        .map(|(&t, &p)| (t.log10(), p))
        .collect();
    if points.len() < 2 {
        return 0.0;
    }

    let n = points.len() as f64;
    let sum_x: f64 = points.iter().map(|(x, _)| x).sum();
    let sum_y: f64 = points.iter().map(|(_, y)| y).sum();
    let sum_xy: f64 = points.iter().map(|(x, y)| x * y).sum();
    let sum_xx: f64 = points.iter().map(|(x, _)| x * x).sum();
    let denom = n * sum_xx - sum_x * sum_x;
    if denom.abs() < f64::EPSILON {
        return 0.0;
    }
    let slope = (n * sum_xy - sum_x * sum_y) / denom;
    let intercept = (sum_y - slope * sum_x) / n;

    let sse: f64 = points
        .iter()
        .map(|(x, y)| {
            let fit = slope * x + intercept;
            (fit - y).powi(2)
        })
        .sum();
    (sse / n).sqrt()
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_inventory_returns_none() {
        let provider = PeriodogramPsdProvider::default();
        let stream = Stream::default();
        assert!(compute_ppsd(&provider, &stream, false, 100.0).is_none());
    }

    #[test]
    fn insufficient_samples_returns_none() {
        let provider = PeriodogramPsdProvider::default();
        let stream = Stream {
            traces: vec![crate::metrics::Trace {
                samples: vec![0.0; 100],
                start: chrono::Utc::now(),
                sample_rate_hz: 100.0,
            }],
        };
        assert!(compute_ppsd(&provider, &stream, true, 100.0).is_none());
    }

    #[test]
    fn dcl_requires_at_least_two_points() {
        assert_eq!(compute_dcl(&[10.0], &[-150.0], 100.0), 0.0);
        assert_eq!(compute_dcl(&[10.0, 20.0], &[-150.0, -140.0], 0.0), 0.0);
    }

    #[test]
    fn band_pct_inside_is_zero_for_empty_band() {
        let pct = band_pct_inside(&[], &[], &[], &[], BAND_SHORT);
        assert_eq!(pct, 0.0);
    }
}
