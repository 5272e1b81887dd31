//! Default values for every `[qc_thresholds]` key (spec §6.2). Grouped under
//! banner comments the way tuning constants are grouped elsewhere in this
//! crate's dependency corpus.

use crate::types::QcThresholds;

// ============================================================================
// Per-metric grade() limits and margins
// ============================================================================

pub const RMS_LIMIT: f64 = 5000.0;
pub const RMS_MARGIN: f64 = 7500.0;
pub const RATIOAMP_LIMIT: f64 = 1.01;
pub const RATIOAMP_MARGIN: f64 = 2.02;
pub const GAP_LIMIT: f64 = 0.00274;
pub const GAP_MARGIN: f64 = 0.992;
pub const OVERLAP_LIMIT: f64 = 0.0;
pub const OVERLAP_MARGIN: f64 = 1.25;
pub const SPIKE_LIMIT: f64 = 0.0;
pub const SPIKE_MARGIN: f64 = 25.0;

// ============================================================================
// Warning-rule trigger counts
// ============================================================================

pub const PCT_BELOW_WARN: f64 = 20.0;
pub const PCT_ABOVE_WARN: f64 = 20.0;
pub const GAP_COUNT_WARN: f64 = 5.0;
pub const OVERLAP_COUNT_WARN: f64 = 5.0;
pub const SPIKE_COUNT_WARN: f64 = 25.0;

// ============================================================================
// Availability bands and dead-channel cutoffs
// ============================================================================

pub const AVAIL_GOOD: f64 = 97.0;
pub const AVAIL_FAIR: f64 = 60.0;
pub const AVAIL_MIN_FOR_NOISE_CHECK: f64 = 10.0;
pub const DCL_DEAD: f64 = 2.25;
pub const RMS_DAMAGED_MAX: f64 = 1.0;

// ============================================================================
// Score-capping sentinels
// ============================================================================

pub const FAIR_MAX_SCORE: f64 = 89.0;
pub const POOR_MAX_SCORE: f64 = 59.0;

// ============================================================================
// botqc composite weights (must sum to 1.0 ± 1e-3)
// ============================================================================

pub const WEIGHT_NOISE: f64 = 0.35;
pub const WEIGHT_AVAILABILITY: f64 = 0.15;
pub const WEIGHT_RMS: f64 = 0.10;
pub const WEIGHT_RATIOAMP: f64 = 0.10;
pub const WEIGHT_GAPS: f64 = 0.10;
pub const WEIGHT_OVERLAPS: f64 = 0.10;
pub const WEIGHT_SPIKES: f64 = 0.10;

pub fn default_thresholds() -> QcThresholds {
    QcThresholds {
        rms_limit: RMS_LIMIT,
        rms_margin: RMS_MARGIN,
        ratioamp_limit: RATIOAMP_LIMIT,
        ratioamp_margin: RATIOAMP_MARGIN,
        gap_limit: GAP_LIMIT,
        gap_margin: GAP_MARGIN,
        overlap_limit: OVERLAP_LIMIT,
        overlap_margin: OVERLAP_MARGIN,
        spike_limit: SPIKE_LIMIT,
        spike_margin: SPIKE_MARGIN,
        pct_below_warn: PCT_BELOW_WARN,
        pct_above_warn: PCT_ABOVE_WARN,
        gap_count_warn: GAP_COUNT_WARN,
        overlap_count_warn: OVERLAP_COUNT_WARN,
        spike_count_warn: SPIKE_COUNT_WARN,
        avail_good: AVAIL_GOOD,
        avail_fair: AVAIL_FAIR,
        avail_min_for_noise_check: AVAIL_MIN_FOR_NOISE_CHECK,
        dcl_dead: DCL_DEAD,
        rms_damaged_max: RMS_DAMAGED_MAX,
        fair_max_score: FAIR_MAX_SCORE,
        poor_max_score: POOR_MAX_SCORE,
        weight_noise: WEIGHT_NOISE,
        weight_availability: WEIGHT_AVAILABILITY,
        weight_rms: WEIGHT_RMS,
        weight_ratioamp: WEIGHT_RATIOAMP,
        weight_gaps: WEIGHT_GAPS,
        weight_overlaps: WEIGHT_OVERLAPS,
        weight_spikes: WEIGHT_SPIKES,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_weights_sum_to_one() {
        let t = default_thresholds();
        assert!((t.weight_sum() - 1.0).abs() < 1e-3);
    }
}
