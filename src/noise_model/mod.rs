//! Peterson (1993) New High/Low Noise Model tables.
//!
//! Pure, allocation-light function over a period vector. No I/O, no failure
//! modes beyond returning empty vectors when every period falls outside the
//! tabulated range.

/// NHNM piecewise break points (seconds).
const PH: [f64; 12] = [
    0.10, 0.22, 0.32, 0.80, 3.80, 4.60, 6.30, 7.90, 15.40, 20.00, 354.80, 100_000.00,
];
const AH: [f64; 11] = [
    -108.73, -150.34, -122.31, -116.85, -108.48, -74.66, 0.66, -93.37, 73.54, -151.52, -206.66,
];
const BH: [f64; 11] = [
    -17.23, -80.50, -23.87, 32.51, 18.08, -32.95, -127.18, -22.42, -162.98, 10.01, 31.63,
];

/// NLNM piecewise break points (seconds).
const PL: [f64; 22] = [
    0.10, 0.17, 0.40, 0.80, 1.24, 2.40, 4.30, 5.00, 6.00, 10.00, 12.00, 15.60, 21.90, 31.60,
    45.00, 70.00, 101.00, 154.00, 328.00, 600.00, 10_000.00, 100_000.00,
];
const AL: [f64; 21] = [
    -162.36, -166.70, -170.00, -166.40, -168.60, -159.98, -141.10, -71.36, -97.26, -132.18,
    -205.27, -37.65, -114.37, -160.58, -187.50, -216.47, -185.00, -168.34, -217.43, -258.28,
    -346.88,
];
const BL: [f64; 21] = [
    5.64, 0.00, -8.30, 28.90, 52.48, 29.81, 0.00, -99.77, -66.49, -31.57, 36.16, -104.33, -47.10,
    -16.28, 0.00, 15.70, 0.00, -7.61, 11.90, 26.60, 48.75,
];

/// Index of the last breakpoint strictly below `period`, or `None` if
/// `period` falls at or before the first breakpoint or past the coefficient
/// table's range.
fn segment_index(period: f64, breaks: &[f64], coeff_len: usize) -> Option<usize> {
    let idx = breaks.iter().rposition(|&p| period > p)?;
    if idx >= coeff_len {
        None
    } else {
        Some(idx)
    }
}

/// Evaluates the NHNM/NLNM at each period in `periods`. The second argument
/// (power grid) is accepted for interface compatibility but unused, matching
/// the upstream contract.
///
/// Returns `(nhnm, nlnm, valid_idx)` where `valid_idx` lists the indices of
/// `periods` for which both models are defined.
pub fn get_models(periods: &[f64], _powers: &[f64]) -> (Vec<f64>, Vec<f64>, Vec<usize>) {
    let mut nhnm = Vec::new();
    let mut nlnm = Vec::new();
    let mut valid_idx = Vec::new();

    for (i, &period) in periods.iter().enumerate() {
        let high = segment_index(period, &PH, AH.len());
        let low = segment_index(period, &PL, AL.len());
        let (Some(h), Some(l)) = (high, low) else {
            continue;
        };

        nhnm.push(AH[h] + BH[h] * period.log10());
        nlnm.push(AL[l] + BL[l] * period.log10());
        valid_idx.push(i);
    }

    (nhnm, nlnm, valid_idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_periods_match_peterson_1993() {
        let (nhnm, nlnm, idx) = get_models(&[1.0, 10.0], &[]);
        assert_eq!(idx, vec![0, 1]);
        assert!((nhnm[0] - (-116.85)).abs() < 1e-2);
        assert!((nhnm[1] - (-115.79)).abs() < 1e-2);
        assert!((nlnm[0] - (-166.40)).abs() < 1e-2);
        assert!((nlnm[1] - (-163.75)).abs() < 1e-2);
    }

    #[test]
    fn periods_entirely_out_of_range_yield_empty_arrays() {
        let (nhnm, nlnm, idx) = get_models(&[0.01, 1_000_000.0], &[]);
        assert!(nhnm.is_empty());
        assert!(nlnm.is_empty());
        assert!(idx.is_empty());
    }

    #[test]
    fn mixed_periods_only_keep_valid_indices() {
        let (nhnm, _nlnm, idx) = get_models(&[0.01, 1.0, 1_000_000.0], &[]);
        assert_eq!(idx, vec![1]);
        assert_eq!(nhnm.len(), 1);
    }
}
