//! Shared data structures for the quality evaluation pipeline.
//!
//! - `Station`: per-network-station descriptor with ranked channel prefixes
//! - `DetailRow`: one row per (station, date, channel component)
//! - `AnalysisRow`: one row per (station, date), written by the grading engine
//! - `QcThresholds`: the tuning bundle consumed by the grading engine
//! - `ScoringInput`: transient per-channel view derived from a `DetailRow`

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Channel-prefix preference rank: SH < BH < HH < HN < other.
pub fn prefix_rank(prefix: &str) -> u8 {
    match prefix {
        "SH" => 0,
        "BH" => 1,
        "HH" => 2,
        "HN" => 3,
        _ => 4,
    }
}

/// A station known to the network catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Station {
    pub network: String,
    pub code: String,
    pub location: String,
    pub group: String,
    /// Ordered, deduplicated two-letter band/instrument codes, sorted by
    /// [`prefix_rank`].
    pub channel_prefixes: Vec<String>,
    /// Deduplicated third-character component codes, typically `E/N/Z` or
    /// `1/2/Z`.
    pub channel_components: Vec<String>,
}

impl Station {
    /// Both lists non-empty implies this station is processable.
    pub fn is_processable(&self) -> bool {
        !self.channel_prefixes.is_empty() && !self.channel_components.is_empty()
    }

    /// Sorts `channel_prefixes` by the fixed preference rank and dedups.
    pub fn normalize_prefixes(&mut self) {
        self.channel_prefixes.sort_by_key(|p| prefix_rank(p));
        self.channel_prefixes.dedup();
    }
}

/// Percentage-inside-model for a single period band.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct BandPct {
    pub long: f64,
    pub micro: f64,
    pub short: f64,
}

/// One row per (station, date, channel component).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetailRow {
    pub station: String,
    pub date: NaiveDate,
    pub channel: String,
    pub rms: f64,
    pub ratioamp: f64,
    pub availability: f64,
    pub ngap: i64,
    pub nover: i64,
    pub n_spikes: i64,
    pub pct_above: f64,
    pub pct_below: f64,
    pub dcl: f64,
    pub dcg: bool,
    pub band_pct: BandPct,
}

impl DetailRow {
    /// `id = station_component_date`, the row's natural key.
    pub fn id(&self) -> String {
        format!("{}_{}_{}", self.station, self.channel, self.date.format("%Y%m%d"))
    }

    /// The default-metric row emitted by the worker on an unhandled error for
    /// one component.
    pub fn default_for(station: &str, date: NaiveDate, channel: &str) -> Self {
        Self {
            station: station.to_string(),
            date,
            channel: channel.to_string(),
            rms: 0.0,
            ratioamp: 0.0,
            availability: 0.0,
            ngap: 1,
            nover: 0,
            n_spikes: 0,
            pct_above: 100.0,
            pct_below: 0.0,
            dcl: 0.0,
            dcg: false,
            band_pct: BandPct::default(),
        }
    }
}

/// Station-level classification vocabulary.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Classification {
    Baik,
    CukupBaik,
    Buruk,
    Mati,
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Classification::Baik => write!(f, "Baik"),
            Classification::CukupBaik => write!(f, "Cukup Baik"),
            Classification::Buruk => write!(f, "Buruk"),
            Classification::Mati => write!(f, "Mati"),
        }
    }
}

/// One row per (station, date), written by the grading engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisRow {
    pub station: String,
    pub date: NaiveDate,
    pub score: f64,
    pub classification: Classification,
    pub group: String,
    pub details: Vec<String>,
}

/// The tuning bundle consumed by the grading engine. Populated from
/// `[qc_thresholds]`; see `config::defaults` for the numeric defaults.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QcThresholds {
    pub rms_limit: f64,
    pub rms_margin: f64,
    pub ratioamp_limit: f64,
    pub ratioamp_margin: f64,
    pub gap_limit: f64,
    pub gap_margin: f64,
    pub overlap_limit: f64,
    pub overlap_margin: f64,
    pub spike_limit: f64,
    pub spike_margin: f64,
    pub pct_below_warn: f64,
    pub pct_above_warn: f64,
    pub gap_count_warn: f64,
    pub overlap_count_warn: f64,
    pub spike_count_warn: f64,
    pub avail_good: f64,
    pub avail_fair: f64,
    pub avail_min_for_noise_check: f64,
    pub dcl_dead: f64,
    pub rms_damaged_max: f64,
    pub fair_max_score: f64,
    pub poor_max_score: f64,
    pub weight_noise: f64,
    pub weight_availability: f64,
    pub weight_rms: f64,
    pub weight_ratioamp: f64,
    pub weight_gaps: f64,
    pub weight_overlaps: f64,
    pub weight_spikes: f64,
}

impl QcThresholds {
    /// Sum of the seven scoring weights; must be within `1e-3` of `1.0`.
    pub fn weight_sum(&self) -> f64 {
        self.weight_noise
            + self.weight_availability
            + self.weight_rms
            + self.weight_ratioamp
            + self.weight_gaps
            + self.weight_overlaps
            + self.weight_spikes
    }
}

/// Transient per-channel view derived from a `DetailRow`, fed to the grading
/// engine.
#[derive(Debug, Clone, Copy)]
pub struct ScoringInput {
    pub component: char,
    pub rms: f64,
    pub ratioamp: f64,
    pub avail: f64,
    pub ngap: i64,
    pub nover: i64,
    pub n_spikes: i64,
    pub pct_above: f64,
    pub pct_below: f64,
    pub dcl: f64,
    pub dcg: bool,
}

impl From<&DetailRow> for ScoringInput {
    fn from(row: &DetailRow) -> Self {
        Self {
            component: row.channel.chars().last().unwrap_or('?'),
            rms: row.rms,
            ratioamp: row.ratioamp,
            avail: row.availability,
            ngap: row.ngap,
            nover: row.nover,
            n_spikes: row.n_spikes,
            pct_above: row.pct_above,
            pct_below: row.pct_below,
            dcl: row.dcl,
            dcg: row.dcg,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_rank_orders_bands_correctly() {
        let mut prefixes = vec!["HN".to_string(), "BH".to_string(), "SH".to_string(), "XX".to_string()];
        prefixes.sort_by_key(|p| prefix_rank(p));
        assert_eq!(prefixes, vec!["SH", "BH", "HN", "XX"]);
    }

    #[test]
    fn station_is_processable_requires_both_lists() {
        let mut s = Station {
            network: "IA".into(),
            code: "MSAI".into(),
            location: "00".into(),
            group: "west".into(),
            channel_prefixes: vec![],
            channel_components: vec!["Z".into()],
        };
        assert!(!s.is_processable());
        s.channel_prefixes.push("BH".into());
        assert!(s.is_processable());
    }

    #[test]
    fn detail_row_id_matches_station_component_date() {
        let row = DetailRow::default_for("MSAI", NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(), "BHZ");
        assert_eq!(row.id(), "MSAI_BHZ_20240305");
    }

    #[test]
    fn default_row_carries_the_spec_sentinel_values() {
        let row = DetailRow::default_for("MSAI", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), "BHE");
        assert_eq!(row.ngap, 1);
        assert_eq!(row.pct_above, 100.0);
        assert_eq!(row.availability, 0.0);
    }
}
