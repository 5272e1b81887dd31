//! End-to-end exercise of the scoring pipeline: synthetic waveform traces
//! through `metrics::basic`, into `ScoringInput`, into `grading::grade_station`.
//! Complements the per-module unit tests by asserting the pieces compose the
//! way a real day's worker would drive them.

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use sqes::config::defaults::default_thresholds;
use sqes::grading::grade_station;
use sqes::metrics::basic::{compute_basic, SpikeEngine};
use sqes::metrics::{Stream, Trace};
use sqes::{AnalysisRow, Classification, DetailRow, ScoringInput};

fn day_window() -> (DateTime<Utc>, DateTime<Utc>) {
    let start = "2024-03-05T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
    (start, start + ChronoDuration::seconds(86_400))
}

fn quiet_channel_stream() -> Stream {
    let (start, _) = day_window();
    Stream {
        traces: vec![Trace {
            samples: (0..86_400).map(|i| (i as f64 * 0.001).sin() * 1000.0).collect(),
            start,
            sample_rate_hz: 1.0,
        }],
    }
}

fn to_detail_row(station: &str, date: NaiveDate, channel: &str, stream: &Stream) -> DetailRow {
    let (window_start, window_end) = day_window();
    let metrics = compute_basic(stream, window_start, window_end, SpikeEngine::Fast);
    DetailRow {
        station: station.to_string(),
        date,
        channel: channel.to_string(),
        rms: metrics.rms,
        ratioamp: metrics.ratioamp,
        availability: metrics.availability,
        ngap: metrics.ngap,
        nover: metrics.nover,
        n_spikes: metrics.n_spikes,
        pct_above: 0.0,
        pct_below: 0.0,
        dcl: 10.0,
        dcg: false,
        band_pct: Default::default(),
    }
}

#[test]
fn a_clean_three_component_day_grades_baik() {
    let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
    let stream = quiet_channel_stream();

    let rows = vec![
        to_detail_row("MSAI", date, "BHE", &stream),
        to_detail_row("MSAI", date, "BHN", &stream),
        to_detail_row("MSAI", date, "BHZ", &stream),
    ];
    let inputs: Vec<ScoringInput> = rows.iter().map(ScoringInput::from).collect();

    let thresholds = default_thresholds();
    let row: AnalysisRow = grade_station("MSAI", date, "west", &inputs, &thresholds);

    assert_eq!(row.station, "MSAI");
    assert!(row.score > thresholds.fair_max_score, "expected a clean day to score well, got {}", row.score);
    assert_eq!(row.classification, Classification::Baik);
    assert!(row.details.is_empty(), "a clean day should fire no warnings, got {:?}", row.details);
}

#[test]
fn one_dead_component_drags_down_but_does_not_zero_a_mixed_station() {
    let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
    let stream = quiet_channel_stream();

    let mut dead_row = to_detail_row("MSAI", date, "BHZ", &stream);
    dead_row.availability = 0.0;

    let rows = vec![
        to_detail_row("MSAI", date, "BHE", &stream),
        to_detail_row("MSAI", date, "BHN", &stream),
        dead_row,
    ];
    let inputs: Vec<ScoringInput> = rows.iter().map(ScoringInput::from).collect();

    let thresholds = default_thresholds();
    let row = grade_station("MSAI", date, "west", &inputs, &thresholds);

    assert!(row.details.iter().any(|d| d.contains("Mati")));
    assert_ne!(row.classification, Classification::Baik);
}

#[test]
fn empty_day_is_mati_with_no_data_message() {
    let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
    let thresholds = default_thresholds();
    let row = grade_station("MSAI", date, "west", &[], &thresholds);
    assert_eq!(row.classification, Classification::Mati);
    assert_eq!(row.details, vec!["Tidak ada data".to_string()]);
}

#[test]
fn noisy_gappy_channel_yields_a_poor_grade() {
    let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();

    let noisy = ScoringInput {
        component: 'Z',
        rms: 9000.0,
        ratioamp: 3.0,
        avail: 40.0,
        ngap: 20,
        nover: 8,
        n_spikes: 60,
        pct_above: 40.0,
        pct_below: 30.0,
        dcl: 10.0,
        dcg: false,
    };

    let thresholds = default_thresholds();
    let row = grade_station("MSAI", date, "west", &[noisy, noisy, noisy], &thresholds);

    assert!(row.score <= thresholds.poor_max_score);
    assert_eq!(row.classification, Classification::Buruk);
    assert!(!row.details.is_empty());
}
