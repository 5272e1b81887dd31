//! Waveform and inventory data sources (spec §4.4).
//!
//! `WaveformClient`/`InventoryClient` are the seam between the station
//! worker and whatever transport a deployment configures — remote FDSN,
//! a local SDS archive, or a local inventory directory. Grounded on the
//! teacher's `SensorSource` trait: `Send + Sync`, async, tolerant of
//! per-call failure (returns `None` rather than propagating).
//!
//! Full miniSEED frame decoding is out of scope — the data client
//! libraries are treated as opaque fetchers per the system's scope
//! statement. `decode_waveform_payload` below does the minimum needed to
//! exercise the metrics pipeline end to end: it reads the transport
//! payload as raw big-endian 16-bit PCM.

pub mod fdsn;
pub mod local_inventory;
pub mod sds;

use crate::metrics::{Stream, Trace};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq)]
pub struct InventoryEpoch {
    pub location: String,
    pub channel: String,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub sample_rate_hz: f64,
}

/// Instrument response metadata for one (network, station). Deliberately
/// thin — the worker only needs epoch coverage and sample rate, never the
/// response curves themselves.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    pub epochs: Vec<InventoryEpoch>,
}

impl Inventory {
    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }

    /// Epoch-restricted select: only epochs whose `[start, end)` covers `at`.
    pub fn select_at(&self, location: &str, channel: &str, at: DateTime<Utc>) -> Vec<&InventoryEpoch> {
        self.epochs
            .iter()
            .filter(|e| {
                e.location == location
                    && e.channel == channel
                    && e.start <= at
                    && e.end.map_or(true, |end| at <= end)
            })
            .collect()
    }

    /// Unrestricted select by channel only, used as the fallback when the
    /// epoch-restricted select comes back empty (spec §4.4).
    pub fn select_channel(&self, channel: &str) -> Vec<&InventoryEpoch> {
        self.epochs.iter().filter(|e| e.channel == channel).collect()
    }

    pub fn sample_rate_hz(&self) -> f64 {
        self.epochs.first().map(|e| e.sample_rate_hz).unwrap_or(0.0)
    }
}

#[async_trait]
pub trait WaveformClient: Send + Sync {
    #[allow(clippy::too_many_arguments)]
    async fn get_waveforms(
        &self,
        network: &str,
        station: &str,
        location: &str,
        prefixes: &[String],
        t0: DateTime<Utc>,
        t1: DateTime<Utc>,
        component: char,
    ) -> Option<Stream>;
}

#[async_trait]
pub trait InventoryClient: Send + Sync {
    async fn get_inventory(
        &self,
        network: &str,
        station: &str,
        location: &str,
        channel: &str,
        at_time: DateTime<Utc>,
    ) -> Option<Inventory>;
}

/// Nominal sample rate for a two-letter channel prefix's band code, used to
/// interpret a raw payload since full response parsing is out of scope.
pub(crate) fn prefix_sample_rate_hz(prefix: &str) -> f64 {
    match prefix.chars().next() {
        Some('H') => 100.0,
        Some('B') => 20.0,
        Some('S') => 50.0,
        Some('L') => 1.0,
        _ => 100.0,
    }
}

/// Decodes a transport payload as raw big-endian 16-bit PCM into a single
/// trace starting at `start`. Returns `None` for an empty or odd-length
/// payload.
pub(crate) fn decode_waveform_payload(bytes: &[u8], start: DateTime<Utc>, sample_rate_hz: f64) -> Option<Stream> {
    if bytes.len() < 2 {
        return None;
    }
    let samples: Vec<f64> = bytes
        .chunks_exact(2)
        .map(|pair| i16::from_be_bytes([pair[0], pair[1]]) as f64)
        .collect();
    if samples.is_empty() {
        return None;
    }
    Some(Stream {
        traces: vec![Trace {
            samples,
            start,
            sample_rate_hz,
        }],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_rejects_short_payloads() {
        assert!(decode_waveform_payload(&[0x00], Utc::now(), 100.0).is_none());
        assert!(decode_waveform_payload(&[], Utc::now(), 100.0).is_none());
    }

    #[test]
    fn decode_produces_one_sample_per_two_bytes() {
        let stream = decode_waveform_payload(&[0x00, 0x01, 0xFF, 0xFF], Utc::now(), 100.0).unwrap();
        assert_eq!(stream.traces[0].samples, vec![1.0, -1.0]);
    }

    #[test]
    fn epoch_select_respects_open_ended_epochs() {
        let now = Utc::now();
        let inv = Inventory {
            epochs: vec![InventoryEpoch {
                location: "00".into(),
                channel: "BHZ".into(),
                start: now - chrono::Duration::days(1),
                end: None,
                sample_rate_hz: 100.0,
            }],
        };
        assert_eq!(inv.select_at("00", "BHZ", now).len(), 1);
        assert_eq!(inv.select_at("00", "BHZ", now - chrono::Duration::days(2)).len(), 0);
    }
}
