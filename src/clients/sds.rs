//! Local SDS-archive waveform client (spec §4.4).
//!
//! Standard SDS layout: `<archive>/<year>/<net>/<sta>/<channel>.D/
//! <net>.<sta>.<loc>.<channel>.D.<year>.<doy>`. Same prefix-iteration
//! contract as the remote client; "latest wins" fill-gap policy means a
//! later-read segment overwrites earlier samples at the same offset.

use super::{decode_waveform_payload, prefix_sample_rate_hz, WaveformClient};
use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use std::path::PathBuf;

pub struct LocalSdsClient {
    archive_root: PathBuf,
    /// Location codes to probe, in preference order (sorted-unique per
    /// spec §4.4's "select the first in sorted-unique order" rule).
    location_candidates: Vec<String>,
}

impl LocalSdsClient {
    pub fn new(archive_root: impl Into<PathBuf>) -> Self {
        Self {
            archive_root: archive_root.into(),
            location_candidates: vec!["00".to_string(), String::new()],
        }
    }

    fn day_file_path(&self, network: &str, station: &str, location: &str, channel: &str, day: DateTime<Utc>) -> PathBuf {
        let year = day.year();
        let doy = day.ordinal();
        self.archive_root
            .join(year.to_string())
            .join(network)
            .join(station)
            .join(format!("{channel}.D"))
            .join(format!("{network}.{station}.{location}.{channel}.D.{year}.{doy:03}"))
    }

    fn read_merged(&self, network: &str, station: &str, location: &str, channel: &str, t0: DateTime<Utc>, t1: DateTime<Utc>) -> Option<Vec<u8>> {
        let mut merged: Vec<u8> = Vec::new();
        let mut day = t0;
        let mut found_any = false;
        while day <= t1 {
            let path = self.day_file_path(network, station, location, channel, day);
            if let Ok(bytes) = std::fs::read(&path) {
                apply_latest_wins(&mut merged, &bytes);
                found_any = true;
            }
            day += chrono::Duration::days(1);
        }
        if found_any {
            Some(merged)
        } else {
            None
        }
    }
}

/// "Latest wins": the incoming segment overwrites the destination at every
/// offset it covers, growing the destination if needed.
fn apply_latest_wins(dest: &mut Vec<u8>, incoming: &[u8]) {
    if dest.len() < incoming.len() {
        dest.resize(incoming.len(), 0);
    }
    dest[..incoming.len()].copy_from_slice(incoming);
}

#[async_trait]
impl WaveformClient for LocalSdsClient {
    async fn get_waveforms(
        &self,
        network: &str,
        station: &str,
        location: &str,
        prefixes: &[String],
        t0: DateTime<Utc>,
        t1: DateTime<Utc>,
        component: char,
    ) -> Option<crate::metrics::Stream> {
        let locations: Vec<&str> = if location.is_empty() {
            self.location_candidates.iter().map(String::as_str).collect()
        } else {
            vec![location]
        };

        for prefix in prefixes {
            let channel = format!("{prefix}{component}");
            for loc in &locations {
                let bytes = match self.read_merged(network, station, loc, &channel, t0, t1) {
                    Some(b) if !b.is_empty() => b,
                    _ => continue,
                };
                let sample_rate_hz = prefix_sample_rate_hz(prefix);
                if let Some(stream) = decode_waveform_payload(&bytes, t0, sample_rate_hz) {
                    if !stream.is_empty() {
                        return Some(stream);
                    }
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_wins_overwrites_overlapping_region() {
        let mut dest = vec![1, 1, 1, 1];
        apply_latest_wins(&mut dest, &[2, 2]);
        assert_eq!(dest, vec![2, 2, 1, 1]);
    }

    #[test]
    fn latest_wins_grows_destination() {
        let mut dest = vec![1, 1];
        apply_latest_wins(&mut dest, &[2, 2, 2, 2]);
        assert_eq!(dest, vec![2, 2, 2, 2]);
    }

    #[test]
    fn day_file_path_matches_sds_layout() {
        let client = LocalSdsClient::new("/archive");
        let day = "2024-03-05T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let path = client.day_file_path("IA", "MSAI", "00", "BHZ", day);
        assert_eq!(path, PathBuf::from("/archive/2024/IA/MSAI/BHZ.D/IA.MSAI.00.BHZ.D.2024.065"));
    }
}
