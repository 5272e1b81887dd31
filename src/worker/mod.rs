//! Per-station, per-day state machine (spec §4.8): for each channel
//! component, acquires waveform and inventory data, persists filesystem
//! artifacts, computes basic and PPSD metrics, writes the detail row, then
//! (once every component has a row) grades the station.
//!
//! States: `Start → Waveforms → Inventory → PersistArtifacts →
//! BasicMetrics → PPSDMetrics → WriteDetail → NextComponent → ... → Grade
//! → Done`. The worker never propagates an error upward — every failure
//! mode resolves to either a default-metric row (spec §4.8) or a logged,
//! non-fatal skip (spec §7's "the worker is the cutover point").

pub mod artifacts;

use crate::clients::{InventoryClient, WaveformClient};
use crate::config::source_map::{get_station_sources, SourceMapping};
use crate::db::Repository;
use crate::grading::grade_station;
use crate::metrics::basic::{compute_basic, SpikeEngine};
use crate::metrics::ppsd::{compute_ppsd, PpsdMetrics, PsdProvider};
use crate::metrics::Stream;
use crate::types::{BandPct, DetailRow, QcThresholds, ScoringInput, Station};
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use std::time::Duration;

const WAVEFORMS_TIMEOUT: Duration = Duration::from_secs(600);
const PERSIST_TIMEOUT: Duration = Duration::from_secs(180);
const PPSD_TIMEOUT: Duration = Duration::from_secs(1200);
const HIGH_GAP_THRESHOLD: i64 = 2000;

/// The secondary-source tags recognized by `source.cfg` (spec §6.3),
/// matching the `[client2]`/`[archive2]`/`[inventory2]` config sections.
const SECONDARY_WAVEFORM_TAGS: &[&str] = &["client2", "archive2"];
const SECONDARY_INVENTORY_TAG: &str = "inventory2";

/// Resolves, per station, which configured client instance to use — the
/// primary source or the `source.cfg` secondary override (spec §6.3).
/// Built once per worker and shared across every station that worker
/// processes; cheap to clone since it only holds `Arc`s.
#[derive(Clone)]
pub struct ClientSet {
    pub waveform_default: Arc<dyn WaveformClient>,
    pub waveform_alt: Option<Arc<dyn WaveformClient>>,
    pub inventory_default: Arc<dyn InventoryClient>,
    pub inventory_alt: Option<Arc<dyn InventoryClient>>,
    pub source_map: Arc<SourceMapping>,
}

impl ClientSet {
    fn waveform_for(&self, network: &str, station: &str) -> Arc<dyn WaveformClient> {
        let wants_alt = get_station_sources(&self.source_map, network, station)
            .and_then(|c| c.waveform.as_ref())
            .is_some_and(|cfg| SECONDARY_WAVEFORM_TAGS.contains(&cfg.tag.as_str()));
        if wants_alt {
            self.waveform_alt.clone().unwrap_or_else(|| self.waveform_default.clone())
        } else {
            self.waveform_default.clone()
        }
    }

    fn inventory_for(&self, network: &str, station: &str) -> Arc<dyn InventoryClient> {
        let wants_alt = get_station_sources(&self.source_map, network, station)
            .and_then(|c| c.inventory.as_ref())
            .is_some_and(|cfg| cfg.tag == SECONDARY_INVENTORY_TAG);
        if wants_alt {
            self.inventory_alt.clone().unwrap_or_else(|| self.inventory_default.clone())
        } else {
            self.inventory_default.clone()
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WorkerOptions {
    pub mseed: bool,
    pub ppsd: bool,
    pub spike_engine: SpikeEngine,
}

/// Output directory roots, taken verbatim from `[basic]` (spec §6.4).
#[derive(Debug, Clone)]
pub struct OutputPaths {
    pub mseed: String,
    pub signal: String,
    pub pdf: String,
    pub psd: String,
}

/// Drives one worker slot's share of stations through the state machine.
/// Owns its own DB connection (spec §9: "one pool per worker, never shared
/// across workers") via the `Repository` it's constructed with.
pub struct StationWorker {
    clients: ClientSet,
    psd_provider: Arc<dyn PsdProvider + Send + Sync>,
    repo: Arc<Repository>,
    thresholds: QcThresholds,
    options: WorkerOptions,
    output_paths: OutputPaths,
}

impl StationWorker {
    pub fn new(
        clients: ClientSet,
        psd_provider: Arc<dyn PsdProvider + Send + Sync>,
        repo: Arc<Repository>,
        thresholds: QcThresholds,
        options: WorkerOptions,
        output_paths: OutputPaths,
    ) -> Self {
        Self {
            clients,
            psd_provider,
            repo,
            thresholds,
            options,
            output_paths,
        }
    }

    /// Runs the full state machine for one station on one day.
    pub async fn process_station(&self, station: &Station, date: NaiveDate) {
        if !station.is_processable() {
            tracing::warn!(station = %station.code, "station has no channel prefixes or components configured, skipping");
            return;
        }

        let waveform_client = self.clients.waveform_for(&station.network, &station.code);
        let inventory_client = self.clients.inventory_for(&station.network, &station.code);
        let (window_start, window_end) = day_window(date);

        let mut rows = Vec::with_capacity(station.channel_components.len());
        for raw_component in &station.channel_components {
            let component = raw_component.chars().next().unwrap_or('Z');
            let row = self
                .process_component(
                    station,
                    date,
                    window_start,
                    window_end,
                    component,
                    waveform_client.as_ref(),
                    inventory_client.as_ref(),
                )
                .await;
            rows.push(row);
        }

        self.grade(station, date, &rows).await;
    }

    #[allow(clippy::too_many_arguments)]
    async fn process_component(
        &self,
        station: &Station,
        date: NaiveDate,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        component: char,
        waveform_client: &dyn WaveformClient,
        inventory_client: &dyn InventoryClient,
    ) -> DetailRow {
        let channel = primary_channel(station, component);

        let waveform_result = tokio::time::timeout(
            WAVEFORMS_TIMEOUT,
            waveform_client.get_waveforms(
                &station.network,
                &station.code,
                &station.location,
                &station.channel_prefixes,
                window_start,
                window_end,
                component,
            ),
        )
        .await;
        let stream = match waveform_result {
            Ok(Some(stream)) if !stream.is_empty() => stream,
            Ok(_) => {
                tracing::debug!(station = %station.code, %channel, "waveform fetch returned no data, defaulting detail row");
                return self.default_and_write(station, date, &channel).await;
            }
            Err(_) => {
                tracing::warn!(station = %station.code, %channel, "waveform fetch timed out, defaulting detail row");
                return self.default_and_write(station, date, &channel).await;
            }
        };

        let inventory = match inventory_client
            .get_inventory(&station.network, &station.code, &station.location, &channel, window_start)
            .await
        {
            Some(inv) if !inv.is_empty() => inv,
            _ => {
                tracing::debug!(station = %station.code, %channel, "inventory absent, defaulting detail row");
                return self.default_and_write(station, date, &channel).await;
            }
        };

        if tokio::time::timeout(PERSIST_TIMEOUT, self.persist_artifacts(station, date, &channel, &stream))
            .await
            .is_err()
        {
            tracing::warn!(station = %station.code, %channel, "persisting artifacts timed out, continuing");
        }

        let basic = compute_basic(&stream, window_start, window_end, self.options.spike_engine);
        let mut row = DetailRow {
            station: station.code.clone(),
            date,
            channel: channel.clone(),
            rms: basic.rms,
            ratioamp: basic.ratioamp,
            availability: basic.availability,
            ngap: basic.ngap,
            nover: basic.nover,
            n_spikes: basic.n_spikes,
            pct_above: 100.0,
            pct_below: 0.0,
            dcl: 0.0,
            dcg: false,
            band_pct: BandPct::default(),
        };

        if basic.ngap > HIGH_GAP_THRESHOLD {
            tracing::info!(station = %station.code, %channel, ngap = basic.ngap, "high-gap gate tripped, skipping PPSD");
            self.write_detail(&row).await;
            return row;
        }

        if let Some(ppsd) = self.run_ppsd(&stream, inventory.sample_rate_hz()).await {
            apply_ppsd(&mut row, ppsd);
            if self.options.ppsd {
                let trace_id = format!("{}.{}.{}.{}", station.network, station.code, station.location, channel);
                if let Err(e) = artifacts::write_pdf_plot(&self.output_paths.pdf, date, &station.code, &channel, &ppsd) {
                    tracing::warn!(station = %station.code, %channel, error = %e, "failed to write PDF plot");
                }
                if let Err(e) =
                    artifacts::write_psd_npz(&self.output_paths.psd, date, &station.code, &channel, &trace_id, &ppsd)
                {
                    tracing::warn!(station = %station.code, %channel, error = %e, "failed to write PSD npz");
                }
            }
        }

        self.write_detail(&row).await;
        row
    }

    async fn run_ppsd(&self, stream: &Stream, sample_rate_hz: f64) -> Option<PpsdMetrics> {
        let provider = self.psd_provider.clone();
        let stream = stream.clone();
        let task = tokio::task::spawn_blocking(move || compute_ppsd(provider.as_ref(), &stream, true, sample_rate_hz));
        match tokio::time::timeout(PPSD_TIMEOUT, task).await {
            Ok(Ok(metrics)) => metrics,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "ppsd task panicked, using default ppsd fields");
                None
            }
            Err(_) => {
                tracing::warn!("ppsd computation timed out, using default ppsd fields");
                None
            }
        }
    }

    async fn persist_artifacts(&self, station: &Station, date: NaiveDate, channel: &str, stream: &Stream) {
        if let Err(e) = artifacts::write_signal_plot(&self.output_paths.signal, date, &station.code, channel, stream) {
            tracing::warn!(station = %station.code, %channel, error = %e, "failed to write signal plot");
        }
        if self.options.mseed {
            if let Err(e) = artifacts::write_mseed(&self.output_paths.mseed, date, &station.code, channel, stream) {
                tracing::warn!(station = %station.code, %channel, error = %e, "failed to write mseed artifact");
            }
        }
    }

    async fn default_and_write(&self, station: &Station, date: NaiveDate, channel: &str) -> DetailRow {
        let row = DetailRow::default_for(&station.code, date, channel);
        self.write_detail(&row).await;
        row
    }

    async fn write_detail(&self, row: &DetailRow) {
        if self.repo.insert_detail(row).await.is_none() {
            tracing::error!(station = %row.station, channel = %row.channel, "failed to write detail row");
        }
    }

    async fn grade(&self, station: &Station, date: NaiveDate, rows: &[DetailRow]) {
        let inputs: Vec<ScoringInput> = rows.iter().map(ScoringInput::from).collect();
        let analysis = grade_station(&station.code, date, &station.group, &inputs, &self.thresholds);
        if self.repo.insert_analysis(&analysis).await.is_none() {
            tracing::error!(station = %station.code, "failed to write analysis row");
        }
    }
}

fn apply_ppsd(row: &mut DetailRow, ppsd: PpsdMetrics) {
    row.pct_above = ppsd.pct_h;
    row.pct_below = ppsd.pct_l;
    row.dcl = ppsd.dcl;
    row.dcg = ppsd.dcg;
    row.band_pct = ppsd.band_pct;
}

/// The channel label recorded against a `DetailRow`: the station's
/// highest-ranked prefix (spec glossary: "channel prefix") joined with the
/// requested component.
fn primary_channel(station: &Station, component: char) -> String {
    let prefix = station.channel_prefixes.first().cloned().unwrap_or_default();
    format!("{prefix}{component}")
}

/// The fixed 86 400 s daily window used as `availability`'s denominator
/// (spec §9, open question ii: "prefer the fixed-window definition").
fn day_window(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = date.and_hms_opt(0, 0, 0).expect("midnight is a valid time-of-day").and_utc();
    (start, start + chrono::Duration::seconds(86_400))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_window_spans_exactly_one_day() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let (start, end) = day_window(date);
        assert_eq!((end - start).num_seconds(), 86_400);
    }

    #[test]
    fn primary_channel_uses_the_highest_ranked_prefix() {
        let station = Station {
            network: "IA".into(),
            code: "MSAI".into(),
            location: "00".into(),
            group: "west".into(),
            channel_prefixes: vec!["SH".into(), "BH".into()],
            channel_components: vec!["Z".into()],
        };
        assert_eq!(primary_channel(&station, 'Z'), "SHZ");
    }
}
