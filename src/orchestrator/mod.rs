//! Date-range driver (spec §4.9): for each day, enumerates stations under
//! a bounded worker pool, re-grades stragglers, and retries the day until
//! processing converges or the retry budget (4 retries past the first
//! pass) is exhausted. Filtered runs (`-s`/`-n`) execute exactly one pass
//! and never flush (spec §4.9).
//!
//! Grounded on the teacher's `JoinSet<Result<TaskName>>` supervisor: spawn
//! a bounded set of tasks and drain them with `join_next`, treating a
//! worker share's failure as local to that share rather than fatal to the
//! run (spec §7: "the orchestrator's only error path is failure to
//! initialise its own resources").

use crate::clients::fdsn::{RemoteInventoryClient, RemoteWaveformClient};
use crate::clients::local_inventory::LocalInventoryClient;
use crate::clients::sds::LocalSdsClient;
use crate::clients::{InventoryClient, WaveformClient};
use crate::config::source_map::SourceMapping;
use crate::config::{Config, DbConnectionConfig, DbDialect, InventorySource, WaveformSource};
use crate::db::{ManagedPool, Repository};
use crate::grading::grade_station;
use crate::metrics::ppsd::{PeriodogramPsdProvider, PsdProvider};
use crate::types::{ScoringInput, Station};
use crate::worker::{ClientSet, OutputPaths, StationWorker, WorkerOptions};
use crate::SqesError;
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

const MAX_PASSES: u32 = 5;
const RETRY_SLEEP: Duration = Duration::from_secs(10);
const MIN_WORKERS: usize = 4;
const STATIONS_PER_WORKER: f64 = 35.0;

pub struct OrchestratorInputs<'a> {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub stations_filter: Option<&'a [String]>,
    pub network_filter: Option<&'a str>,
    /// Write PDF/npz PPSD artifacts (`--ppsd` / historically `npz`).
    pub ppsd: bool,
    pub mseed: bool,
    pub flush: bool,
}

pub struct Orchestrator {
    config: Arc<Config>,
    source_map: Arc<SourceMapping>,
}

impl Orchestrator {
    pub fn new(config: Arc<Config>, source_map: Arc<SourceMapping>) -> Self {
        Self { config, source_map }
    }

    pub async fn run(&self, inputs: OrchestratorInputs<'_>) -> crate::error::Result<()> {
        let mut date = inputs.start_date;
        while date <= inputs.end_date {
            self.run_day(date, &inputs).await?;
            date += chrono::Duration::days(1);
        }
        Ok(())
    }

    fn db_target(&self) -> Option<(DbDialect, DbConnectionConfig)> {
        match self.config.basic.use_database {
            DbDialect::MySql => Some((DbDialect::MySql, self.config.mysql.clone())),
            DbDialect::PostgreSql => Some((DbDialect::PostgreSql, self.config.postgresql.clone())),
            DbDialect::Disabled => None,
        }
    }

    async fn open_repository(&self) -> Option<Repository> {
        let (dialect, db_cfg) = self.db_target()?;
        match ManagedPool::connect(dialect, db_cfg).await {
            Ok(pool) => Some(Repository::new(pool)),
            Err(e) => {
                tracing::error!(error = %e, "failed to open a repository connection");
                None
            }
        }
    }

    fn build_client_set(&self) -> ClientSet {
        let cfg = &self.config;
        let waveform_default: Arc<dyn WaveformClient> = match cfg.basic.waveform_source {
            WaveformSource::Fdsn => Arc::new(RemoteWaveformClient::new(
                cfg.client.url.clone(),
                cfg.client.user.clone(),
                cfg.client.password.clone(),
            )),
            WaveformSource::Sds => Arc::new(LocalSdsClient::new(cfg.basic.archive_path.clone())),
        };
        let waveform_alt: Option<Arc<dyn WaveformClient>> = match cfg.basic.waveform_source {
            WaveformSource::Fdsn if !cfg.client2.url.is_empty() => Some(Arc::new(RemoteWaveformClient::new(
                cfg.client2.url.clone(),
                cfg.client2.user.clone(),
                cfg.client2.password.clone(),
            ))),
            WaveformSource::Sds if !cfg.archive2.archive_path.is_empty() => {
                Some(Arc::new(LocalSdsClient::new(cfg.archive2.archive_path.clone())))
            }
            _ => None,
        };
        let inventory_default: Arc<dyn InventoryClient> = match cfg.basic.inventory_source {
            InventorySource::Fdsn => Arc::new(RemoteInventoryClient::new(
                cfg.inventory_client.url.clone(),
                cfg.inventory_client.user.clone(),
                cfg.inventory_client.password.clone(),
            )),
            InventorySource::Local => Arc::new(LocalInventoryClient::new(cfg.basic.inventory_path.clone())),
        };
        let inventory_alt: Option<Arc<dyn InventoryClient>> = match cfg.basic.inventory_source {
            InventorySource::Local if !cfg.inventory2.inventory_path.is_empty() => {
                Some(Arc::new(LocalInventoryClient::new(cfg.inventory2.inventory_path.clone())))
            }
            _ => None,
        };
        ClientSet {
            waveform_default,
            waveform_alt,
            inventory_default,
            inventory_alt,
            source_map: self.source_map.clone(),
        }
    }

    async fn run_day(&self, date: NaiveDate, inputs: &OrchestratorInputs<'_>) -> crate::error::Result<()> {
        let repo = self
            .open_repository()
            .await
            .ok_or_else(|| SqesError::Configuration("orchestrator could not open its repository".to_string()))?;

        let mut pass = 1u32;
        loop {
            if inputs.flush && date == inputs.start_date && pass == 1 && repo.flush_day(date).await.is_none() {
                tracing::warn!(%date, "flush_day failed, continuing anyway");
            }

            let data = if let Some(codes) = inputs.stations_filter {
                repo.get_station_tuples(codes, inputs.network_filter).await.unwrap_or_default()
            } else {
                repo.list_stations_to_process(date, inputs.network_filter).await.unwrap_or_default()
            };

            if data.is_empty() && inputs.stations_filter.is_none() {
                tracing::info!(%date, pass, "no stations left to process");
                break;
            }

            tracing::info!(%date, pass, stations = data.len(), "dispatching worker pool");
            self.run_worker_pool(data, date, inputs).await;

            let straggler_codes = repo.get_stragglers(date, inputs.stations_filter).await.unwrap_or_default();
            if !straggler_codes.is_empty() {
                tracing::info!(%date, stragglers = straggler_codes.len(), "re-grading stragglers");
                self.grade_stragglers(&straggler_codes, date, inputs, &repo).await;
            }

            if inputs.stations_filter.is_some() || inputs.network_filter.is_some() {
                break;
            }

            let remaining = repo.list_stations_to_process(date, None).await.unwrap_or_default();
            let stragglers = repo.get_stragglers(date, None).await.unwrap_or_default();
            if remaining.is_empty() && stragglers.is_empty() {
                break;
            }

            pass += 1;
            if pass >= MAX_PASSES {
                tracing::warn!(%date, passes = pass, "reached retry limit without full completeness");
                break;
            }
            tokio::time::sleep(RETRY_SLEEP).await;
        }
        Ok(())
    }

    async fn run_worker_pool(&self, stations: Vec<Station>, date: NaiveDate, inputs: &OrchestratorInputs<'_>) {
        if stations.is_empty() {
            return;
        }
        let Some((dialect, db_cfg)) = self.db_target() else {
            tracing::error!("no database dialect configured, skipping worker pool dispatch");
            return;
        };

        let workers = worker_count(self.config.basic.cpu_number_used, stations.len());
        let shares = partition(stations, workers);
        let clients = self.build_client_set();
        let thresholds = self.config.qc_thresholds;
        let options = WorkerOptions {
            mseed: inputs.mseed,
            ppsd: inputs.ppsd,
            spike_engine: self.config.basic.spike_method.into(),
        };
        let output_paths = OutputPaths {
            mseed: self.config.basic.outputmseed.clone(),
            signal: self.config.basic.outputsignal.clone(),
            pdf: self.config.basic.outputpdf.clone(),
            psd: self.config.basic.outputpsd.clone(),
        };

        let mut join_set = JoinSet::new();
        for share in shares {
            if share.is_empty() {
                continue;
            }
            let clients = clients.clone();
            let output_paths = output_paths.clone();
            let db_cfg = db_cfg.clone();
            join_set.spawn(async move {
                let pool = match ManagedPool::connect(dialect, db_cfg).await {
                    Ok(pool) => pool,
                    Err(e) => {
                        tracing::error!(error = %e, stations = share.len(), "worker could not open its db pool, dropping its share");
                        return;
                    }
                };
                let repo = Arc::new(Repository::new(pool));
                let psd_provider: Arc<dyn PsdProvider + Send + Sync> = Arc::new(PeriodogramPsdProvider::default());
                let worker = StationWorker::new(clients, psd_provider, repo, thresholds, options, output_paths);
                for station in &share {
                    worker.process_station(station, date).await;
                }
            });
        }
        while join_set.join_next().await.is_some() {}
    }

    async fn grade_stragglers(&self, codes: &[String], date: NaiveDate, inputs: &OrchestratorInputs<'_>, repo: &Repository) {
        let stations = repo.get_station_tuples(codes, inputs.network_filter).await.unwrap_or_default();
        for station in &stations {
            let rows = repo.get_detail_rows(&station.code, date).await.unwrap_or_default();
            if rows.is_empty() {
                continue;
            }
            let scoring_inputs: Vec<ScoringInput> = rows.iter().map(ScoringInput::from).collect();
            let analysis = grade_station(&station.code, date, &station.group, &scoring_inputs, &self.config.qc_thresholds);
            if repo.insert_analysis(&analysis).await.is_none() {
                tracing::error!(station = %station.code, "failed to write straggler analysis row");
            }
        }
    }
}

/// `max(4, min(configuredCPU, data/35 rounded to even, cpu/3))` (spec §5).
fn worker_count(configured_cpu: usize, data_len: usize) -> usize {
    let cpu = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    let by_data = round_half_to_even(data_len as f64 / STATIONS_PER_WORKER).max(1) as usize;
    let by_cpu_third = (cpu / 3).max(1);
    configured_cpu.min(by_data).min(by_cpu_third).max(MIN_WORKERS)
}

fn round_half_to_even(x: f64) -> i64 {
    let floor = x.floor();
    let diff = x - floor;
    let floor_i = floor as i64;
    if diff < 0.5 {
        floor_i
    } else if diff > 0.5 {
        floor_i + 1
    } else if floor_i % 2 == 0 {
        floor_i
    } else {
        floor_i + 1
    }
}

fn partition(stations: Vec<Station>, workers: usize) -> Vec<Vec<Station>> {
    let mut buckets: Vec<Vec<Station>> = (0..workers).map(|_| Vec::new()).collect();
    for (i, station) in stations.into_iter().enumerate() {
        buckets[i % workers].push(station);
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_half_to_even_matches_banker_rounding() {
        assert_eq!(round_half_to_even(2.5), 2);
        assert_eq!(round_half_to_even(3.5), 4);
        assert_eq!(round_half_to_even(2.4), 2);
        assert_eq!(round_half_to_even(2.6), 3);
    }

    #[test]
    fn worker_count_never_drops_below_the_floor() {
        assert!(worker_count(1, 5) >= MIN_WORKERS);
    }

    #[test]
    fn worker_count_respects_the_configured_ceiling() {
        assert!(worker_count(4, 100_000) <= 4.max(MIN_WORKERS));
    }

    #[test]
    fn partition_distributes_round_robin_without_dropping_stations() {
        let stations: Vec<Station> = (0..7)
            .map(|i| Station {
                network: "IA".into(),
                code: format!("S{i}"),
                location: "00".into(),
                group: "west".into(),
                channel_prefixes: vec!["BH".into()],
                channel_components: vec!["Z".into()],
            })
            .collect();
        let shares = partition(stations, 3);
        let total: usize = shares.iter().map(Vec::len).sum();
        assert_eq!(total, 7);
        assert_eq!(shares.len(), 3);
    }
}
