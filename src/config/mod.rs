//! Global configuration singleton, loaded from an INI-style file (spec
//! §6.2). Mirrors the teacher's `config::init`/`config::get` global-config
//! idiom; the parsing backend is `ini` rather than `toml` since this
//! domain's configuration format is INI, not TOML.

pub mod defaults;
pub mod source_map;

use crate::types::QcThresholds;
use ini::Ini;
use std::sync::OnceLock;

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Which of the two supported relational backends a deployment uses, or
/// `Disabled` when `use_database = false` (useful for `--check-config`
/// dry runs).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbDialect {
    MySql,
    PostgreSql,
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaveformSource {
    Fdsn,
    Sds,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InventorySource {
    Fdsn,
    Local,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpikeMethod {
    Fast,
    Efficient,
}

impl From<SpikeMethod> for crate::metrics::basic::SpikeEngine {
    fn from(method: SpikeMethod) -> Self {
        match method {
            SpikeMethod::Fast => crate::metrics::basic::SpikeEngine::Fast,
            SpikeMethod::Efficient => crate::metrics::basic::SpikeEngine::Efficient,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RemoteClientConfig {
    pub url: String,
    pub user: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ArchiveConfig {
    pub archive_path: String,
}

#[derive(Debug, Clone, Default)]
pub struct InventoryDirConfig {
    pub inventory_path: String,
}

#[derive(Debug, Clone)]
pub struct DbConnectionConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub pool_size: u32,
}

impl Default for DbConnectionConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3306,
            user: "root".to_string(),
            password: String::new(),
            database: "sqes".to_string(),
            pool_size: 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BasicConfig {
    pub use_database: DbDialect,
    pub waveform_source: WaveformSource,
    pub inventory_source: InventorySource,
    pub archive_path: String,
    pub inventory_path: String,
    pub outputpsd: String,
    pub outputpdf: String,
    pub outputsignal: String,
    pub outputmseed: String,
    pub cpu_number_used: usize,
    pub spike_method: SpikeMethod,
    pub sensor_update_url: Option<String>,
    pub station_update_url: Option<String>,
    pub latency_update_url: Option<String>,
}

impl Default for BasicConfig {
    fn default() -> Self {
        Self {
            use_database: DbDialect::Disabled,
            waveform_source: WaveformSource::Fdsn,
            inventory_source: InventorySource::Fdsn,
            archive_path: String::new(),
            inventory_path: String::new(),
            outputpsd: "output/psd".to_string(),
            outputpdf: "output/pdf".to_string(),
            outputsignal: "output/signal".to_string(),
            outputmseed: "output/mseed".to_string(),
            cpu_number_used: 4,
            spike_method: SpikeMethod::Fast,
            sensor_update_url: None,
            station_update_url: None,
            latency_update_url: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub basic: BasicConfig,
    pub client: RemoteClientConfig,
    pub client2: RemoteClientConfig,
    pub inventory_client: RemoteClientConfig,
    pub archive: ArchiveConfig,
    pub archive2: ArchiveConfig,
    pub inventory: InventoryDirConfig,
    pub inventory2: InventoryDirConfig,
    pub mysql: DbConnectionConfig,
    pub postgresql: DbConnectionConfig,
    pub qc_thresholds: QcThresholds,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            basic: BasicConfig::default(),
            client: RemoteClientConfig::default(),
            client2: RemoteClientConfig::default(),
            inventory_client: RemoteClientConfig::default(),
            archive: ArchiveConfig::default(),
            archive2: ArchiveConfig::default(),
            inventory: InventoryDirConfig::default(),
            inventory2: InventoryDirConfig::default(),
            mysql: DbConnectionConfig {
                port: 3306,
                ..DbConnectionConfig::default()
            },
            postgresql: DbConnectionConfig {
                port: 5432,
                ..DbConnectionConfig::default()
            },
            qc_thresholds: defaults::default_thresholds(),
        }
    }
}

/// Installs the global config. Logs (does not panic) if called twice — the
/// second caller loses, matching the teacher's `config::init`.
pub fn init(config: Config) {
    if CONFIG.set(config).is_err() {
        tracing::warn!("config::init called more than once, ignoring subsequent call");
    }
}

/// Returns the global config.
///
/// # Panics
/// Panics if called before [`init`] — this is a startup bug, not a runtime
/// condition callers should handle.
pub fn get() -> &'static Config {
    CONFIG
        .get()
        .expect("config::get() called before config::init() — this is a startup bug")
}

pub fn is_initialized() -> bool {
    CONFIG.get().is_some()
}

fn get_opt(ini: &Ini, section: &str, key: &str) -> Option<String> {
    ini.section(Some(section)).and_then(|s| s.get(key)).map(str::to_string)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn parse_remote_client(ini: &Ini, section: &str) -> RemoteClientConfig {
    RemoteClientConfig {
        url: get_opt(ini, section, "url").unwrap_or_default(),
        user: non_empty(get_opt(ini, section, "user")),
        password: non_empty(get_opt(ini, section, "password")),
    }
}

fn parse_db_connection(ini: &Ini, section: &str, default_port: u16) -> DbConnectionConfig {
    let mut cfg = DbConnectionConfig {
        port: default_port,
        ..DbConnectionConfig::default()
    };
    if let Some(v) = get_opt(ini, section, "host") {
        cfg.host = v;
    }
    if let Some(v) = get_opt(ini, section, "port").and_then(|v| v.parse().ok()) {
        cfg.port = v;
    }
    if let Some(v) = get_opt(ini, section, "user") {
        cfg.user = v;
    }
    if let Some(v) = get_opt(ini, section, "password") {
        cfg.password = v;
    }
    if let Some(v) = get_opt(ini, section, "database") {
        cfg.database = v;
    }
    if let Some(v) = get_opt(ini, section, "pool_size").and_then(|v| v.parse().ok()) {
        cfg.pool_size = v;
    }
    cfg
}

fn parse_threshold(ini: &Ini, key: &str, default: f64) -> f64 {
    get_opt(ini, "qc_thresholds", key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_qc_thresholds(ini: &Ini) -> QcThresholds {
    use defaults::*;
    QcThresholds {
        rms_limit: parse_threshold(ini, "rms_limit", RMS_LIMIT),
        rms_margin: parse_threshold(ini, "rms_margin", RMS_MARGIN),
        ratioamp_limit: parse_threshold(ini, "ratioamp_limit", RATIOAMP_LIMIT),
        ratioamp_margin: parse_threshold(ini, "ratioamp_margin", RATIOAMP_MARGIN),
        gap_limit: parse_threshold(ini, "gap_limit", GAP_LIMIT),
        gap_margin: parse_threshold(ini, "gap_margin", GAP_MARGIN),
        overlap_limit: parse_threshold(ini, "overlap_limit", OVERLAP_LIMIT),
        overlap_margin: parse_threshold(ini, "overlap_margin", OVERLAP_MARGIN),
        spike_limit: parse_threshold(ini, "spike_limit", SPIKE_LIMIT),
        spike_margin: parse_threshold(ini, "spike_margin", SPIKE_MARGIN),
        pct_below_warn: parse_threshold(ini, "pct_below_warn", PCT_BELOW_WARN),
        pct_above_warn: parse_threshold(ini, "pct_above_warn", PCT_ABOVE_WARN),
        gap_count_warn: parse_threshold(ini, "gap_count_warn", GAP_COUNT_WARN),
        overlap_count_warn: parse_threshold(ini, "overlap_count_warn", OVERLAP_COUNT_WARN),
        spike_count_warn: parse_threshold(ini, "spike_count_warn", SPIKE_COUNT_WARN),
        avail_good: parse_threshold(ini, "avail_good", AVAIL_GOOD),
        avail_fair: parse_threshold(ini, "avail_fair", AVAIL_FAIR),
        avail_min_for_noise_check: parse_threshold(
            ini,
            "avail_min_for_noise_check",
            AVAIL_MIN_FOR_NOISE_CHECK,
        ),
        dcl_dead: parse_threshold(ini, "dcl_dead", DCL_DEAD),
        rms_damaged_max: parse_threshold(ini, "rms_damaged_max", RMS_DAMAGED_MAX),
        fair_max_score: parse_threshold(ini, "fair_max_score", FAIR_MAX_SCORE),
        poor_max_score: parse_threshold(ini, "poor_max_score", POOR_MAX_SCORE),
        weight_noise: parse_threshold(ini, "weight_noise", WEIGHT_NOISE),
        weight_availability: parse_threshold(ini, "weight_availability", WEIGHT_AVAILABILITY),
        weight_rms: parse_threshold(ini, "weight_rms", WEIGHT_RMS),
        weight_ratioamp: parse_threshold(ini, "weight_ratioamp", WEIGHT_RATIOAMP),
        weight_gaps: parse_threshold(ini, "weight_gaps", WEIGHT_GAPS),
        weight_overlaps: parse_threshold(ini, "weight_overlaps", WEIGHT_OVERLAPS),
        weight_spikes: parse_threshold(ini, "weight_spikes", WEIGHT_SPIKES),
    }
}

/// Parses an INI document already read into memory. Split from
/// `load_from_file` so tests can exercise parsing without touching the
/// filesystem.
pub fn parse(raw: &str) -> Result<Config, crate::SqesError> {
    let ini = Ini::load_from_str(raw)
        .map_err(|e| crate::SqesError::Configuration(format!("invalid ini: {e}")))?;

    let use_database = match get_opt(&ini, "basic", "use_database").as_deref() {
        Some("mysql") => DbDialect::MySql,
        Some("postgresql") => DbDialect::PostgreSql,
        Some("false") | None => DbDialect::Disabled,
        Some(other) => {
            return Err(crate::SqesError::Configuration(format!(
                "basic.use_database: unknown value '{other}', expected mysql, postgresql, or false"
            )))
        }
    };
    let waveform_source = match get_opt(&ini, "basic", "waveform_source").as_deref() {
        Some("sds") => WaveformSource::Sds,
        Some("fdsn") | None => WaveformSource::Fdsn,
        Some(other) => {
            return Err(crate::SqesError::Configuration(format!(
                "basic.waveform_source: unknown value '{other}'"
            )))
        }
    };
    let inventory_source = match get_opt(&ini, "basic", "inventory_source").as_deref() {
        Some("local") => InventorySource::Local,
        Some("fdsn") | None => InventorySource::Fdsn,
        Some(other) => {
            return Err(crate::SqesError::Configuration(format!(
                "basic.inventory_source: unknown value '{other}'"
            )))
        }
    };
    let spike_method = match get_opt(&ini, "basic", "spike_method").as_deref() {
        Some("efficient") => SpikeMethod::Efficient,
        Some("fast") | None => SpikeMethod::Fast,
        Some(other) => {
            return Err(crate::SqesError::Configuration(format!(
                "basic.spike_method: unknown value '{other}'"
            )))
        }
    };

    let defaults = BasicConfig::default();
    let basic = BasicConfig {
        use_database,
        waveform_source,
        inventory_source,
        archive_path: get_opt(&ini, "basic", "archive_path").unwrap_or(defaults.archive_path),
        inventory_path: get_opt(&ini, "basic", "inventory_path").unwrap_or(defaults.inventory_path),
        outputpsd: get_opt(&ini, "basic", "outputpsd").unwrap_or(defaults.outputpsd),
        outputpdf: get_opt(&ini, "basic", "outputpdf").unwrap_or(defaults.outputpdf),
        outputsignal: get_opt(&ini, "basic", "outputsignal").unwrap_or(defaults.outputsignal),
        outputmseed: get_opt(&ini, "basic", "outputmseed").unwrap_or(defaults.outputmseed),
        cpu_number_used: get_opt(&ini, "basic", "cpu_number_used")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.cpu_number_used),
        spike_method,
        sensor_update_url: non_empty(get_opt(&ini, "basic", "sensor_update_url")),
        station_update_url: non_empty(get_opt(&ini, "basic", "station_update_url")),
        latency_update_url: non_empty(get_opt(&ini, "basic", "latency_update_url")),
    };

    Ok(Config {
        basic,
        client: parse_remote_client(&ini, "client"),
        client2: parse_remote_client(&ini, "client2"),
        inventory_client: parse_remote_client(&ini, "inventory_client"),
        archive: ArchiveConfig {
            archive_path: get_opt(&ini, "archive", "archive_path").unwrap_or_default(),
        },
        archive2: ArchiveConfig {
            archive_path: get_opt(&ini, "archive2", "archive_path").unwrap_or_default(),
        },
        inventory: InventoryDirConfig {
            inventory_path: get_opt(&ini, "inventory", "inventory_path").unwrap_or_default(),
        },
        inventory2: InventoryDirConfig {
            inventory_path: get_opt(&ini, "inventory2", "inventory_path").unwrap_or_default(),
        },
        mysql: parse_db_connection(&ini, "mysql", 3306),
        postgresql: parse_db_connection(&ini, "postgresql", 5432),
        qc_thresholds: parse_qc_thresholds(&ini),
    })
}

/// Loads configuration from a file path.
pub fn load_from_file(path: &std::path::Path) -> Result<Config, crate::SqesError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| crate::SqesError::Configuration(format!("reading {}: {e}", path.display())))?;
    parse(&raw)
}

/// Collects every validation problem rather than failing on the first one,
/// matching the teacher's `WellConfig::validate()`.
pub fn validate(config: &Config) -> Vec<String> {
    let mut errors = Vec::new();

    let sum = config.qc_thresholds.weight_sum();
    if (sum - 1.0).abs() > 1e-3 {
        errors.push(format!(
            "qc_thresholds weights must sum to 1.0 (±1e-3), got {sum:.4}"
        ));
    }

    if matches!(config.basic.use_database, DbDialect::MySql) && config.mysql.database.is_empty() {
        errors.push("use_database = mysql but [mysql] database is empty".to_string());
    }
    if matches!(config.basic.use_database, DbDialect::PostgreSql) && config.postgresql.database.is_empty()
    {
        errors.push("use_database = postgresql but [postgresql] database is empty".to_string());
    }

    if matches!(config.basic.waveform_source, WaveformSource::Sds) && config.basic.archive_path.is_empty()
    {
        errors.push("waveform_source = sds but basic.archive_path is empty".to_string());
    }
    if matches!(config.basic.inventory_source, InventorySource::Local)
        && config.basic.inventory_path.is_empty()
    {
        errors.push("inventory_source = local but basic.inventory_path is empty".to_string());
    }

    errors
}


