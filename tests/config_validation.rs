//! Integration coverage for the INI configuration layer: parsing a
//! realistic file from disk through to `config::validate`, independent of
//! any single module's unit tests.

use sqes::config::{self, DbDialect, InventorySource, WaveformSource};

fn sample_ini() -> &'static str {
    r#"
[basic]
use_database = mysql
waveform_source = sds
inventory_source = local
archive_path = /data/archive
inventory_path = /data/inventory
cpu_number_used = 8

[mysql]
host = db.internal
port = 3306
user = sqes
password = secret
database = sqes_qc
pool_size = 5

[archive2]
archive_path = /data/archive-backup

[qc_thresholds]
weight_noise = 0.35
weight_availability = 0.15
weight_rms = 0.10
weight_ratioamp = 0.10
weight_gaps = 0.10
weight_overlaps = 0.10
weight_spikes = 0.10
"#
}

#[test]
fn realistic_file_parses_and_validates_clean() {
    let path = std::env::temp_dir().join("sqes_test_config_clean.ini");
    std::fs::write(&path, sample_ini()).unwrap();

    let cfg = config::load_from_file(&path).expect("should load");
    assert_eq!(cfg.basic.use_database, DbDialect::MySql);
    assert_eq!(cfg.basic.waveform_source, WaveformSource::Sds);
    assert_eq!(cfg.basic.inventory_source, InventorySource::Local);
    assert_eq!(cfg.mysql.host, "db.internal");
    assert_eq!(cfg.archive2.archive_path, "/data/archive-backup");

    let errors = config::validate(&cfg);
    assert!(errors.is_empty(), "expected a clean config, got {errors:?}");

    std::fs::remove_file(&path).ok();
}

#[test]
fn sds_source_without_archive_path_is_rejected_end_to_end() {
    let raw = "[basic]\nwaveform_source = sds\nuse_database = false\n";
    let path = std::env::temp_dir().join("sqes_test_config_bad_sds.ini");
    std::fs::write(&path, raw).unwrap();

    let cfg = config::load_from_file(&path).expect("should still parse");
    let errors = config::validate(&cfg);
    assert!(errors.iter().any(|e| e.contains("archive_path")));

    std::fs::remove_file(&path).ok();
}

#[test]
fn missing_file_is_a_configuration_error_not_a_panic() {
    let path = std::env::temp_dir().join("sqes_test_config_does_not_exist.ini");
    let result = config::load_from_file(&path);
    assert!(matches!(result, Err(sqes::SqesError::Configuration(_))));
}

#[test]
fn mysql_dialect_requires_a_database_name() {
    let raw = "[basic]\nuse_database = mysql\n[mysql]\ndatabase = \n";
    let cfg = config::parse(raw).unwrap();
    let errors = config::validate(&cfg);
    assert!(errors.iter().any(|e| e.contains("mysql")));
}
