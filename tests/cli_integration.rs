//! CLI parsing exercised the way `sqes_cli` actually calls it: full
//! argument vectors in, resolved dates/verbosity out. Complements
//! `cli`'s own unit tests by covering flag combinations across the whole
//! surface described in the run-mode contract.

use clap::Parser;
use sqes::cli::CliArgs;
use sqes::logging::Verbosity;

#[test]
fn date_range_and_station_filter_combine() {
    let args = CliArgs::parse_from([
        "sqes_cli",
        "--date-range",
        "20240301",
        "20240305",
        "-s",
        "MSAI",
        "-s",
        "BSSI",
        "--ppsd",
    ]);
    let (start, end) = args.date_bounds().unwrap();
    assert_eq!(start.to_string(), "2024-03-01");
    assert_eq!(end.to_string(), "2024-03-05");
    assert_eq!(args.stations, vec!["MSAI".to_string(), "BSSI".to_string()]);
    assert!(args.ppsd);
    assert!(!args.mseed);
}

#[test]
fn flush_without_date_is_rejected_by_the_parser() {
    let result = CliArgs::try_parse_from(["sqes_cli", "--flush"]);
    assert!(result.is_err(), "--flush requires --date at the parser level");
}

#[test]
fn date_and_date_range_are_mutually_exclusive() {
    let result = CliArgs::try_parse_from([
        "sqes_cli",
        "--date",
        "20240305",
        "--date-range",
        "20240301",
        "20240305",
    ]);
    assert!(result.is_err());
}

#[test]
fn check_config_mode_needs_no_date_at_all() {
    let args = CliArgs::parse_from(["sqes_cli", "--check-config"]);
    assert!(args.check_config);
    assert!(args.date_bounds().is_err());
}

#[test]
fn default_config_path_falls_back_to_sqes_ini() {
    let args = CliArgs::parse_from(["sqes_cli", "--date", "20240305"]);
    assert_eq!(args.config, "sqes.ini");
}

#[test]
fn verbosity_levels_map_onto_the_logging_enum() {
    let normal = CliArgs::parse_from(["sqes_cli", "--date", "20240305"]);
    let verbose = CliArgs::parse_from(["sqes_cli", "--date", "20240305", "-v"]);
    let debug = CliArgs::parse_from(["sqes_cli", "--date", "20240305", "-v", "-v"]);
    assert_eq!(normal.verbosity(), Verbosity::Normal);
    assert_eq!(verbose.verbosity(), Verbosity::Verbose);
    assert_eq!(debug.verbosity(), Verbosity::Debug);
}

#[test]
fn invalid_date_format_is_rejected_after_parsing() {
    let args = CliArgs::parse_from(["sqes_cli", "--date", "2024-03-05"]);
    assert!(args.date_bounds().is_err());
}
