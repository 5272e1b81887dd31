//! CLI argument parsing (spec §6.1), grounded on the teacher's `CliArgs`
//! derive-`Parser` struct shape.

use chrono::NaiveDate;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "sqes_cli")]
#[command(about = "Seismic station quality evaluation")]
#[command(version)]
pub struct CliArgs {
    /// Process a single day, format YYYYMMDD.
    #[arg(long, value_name = "YYYYMMDD", conflicts_with = "date_range")]
    pub date: Option<String>,

    /// Process an inclusive date range, format YYYYMMDD YYYYMMDD.
    #[arg(long, value_names = ["START", "END"], num_args = 2, conflicts_with = "date")]
    pub date_range: Option<Vec<String>>,

    /// Restrict processing to these station codes (repeatable).
    #[arg(short = 's', long = "station", value_name = "STA")]
    pub stations: Vec<String>,

    /// Restrict processing to this network code.
    #[arg(short = 'n', long = "network", value_name = "NET")]
    pub network: Option<String>,

    /// Write PDF plot and PSD npz artifacts.
    #[arg(long)]
    pub ppsd: bool,

    /// Write miniSEED artifacts.
    #[arg(long)]
    pub mseed: bool,

    /// Delete and re-run the first day of the run before processing.
    #[arg(long, requires = "date")]
    pub flush: bool,

    /// Out of scope: refresh the sensor catalog from `sensor_update_url`.
    #[arg(long)]
    pub sensor_update: bool,

    /// Out of scope: refresh the station catalog from `station_update_url`.
    #[arg(long)]
    pub station_update: bool,

    /// Out of scope: refresh latency stats from `latency_update_url`.
    #[arg(long)]
    pub latency_collector: bool,

    /// Validate configuration and exit without processing any day.
    #[arg(long)]
    pub check_config: bool,

    /// Increase log verbosity. Repeat for more (`-v`, `-vv`).
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Path to the INI configuration file.
    #[arg(long, default_value = "sqes.ini", env = "SQES_CONFIG")]
    pub config: String,
}

impl CliArgs {
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        match self.verbose {
            0 => crate::logging::Verbosity::Normal,
            1 => crate::logging::Verbosity::Verbose,
            _ => crate::logging::Verbosity::Debug,
        }
    }

    /// Resolves `--date`/`--date-range` into an inclusive `(start, end)`
    /// pair. `None` for both is a configuration error the caller surfaces
    /// before touching the database.
    pub fn date_bounds(&self) -> Result<(NaiveDate, NaiveDate), String> {
        if let Some(raw) = &self.date {
            let date = parse_yyyymmdd(raw)?;
            return Ok((date, date));
        }
        if let Some(range) = &self.date_range {
            let start = parse_yyyymmdd(&range[0])?;
            let end = parse_yyyymmdd(&range[1])?;
            if end < start {
                return Err(format!("--date-range end ({end}) is before start ({start})"));
            }
            return Ok((start, end));
        }
        Err("one of --date or --date-range is required".to_string())
    }

    /// Any of the out-of-scope auxiliary scraper flags were passed.
    pub fn wants_auxiliary_scraper(&self) -> bool {
        self.sensor_update || self.station_update || self.latency_collector
    }
}

fn parse_yyyymmdd(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, "%Y%m%d").map_err(|e| format!("invalid date '{raw}' (expected YYYYMMDD): {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_date_bounds_are_equal() {
        let args = CliArgs::parse_from(["sqes_cli", "--date", "20240305"]);
        let (start, end) = args.date_bounds().unwrap();
        assert_eq!(start, end);
        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
    }

    #[test]
    fn date_range_requires_non_decreasing_order() {
        let args = CliArgs::parse_from(["sqes_cli", "--date-range", "20240305", "20240301"]);
        assert!(args.date_bounds().is_err());
    }

    #[test]
    fn neither_date_flag_is_an_error() {
        let args = CliArgs::parse_from(["sqes_cli"]);
        assert!(args.date_bounds().is_err());
    }

    #[test]
    fn verbosity_escalates_with_repeated_flag() {
        let args = CliArgs::parse_from(["sqes_cli", "--date", "20240305", "-vv"]);
        assert_eq!(args.verbosity(), crate::logging::Verbosity::Debug);
    }

    #[test]
    fn wants_auxiliary_scraper_detects_any_of_the_three_flags() {
        let args = CliArgs::parse_from(["sqes_cli", "--date", "20240305", "--station-update"]);
        assert!(args.wants_auxiliary_scraper());
    }
}
