//! Per-station source override file (spec §6.3), grounded line-for-line on
//! the upstream source mapper: `NETWORK STATION WAVEFORM_TYPE WAVEFORM_TAG
//! [INVENTORY_TYPE INVENTORY_TAG]`, `default`/`default` inherits.

use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaveformSourceConfig {
    pub kind: String,
    pub tag: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventorySourceConfig {
    pub kind: String,
    pub tag: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StationSourceConfig {
    pub waveform: Option<WaveformSourceConfig>,
    pub inventory: Option<InventorySourceConfig>,
}

pub type SourceMapping = HashMap<(String, String), StationSourceConfig>;

/// Loads a `source.cfg`. Returns an empty mapping (not an error) if the file
/// doesn't exist — callers fall back to `global.cfg` defaults for every
/// station.
pub fn load_source_mapping(path: &Path) -> SourceMapping {
    let mut mapping = SourceMapping::new();
    let Ok(contents) = std::fs::read_to_string(path) else {
        tracing::info!(path = %path.display(), "source mapping file not found, using defaults for all stations");
        return mapping;
    };

    for (line_num, raw_line) in contents.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 4 {
            tracing::warn!(line = line_num + 1, %raw_line, "invalid source.cfg line, expected at least 4 fields");
            continue;
        }

        let network = parts[0].to_string();
        let station = parts[1].to_string();
        let waveform_type = parts[2];
        let waveform_tag = parts[3];

        let waveform = if !is_default(waveform_type) && !is_default(waveform_tag) {
            if waveform_type != "fdsn" && waveform_type != "sds" {
                tracing::warn!(line = line_num + 1, waveform_type, "invalid waveform type, expected fdsn, sds, or default");
                continue;
            }
            Some(WaveformSourceConfig {
                kind: waveform_type.to_string(),
                tag: waveform_tag.to_string(),
            })
        } else {
            None
        };

        let inventory = if parts.len() >= 6 {
            let inventory_type = parts[4];
            let inventory_tag = parts[5];
            if !is_default(inventory_type) && !is_default(inventory_tag) {
                if inventory_type != "fdsn" && inventory_type != "local" {
                    tracing::warn!(line = line_num + 1, inventory_type, "invalid inventory type, expected fdsn, local, or default");
                    continue;
                }
                Some(InventorySourceConfig {
                    kind: inventory_type.to_string(),
                    tag: inventory_tag.to_string(),
                })
            } else {
                None
            }
        } else {
            None
        };

        mapping.insert((network, station), StationSourceConfig { waveform, inventory });
    }

    mapping
}

fn is_default(value: &str) -> bool {
    value.eq_ignore_ascii_case("default")
}

pub fn get_station_sources<'a>(
    mapping: &'a SourceMapping,
    network: &str,
    station: &str,
) -> Option<&'a StationSourceConfig> {
    mapping.get(&(network.to_string(), station.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_yields_empty_mapping() {
        let mapping = load_source_mapping(Path::new("/nonexistent/source.cfg"));
        assert!(mapping.is_empty());
    }

    #[test]
    fn parses_waveform_and_inventory_override() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# comment").unwrap();
        writeln!(file, "IA MSAI sds archive2 local inventory2").unwrap();
        writeln!(file, "IA ABCD default default").unwrap();
        let mapping = load_source_mapping(file.path());

        let msai = get_station_sources(&mapping, "IA", "MSAI").unwrap();
        assert_eq!(msai.waveform.as_ref().unwrap().kind, "sds");
        assert_eq!(msai.waveform.as_ref().unwrap().tag, "archive2");
        assert_eq!(msai.inventory.as_ref().unwrap().kind, "local");

        let abcd = get_station_sources(&mapping, "IA", "ABCD").unwrap();
        assert!(abcd.waveform.is_none());
        assert!(abcd.inventory.is_none());

        assert!(get_station_sources(&mapping, "IA", "NOPE").is_none());
    }

    #[test]
    fn invalid_lines_are_skipped_with_warning() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "IA MSAI only_three").unwrap();
        let mapping = load_source_mapping(file.path());
        assert!(mapping.is_empty());
    }
}
