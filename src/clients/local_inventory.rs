//! Local-file inventory client (spec §4.4): tries `{net}.{sta}.xml`,
//! `{net}.{sta}.dataless`, `{sta}.xml` under a configured directory, parses
//! the first that exists as StationXML, then applies the
//! epoch-restricted-then-unrestricted select fallback.

use super::{Inventory, InventoryClient, InventoryEpoch};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;
use std::path::PathBuf;

pub struct LocalInventoryClient {
    directory: PathBuf,
}

impl LocalInventoryClient {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    fn candidate_paths(&self, network: &str, station: &str) -> Vec<PathBuf> {
        vec![
            self.directory.join(format!("{network}.{station}.xml")),
            self.directory.join(format!("{network}.{station}.dataless")),
            self.directory.join(format!("{station}.xml")),
        ]
    }
}

#[async_trait]
impl InventoryClient for LocalInventoryClient {
    async fn get_inventory(
        &self,
        network: &str,
        station: &str,
        location: &str,
        channel: &str,
        at_time: DateTime<Utc>,
    ) -> Option<Inventory> {
        let path = self
            .candidate_paths(network, station)
            .into_iter()
            .find(|p| p.exists())?;

        let contents = std::fs::read_to_string(&path).ok()?;
        let inventory = parse_station_xml(&contents);
        if inventory.is_empty() {
            return None;
        }

        let restricted = inventory.select_at(location, channel, at_time);
        let epochs = if !restricted.is_empty() {
            restricted.into_iter().cloned().collect()
        } else {
            tracing::debug!(
                path = %path.display(),
                channel,
                "epoch-restricted select empty, falling back to unrestricted channel select"
            );
            inventory
                .select_channel(channel)
                .into_iter()
                .cloned()
                .collect::<Vec<_>>()
        };

        if epochs.is_empty() {
            None
        } else {
            Some(Inventory { epochs })
        }
    }
}

/// Minimal StationXML reader: extracts `<Channel>` elements' location code,
/// channel code, start/end dates and `<SampleRate>`. Anything else in the
/// document (responses, sensor descriptions, comments) is ignored — the
/// worker only needs epoch coverage and sample rate.
pub fn parse_station_xml(xml: &str) -> Inventory {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut epochs = Vec::new();
    let mut warnings: HashMap<String, usize> = HashMap::new();
    let mut buf = Vec::new();

    let mut current: Option<PartialEpoch> = None;
    let mut in_sample_rate = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"Channel" => {
                let mut location = String::new();
                let mut channel = String::new();
                let mut start = None;
                let mut end = None;
                for attr in e.attributes().flatten() {
                    let key = attr.key.local_name();
                    let value = attr.unescape_value().unwrap_or_default().to_string();
                    match key.as_ref() {
                        b"locationCode" => location = value,
                        b"code" => channel = value,
                        b"startDate" => start = parse_xml_time(&value),
                        b"endDate" => end = parse_xml_time(&value),
                        _ => {}
                    }
                }
                current = Some(PartialEpoch {
                    location,
                    channel,
                    start,
                    end,
                    sample_rate_hz: 0.0,
                });
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == b"Channel" => {
                if let Some(epoch) = current.take() {
                    match epoch.start {
                        Some(start) => epochs.push(InventoryEpoch {
                            location: epoch.location,
                            channel: epoch.channel,
                            start,
                            end: epoch.end,
                            sample_rate_hz: epoch.sample_rate_hz,
                        }),
                        None => {
                            *warnings.entry("channel missing startDate".to_string()).or_insert(0) += 1;
                        }
                    }
                }
            }
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"SampleRate" => {
                in_sample_rate = true;
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == b"SampleRate" => {
                in_sample_rate = false;
            }
            Ok(Event::Text(t)) if in_sample_rate => {
                if let Some(epoch) = current.as_mut() {
                    if let Ok(text) = t.unescape() {
                        epoch.sample_rate_hz = text.parse().unwrap_or(0.0);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                *warnings.entry(format!("xml parse error: {e}")).or_insert(0) += 1;
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    for (message, count) in warnings {
        tracing::warn!(count, "{message}");
    }

    Inventory { epochs }
}

struct PartialEpoch {
    location: String,
    channel: String,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    sample_rate_hz: f64,
}

fn parse_xml_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value).map(|dt| dt.with_timezone(&Utc)).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_XML: &str = r#"<?xml version="1.0"?>
<FDSNStationXML>
  <Network code="IA">
    <Station code="MSAI">
      <Channel locationCode="00" code="BHZ" startDate="2020-01-01T00:00:00Z" endDate="2024-01-01T00:00:00Z">
        <SampleRate>100.0</SampleRate>
      </Channel>
      <Channel locationCode="00" code="BHZ" startDate="2024-01-01T00:00:00Z">
        <SampleRate>100.0</SampleRate>
      </Channel>
    </Station>
  </Network>
</FDSNStationXML>"#;

    #[test]
    fn parses_two_epochs_with_sample_rate() {
        let inv = parse_station_xml(SAMPLE_XML);
        assert_eq!(inv.epochs.len(), 2);
        assert_eq!(inv.epochs[0].sample_rate_hz, 100.0);
        assert!(inv.epochs[1].end.is_none());
    }

    #[test]
    fn select_at_picks_the_covering_epoch() {
        let inv = parse_station_xml(SAMPLE_XML);
        let at = "2022-06-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let matches = inv.select_at("00", "BHZ", at);
        assert_eq!(matches.len(), 1);
        assert!(matches[0].end.is_some());
    }

    #[test]
    fn empty_document_yields_empty_inventory() {
        let inv = parse_station_xml("<FDSNStationXML></FDSNStationXML>");
        assert!(inv.is_empty());
    }
}
