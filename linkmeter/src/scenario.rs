//! Scenario files.
//!
//! A scenario describes one finished run: the link it was configured with,
//! the traffic it generated and the flow counters the engine reported.
//!
//! ```toml
//! name = "mimo-2x2-near"
//!
//! [link]
//! spatial_streams = 2
//! channel_width = 40
//! distance = 15.0
//!
//! [traffic]
//! nodes = 4
//! packets = 10
//!
//! [[flows]]
//! id = 1
//! tx_packets = 100
//! rx_packets = 95
//! lost_packets = 5
//! rx_bytes = 139650
//! delay_sum = "950ms"
//! first_tx = "1s"
//! last_rx = "9s"
//! ```

use anyhow::{Context as _, Result};
use linkmeter_core::{
    ChannelWidth, FlowCounters, FlowId, FlowSnapshot, ScenarioParameters, SimTime,
    SpatialStreams, parse_duration,
    capacity::ParameterError,
    defaults,
    flow::CounterError,
};
use serde::{Deserialize, Deserializer, de::Error as _};
use std::{fs, path::Path, time::Duration};
use thiserror::Error;
use tracing::{info, warn};

/// A scenario file as written on disk.
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct ScenarioFile {
    pub name: Option<String>,
    #[serde(default)]
    pub link: LinkConfig,
    #[serde(default)]
    pub traffic: TrafficConfig,
    #[serde(default)]
    pub flows: Vec<FlowEntry>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct LinkConfig {
    pub spatial_streams: u32,
    /// In MHz.
    pub channel_width: u32,
    /// Distance between the station and the access point, in meters.
    pub distance: f64,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct TrafficConfig {
    /// Number of wireless stations per network.
    pub nodes: u32,
    /// Number of packets the traced client sends.
    pub packets: u64,
    /// UDP payload size, in bytes.
    pub packet_size: u32,
}

/// Counters of one flow. Times and the delay sum are written with their
/// unit (`"950ms"`, `"1.5s"`).
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct FlowEntry {
    pub id: FlowId,
    pub tx_packets: u64,
    pub rx_packets: u64,
    /// Defaults to the packets transmitted but not received.
    pub lost_packets: Option<u64>,
    pub rx_bytes: u64,
    #[serde(default, deserialize_with = "span")]
    pub delay_sum: Duration,
    #[serde(default)]
    pub first_tx: SimTime,
    #[serde(default)]
    pub last_rx: SimTime,
}

/// A validated scenario.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: String,
    pub parameters: ScenarioParameters,
    pub nodes: u32,
    pub packets: u64,
    pub packet_size: u32,
    pub snapshot: FlowSnapshot,
}

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error(transparent)]
    Parameter(#[from] ParameterError),
    #[error("flow {flow} appears more than once")]
    DuplicateFlow { flow: FlowId },
    #[error("flow {flow} has inconsistent counters")]
    Counters {
        flow: FlowId,
        #[source]
        source: CounterError,
    },
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            spatial_streams: 1,
            channel_width: 20,
            distance: defaults::DEFAULT_DISTANCE_M,
        }
    }
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            nodes: 4,
            packets: 10,
            packet_size: defaults::DEFAULT_PACKET_SIZE,
        }
    }
}

impl LinkConfig {
    /// An unsupported channel width falls back to 20MHz; any other invalid
    /// value is an error.
    pub fn parameters(&self) -> Result<ScenarioParameters, ParameterError> {
        let channel_width = ChannelWidth::try_from(self.channel_width).unwrap_or_else(|error| {
            warn!(%error, "using the default 20MHz channel width");
            ChannelWidth::Mhz20
        });
        let spatial_streams = SpatialStreams::try_from(self.spatial_streams)?;

        ScenarioParameters::new(spatial_streams, channel_width, self.distance)
    }
}

fn span<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    let text = String::deserialize(deserializer)?;
    parse_duration(&text).map_err(D::Error::custom)
}

impl FlowEntry {
    pub fn counters(&self) -> Result<FlowCounters, CounterError> {
        let counters = FlowCounters {
            tx_packets: self.tx_packets,
            rx_packets: self.rx_packets,
            lost_packets: self
                .lost_packets
                .unwrap_or(self.tx_packets.saturating_sub(self.rx_packets)),
            rx_bytes: self.rx_bytes,
            delay_sum: self.delay_sum,
            first_tx: self.first_tx,
            last_rx: self.last_rx,
        };
        counters.validate()?;
        Ok(counters)
    }
}

impl ScenarioFile {
    pub fn resolve(self) -> Result<Scenario, ScenarioError> {
        let parameters = self.link.parameters()?;

        let mut snapshot = FlowSnapshot::new();
        for entry in &self.flows {
            let counters = entry.counters().map_err(|source| ScenarioError::Counters {
                flow: entry.id,
                source,
            })?;
            if snapshot.insert(entry.id, counters).is_some() {
                return Err(ScenarioError::DuplicateFlow { flow: entry.id });
            }
        }

        Ok(Scenario {
            name: self.name.unwrap_or_else(|| "scenario".to_owned()),
            parameters,
            nodes: self.traffic.nodes,
            packets: self.traffic.packets,
            packet_size: self.traffic.packet_size,
            snapshot,
        })
    }
}

impl Scenario {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: ScenarioFile = toml::from_str(content).context("Failed to parse scenario file")?;
        Ok(file.resolve()?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
        let scenario = Self::from_toml_str(&content)
            .with_context(|| format!("Invalid scenario {}", path.display()))?;

        info!(
            name = %scenario.name,
            streams = %scenario.parameters.spatial_streams(),
            width = %scenario.parameters.channel_width(),
            distance = scenario.parameters.distance_m(),
            flows = scenario.snapshot.len(),
            "scenario loaded"
        );
        Ok(scenario)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
        name = "mimo"

        [link]
        spatial_streams = 2
        channel_width = 40
        distance = 35.0

        [traffic]
        nodes = 3
        packets = 20

        [[flows]]
        id = 1
        tx_packets = 100
        rx_packets = 95
        lost_packets = 5
        rx_bytes = 139650
        delay_sum = "950ms"
        first_tx = "1s"
        last_rx = "9s"

        [[flows]]
        id = 2
        tx_packets = 10
        rx_packets = 8
        rx_bytes = 800
    "#;

    #[test]
    fn full_scenario() {
        let scenario = Scenario::from_toml_str(FULL).unwrap();

        assert_eq!(scenario.name, "mimo");
        assert_eq!(scenario.parameters.spatial_streams(), SpatialStreams::Two);
        assert_eq!(scenario.parameters.channel_width(), ChannelWidth::Mhz40);
        assert_eq!(scenario.parameters.theoretical_throughput().as_mbps(), 150.0);
        assert_eq!(scenario.nodes, 3);
        assert_eq!(scenario.packets, 20);
        assert_eq!(scenario.packet_size, 1_470);

        let first = &scenario.snapshot[&FlowId::new(1)];
        assert_eq!(first.delay_sum, Duration::from_millis(950));
        assert_eq!(first.last_rx, SimTime::from_secs(9));

        // missing lost count is derived
        assert_eq!(scenario.snapshot[&FlowId::new(2)].lost_packets, 2);
    }

    #[test]
    fn delay_sum_is_a_span() {
        let flow = |delay_sum: &str| {
            format!("[[flows]]\nid = 1\ntx_packets = 1\nrx_packets = 1\nrx_bytes = 0\ndelay_sum = \"{delay_sum}\"\n")
        };

        let file: ScenarioFile = toml::from_str(&flow("1s 250ms")).unwrap();
        assert_eq!(file.flows[0].delay_sum, Duration::from_millis(1_250));

        let error = toml::from_str::<ScenarioFile>(&flow("950")).unwrap_err();
        assert!(error.to_string().contains("expecting a unit"));
        assert!(toml::from_str::<ScenarioFile>(&flow("soon")).is_err());

        let file: ScenarioFile =
            toml::from_str("[[flows]]\nid = 1\ntx_packets = 0\nrx_packets = 0\nrx_bytes = 0\n").unwrap();
        assert_eq!(file.flows[0].delay_sum, Duration::ZERO);
    }

    #[test]
    fn defaults() {
        let scenario = Scenario::from_toml_str("").unwrap();

        assert_eq!(scenario.parameters, ScenarioParameters::default());
        assert_eq!(scenario.nodes, 4);
        assert_eq!(scenario.packets, 10);
        assert!(scenario.snapshot.is_empty());
    }

    #[test]
    fn unsupported_width_falls_back_to_20mhz() {
        let scenario = Scenario::from_toml_str("[link]\nchannel_width = 80\n").unwrap();
        assert_eq!(scenario.parameters.channel_width(), ChannelWidth::Mhz20);
    }

    #[test]
    fn unsupported_streams_are_rejected() {
        assert!(Scenario::from_toml_str("[link]\nspatial_streams = 3\n").is_err());
        assert!(Scenario::from_toml_str("[link]\ndistance = -1.0\n").is_err());
    }

    #[test]
    fn inconsistent_flows_are_rejected() {
        let more_rx = r#"
            [[flows]]
            id = 1
            tx_packets = 1
            rx_packets = 2
            rx_bytes = 0
        "#;
        let file: ScenarioFile = toml::from_str(more_rx).unwrap();
        assert!(matches!(
            file.resolve(),
            Err(ScenarioError::Counters { flow, .. }) if flow == FlowId::new(1)
        ));

        let duplicated = r#"
            [[flows]]
            id = 1
            tx_packets = 1
            rx_packets = 1
            rx_bytes = 0

            [[flows]]
            id = 1
            tx_packets = 1
            rx_packets = 1
            rx_bytes = 0
        "#;
        let file: ScenarioFile = toml::from_str(duplicated).unwrap();
        assert!(matches!(
            file.resolve(),
            Err(ScenarioError::DuplicateFlow { .. })
        ));
    }

    #[test]
    fn bad_time_is_a_parse_error() {
        let bad = "[[flows]]\nid = 1\ntx_packets = 1\nrx_packets = 1\nrx_bytes = 0\nlast_rx = \"soon\"\n";
        assert!(Scenario::from_toml_str(bad).is_err());
    }
}
