//! Runtime configuration, seeded from the compile-time defaults and
//! overridden from the command line.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{SIMULATION, STREAM};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagerConfig {
    pub server_url: String,
    pub stomp_path: String,
    pub virtual_host: String,
    pub max_reconnect_attempts: u32,
    pub reconnect_backoff: Duration,
    pub heartbeat_outgoing: Duration,
    pub heartbeat_incoming: Duration,
    /// Also listen on the shared analysis topic, keeping only updates that
    /// match the card's exchange and currency pair.
    pub subscribe_common_topic: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            server_url: STREAM.endpoint.server_url.to_string(),
            stomp_path: STREAM.endpoint.stomp_path.to_string(),
            virtual_host: STREAM.endpoint.virtual_host.to_string(),
            max_reconnect_attempts: STREAM.reconnect.max_attempts,
            reconnect_backoff: Duration::from_millis(STREAM.reconnect.backoff_ms),
            heartbeat_outgoing: Duration::from_millis(STREAM.heartbeat.outgoing_ms),
            heartbeat_incoming: Duration::from_millis(STREAM.heartbeat.incoming_ms),
            subscribe_common_topic: false,
        }
    }
}

impl ManagerConfig {
    /// WebSocket URL of the STOMP endpoint, e.g. `ws://localhost:8080/ws/stomp/analysis`.
    pub fn endpoint_url(&self) -> String {
        let base = self.server_url.trim_end_matches('/');
        let base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else if base.starts_with("ws://") || base.starts_with("wss://") {
            base.to_string()
        } else {
            format!("ws://{base}")
        };
        format!("{}{}", base, self.stomp_path)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSettings {
    pub initial_balance: f64,
    pub position_fraction: f64,
    pub cooldown: Duration,
    pub signal_threshold: f64,
    pub take_profit_pct: f64,
    pub stop_loss_pct: f64,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            initial_balance: SIMULATION.initial_balance,
            position_fraction: SIMULATION.position_fraction,
            cooldown: Duration::from_millis(SIMULATION.cooldown_ms),
            signal_threshold: SIMULATION.signal_threshold,
            take_profit_pct: SIMULATION.take_profit_pct,
            stop_loss_pct: SIMULATION.stop_loss_pct,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_url_rewrites_http_schemes() {
        let mut config = ManagerConfig::default();
        assert_eq!(config.endpoint_url(), "ws://localhost:8080/ws/stomp/analysis");

        config.server_url = "https://desk.example.com/".to_string();
        assert_eq!(config.endpoint_url(), "wss://desk.example.com/ws/stomp/analysis");

        config.server_url = "10.0.0.5:9000".to_string();
        assert_eq!(config.endpoint_url(), "ws://10.0.0.5:9000/ws/stomp/analysis");
    }

    #[test]
    fn defaults_follow_observed_values() {
        let config = ManagerConfig::default();
        assert_eq!(config.max_reconnect_attempts, 3);
        assert_eq!(config.reconnect_backoff, Duration::from_secs(1));

        let sim = SimulationSettings::default();
        assert_eq!(sim.cooldown, Duration::from_secs(5));
        assert!((sim.position_fraction - 0.30).abs() < f64::EPSILON);
    }
}
