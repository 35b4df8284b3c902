use crate::domain::models::{EndpointCandidate, EndpointKind};
use crate::infrastructure::error::InfraError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

const AGENT_JSON: &str = "agent.json";

pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 1_000;
pub const DEFAULT_SCAN_TIMEOUT_MS: u64 = 500;
pub const DEFAULT_STATS_POLL_INTERVAL_MS: u64 = 1_000;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 2_000;
const DEFAULT_PROCESS_REFRESH_INTERVAL_MS: u64 = 5_000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AgentSettings {
    pub endpoints: Vec<EndpointCandidate>,
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    #[serde(default = "default_scan_timeout_ms")]
    pub scan_timeout_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_stats_poll_interval_ms")]
    pub stats_poll_interval_ms: u64,
    #[serde(default = "default_process_refresh_interval_ms")]
    pub process_refresh_interval_ms: u64,
}

fn default_probe_timeout_ms() -> u64 {
    DEFAULT_PROBE_TIMEOUT_MS
}

fn default_scan_timeout_ms() -> u64 {
    DEFAULT_SCAN_TIMEOUT_MS
}

fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

fn default_stats_poll_interval_ms() -> u64 {
    DEFAULT_STATS_POLL_INTERVAL_MS
}

fn default_process_refresh_interval_ms() -> u64 {
    DEFAULT_PROCESS_REFRESH_INTERVAL_MS
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            endpoints: vec![
                EndpointCandidate {
                    kind: EndpointKind::Tunnel,
                    url: "https://agent.example.trycloudflare.com".to_string(),
                },
                EndpointCandidate {
                    kind: EndpointKind::Lan,
                    url: "http://192.168.1.7:8080".to_string(),
                },
            ],
            probe_timeout_ms: DEFAULT_PROBE_TIMEOUT_MS,
            scan_timeout_ms: DEFAULT_SCAN_TIMEOUT_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            stats_poll_interval_ms: DEFAULT_STATS_POLL_INTERVAL_MS,
            process_refresh_interval_ms: DEFAULT_PROCESS_REFRESH_INTERVAL_MS,
        }
    }
}

impl AgentSettings {
    pub fn validate(&self) -> Result<(), InfraError> {
        if self.endpoints.is_empty() {
            return Err(InfraError::InvalidConfig(
                "agent.endpoints must list at least one candidate".to_string(),
            ));
        }
        for endpoint in &self.endpoints {
            endpoint.validate().map_err(InfraError::InvalidConfig)?;
        }
        for (value, field) in [
            (self.probe_timeout_ms, "agent.probeTimeoutMs"),
            (self.scan_timeout_ms, "agent.scanTimeoutMs"),
            (self.request_timeout_ms, "agent.requestTimeoutMs"),
            (self.stats_poll_interval_ms, "agent.statsPollIntervalMs"),
            (
                self.process_refresh_interval_ms,
                "agent.processRefreshIntervalMs",
            ),
        ] {
            if value == 0 {
                return Err(InfraError::InvalidConfig(format!("{field} must be > 0")));
            }
        }
        Ok(())
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_millis(self.scan_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn stats_poll_interval(&self) -> Duration {
        Duration::from_millis(self.stats_poll_interval_ms)
    }
}

fn default_agent_file() -> serde_json::Value {
    serde_json::json!({
        "schema": 1,
        "endpoints": [
            {"kind": "tunnel", "url": "https://agent.example.trycloudflare.com"},
            {"kind": "lan", "url": "http://192.168.1.7:8080"}
        ],
        "probeTimeoutMs": DEFAULT_PROBE_TIMEOUT_MS,
        "scanTimeoutMs": DEFAULT_SCAN_TIMEOUT_MS,
        "requestTimeoutMs": DEFAULT_REQUEST_TIMEOUT_MS,
        "statsPollIntervalMs": DEFAULT_STATS_POLL_INTERVAL_MS,
        "processRefreshIntervalMs": DEFAULT_PROCESS_REFRESH_INTERVAL_MS
    })
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    let path = config_dir.join(AGENT_JSON);
    if !path.exists() {
        let formatted = serde_json::to_string_pretty(&default_agent_file())?;
        fs::write(path, format!("{formatted}\n"))?;
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != 1 {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

pub fn load_agent_settings(config_dir: &Path) -> Result<AgentSettings, InfraError> {
    let parsed = read_config(&config_dir.join(AGENT_JSON))?;
    let settings: AgentSettings = serde_json::from_value(parsed)?;
    settings.validate()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_CONFIG_DIR: AtomicUsize = AtomicUsize::new(0);

    struct TempConfigDir {
        path: PathBuf,
    }

    impl TempConfigDir {
        fn new() -> Self {
            let sequence = NEXT_CONFIG_DIR.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!(
                "deskpulse-config-tests-{}-{}",
                std::process::id(),
                sequence
            ));
            fs::create_dir_all(&path).expect("create temp config dir");
            Self { path }
        }
    }

    impl Drop for TempConfigDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }

    #[test]
    fn ensure_default_configs_writes_agent_file_once() {
        let dir = TempConfigDir::new();
        ensure_default_configs(&dir.path).expect("write defaults");

        let settings = load_agent_settings(&dir.path).expect("load defaults");
        assert_eq!(settings, AgentSettings::default());
        assert_eq!(settings.endpoints[0].kind, EndpointKind::Tunnel);
        assert_eq!(settings.endpoints[1].kind, EndpointKind::Lan);

        // A hand-edited file must survive a later bootstrap untouched.
        let path = dir.path.join(AGENT_JSON);
        let edited = r#"{
            "schema": 1,
            "endpoints": [{"kind": "lan", "url": "http://10.0.0.2:8080"}]
        }"#;
        fs::write(&path, edited).expect("overwrite config");
        ensure_default_configs(&dir.path).expect("second bootstrap");

        let reloaded = load_agent_settings(&dir.path).expect("reload");
        assert_eq!(reloaded.endpoints.len(), 1);
        assert_eq!(reloaded.endpoints[0].url, "http://10.0.0.2:8080");
        assert_eq!(reloaded.probe_timeout_ms, DEFAULT_PROBE_TIMEOUT_MS);
    }

    #[test]
    fn load_agent_settings_rejects_unknown_schema() {
        let dir = TempConfigDir::new();
        fs::write(
            dir.path.join(AGENT_JSON),
            r#"{"schema": 2, "endpoints": []}"#,
        )
        .expect("write config");

        let result = load_agent_settings(&dir.path);
        assert!(matches!(result, Err(InfraError::InvalidConfig(_))));
    }

    #[test]
    fn load_agent_settings_rejects_empty_candidate_list() {
        let dir = TempConfigDir::new();
        fs::write(
            dir.path.join(AGENT_JSON),
            r#"{"schema": 1, "endpoints": []}"#,
        )
        .expect("write config");

        let result = load_agent_settings(&dir.path);
        assert!(matches!(result, Err(InfraError::InvalidConfig(_))));
    }

    #[test]
    fn agent_settings_validate_rejects_zero_intervals() {
        let mut settings = AgentSettings::default();
        settings.stats_poll_interval_ms = 0;
        assert!(settings.validate().is_err());
    }
}
