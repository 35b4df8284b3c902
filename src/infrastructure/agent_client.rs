use crate::domain::models::{ControlCommand, PowerAction, ProcessInfo, SystemStats};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::sse::SseFrameDecoder;
use async_trait::async_trait;
use reqwest::Client;
use std::collections::VecDeque;
use std::time::Duration;
use url::Url;

#[async_trait]
pub trait AgentClient: Send + Sync {
    /// Single stats snapshot; doubles as the resolver's probe. Success means
    /// HTTP 200 with a parseable payload, anything else is a probe failure.
    async fn fetch_stats(
        &self,
        base_url: &str,
        timeout: Duration,
    ) -> Result<SystemStats, InfraError>;

    async fn fetch_processes(
        &self,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Vec<ProcessInfo>, InfraError>;

    async fn kill_process(
        &self,
        base_url: &str,
        pid: i64,
        timeout: Duration,
    ) -> Result<String, InfraError>;

    async fn send_control(
        &self,
        base_url: &str,
        command: &ControlCommand,
        timeout: Duration,
    ) -> Result<(), InfraError>;

    async fn power_action(
        &self,
        base_url: &str,
        action: PowerAction,
        timeout: Duration,
    ) -> Result<String, InfraError>;
}

#[derive(Debug, Clone, Default)]
pub struct ReqwestAgentClient {
    client: Client,
}

impl ReqwestAgentClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    fn agent_http_error(status: reqwest::StatusCode, body: &str) -> InfraError {
        let message = if body.trim().is_empty() {
            format!("agent error: http {}", status.as_u16())
        } else {
            format!("agent error: http {}; body={body}", status.as_u16())
        };
        InfraError::Agent(message)
    }

    fn endpoint_url(base_url: &str, segments: &[&str]) -> Result<Url, InfraError> {
        let mut url = Url::parse(base_url).map_err(|error| {
            InfraError::Agent(format!("invalid agent base url '{base_url}': {error}"))
        })?;
        {
            let mut path_segments = url.path_segments_mut().map_err(|_| {
                InfraError::Agent(format!("agent base url '{base_url}' cannot be a base"))
            })?;
            path_segments.pop_if_empty();
            for segment in segments {
                path_segments.push(segment);
            }
        }
        Ok(url)
    }

    fn kill_url(base_url: &str, pid: i64) -> Result<Url, InfraError> {
        let mut url = Self::endpoint_url(base_url, &["kill"])?;
        url.query_pairs_mut().append_pair("pid", &pid.to_string());
        Ok(url)
    }

    async fn read_body(
        response: reqwest::Response,
        context: &str,
    ) -> Result<(reqwest::StatusCode, String), InfraError> {
        let status = response.status();
        let body = response.text().await.map_err(|error| {
            InfraError::Agent(format!("failed reading {context} response: {error}"))
        })?;
        Ok((status, body))
    }

    /// Opens the agent's push stream (`GET /stats`). The returned stream
    /// yields one parsed payload per SSE frame.
    pub async fn open_stats_stream(&self, base_url: &str) -> Result<StatsStream, InfraError> {
        let url = Self::endpoint_url(base_url, &["stats"])?;
        let response = self.client.get(url).send().await.map_err(|error| {
            InfraError::Agent(format!("network error while opening stats stream: {error}"))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::agent_http_error(status, &body));
        }

        Ok(StatsStream {
            response,
            decoder: SseFrameDecoder::new(),
            pending: VecDeque::new(),
        })
    }
}

#[async_trait]
impl AgentClient for ReqwestAgentClient {
    async fn fetch_stats(
        &self,
        base_url: &str,
        timeout: Duration,
    ) -> Result<SystemStats, InfraError> {
        let url = Self::endpoint_url(base_url, &["stats-json"])?;
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|error| {
                InfraError::Agent(format!("network error while fetching stats: {error}"))
            })?;

        let (status, body) = Self::read_body(response, "stats").await?;
        if !status.is_success() {
            return Err(Self::agent_http_error(status, &body));
        }

        serde_json::from_str(&body)
            .map_err(|error| InfraError::Agent(format!("invalid stats payload: {error}")))
    }

    async fn fetch_processes(
        &self,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Vec<ProcessInfo>, InfraError> {
        let url = Self::endpoint_url(base_url, &["processes"])?;
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|error| {
                InfraError::Agent(format!("network error while listing processes: {error}"))
            })?;

        let (status, body) = Self::read_body(response, "process list").await?;
        if !status.is_success() {
            return Err(Self::agent_http_error(status, &body));
        }

        serde_json::from_str(&body)
            .map_err(|error| InfraError::Agent(format!("invalid process list payload: {error}")))
    }

    async fn kill_process(
        &self,
        base_url: &str,
        pid: i64,
        timeout: Duration,
    ) -> Result<String, InfraError> {
        let url = Self::kill_url(base_url, pid)?;
        let response = self
            .client
            .post(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|error| {
                InfraError::Agent(format!("network error while killing pid {pid}: {error}"))
            })?;

        let (status, body) = Self::read_body(response, "kill").await?;
        if !status.is_success() {
            return Err(Self::agent_http_error(status, &body));
        }
        Ok(body.trim().to_string())
    }

    async fn send_control(
        &self,
        base_url: &str,
        command: &ControlCommand,
        timeout: Duration,
    ) -> Result<(), InfraError> {
        command.validate().map_err(InfraError::InvalidConfig)?;

        let url = Self::endpoint_url(base_url, &["api", "control"])?;
        let response = self
            .client
            .post(url)
            .timeout(timeout)
            .json(command)
            .send()
            .await
            .map_err(|error| {
                InfraError::Agent(format!("network error while sending control: {error}"))
            })?;

        let (status, body) = Self::read_body(response, "control").await?;
        if !status.is_success() {
            return Err(Self::agent_http_error(status, &body));
        }
        Ok(())
    }

    async fn power_action(
        &self,
        base_url: &str,
        action: PowerAction,
        timeout: Duration,
    ) -> Result<String, InfraError> {
        let url = Self::endpoint_url(base_url, &["api", "action", action.as_str()])?;
        let response = self
            .client
            .post(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|error| {
                InfraError::Agent(format!(
                    "network error while requesting {}: {error}",
                    action.as_str()
                ))
            })?;

        let (status, body) = Self::read_body(response, "power action").await?;
        if !status.is_success() {
            return Err(Self::agent_http_error(status, &body));
        }
        Ok(body.trim().to_string())
    }
}

/// Live `text/event-stream` connection to the agent's `/stats` endpoint.
pub struct StatsStream {
    response: reqwest::Response,
    decoder: SseFrameDecoder,
    pending: VecDeque<SystemStats>,
}

impl StatsStream {
    /// Next parsed stats frame, or `None` once the agent closes the stream.
    /// Frames that fail to parse are skipped.
    pub async fn next_stats(&mut self) -> Result<Option<SystemStats>, InfraError> {
        loop {
            if let Some(stats) = self.pending.pop_front() {
                return Ok(Some(stats));
            }

            let chunk = self
                .response
                .chunk()
                .await
                .map_err(|error| InfraError::Agent(format!("stats stream read failed: {error}")))?;
            let Some(chunk) = chunk else {
                return Ok(None);
            };

            for payload in self.decoder.push(&chunk) {
                if let Some(stats) = decode_stats_payload(&payload) {
                    self.pending.push_back(stats);
                }
            }
        }
    }
}

fn decode_stats_payload(payload: &str) -> Option<SystemStats> {
    serde_json::from_str(payload).ok()
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::domain::models::NetworkThroughput;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted stand-in for a desktop agent.
    ///
    /// Stats outcomes are queued per base URL; a queue's final entry repeats
    /// once the queue is drained, so a single `Ok` scripts an endpoint that
    /// stays healthy. Every call is recorded for assertions.
    #[derive(Default)]
    pub(crate) struct FakeAgentClient {
        stats: Mutex<HashMap<String, VecDeque<Result<SystemStats, String>>>>,
        processes: Mutex<VecDeque<Result<Vec<ProcessInfo>, String>>>,
        stats_requests: Mutex<Vec<(String, Duration)>>,
        kill_requests: Mutex<Vec<(String, i64)>>,
        control_requests: Mutex<Vec<(String, ControlCommand)>>,
        power_requests: Mutex<Vec<(String, PowerAction)>>,
        stats_calls: AtomicUsize,
    }

    impl FakeAgentClient {
        pub(crate) fn script_stats(&self, base_url: &str, stats: SystemStats) {
            self.stats
                .lock()
                .expect("stats scripts")
                .entry(base_url.to_string())
                .or_default()
                .push_back(Ok(stats));
        }

        pub(crate) fn script_stats_error(&self, base_url: &str, message: &str) {
            self.stats
                .lock()
                .expect("stats scripts")
                .entry(base_url.to_string())
                .or_default()
                .push_back(Err(message.to_string()));
        }

        pub(crate) fn script_processes(&self, processes: Vec<ProcessInfo>) {
            self.processes
                .lock()
                .expect("process scripts")
                .push_back(Ok(processes));
        }

        pub(crate) fn script_processes_error(&self, message: &str) {
            self.processes
                .lock()
                .expect("process scripts")
                .push_back(Err(message.to_string()));
        }

        pub(crate) fn stats_requests(&self) -> Vec<(String, Duration)> {
            self.stats_requests.lock().expect("stats requests").clone()
        }

        pub(crate) fn kill_requests(&self) -> Vec<(String, i64)> {
            self.kill_requests.lock().expect("kill requests").clone()
        }

        pub(crate) fn control_requests(&self) -> Vec<(String, ControlCommand)> {
            self.control_requests
                .lock()
                .expect("control requests")
                .clone()
        }

        pub(crate) fn power_requests(&self) -> Vec<(String, PowerAction)> {
            self.power_requests.lock().expect("power requests").clone()
        }

        pub(crate) fn stats_call_count(&self) -> usize {
            self.stats_calls.load(Ordering::SeqCst)
        }
    }

    pub(crate) fn sample_stats(ts: i64) -> SystemStats {
        SystemStats {
            ts,
            cpu: 12.5,
            ram: 48.0,
            gpu: 7.5,
            disk: 61.0,
            temp: 45.5,
            battery: 88,
            battery_status: "Charging".to_string(),
            battery_time: "1:24".to_string(),
            uptime: "3 days".to_string(),
            network: NetworkThroughput {
                rx_speed: "1.2 MB/s".to_string(),
                tx_speed: "0.3 MB/s".to_string(),
                rx_total: "4.1 GB".to_string(),
                tx_total: "0.9 GB".to_string(),
            },
        }
    }

    #[async_trait]
    impl AgentClient for FakeAgentClient {
        async fn fetch_stats(
            &self,
            base_url: &str,
            timeout: Duration,
        ) -> Result<SystemStats, InfraError> {
            self.stats_calls.fetch_add(1, Ordering::SeqCst);
            self.stats_requests
                .lock()
                .expect("stats requests")
                .push((base_url.to_string(), timeout));

            let mut scripts = self.stats.lock().expect("stats scripts");
            let queue = scripts
                .get_mut(base_url)
                .ok_or_else(|| InfraError::Agent(format!("unscripted endpoint {base_url}")))?;
            let outcome = if queue.len() > 1 {
                queue.pop_front().expect("scripted outcome")
            } else {
                queue
                    .front()
                    .cloned()
                    .ok_or_else(|| InfraError::Agent(format!("unscripted endpoint {base_url}")))?
            };
            outcome.map_err(InfraError::Agent)
        }

        async fn fetch_processes(
            &self,
            _base_url: &str,
            _timeout: Duration,
        ) -> Result<Vec<ProcessInfo>, InfraError> {
            let mut queue = self.processes.lock().expect("process scripts");
            let outcome = if queue.len() > 1 {
                queue.pop_front().expect("scripted outcome")
            } else {
                queue
                    .front()
                    .cloned()
                    .ok_or_else(|| InfraError::Agent("unscripted process list".to_string()))?
            };
            outcome.map_err(InfraError::Agent)
        }

        async fn kill_process(
            &self,
            base_url: &str,
            pid: i64,
            _timeout: Duration,
        ) -> Result<String, InfraError> {
            self.kill_requests
                .lock()
                .expect("kill requests")
                .push((base_url.to_string(), pid));
            Ok(format!("Process {pid} terminated"))
        }

        async fn send_control(
            &self,
            base_url: &str,
            command: &ControlCommand,
            _timeout: Duration,
        ) -> Result<(), InfraError> {
            command.validate().map_err(InfraError::InvalidConfig)?;
            self.control_requests
                .lock()
                .expect("control requests")
                .push((base_url.to_string(), command.clone()));
            Ok(())
        }

        async fn power_action(
            &self,
            base_url: &str,
            action: PowerAction,
            _timeout: Duration,
        ) -> Result<String, InfraError> {
            self.power_requests
                .lock()
                .expect("power requests")
                .push((base_url.to_string(), action));
            Ok(format!("{} initiated", action.as_str()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_url_joins_segments() {
        let url = ReqwestAgentClient::endpoint_url("http://192.168.1.7:8080", &["stats-json"])
            .expect("build url");
        assert_eq!(url.as_str(), "http://192.168.1.7:8080/stats-json");

        let url = ReqwestAgentClient::endpoint_url(
            "https://agent.example.trycloudflare.com/",
            &["api", "action", "sleep"],
        )
        .expect("build url");
        assert_eq!(
            url.as_str(),
            "https://agent.example.trycloudflare.com/api/action/sleep"
        );
    }

    #[test]
    fn endpoint_url_rejects_invalid_base() {
        let result = ReqwestAgentClient::endpoint_url("not a url", &["stats-json"]);
        assert!(matches!(result, Err(InfraError::Agent(_))));
    }

    #[test]
    fn kill_url_carries_pid_query() {
        let url = ReqwestAgentClient::kill_url("http://192.168.1.7:8080", 501).expect("build url");
        assert_eq!(url.as_str(), "http://192.168.1.7:8080/kill?pid=501");
    }

    #[test]
    fn agent_http_error_includes_body_context() {
        let error = ReqwestAgentClient::agent_http_error(
            reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to kill process",
        );
        let message = error.to_string();
        assert!(message.contains("http 500"));
        assert!(message.contains("Failed to kill process"));

        let bare = ReqwestAgentClient::agent_http_error(reqwest::StatusCode::NOT_FOUND, "  ");
        assert_eq!(bare.to_string(), "Agent error: agent error: http 404");
    }

    #[test]
    fn decode_stats_payload_skips_malformed_frames() {
        assert!(decode_stats_payload("{broken").is_none());

        let raw = r#"{
            "ts": 1, "cpu": 1.0, "ram": 2.0, "gpu": 0.0, "disk": 3.0, "temp": 40.0,
            "battery": 90, "battery_status": "ok", "battery_time": "", "uptime": "1h",
            "network": {"rx_speed": "0 KB/s", "tx_speed": "0 KB/s",
                        "rx_total": "0 B", "tx_total": "0 B"}
        }"#;
        let stats = decode_stats_payload(raw).expect("parse stats");
        assert_eq!(stats.battery, 90);
    }
}
