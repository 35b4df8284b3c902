use crate::domain::models::{EndpointCandidate, SystemStats};
use crate::infrastructure::agent_client::AgentClient;
use crate::infrastructure::config::{DEFAULT_PROBE_TIMEOUT_MS, DEFAULT_SCAN_TIMEOUT_MS};
use crate::infrastructure::error::InfraError;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

pub type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
pub struct ResolverStatus {
    pub active: EndpointCandidate,
    pub connected: bool,
    pub last_error: Option<String>,
    pub last_success_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct ResolverState {
    active_index: usize,
    connected: bool,
    last_error: Option<String>,
    last_success_at: Option<DateTime<Utc>>,
}

/// Picks which agent endpoint the app talks to. Each cycle probes the active
/// candidate first; only when that fails are the others scanned in declared
/// order, and the first that answers becomes the new sticky active endpoint.
pub struct EndpointResolver<C: AgentClient> {
    client: Arc<C>,
    candidates: Vec<EndpointCandidate>,
    probe_timeout: Duration,
    scan_timeout: Duration,
    now: NowProvider,
    state: Mutex<ResolverState>,
}

impl<C: AgentClient> EndpointResolver<C> {
    pub fn new(client: Arc<C>, candidates: Vec<EndpointCandidate>) -> Self {
        Self {
            client,
            candidates,
            probe_timeout: Duration::from_millis(DEFAULT_PROBE_TIMEOUT_MS),
            scan_timeout: Duration::from_millis(DEFAULT_SCAN_TIMEOUT_MS),
            now: Arc::new(Utc::now),
            state: Mutex::new(ResolverState {
                active_index: 0,
                connected: false,
                last_error: None,
                last_success_at: None,
            }),
        }
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = timeout;
        self
    }

    pub fn with_now_provider(mut self, provider: NowProvider) -> Self {
        self.now = provider;
        self
    }

    pub fn active_candidate(&self) -> Result<EndpointCandidate, InfraError> {
        let state = self.lock_state()?;
        self.candidate_at(state.active_index)
    }

    pub fn status(&self) -> Result<ResolverStatus, InfraError> {
        let state = self.lock_state()?;
        Ok(ResolverStatus {
            active: self.candidate_at(state.active_index)?,
            connected: state.connected,
            last_error: state.last_error.clone(),
            last_success_at: state.last_success_at,
        })
    }

    /// One resolution cycle: fetch stats from the active endpoint, falling
    /// back to a scan of the remaining candidates. When everything fails the
    /// active endpoint stays pinned and the failure is reported through
    /// `status`.
    pub async fn resolve(&self) -> Result<SystemStats, InfraError> {
        let active_index = self.lock_state()?.active_index;
        let primary = match self.probe(active_index, self.probe_timeout).await {
            Ok(stats) => {
                self.record_success(active_index)?;
                return Ok(stats);
            }
            Err(err) => err,
        };

        for index in 0..self.candidates.len() {
            if index == active_index {
                continue;
            }
            if let Ok(stats) = self.probe(index, self.scan_timeout).await {
                self.record_success(index)?;
                return Ok(stats);
            }
        }

        self.record_failure(&primary)?;
        Err(primary)
    }

    async fn probe(&self, index: usize, timeout: Duration) -> Result<SystemStats, InfraError> {
        let candidate = self.candidate_at(index)?;
        self.client.fetch_stats(&candidate.url, timeout).await
    }

    fn candidate_at(&self, index: usize) -> Result<EndpointCandidate, InfraError> {
        self.candidates
            .get(index)
            .cloned()
            .ok_or_else(|| InfraError::InvalidConfig("no agent endpoints configured".to_string()))
    }

    fn record_success(&self, index: usize) -> Result<(), InfraError> {
        let mut state = self.lock_state()?;
        state.active_index = index;
        state.connected = true;
        state.last_error = None;
        state.last_success_at = Some((self.now)());
        Ok(())
    }

    fn record_failure(&self, error: &InfraError) -> Result<(), InfraError> {
        let mut state = self.lock_state()?;
        state.connected = false;
        state.last_error = Some(error.to_string());
        Ok(())
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, ResolverState>, InfraError> {
        self.state.lock().map_err(|_| {
            InfraError::InvalidConfig("endpoint resolver state lock poisoned".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::EndpointKind;
    use crate::infrastructure::agent_client::testing::{FakeAgentClient, sample_stats};
    use chrono::TimeZone;

    const TUNNEL_URL: &str = "https://agent.example.trycloudflare.com";
    const LAN_URL: &str = "http://192.168.1.7:8080";

    fn candidates() -> Vec<EndpointCandidate> {
        vec![
            EndpointCandidate {
                kind: EndpointKind::Tunnel,
                url: TUNNEL_URL.to_string(),
            },
            EndpointCandidate {
                kind: EndpointKind::Lan,
                url: LAN_URL.to_string(),
            },
        ]
    }

    fn resolver(client: Arc<FakeAgentClient>) -> EndpointResolver<FakeAgentClient> {
        EndpointResolver::new(client, candidates())
            .with_probe_timeout(Duration::from_millis(80))
            .with_scan_timeout(Duration::from_millis(40))
    }

    #[tokio::test]
    async fn healthy_active_endpoint_skips_the_scan() {
        let client = Arc::new(FakeAgentClient::default());
        client.script_stats(TUNNEL_URL, sample_stats(1));
        let resolver = resolver(client.clone());

        let stats = resolver.resolve().await.expect("resolve");
        assert_eq!(stats.ts, 1);
        assert_eq!(
            client.stats_requests(),
            vec![(TUNNEL_URL.to_string(), Duration::from_millis(80))]
        );

        let status = resolver.status().expect("status");
        assert_eq!(status.active.kind, EndpointKind::Tunnel);
        assert!(status.connected);
        assert_eq!(status.last_error, None);
    }

    #[tokio::test]
    async fn failing_active_endpoint_promotes_the_next_candidate() {
        let client = Arc::new(FakeAgentClient::default());
        client.script_stats_error(TUNNEL_URL, "network error: connection refused");
        client.script_stats(LAN_URL, sample_stats(7));
        let resolver = resolver(client.clone());

        let stats = resolver.resolve().await.expect("resolve");
        assert_eq!(stats.ts, 7);
        assert_eq!(
            client.stats_requests(),
            vec![
                (TUNNEL_URL.to_string(), Duration::from_millis(80)),
                (LAN_URL.to_string(), Duration::from_millis(40)),
            ]
        );

        let status = resolver.status().expect("status");
        assert_eq!(status.active.kind, EndpointKind::Lan);
        assert_eq!(status.active.url, LAN_URL);
        assert!(status.connected);
    }

    #[tokio::test]
    async fn promotion_is_sticky_even_after_the_old_endpoint_recovers() {
        let client = Arc::new(FakeAgentClient::default());
        // The tunnel fails once and then stays healthy again.
        client.script_stats_error(TUNNEL_URL, "network error: timeout");
        client.script_stats(TUNNEL_URL, sample_stats(2));
        client.script_stats(LAN_URL, sample_stats(3));
        let resolver = resolver(client.clone());

        resolver.resolve().await.expect("first cycle");
        resolver.resolve().await.expect("second cycle");

        // The second cycle probes only the promoted LAN endpoint.
        assert_eq!(
            client.stats_requests(),
            vec![
                (TUNNEL_URL.to_string(), Duration::from_millis(80)),
                (LAN_URL.to_string(), Duration::from_millis(40)),
                (LAN_URL.to_string(), Duration::from_millis(80)),
            ]
        );
        let status = resolver.status().expect("status");
        assert_eq!(status.active.kind, EndpointKind::Lan);
    }

    #[tokio::test]
    async fn total_failure_keeps_the_active_endpoint_pinned() {
        let client = Arc::new(FakeAgentClient::default());
        client.script_stats_error(TUNNEL_URL, "agent error: http 503");
        client.script_stats(TUNNEL_URL, sample_stats(9));
        client.script_stats_error(LAN_URL, "network error: connection refused");
        let resolver = resolver(client.clone());

        let err = resolver.resolve().await.expect_err("all candidates down");
        assert!(err.to_string().contains("http 503"));

        let status = resolver.status().expect("status");
        assert_eq!(status.active.kind, EndpointKind::Tunnel);
        assert!(!status.connected);
        assert_eq!(
            status.last_error.as_deref(),
            Some("Agent error: agent error: http 503")
        );

        // The pinned endpoint recovering clears the failure report.
        resolver.resolve().await.expect("recovered");
        let status = resolver.status().expect("status");
        assert!(status.connected);
        assert_eq!(status.last_error, None);
    }

    #[tokio::test]
    async fn empty_candidate_list_is_rejected() {
        let client = Arc::new(FakeAgentClient::default());
        let resolver = EndpointResolver::new(client, Vec::new());

        let err = resolver.resolve().await.expect_err("nothing to resolve");
        assert!(matches!(err, InfraError::InvalidConfig(_)));
        assert!(resolver.status().is_err());
    }

    #[tokio::test]
    async fn successful_cycle_records_the_clock_time() {
        let fixed = Utc.with_ymd_and_hms(2025, 3, 1, 8, 30, 0).unwrap();
        let client = Arc::new(FakeAgentClient::default());
        client.script_stats(TUNNEL_URL, sample_stats(4));
        let resolver = resolver(client).with_now_provider(Arc::new(move || fixed));

        resolver.resolve().await.expect("resolve");
        let status = resolver.status().expect("status");
        assert_eq!(status.last_success_at, Some(fixed));
    }
}
