use crate::application::bootstrap::bootstrap_workspace;
use crate::application::endpoint_resolver::EndpointResolver;
use crate::application::stats_poller::StatsPoller;
use crate::application::timer_engine::{FocusTimer, PhaseChange, TimerSnapshot};
use crate::application::timer_ticker::TimerTicker;
use crate::domain::models::{
    Budget, ControlCommand, PowerAction, ProcessInfo, SystemStats, TimerSettings, Transaction,
    TransactionKind,
};
use crate::infrastructure::agent_client::{AgentClient, ReqwestAgentClient};
use crate::infrastructure::config::{AgentSettings, ensure_default_configs, load_agent_settings};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::finance_repository::{FinanceRepository, SqliteFinanceRepository};
use crate::infrastructure::settings_repository::{SettingsRepository, SqliteSettingsRepository};
use crate::infrastructure::storage::initialize_database;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id(prefix: &str) -> String {
    let sequence = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{}-{sequence}", Utc::now().timestamp_micros())
}

pub struct AppState {
    config_dir: PathBuf,
    database_path: PathBuf,
    logs_dir: PathBuf,
    agent_settings: AgentSettings,
    client: Arc<ReqwestAgentClient>,
    resolver: Arc<EndpointResolver<ReqwestAgentClient>>,
    poller: StatsPoller<ReqwestAgentClient>,
    runtime: Mutex<RuntimeState>,
    log_guard: Mutex<()>,
}

impl AppState {
    pub fn new(workspace_root: PathBuf) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        let config_dir = workspace_root.join("config");
        let logs_dir = workspace_root.join("logs");

        ensure_default_configs(&config_dir)?;
        initialize_database(&bootstrap.database_path)?;

        let agent_settings = load_agent_settings(&config_dir)?;
        let timer_settings =
            SqliteSettingsRepository::new(&bootstrap.database_path).load_or_default()?;

        let client = Arc::new(ReqwestAgentClient::new());
        let resolver = Arc::new(
            EndpointResolver::new(Arc::clone(&client), agent_settings.endpoints.clone())
                .with_probe_timeout(agent_settings.probe_timeout())
                .with_scan_timeout(agent_settings.scan_timeout()),
        );
        let poller = StatsPoller::new(Arc::clone(&resolver))
            .with_interval(agent_settings.stats_poll_interval());

        Ok(Self {
            config_dir,
            database_path: bootstrap.database_path,
            logs_dir,
            agent_settings,
            client,
            resolver,
            poller,
            runtime: Mutex::new(RuntimeState {
                timer: FocusTimer::new(timer_settings),
            }),
            log_guard: Mutex::new(()),
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn command_error(&self, command: &str, error: &InfraError) -> String {
        self.log_error(command, &error.to_string());
        error.to_string()
    }

    pub fn log_info(&self, command: &str, message: &str) {
        self.append_log("info", command, message);
    }

    pub fn log_error(&self, command: &str, message: &str) {
        self.append_log("error", command, message);
    }

    fn append_log(&self, level: &str, command: &str, message: &str) {
        let Ok(_guard) = self.log_guard.lock() else {
            return;
        };
        let path = self.logs_dir.join("commands.log");
        let payload = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": level,
            "command": command,
            "message": message,
        });

        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = writeln!(file, "{}", payload);
        }
    }
}

#[derive(Debug)]
struct RuntimeState {
    timer: FocusTimer,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PhaseChangeResponse {
    pub from: String,
    pub to: String,
    pub completed_focus_cycles: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TimerStateResponse {
    pub phase: String,
    pub seconds_remaining: u32,
    pub running: bool,
    pub completed_focus_cycles: u32,
    pub settings: TimerSettings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase_change: Option<PhaseChangeResponse>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MonitorStatusResponse {
    pub polling: bool,
    pub endpoint_kind: String,
    pub endpoint_url: String,
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_success_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<SystemStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats_fetched_at: Option<String>,
    pub stats_poll_interval_ms: u64,
    pub process_refresh_interval_ms: u64,
}

pub fn get_timer_state_impl(state: &AppState) -> Result<TimerStateResponse, InfraError> {
    let runtime = lock_runtime(state)?;
    Ok(to_timer_state_response(&runtime.timer.snapshot(), None))
}

pub fn toggle_timer_impl(state: &AppState) -> Result<TimerStateResponse, InfraError> {
    let mut runtime = lock_runtime(state)?;
    runtime.timer.toggle();
    let snapshot = runtime.timer.snapshot();

    state.log_info(
        "toggle_timer",
        if snapshot.running {
            "timer started"
        } else {
            "timer paused"
        },
    );
    Ok(to_timer_state_response(&snapshot, None))
}

pub fn reset_timer_impl(state: &AppState) -> Result<TimerStateResponse, InfraError> {
    let mut runtime = lock_runtime(state)?;
    runtime.timer.reset();

    state.log_info("reset_timer", "timer reset to focus phase");
    Ok(to_timer_state_response(&runtime.timer.snapshot(), None))
}

pub fn tick_timer_impl(state: &AppState) -> Result<TimerStateResponse, InfraError> {
    let mut runtime = lock_runtime(state)?;
    let phase_change = runtime.timer.tick();

    if let Some(change) = phase_change {
        state.log_info(
            "tick_timer",
            &format!(
                "phase completed: {} -> {}",
                change.from.as_str(),
                change.to.as_str()
            ),
        );
    }
    Ok(to_timer_state_response(
        &runtime.timer.snapshot(),
        phase_change,
    ))
}

pub fn update_timer_settings_impl(
    state: &AppState,
    focus: u32,
    short_break: u32,
    long_break: u32,
    cycles: u32,
) -> Result<TimerStateResponse, InfraError> {
    let settings = TimerSettings {
        focus,
        short_break,
        long_break,
        cycles,
    };
    settings.validate().map_err(InfraError::InvalidConfig)?;

    let response = {
        let mut runtime = lock_runtime(state)?;
        runtime.timer.apply_settings(settings);
        to_timer_state_response(&runtime.timer.snapshot(), None)
    };

    // A failed write keeps the in-memory settings live; the error is only
    // logged.
    if let Err(error) = settings_repository(state).save(&settings) {
        state.log_error(
            "update_timer_settings",
            &format!("failed to persist settings: {error}"),
        );
    } else {
        state.log_info(
            "update_timer_settings",
            &format!(
                "focus={focus} short_break={short_break} long_break={long_break} cycles={cycles}"
            ),
        );
    }

    Ok(response)
}

/// Wires a 1 Hz clock to the shared timer. The host keeps the returned
/// ticker alive for as long as the countdown should advance.
pub fn spawn_timer_ticker(state: Arc<AppState>) -> TimerTicker {
    TimerTicker::new(Arc::new(move || {
        let _ = tick_timer_impl(&state);
    }))
}

pub fn monitor_status_impl(state: &AppState) -> Result<MonitorStatusResponse, InfraError> {
    let status = state.resolver.status()?;
    let snapshot = state.poller.snapshot()?;

    Ok(MonitorStatusResponse {
        polling: state.poller.is_running()?,
        endpoint_kind: status.active.kind.as_str().to_string(),
        endpoint_url: status.active.url,
        connected: status.connected,
        last_error: status.last_error,
        last_success_at: status.last_success_at.map(|value| value.to_rfc3339()),
        stats: snapshot.as_ref().map(|snapshot| snapshot.stats.clone()),
        stats_fetched_at: snapshot.map(|snapshot| snapshot.fetched_at.to_rfc3339()),
        stats_poll_interval_ms: state.agent_settings.stats_poll_interval_ms,
        process_refresh_interval_ms: state.agent_settings.process_refresh_interval_ms,
    })
}

pub fn start_monitor_impl(state: &AppState) -> Result<MonitorStatusResponse, InfraError> {
    state.poller.start()?;
    state.log_info("start_monitor", "stats polling started");
    monitor_status_impl(state)
}

pub fn stop_monitor_impl(state: &AppState) -> Result<MonitorStatusResponse, InfraError> {
    state.poller.stop()?;
    state.log_info("stop_monitor", "stats polling stopped");
    monitor_status_impl(state)
}

pub async fn list_processes_impl(state: &AppState) -> Result<Vec<ProcessInfo>, InfraError> {
    let candidate = state.resolver.active_candidate()?;
    state
        .client
        .fetch_processes(&candidate.url, state.agent_settings.request_timeout())
        .await
}

pub async fn kill_process_impl(state: &AppState, pid: i64) -> Result<String, InfraError> {
    if pid <= 0 {
        return Err(InfraError::InvalidConfig(format!(
            "pid must be positive: {pid}"
        )));
    }

    let candidate = state.resolver.active_candidate()?;
    let ack = state
        .client
        .kill_process(&candidate.url, pid, state.agent_settings.request_timeout())
        .await?;
    state.log_info("kill_process", &format!("terminated pid={pid}"));
    Ok(ack)
}

pub async fn send_control_impl(
    state: &AppState,
    command: ControlCommand,
) -> Result<(), InfraError> {
    command.validate().map_err(InfraError::InvalidConfig)?;

    let candidate = state.resolver.active_candidate()?;
    state
        .client
        .send_control(
            &candidate.url,
            &command,
            state.agent_settings.request_timeout(),
        )
        .await?;
    state.log_info(
        "send_control",
        &format!("dispatched {} command", control_kind(&command)),
    );
    Ok(())
}

pub async fn power_action_impl(state: &AppState, action: String) -> Result<String, InfraError> {
    let action = parse_power_action(&action)?;

    let candidate = state.resolver.active_candidate()?;
    let ack = state
        .client
        .power_action(
            &candidate.url,
            action,
            state.agent_settings.request_timeout(),
        )
        .await?;
    state.log_info("power_action", &format!("requested {}", action.as_str()));
    Ok(ack)
}

pub fn add_transaction_impl(
    state: &AppState,
    title: String,
    amount: f64,
    kind: String,
    category: Option<String>,
    date: Option<String>,
) -> Result<Transaction, InfraError> {
    let kind = parse_transaction_kind(&kind)?;
    let date = match date {
        Some(raw) => parse_datetime_input(&raw, "date")?,
        None => Utc::now(),
    };

    let transaction = Transaction {
        id: next_id("txn"),
        title: title.trim().to_string(),
        amount,
        kind,
        category: normalize_category(category),
        date,
    };
    transaction.validate().map_err(InfraError::InvalidConfig)?;

    finance_repository(state).upsert_transaction(&transaction)?;
    state.log_info(
        "add_transaction",
        &format!("added {} id={}", kind.as_str(), transaction.id),
    );
    Ok(transaction)
}

pub fn update_transaction_impl(
    state: &AppState,
    transaction_id: String,
    title: Option<String>,
    amount: Option<f64>,
    category: Option<String>,
) -> Result<Transaction, InfraError> {
    let repository = finance_repository(state);
    let mut transaction = repository.get_transaction(&transaction_id)?.ok_or_else(|| {
        InfraError::InvalidConfig(format!("transaction not found: {transaction_id}"))
    })?;

    if let Some(title) = title {
        transaction.title = title.trim().to_string();
    }
    if let Some(amount) = amount {
        transaction.amount = amount;
    }
    if let Some(category) = category {
        transaction.category = normalize_category(Some(category));
    }
    transaction.validate().map_err(InfraError::InvalidConfig)?;

    repository.upsert_transaction(&transaction)?;
    state.log_info(
        "update_transaction",
        &format!("updated id={}", transaction.id),
    );
    Ok(transaction)
}

pub fn delete_transaction_impl(
    state: &AppState,
    transaction_id: String,
) -> Result<bool, InfraError> {
    let deleted = finance_repository(state).delete_transaction(&transaction_id)?;
    if deleted {
        state.log_info(
            "delete_transaction",
            &format!("deleted id={transaction_id}"),
        );
    }
    Ok(deleted)
}

pub fn list_transactions_impl(state: &AppState) -> Result<Vec<Transaction>, InfraError> {
    finance_repository(state).list_transactions()
}

pub fn add_budget_impl(
    state: &AppState,
    name: String,
    limit: f64,
    color: String,
) -> Result<Budget, InfraError> {
    let budget = Budget {
        id: next_id("budget"),
        name: name.trim().to_string(),
        limit,
        color: color.trim().to_string(),
    };
    budget.validate().map_err(InfraError::InvalidConfig)?;

    finance_repository(state).upsert_budget(&budget)?;
    state.log_info("add_budget", &format!("added id={}", budget.id));
    Ok(budget)
}

pub fn update_budget_impl(
    state: &AppState,
    budget_id: String,
    name: Option<String>,
    limit: Option<f64>,
) -> Result<Budget, InfraError> {
    let repository = finance_repository(state);
    let mut budget = repository
        .get_budget(&budget_id)?
        .ok_or_else(|| InfraError::InvalidConfig(format!("budget not found: {budget_id}")))?;

    if let Some(name) = name {
        budget.name = name.trim().to_string();
    }
    if let Some(limit) = limit {
        budget.limit = limit;
    }
    budget.validate().map_err(InfraError::InvalidConfig)?;

    repository.upsert_budget(&budget)?;
    state.log_info("update_budget", &format!("updated id={}", budget.id));
    Ok(budget)
}

pub fn delete_budget_impl(state: &AppState, budget_id: String) -> Result<bool, InfraError> {
    let deleted = finance_repository(state).delete_budget(&budget_id)?;
    if deleted {
        state.log_info("delete_budget", &format!("deleted id={budget_id}"));
    }
    Ok(deleted)
}

pub fn list_budgets_impl(state: &AppState) -> Result<Vec<Budget>, InfraError> {
    finance_repository(state).list_budgets()
}

fn lock_runtime(state: &AppState) -> Result<MutexGuard<'_, RuntimeState>, InfraError> {
    state
        .runtime
        .lock()
        .map_err(|error| InfraError::InvalidConfig(format!("runtime lock poisoned: {error}")))
}

fn to_timer_state_response(
    snapshot: &TimerSnapshot,
    phase_change: Option<PhaseChange>,
) -> TimerStateResponse {
    TimerStateResponse {
        phase: snapshot.phase.as_str().to_string(),
        seconds_remaining: snapshot.seconds_remaining,
        running: snapshot.running,
        completed_focus_cycles: snapshot.completed_focus_cycles,
        settings: snapshot.settings,
        phase_change: phase_change.map(|change| PhaseChangeResponse {
            from: change.from.as_str().to_string(),
            to: change.to.as_str().to_string(),
            completed_focus_cycles: change.completed_focus_cycles,
        }),
    }
}

fn settings_repository(state: &AppState) -> SqliteSettingsRepository {
    SqliteSettingsRepository::new(state.database_path())
}

fn finance_repository(state: &AppState) -> SqliteFinanceRepository {
    SqliteFinanceRepository::new(state.database_path())
}

fn control_kind(command: &ControlCommand) -> &'static str {
    match command {
        ControlCommand::Volume { .. } => "volume",
        ControlCommand::Brightness { .. } => "brightness",
        ControlCommand::App { .. } => "app",
        ControlCommand::Media { .. } => "media",
    }
}

fn parse_power_action(raw: &str) -> Result<PowerAction, InfraError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "restart" => Ok(PowerAction::Restart),
        "sleep" => Ok(PowerAction::Sleep),
        "shutdown" => Ok(PowerAction::Shutdown),
        other => Err(InfraError::InvalidConfig(format!(
            "power action must be restart, sleep, or shutdown: {other}"
        ))),
    }
}

fn parse_transaction_kind(raw: &str) -> Result<TransactionKind, InfraError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "income" => Ok(TransactionKind::Income),
        "expense" => Ok(TransactionKind::Expense),
        other => Err(InfraError::InvalidConfig(format!(
            "transaction kind must be income or expense: {other}"
        ))),
    }
}

fn parse_datetime_input(raw: &str, field_name: &str) -> Result<DateTime<Utc>, InfraError> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|value| value.with_timezone(&Utc))
        .map_err(|error| {
            InfraError::InvalidConfig(format!("{field_name} must be RFC3339: {error}"))
        })
}

fn normalize_category(category: Option<String>) -> Option<String> {
    category
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
