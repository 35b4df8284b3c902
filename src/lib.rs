pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::bootstrap::{BootstrapResult, bootstrap_workspace};
pub use application::commands::{
    AppState, MonitorStatusResponse, PhaseChangeResponse, TimerStateResponse, add_budget_impl,
    add_transaction_impl, delete_budget_impl, delete_transaction_impl, get_timer_state_impl,
    kill_process_impl, list_budgets_impl, list_processes_impl, list_transactions_impl,
    monitor_status_impl, power_action_impl, reset_timer_impl, send_control_impl,
    spawn_timer_ticker, start_monitor_impl, stop_monitor_impl, tick_timer_impl, toggle_timer_impl,
    update_budget_impl, update_timer_settings_impl, update_transaction_impl,
};
pub use application::endpoint_resolver::{EndpointResolver, NowProvider, ResolverStatus};
pub use application::stats_poller::{StatsPoller, StatsSnapshot};
pub use application::timer_engine::{FocusTimer, PhaseChange, TimerSnapshot};
pub use application::timer_ticker::{TickFn, TimerTicker};
pub use domain::models::{
    Budget, ControlCommand, EndpointCandidate, EndpointKind, NetworkThroughput, PowerAction,
    ProcessCategory, ProcessInfo, SystemStats, TimerPhase, TimerSettings, Transaction,
    TransactionKind,
};
pub use infrastructure::agent_client::{AgentClient, ReqwestAgentClient, StatsStream};
pub use infrastructure::config::AgentSettings;
pub use infrastructure::error::InfraError;
