use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_FOCUS_MINUTES: u32 = 25;
pub const DEFAULT_SHORT_BREAK_MINUTES: u32 = 5;
pub const DEFAULT_LONG_BREAK_MINUTES: u32 = 15;
pub const DEFAULT_CYCLES_PER_LONG_BREAK: u32 = 4;

const MAX_PHASE_MINUTES: u32 = 600;
const MAX_CYCLES_PER_LONG_BREAK: u32 = 99;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TimerPhase {
    Focus,
    ShortBreak,
    LongBreak,
}

impl TimerPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Focus => "focus",
            Self::ShortBreak => "short_break",
            Self::LongBreak => "long_break",
        }
    }

    pub fn is_break(self) -> bool {
        matches!(self, Self::ShortBreak | Self::LongBreak)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TimerSettings {
    pub focus: u32,
    pub short_break: u32,
    pub long_break: u32,
    pub cycles: u32,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            focus: DEFAULT_FOCUS_MINUTES,
            short_break: DEFAULT_SHORT_BREAK_MINUTES,
            long_break: DEFAULT_LONG_BREAK_MINUTES,
            cycles: DEFAULT_CYCLES_PER_LONG_BREAK,
        }
    }
}

impl TimerSettings {
    pub fn validate(&self) -> Result<(), String> {
        validate_minutes(self.focus, "settings.focus")?;
        validate_minutes(self.short_break, "settings.short_break")?;
        validate_minutes(self.long_break, "settings.long_break")?;
        if self.cycles == 0 || self.cycles > MAX_CYCLES_PER_LONG_BREAK {
            return Err(format!(
                "settings.cycles must be between 1 and {MAX_CYCLES_PER_LONG_BREAK}"
            ));
        }
        Ok(())
    }

    // Stored records that fail validation fall back to defaults rather than erroring.
    pub fn coerce(self) -> Self {
        if self.validate().is_ok() {
            self
        } else {
            Self::default()
        }
    }

    pub fn phase_seconds(&self, phase: TimerPhase) -> u32 {
        let minutes = match phase {
            TimerPhase::Focus => self.focus,
            TimerPhase::ShortBreak => self.short_break,
            TimerPhase::LongBreak => self.long_break,
        };
        minutes * 60
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkThroughput {
    pub rx_speed: String,
    pub tx_speed: String,
    pub rx_total: String,
    pub tx_total: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SystemStats {
    pub ts: i64,
    pub cpu: f64,
    pub ram: f64,
    pub gpu: f64,
    pub disk: f64,
    pub temp: f64,
    pub battery: i64,
    pub battery_status: String,
    pub battery_time: String,
    pub uptime: String,
    pub network: NetworkThroughput,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum ProcessCategory {
    User,
    System,
}

impl ProcessCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::System => "System",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessInfo {
    pub pid: i64,
    pub name: String,
    pub cpu: f64,
    pub ram: f64,
    pub category: ProcessCategory,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlCommand {
    Volume { action: String, value: i64 },
    Brightness { action: String },
    App { name: String },
    Media { action: String },
}

impl ControlCommand {
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::Volume { action, value } => {
                validate_non_empty(action, "control.volume.action")?;
                if action == "set" && !(0..=100).contains(value) {
                    return Err("control.volume.value must be between 0 and 100".to_string());
                }
                Ok(())
            }
            Self::Brightness { action } => validate_non_empty(action, "control.brightness.action"),
            Self::App { name } => validate_non_empty(name, "control.app.name"),
            Self::Media { action } => validate_non_empty(action, "control.media.action"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PowerAction {
    Restart,
    Sleep,
    Shutdown,
}

impl PowerAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Restart => "restart",
            Self::Sleep => "sleep",
            Self::Shutdown => "shutdown",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Income,
    Expense,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub id: String,
    pub title: String,
    pub amount: f64,
    pub kind: TransactionKind,
    pub category: Option<String>,
    pub date: DateTime<Utc>,
}

impl Transaction {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "transaction.id")?;
        validate_non_empty(&self.title, "transaction.title")?;
        if !self.amount.is_finite() || self.amount < 0.0 {
            return Err("transaction.amount must be a non-negative number".to_string());
        }
        if let Some(category) = &self.category {
            validate_non_empty(category, "transaction.category")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Budget {
    pub id: String,
    pub name: String,
    pub limit: f64,
    pub color: String,
}

impl Budget {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "budget.id")?;
        validate_non_empty(&self.name, "budget.name")?;
        if !self.limit.is_finite() || self.limit < 0.0 {
            return Err("budget.limit must be a non-negative number".to_string());
        }
        validate_non_empty(&self.color, "budget.color")?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EndpointKind {
    Tunnel,
    Lan,
}

impl EndpointKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tunnel => "tunnel",
            Self::Lan => "lan",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EndpointCandidate {
    pub kind: EndpointKind,
    pub url: String,
}

impl EndpointCandidate {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.url, "endpoint.url")?;
        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err("endpoint.url must start with http:// or https://".to_string());
        }
        Ok(())
    }
}

fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}

fn validate_minutes(value: u32, field_name: &str) -> Result<(), String> {
    if value == 0 || value > MAX_PHASE_MINUTES {
        return Err(format!(
            "{field_name} must be between 1 and {MAX_PHASE_MINUTES} minutes"
        ));
    }
    Ok(())
}
