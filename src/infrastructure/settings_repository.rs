use crate::domain::models::TimerSettings;
use crate::infrastructure::error::InfraError;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const SETTINGS_KEY: &str = "pomodoro_settings";

pub trait SettingsRepository: Send + Sync {
    fn load(&self) -> Result<Option<TimerSettings>, InfraError>;
    fn save(&self, settings: &TimerSettings) -> Result<(), InfraError>;

    /// Startup read: absent, unparseable, or out-of-range records all land on
    /// defaults instead of failing.
    fn load_or_default(&self) -> Result<TimerSettings, InfraError> {
        Ok(self
            .load()?
            .map(TimerSettings::coerce)
            .unwrap_or_default())
    }
}

#[derive(Debug, Clone)]
pub struct SqliteSettingsRepository {
    db_path: PathBuf,
}

impl SqliteSettingsRepository {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        Connection::open(&self.db_path).map_err(InfraError::from)
    }
}

impl SettingsRepository for SqliteSettingsRepository {
    fn load(&self) -> Result<Option<TimerSettings>, InfraError> {
        let connection = self.connect()?;
        let raw: Option<String> = connection
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![SETTINGS_KEY],
                |row| row.get(0),
            )
            .optional()?;

        let Some(raw) = raw else {
            return Ok(None);
        };

        // A record that no longer parses is treated as absent, not fatal.
        Ok(serde_json::from_str::<TimerSettings>(&raw).ok())
    }

    fn save(&self, settings: &TimerSettings) -> Result<(), InfraError> {
        let connection = self.connect()?;
        let encoded = serde_json::to_string(settings)?;
        connection.execute(
            "INSERT INTO kv_store (key, value)
             VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET
               value = excluded.value",
            params![SETTINGS_KEY, encoded],
        )?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemorySettingsRepository {
    settings: Mutex<Option<TimerSettings>>,
}

impl SettingsRepository for InMemorySettingsRepository {
    fn load(&self) -> Result<Option<TimerSettings>, InfraError> {
        let settings = self.settings.lock().map_err(|error| {
            InfraError::InvalidConfig(format!("settings lock poisoned: {error}"))
        })?;
        Ok(*settings)
    }

    fn save(&self, settings: &TimerSettings) -> Result<(), InfraError> {
        let mut stored = self.settings.lock().map_err(|error| {
            InfraError::InvalidConfig(format!("settings lock poisoned: {error}"))
        })?;
        *stored = Some(*settings);
        Ok(())
    }
}
