use crate::infrastructure::error::InfraError;
use rusqlite::Connection;
use std::path::Path;

const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");

pub fn initialize_database(path: &Path) -> Result<(), InfraError> {
    let connection = Connection::open(path)?;
    connection.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialize_database_creates_expected_tables() {
        let path = std::env::temp_dir().join(format!(
            "deskpulse-storage-test-{}.sqlite",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);

        initialize_database(&path).expect("initialize database");
        // Second run must be a no-op, not an error.
        initialize_database(&path).expect("reinitialize database");

        let connection = Connection::open(&path).expect("open database");
        let mut statement = connection
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .expect("prepare table query");
        let tables: Vec<String> = statement
            .query_map([], |row| row.get(0))
            .expect("query tables")
            .collect::<Result<_, _>>()
            .expect("collect tables");

        assert!(tables.contains(&"kv_store".to_string()));
        assert!(tables.contains(&"transactions".to_string()));
        assert!(tables.contains(&"budgets".to_string()));

        drop(statement);
        drop(connection);
        let _ = std::fs::remove_file(&path);
    }
}
