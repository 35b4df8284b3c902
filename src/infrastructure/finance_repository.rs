use crate::domain::models::{Budget, Transaction, TransactionKind};
use crate::infrastructure::error::InfraError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub trait FinanceRepository: Send + Sync {
    fn upsert_transaction(&self, transaction: &Transaction) -> Result<(), InfraError>;
    fn get_transaction(&self, id: &str) -> Result<Option<Transaction>, InfraError>;
    fn delete_transaction(&self, id: &str) -> Result<bool, InfraError>;
    fn list_transactions(&self) -> Result<Vec<Transaction>, InfraError>;

    fn upsert_budget(&self, budget: &Budget) -> Result<(), InfraError>;
    fn get_budget(&self, id: &str) -> Result<Option<Budget>, InfraError>;
    fn delete_budget(&self, id: &str) -> Result<bool, InfraError>;
    fn list_budgets(&self) -> Result<Vec<Budget>, InfraError>;
}

#[derive(Debug, Clone)]
pub struct SqliteFinanceRepository {
    db_path: PathBuf,
}

impl SqliteFinanceRepository {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        Connection::open(&self.db_path).map_err(InfraError::from)
    }

    fn transaction_row(row: &Row<'_>) -> rusqlite::Result<TransactionRow> {
        Ok(TransactionRow {
            id: row.get(0)?,
            title: row.get(1)?,
            amount: row.get(2)?,
            kind: row.get(3)?,
            category: row.get(4)?,
            date: row.get(5)?,
        })
    }
}

struct TransactionRow {
    id: String,
    title: String,
    amount: f64,
    kind: String,
    category: Option<String>,
    date: String,
}

impl TransactionRow {
    fn into_transaction(self) -> Result<Transaction, InfraError> {
        Ok(Transaction {
            id: self.id,
            title: self.title,
            amount: self.amount,
            kind: parse_kind(&self.kind)?,
            category: self.category,
            date: parse_date(&self.date)?,
        })
    }
}

fn parse_kind(raw: &str) -> Result<TransactionKind, InfraError> {
    match raw {
        "income" => Ok(TransactionKind::Income),
        "expense" => Ok(TransactionKind::Expense),
        other => Err(InfraError::InvalidConfig(format!(
            "invalid transaction kind '{other}'"
        ))),
    }
}

fn parse_date(raw: &str) -> Result<DateTime<Utc>, InfraError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|error| {
            InfraError::InvalidConfig(format!("invalid transaction date '{raw}': {error}"))
        })
}

impl FinanceRepository for SqliteFinanceRepository {
    fn upsert_transaction(&self, transaction: &Transaction) -> Result<(), InfraError> {
        let connection = self.connect()?;
        connection.execute(
            "INSERT INTO transactions (id, title, amount, kind, category, date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
               title = excluded.title,
               amount = excluded.amount,
               kind = excluded.kind,
               category = excluded.category,
               date = excluded.date",
            params![
                transaction.id,
                transaction.title,
                transaction.amount,
                transaction.kind.as_str(),
                transaction.category,
                transaction.date.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn get_transaction(&self, id: &str) -> Result<Option<Transaction>, InfraError> {
        let connection = self.connect()?;
        let row = connection
            .query_row(
                "SELECT id, title, amount, kind, category, date
                 FROM transactions WHERE id = ?1",
                params![id],
                Self::transaction_row,
            )
            .optional()?;

        row.map(TransactionRow::into_transaction).transpose()
    }

    fn delete_transaction(&self, id: &str) -> Result<bool, InfraError> {
        let connection = self.connect()?;
        let deleted = connection.execute("DELETE FROM transactions WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    fn list_transactions(&self) -> Result<Vec<Transaction>, InfraError> {
        let connection = self.connect()?;
        let mut statement = connection.prepare(
            "SELECT id, title, amount, kind, category, date
             FROM transactions ORDER BY date DESC, id DESC",
        )?;
        let rows = statement.query_map([], Self::transaction_row)?;

        let mut transactions = Vec::new();
        for row in rows {
            transactions.push(row?.into_transaction()?);
        }
        Ok(transactions)
    }

    fn upsert_budget(&self, budget: &Budget) -> Result<(), InfraError> {
        let connection = self.connect()?;
        connection.execute(
            "INSERT INTO budgets (id, name, budget_limit, color)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
               name = excluded.name,
               budget_limit = excluded.budget_limit,
               color = excluded.color",
            params![budget.id, budget.name, budget.limit, budget.color],
        )?;
        Ok(())
    }

    fn get_budget(&self, id: &str) -> Result<Option<Budget>, InfraError> {
        let connection = self.connect()?;
        let budget = connection
            .query_row(
                "SELECT id, name, budget_limit, color FROM budgets WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Budget {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        limit: row.get(2)?,
                        color: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(budget)
    }

    fn delete_budget(&self, id: &str) -> Result<bool, InfraError> {
        let connection = self.connect()?;
        let deleted = connection.execute("DELETE FROM budgets WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    fn list_budgets(&self) -> Result<Vec<Budget>, InfraError> {
        let connection = self.connect()?;
        let mut statement =
            connection.prepare("SELECT id, name, budget_limit, color FROM budgets ORDER BY name")?;
        let rows = statement.query_map([], |row| {
            Ok(Budget {
                id: row.get(0)?,
                name: row.get(1)?,
                limit: row.get(2)?,
                color: row.get(3)?,
            })
        })?;

        let mut budgets = Vec::new();
        for row in rows {
            budgets.push(row?);
        }
        Ok(budgets)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryFinanceRepository {
    transactions: Mutex<HashMap<String, Transaction>>,
    budgets: Mutex<HashMap<String, Budget>>,
}

impl InMemoryFinanceRepository {
    fn lock_error(error: impl std::fmt::Display) -> InfraError {
        InfraError::InvalidConfig(format!("finance lock poisoned: {error}"))
    }
}

impl FinanceRepository for InMemoryFinanceRepository {
    fn upsert_transaction(&self, transaction: &Transaction) -> Result<(), InfraError> {
        let mut transactions = self.transactions.lock().map_err(Self::lock_error)?;
        transactions.insert(transaction.id.clone(), transaction.clone());
        Ok(())
    }

    fn get_transaction(&self, id: &str) -> Result<Option<Transaction>, InfraError> {
        let transactions = self.transactions.lock().map_err(Self::lock_error)?;
        Ok(transactions.get(id).cloned())
    }

    fn delete_transaction(&self, id: &str) -> Result<bool, InfraError> {
        let mut transactions = self.transactions.lock().map_err(Self::lock_error)?;
        Ok(transactions.remove(id).is_some())
    }

    fn list_transactions(&self) -> Result<Vec<Transaction>, InfraError> {
        let transactions = self.transactions.lock().map_err(Self::lock_error)?;
        let mut listed: Vec<Transaction> = transactions.values().cloned().collect();
        listed.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| b.id.cmp(&a.id)));
        Ok(listed)
    }

    fn upsert_budget(&self, budget: &Budget) -> Result<(), InfraError> {
        let mut budgets = self.budgets.lock().map_err(Self::lock_error)?;
        budgets.insert(budget.id.clone(), budget.clone());
        Ok(())
    }

    fn get_budget(&self, id: &str) -> Result<Option<Budget>, InfraError> {
        let budgets = self.budgets.lock().map_err(Self::lock_error)?;
        Ok(budgets.get(id).cloned())
    }

    fn delete_budget(&self, id: &str) -> Result<bool, InfraError> {
        let mut budgets = self.budgets.lock().map_err(Self::lock_error)?;
        Ok(budgets.remove(id).is_some())
    }

    fn list_budgets(&self) -> Result<Vec<Budget>, InfraError> {
        let budgets = self.budgets.lock().map_err(Self::lock_error)?;
        let mut listed: Vec<Budget> = budgets.values().cloned().collect();
        listed.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(listed)
    }
}
