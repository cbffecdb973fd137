//! Testing utilities for the MySQL source
//!
//! [`FakeDb`] stands in for a server: it answers the schema queries from
//! registered tables, hands out queued pages for row SELECTs and records
//! every statement it is asked to run.

use async_trait::async_trait;
use mysql_types::ColumnDescriptor;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use sync_core::Row;

use crate::accessor::DbAccessor;
use crate::error::DbError;

struct FakeTable {
    name: String,
    columns: Vec<ColumnDescriptor>,
    create: String,
    is_view: bool,
}

#[derive(Default)]
struct State {
    tables: Vec<FakeTable>,
    pages: HashMap<String, VecDeque<Vec<Row>>>,
    responses: Vec<(String, Vec<Row>)>,
    failures: Vec<(String, String)>,
    strict_utf8: bool,
    queries: Vec<String>,
    executed: Vec<String>,
}

#[derive(Default)]
pub struct FakeDb {
    state: Mutex<State>,
}

impl FakeDb {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_table(&self, name: &str, columns: Vec<ColumnDescriptor>, create: &str) {
        self.state().tables.push(FakeTable {
            name: name.to_string(),
            columns,
            create: create.to_string(),
            is_view: false,
        });
    }

    pub fn add_view(&self, name: &str) {
        self.state().tables.push(FakeTable {
            name: name.to_string(),
            columns: Vec::new(),
            create: String::new(),
            is_view: true,
        });
    }

    /// Queues the result of the next row SELECT on `table`. Once the queue is
    /// empty, SELECTs return no rows.
    pub fn queue_page(&self, table: &str, rows: Vec<Row>) {
        self.state()
            .pages
            .entry(table.to_string())
            .or_default()
            .push_back(rows);
    }

    /// Answers every query containing `needle` with `rows`. Checked before
    /// anything else.
    pub fn respond(&self, needle: &str, rows: Vec<Row>) {
        self.state().responses.push((needle.to_string(), rows));
    }

    /// Makes every statement containing `needle` fail with `message`.
    pub fn fail_when(&self, needle: &str, message: &str) {
        self.state()
            .failures
            .push((needle.to_string(), message.to_string()));
    }

    /// Rejects statements that are not valid UTF-8, the way a utf8mb4
    /// connection rejects invalid text.
    pub fn strict_utf8(&self) {
        self.state().strict_utf8 = true;
    }

    pub fn queries(&self) -> Vec<String> {
        self.state().queries.clone()
    }

    /// Every statement passed to `execute`, including failed ones.
    pub fn executed(&self) -> Vec<String> {
        self.state().executed.clone()
    }

    /// Row SELECTs issued against `table`, in order.
    pub fn selects(&self, table: &str) -> Vec<String> {
        let from = format!("FROM `{table}`");
        self.queries()
            .into_iter()
            .filter(|q| q.starts_with("SELECT ") && q.contains(&from))
            .collect()
    }
}

fn quoted_name(sql: &str, open: char, close: char) -> Option<String> {
    let start = sql.find(open)? + 1;
    let end = sql[start..].find(close)? + start;
    Some(sql[start..end].to_string())
}

fn describe_row(column: &ColumnDescriptor) -> Row {
    Row::new()
        .with("Field", Some(column.field.as_str()))
        .with("Type", Some(column.column_type.as_str()))
        .with("Null", Some(if column.nullable { "YES" } else { "NO" }))
        .with("Key", Some(column.key.as_str()))
        .with("Default", column.default.as_deref())
        .with("Extra", Some(column.extra.as_str()))
}

#[async_trait]
impl DbAccessor for FakeDb {
    async fn query(&self, sql: &str) -> Result<Vec<Row>, DbError> {
        let mut state = self.state();
        state.queries.push(sql.to_string());

        if let Some((_, message)) = state.failures.iter().find(|(n, _)| sql.contains(n.as_str())) {
            return Err(DbError::query(message.clone()));
        }
        if let Some((_, rows)) = state.responses.iter().find(|(n, _)| sql.contains(n.as_str())) {
            return Ok(rows.clone());
        }

        if let Some(rest) = sql.strip_prefix("SHOW TABLES LIKE ") {
            let name = quoted_name(rest, '\'', '\'').unwrap_or_default();
            return Ok(state
                .tables
                .iter()
                .filter(|t| t.name == name)
                .map(|t| Row::new().with("Tables", Some(t.name.as_str())))
                .collect());
        }
        if let Some(rest) = sql.strip_prefix("DESCRIBE ") {
            let name = quoted_name(rest, '`', '`').unwrap_or_default();
            return Ok(state
                .tables
                .iter()
                .filter(|t| t.name == name)
                .flat_map(|t| t.columns.iter().map(describe_row))
                .collect());
        }
        if let Some(rest) = sql.strip_prefix("SHOW CREATE TABLE ") {
            let name = quoted_name(rest, '`', '`').unwrap_or_default();
            return Ok(state
                .tables
                .iter()
                .filter(|t| t.name == name && !t.is_view)
                .map(|t| {
                    Row::new()
                        .with("Table", Some(t.name.as_str()))
                        .with("Create Table", Some(t.create.as_str()))
                })
                .collect());
        }
        if sql == "SHOW FULL TABLES" {
            return Ok(state
                .tables
                .iter()
                .map(|t| {
                    Row::new().with("Tables_in_wordpress", Some(t.name.as_str())).with(
                        "Table_type",
                        Some(if t.is_view { "VIEW" } else { "BASE TABLE" }),
                    )
                })
                .collect());
        }
        if sql.starts_with("SELECT ") {
            if let Some(from) = sql.find(" FROM ") {
                if let Some(table) = quoted_name(&sql[from..], '`', '`') {
                    let page = state
                        .pages
                        .get_mut(&table)
                        .and_then(|pages| pages.pop_front())
                        .unwrap_or_default();
                    return Ok(page);
                }
            }
        }
        Ok(Vec::new())
    }

    async fn execute(&self, sql: &[u8]) -> Result<(), DbError> {
        let valid = std::str::from_utf8(sql).is_ok();
        let sql = String::from_utf8_lossy(sql).into_owned();
        let mut state = self.state();
        state.executed.push(sql.clone());
        if state.strict_utf8 && !valid {
            return Err(DbError::query("Incorrect string value"));
        }
        if let Some((_, message)) = state.failures.iter().find(|(n, _)| sql.contains(n.as_str())) {
            return Err(DbError::query(message.clone()));
        }
        Ok(())
    }

    fn database_name(&self) -> &str {
        "wordpress"
    }

    fn host_name(&self) -> &str {
        "localhost"
    }
}
