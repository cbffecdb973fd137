//! DDL handling for table headers.
//!
//! `SHOW CREATE TABLE` output is normalised before it is written to a dump or
//! executed: ANSI quotes become backticks, the table is renamed to its target
//! and the legacy `TYPE=` option is spelled `ENGINE=`. Foreign key constraints
//! are moved out into a deferred `ALTER TABLE` so tables can be created in any
//! order and the constraints applied once every table exists.

use crate::forward::escape_mimic;
use regex::Regex;
use std::sync::LazyLock;
use sync_core::backquote;

static CONSTRAINT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"CONSTRAINT|FOREIGN\s+KEY").expect("valid regex"));
static CONSTRAINT_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(CONSTRAINT|FOREIGN\s+KEY)").expect("valid regex"));
static FOREIGN_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(FOREIGN\s+KEY)").expect("valid regex"));

pub fn remove_ansi_quotes(sql: &str) -> String {
    sql.replace('"', "`")
}

/// Rewrites the statement returned by `SHOW CREATE TABLE <table>` so it creates
/// `target` instead.
pub fn normalize_create_table(create: &str, table: &str, target: &str) -> String {
    remove_ansi_quotes(create)
        .replace(
            &format!("CREATE TABLE `{table}`"),
            &format!("CREATE TABLE `{target}`"),
        )
        .replace("TYPE=", "ENGINE=")
}

/// Separates constraint lines from a CREATE TABLE statement.
///
/// Returns the statement without its constraints and, when there were any, an
/// `ALTER TABLE <table> ADD ...;` statement that adds them back.
pub fn split_constraints(create: &str, table: &str) -> (String, Option<String>) {
    if !CONSTRAINT.is_match(create) {
        return (create.to_string(), None);
    }

    let crlf = if create.contains("\r\n") {
        "\r\n"
    } else if create.contains('\r') {
        "\r"
    } else {
        "\n"
    };
    let mut lines: Vec<String> = create.split(crlf).map(str::to_string).collect();

    let Some(first) = lines.iter().position(|l| CONSTRAINT_LINE.is_match(l)) else {
        return (create.to_string(), None);
    };
    if first == 0 {
        return (create.to_string(), None);
    }
    if let Some(stripped) = lines[first - 1].strip_suffix(',') {
        lines[first - 1] = stripped.to_string();
    }

    let mut alter = format!("ALTER TABLE {}{crlf}", backquote(table));
    let mut end = first;
    while end < lines.len() && CONSTRAINT.is_match(&lines[end]) {
        let line = &lines[end];
        if line.contains("CONSTRAINT") {
            alter.push_str(&line.replacen("CONSTRAINT", "ADD CONSTRAINT", 1));
        } else {
            alter.push_str(&FOREIGN_KEY.replace(line, "ADD $1"));
        }
        end += 1;
    }
    alter.push_str(";\n");

    let create = format!(
        "{}{crlf}{}",
        lines[..first].join(crlf),
        lines[end..].join(crlf)
    );
    (create, Some(alter))
}

/// `INSERT INTO <alter_table> ( `query` ) VALUES ( '<query>' );`
pub fn alter_statement_insert(alter_table: &str, query: &str) -> String {
    format!(
        "INSERT INTO {} ( `query` ) VALUES ( '{}' );\n",
        backquote(alter_table),
        String::from_utf8_lossy(&escape_mimic(query.as_bytes()))
    )
}

/// Drops the legacy and current alter tracking tables and recreates the
/// current one.
pub fn create_alter_table_query(legacy_alter_table: &str, alter_table: &str) -> String {
    format!(
        "DROP TABLE IF EXISTS `{legacy_alter_table}`;\n\
         DROP TABLE IF EXISTS `{alter_table}`;\n\
         CREATE TABLE `{alter_table}` ( `query` LONGTEXT NOT NULL );\n"
    )
}

pub fn drop_table(table: &str) -> String {
    format!("DROP TABLE IF EXISTS {};\n", backquote(table))
}

/// Copies `source` into `temp`, replacing any previous copy.
pub fn copy_table(source: &str, temp: &str) -> String {
    let source = backquote(source);
    let temp = backquote(temp);
    format!(
        "DROP TABLE IF EXISTS {temp};\n\
         CREATE TABLE {temp} LIKE {source};\n\
         INSERT INTO {temp} SELECT * FROM {source};"
    )
}
