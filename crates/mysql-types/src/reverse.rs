//! Reverse conversion: MySQL values to cells.
//!
//! The text protocol returns nearly everything as `Bytes`; the other arms
//! render values the way MySQL prints them so a cell always holds the text
//! form of the value.

use mysql_async::Value;
use sync_core::{Cell, Row};

pub fn value_to_cell(value: Value) -> Cell {
    match value {
        Value::NULL => None,
        Value::Bytes(bytes) => Some(bytes),
        Value::Int(i) => Some(i.to_string().into_bytes()),
        Value::UInt(u) => Some(u.to_string().into_bytes()),
        Value::Float(f) => Some(f.to_string().into_bytes()),
        Value::Double(d) => Some(d.to_string().into_bytes()),
        Value::Date(year, month, day, hour, minute, second, micros) => {
            let mut text = format!(
                "{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}"
            );
            if micros > 0 {
                text.push_str(&format!(".{micros:06}"));
            }
            Some(text.into_bytes())
        }
        Value::Time(negative, days, hours, minutes, seconds, micros) => {
            let sign = if negative { "-" } else { "" };
            let hours = u64::from(days) * 24 + u64::from(hours);
            let mut text = format!("{sign}{hours:02}:{minutes:02}:{seconds:02}");
            if micros > 0 {
                text.push_str(&format!(".{micros:06}"));
            }
            Some(text.into_bytes())
        }
    }
}

/// Converts a result row, keeping column order and names.
pub fn row_to_cells(mut row: mysql_async::Row) -> Row {
    let names: Vec<String> = row
        .columns_ref()
        .iter()
        .map(|column| column.name_str().into_owned())
        .collect();
    let mut cells = Vec::with_capacity(names.len());
    for (index, name) in names.into_iter().enumerate() {
        let value = row.take::<Value, _>(index).unwrap_or(Value::NULL);
        cells.push((name, value_to_cell(value)));
    }
    Row::from_cells(cells)
}
