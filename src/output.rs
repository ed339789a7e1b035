// merakictl - CLI for the Meraki Dashboard API
// Copyright (C) 2024 Mathias Uhl <mathiasuhl@gmx.de>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use anyhow::Result;
use clap::ValueEnum;
use serde_json::{Map, Value, json};
use std::io::Write;
use tabled::builder::Builder;
use tabled::settings::Style;

#[derive(Clone, Copy, Debug, Default, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// A titled set of rows rendered either as a table or as JSON objects keyed
/// by header.
#[derive(Debug, Clone, Default)]
pub struct Report {
    title: Option<String>,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Report {
    pub fn new(headers: &[&str]) -> Self {
        Self {
            title: None,
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn titled(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn push_header(&mut self, header: &str) {
        self.headers.push(header.to_string());
    }

    /// Short rows are padded with empty cells.
    pub fn row<I, S>(&mut self, cells: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut row: Vec<String> = cells.into_iter().map(Into::into).collect();
        if row.len() < self.headers.len() {
            row.resize(self.headers.len(), String::new());
        }
        self.rows.push(row);
    }

    pub fn render<W: Write + ?Sized>(&self, format: OutputFormat, out: &mut W) -> Result<()> {
        match format {
            OutputFormat::Table => {
                let mut builder = Builder::default();
                builder.push_record(self.headers.iter().cloned());
                for row in &self.rows {
                    builder.push_record(row.iter().cloned());
                }
                let mut table = builder.build();
                table.with(Style::rounded());

                if let Some(title) = &self.title {
                    writeln!(out, "{title}")?;
                }
                writeln!(out, "{table}")?;
            }
            OutputFormat::Json => {
                writeln!(out, "{}", serde_json::to_string_pretty(&self.json_rows())?)?;
            }
        }
        Ok(())
    }

    fn json_rows(&self) -> Value {
        self.rows
            .iter()
            .map(|row| {
                let mut obj = Map::new();
                for (header, cell) in self.headers.iter().zip(row) {
                    obj.insert(header.clone(), Value::String(cell.clone()));
                }
                Value::Object(obj)
            })
            .collect()
    }
}

/// Several reports as one document: tables one after another, or a single
/// JSON array of `{"title", "rows"}` objects.
pub fn render_all<W: Write + ?Sized>(
    reports: &[Report],
    format: OutputFormat,
    out: &mut W,
) -> Result<()> {
    match format {
        OutputFormat::Table => {
            for report in reports {
                report.render(format, out)?;
            }
        }
        OutputFormat::Json => {
            let sections: Vec<Value> = reports
                .iter()
                .map(|report| json!({"title": report.title, "rows": report.json_rows()}))
                .collect();
            writeln!(out, "{}", serde_json::to_string_pretty(&sections)?)?;
        }
    }
    Ok(())
}

/// Flatten a JSON value into a table cell.
pub fn value_to_str(value: &Value) -> String {
    match value {
        Value::Null => "".into(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(arr) => arr.iter().map(value_to_str).collect::<Vec<_>>().join(", "),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

pub fn cell(item: &Value, key: &str) -> String {
    item.get(key).map(value_to_str).unwrap_or_default()
}

pub fn enabled(flag: bool) -> &'static str {
    if flag { "Enabled" } else { "Disabled" }
}
