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

use super::Ctx;
use crate::lookup::id_of;
use crate::output::{Report, cell, value_to_str};
use crate::progress::with_spinner;
use crate::select::str_field;
use crate::types::SensorMetric;
use anyhow::Result;
use clap::Subcommand;
use serde_json::Value;

/// Page size limit of the latest-readings endpoint.
const LATEST_READINGS_PER_PAGE: u32 = 100;

#[derive(Subcommand, Debug)]
pub enum SensorCommand {
    /// Latest reading of each metric, one table per sensor
    LatestReadings {
        organization_name: String,
        #[arg(long = "serial")]
        serials: Vec<String>,
    },
    /// Historical readings of an organization
    History {
        organization_name: String,
        #[arg(long = "serial")]
        serials: Vec<String>,
        #[arg(long = "metric", value_enum)]
        metrics: Vec<SensorMetric>,
    },
}

pub fn handle(ctx: &mut Ctx, cmd: SensorCommand) -> Result<()> {
    match cmd {
        SensorCommand::LatestReadings {
            organization_name,
            serials,
        } => latest_readings(ctx, &organization_name, &serials),
        SensorCommand::History {
            organization_name,
            serials,
            metrics,
        } => history(ctx, &organization_name, &serials, &metrics),
    }
}

fn wanted(serials: &[String], item: &Value) -> bool {
    serials.is_empty() || serials.iter().any(|s| s == str_field(item, "serial"))
}

/// The measurement is stored under a key named after the metric.
fn reading_value(reading: &Value) -> String {
    reading
        .get(str_field(reading, "metric"))
        .map(value_to_str)
        .unwrap_or_default()
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    chars
        .next()
        .map(|first| first.to_uppercase().chain(chars).collect())
        .unwrap_or_default()
}

fn latest_readings(ctx: &mut Ctx, organization_name: &str, serials: &[String]) -> Result<()> {
    let org = ctx.org(organization_name)?;
    let client = ctx.client;
    let path = format!("organizations/{}/sensor/readings/latest", id_of(&org));
    let sensors = with_spinner("Accessing API...", || {
        client.get_all_capped(&path, &[], LATEST_READINGS_PER_PAGE)
    })?;

    let mut reports = Vec::new();
    for sensor in sensors.iter().filter(|s| wanted(serials, s)) {
        let network = sensor
            .pointer("/network/name")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let mut report = Report::new(&["Metric", "Data", "Time"])
            .titled(format!("{network}: {}", str_field(sensor, "serial")));
        let readings = sensor
            .get("readings")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for reading in readings {
            report.row([
                capitalize(str_field(reading, "metric")),
                reading_value(reading),
                cell(reading, "ts"),
            ]);
        }
        reports.push(report);
    }
    ctx.show_all(&reports)
}

fn history(
    ctx: &mut Ctx,
    organization_name: &str,
    serials: &[String],
    metrics: &[SensorMetric],
) -> Result<()> {
    let org = ctx.org(organization_name)?;
    let client = ctx.client;
    let path = format!("organizations/{}/sensor/readings/history", id_of(&org));
    let readings = with_spinner("Accessing API...", || client.get_all(&path, &[]))?;

    let mut report = Report::new(&["Metric", "Data", "Time", "Network / Serial"]).titled("History");
    for reading in readings.iter().filter(|r| wanted(serials, r)) {
        let metric = str_field(reading, "metric");
        if !metrics.is_empty() && !metrics.iter().any(|m| m.as_str() == metric) {
            continue;
        }
        report.row([
            metric.to_string(),
            reading_value(reading),
            cell(reading, "ts"),
            format!(
                "{} / {}",
                reading
                    .pointer("/network/name")
                    .and_then(Value::as_str)
                    .unwrap_or_default(),
                str_field(reading, "serial")
            ),
        ]);
    }
    ctx.show(&report)
}
