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

//! Resolution of human-readable organization and network names to API
//! objects.

use crate::client::{ApiError, DashboardClient};
use crate::prompt::Prompter;
use crate::select::str_field;
use anyhow::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("No {kind} found matching '{query}'")]
    NotFound { kind: &'static str, query: String },
}

pub fn filter_by_name(items: Vec<Value>, name: Option<&str>) -> Vec<Value> {
    match name {
        Some(name) => items
            .into_iter()
            .filter(|item| str_field(item, "name").contains(name))
            .collect(),
        None => items,
    }
}

/// Pick a single object out of the name matches.
///
/// Zero matches is an error. One match, or exactly one match whose name is
/// identical to `query`, is returned directly. Anything else is handed to the
/// prompter.
pub fn pick_one(
    kind: &'static str,
    query: &str,
    mut matches: Vec<Value>,
    prompter: &mut dyn Prompter,
) -> Result<Value> {
    match matches.len() {
        0 => Err(LookupError::NotFound {
            kind,
            query: query.to_string(),
        }
        .into()),
        1 => Ok(matches.remove(0)),
        _ => {
            let exact: Vec<usize> = matches
                .iter()
                .enumerate()
                .filter(|(_, m)| str_field(m, "name") == query)
                .map(|(idx, _)| idx)
                .collect();
            if let [idx] = exact.as_slice() {
                return Ok(matches.swap_remove(*idx));
            }

            let labels: Vec<String> = matches
                .iter()
                .map(|m| format!("{} ({})", str_field(m, "name"), id_of(m)))
                .collect();
            let choice = prompter.choose(
                &format!("{} {kind}s match '{query}':", matches.len()),
                &labels,
            )?;
            debug!(kind, query, choice, "disambiguated by prompt");
            Ok(matches.swap_remove(choice))
        }
    }
}

pub fn find_orgs_by_name(
    client: &DashboardClient,
    name: Option<&str>,
) -> Result<Vec<Value>, ApiError> {
    let orgs = client.get_all("organizations", &[])?;
    Ok(filter_by_name(orgs, name))
}

pub fn find_org_by_name(
    client: &DashboardClient,
    name: &str,
    prompter: &mut dyn Prompter,
) -> Result<Value> {
    let matches = find_orgs_by_name(client, Some(name))?;
    pick_one("organization", name, matches, prompter)
}

pub fn find_network_by_name(
    client: &DashboardClient,
    org_name: &str,
    network_name: &str,
    prompter: &mut dyn Prompter,
) -> Result<Value> {
    let org = find_org_by_name(client, org_name, prompter)?;
    let networks = client.get_all(&format!("organizations/{}/networks", id_of(&org)), &[])?;
    let matches = filter_by_name(networks, Some(network_name));
    pick_one("network", network_name, matches, prompter)
}

/// Identifier as a string, whether the API sent a string or a number.
pub fn id_of(item: &Value) -> String {
    match item.get("id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// Device name, falling back to the serial for unnamed devices.
pub fn device_label(device: &Value) -> String {
    let name = str_field(device, "name");
    if name.is_empty() {
        str_field(device, "serial").to_string()
    } else {
        name.to_string()
    }
}

/// Per-command memo of `GET /devices/{serial}` results.
pub struct DeviceCache<'a> {
    client: &'a DashboardClient,
    devices: HashMap<String, Value>,
}

impl<'a> DeviceCache<'a> {
    pub fn new(client: &'a DashboardClient) -> Self {
        Self {
            client,
            devices: HashMap::new(),
        }
    }

    pub fn get(&mut self, serial: &str) -> Result<&Value, ApiError> {
        match self.devices.entry(serial.to_string()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let device = self.client.get(&format!("devices/{serial}"), &[])?;
                Ok(entry.insert(device))
            }
        }
    }

    pub fn label(&mut self, serial: &str) -> Result<String, ApiError> {
        Ok(device_label(self.get(serial)?))
    }
}
