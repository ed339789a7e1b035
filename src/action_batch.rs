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

//! Action batches queue several configuration changes for asynchronous
//! execution by the Dashboard.

use crate::client::DashboardClient;
use crate::poll::poll_until;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::info;

/// Upper bound on actions in one asynchronous batch.
pub const MAX_ACTIONS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Update,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Action {
    pub resource: String,
    pub operation: Operation,
    pub body: Value,
}

impl Action {
    pub fn update(resource: impl Into<String>, body: Value) -> Self {
        Self {
            resource: resource.into(),
            operation: Operation::Update,
            body,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchStatus {
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub failed: bool,
    #[serde(default)]
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActionBatch {
    pub id: String,
    #[serde(default)]
    pub status: BatchStatus,
}

impl ActionBatch {
    pub fn finished(&self) -> bool {
        self.status.completed || self.status.failed
    }
}

pub fn submit(client: &DashboardClient, org_id: &str, actions: &[Action]) -> Result<ActionBatch> {
    let body = json!({
        "confirmed": true,
        "synchronous": false,
        "actions": actions,
    });
    let created = client.post(&format!("organizations/{org_id}/actionBatches"), &body)?;
    let batch: ActionBatch =
        serde_json::from_value(created).context("decoding created action batch")?;
    info!(batch = %batch.id, actions = actions.len(), "action batch submitted");
    Ok(batch)
}

/// Re-query the batch every `interval` until it completes or fails.
pub fn wait(
    client: &DashboardClient,
    org_id: &str,
    batch: ActionBatch,
    interval: Duration,
) -> Result<ActionBatch> {
    poll_until(
        batch,
        interval,
        |current| {
            let value = client.get(
                &format!("organizations/{org_id}/actionBatches/{}", current.id),
                &[],
            )?;
            serde_json::from_value(value).context("decoding action batch status")
        },
        ActionBatch::finished,
    )
}

/// Submit `actions` in chunks of [`MAX_ACTIONS`], waiting for each chunk.
pub fn run(
    client: &DashboardClient,
    org_id: &str,
    actions: &[Action],
    interval: Duration,
) -> Result<Vec<ActionBatch>> {
    let mut finished = Vec::new();
    for chunk in actions.chunks(MAX_ACTIONS) {
        let batch = submit(client, org_id, chunk)?;
        finished.push(wait(client, org_id, batch, interval)?);
    }
    Ok(finished)
}
