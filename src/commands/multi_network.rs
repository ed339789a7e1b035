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

//! Commands spanning several organizations or networks.

use super::Ctx;
use super::networks::SettingsArgs;
use crate::action_batch::{self, Action};
use crate::lookup::{find_orgs_by_name, id_of};
use crate::progress::{bar, with_spinner};
use crate::select::{matches_text, str_field};
use anyhow::{Result, bail};
use chrono::{DateTime, Days, Local, NaiveTime, TimeZone};
use clap::Subcommand;
use serde_json::{Value, json};
use tracing::{info, warn};

const WINDOW_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Subcommand, Debug)]
pub enum MultiNetworkCommand {
    /// Enable API access on every organization where it is disabled
    EnableApiAll,
    /// Summarize appliance security events per organization
    ListSecurityEvents {
        /// Days to look back, counted from midnight
        #[arg(long, default_value_t = 3)]
        days_ago: u64,
        /// Exact organization names; all organizations when omitted
        #[arg(long = "organization-name")]
        organization_names: Vec<String>,
        /// Only events whose message contains this text
        #[arg(long)]
        filter_event_name: Option<String>,
    },
    /// Apply network settings to many networks through an action batch
    UpdateSettings {
        organization_name: String,
        /// Only networks whose name contains this text
        #[arg(long)]
        network_filter: Option<String>,
        #[arg(long)]
        no_confirm: bool,
        #[command(flatten)]
        settings: SettingsArgs,
    },
}

pub fn handle(ctx: &mut Ctx, cmd: MultiNetworkCommand) -> Result<()> {
    match cmd {
        MultiNetworkCommand::EnableApiAll => enable_api_all(ctx),
        MultiNetworkCommand::ListSecurityEvents {
            days_ago,
            organization_names,
            filter_event_name,
        } => list_security_events(
            ctx,
            days_ago,
            &organization_names,
            filter_event_name.as_deref(),
            Local::now(),
        ),
        MultiNetworkCommand::UpdateSettings {
            organization_name,
            network_filter,
            no_confirm,
            settings,
        } => update_settings(
            ctx,
            &organization_name,
            network_filter.as_deref(),
            !no_confirm,
            &settings,
        ),
    }
}

fn enable_api_all(ctx: &mut Ctx) -> Result<()> {
    let client = ctx.client;
    let orgs = with_spinner("Finding organizations", || find_orgs_by_name(client, None))?;
    let orgs: Vec<Value> = orgs
        .into_iter()
        .filter(|org| !org.pointer("/api/enabled").and_then(Value::as_bool).unwrap_or(false))
        .collect();
    ctx.say(format!("Found {} organizations with API disabled.", orgs.len()))?;

    let progress = bar(orgs.len() as u64);
    for org in &orgs {
        let name = str_field(org, "name");
        progress.set_message(name.to_string());
        let body = json!({"name": name, "api": {"enabled": true}});
        match client.put(&format!("organizations/{}", id_of(org)), &body) {
            Ok(_) => ctx.say(format!("API enabled for {name}"))?,
            Err(err) => {
                warn!(org = %id_of(org), error = %err, "enabling API failed");
                ctx.say(format!("Error enabling API for {name}"))?;
            }
        }
        progress.inc(1);
    }
    progress.finish_and_clear();
    Ok(())
}

/// From midnight `days_ago` days before `now`, up to `now`.
fn event_window<Tz: TimeZone>(
    now: DateTime<Tz>,
    days_ago: u64,
) -> Result<(DateTime<Tz>, DateTime<Tz>)> {
    let Some(day) = now.date_naive().checked_sub_days(Days::new(days_ago)) else {
        bail!("--days-ago {days_ago} reaches before the earliest supported date");
    };
    let midnight = day.and_time(NaiveTime::MIN);
    let tz = now.timezone();
    // Midnight can fall into a DST gap; read it as UTC then.
    let start = tz
        .from_local_datetime(&midnight)
        .earliest()
        .unwrap_or_else(|| midnight.and_utc().with_timezone(&tz));
    Ok((start, now))
}

/// Matching event count and the distinct destination hosts, in first-seen
/// order.
fn summarize_events(events: &[Value], filter: Option<&str>) -> (usize, Vec<String>) {
    let mut count = 0;
    let mut hosts: Vec<String> = Vec::new();
    for event in events {
        if !matches_text(str_field(event, "message"), filter) {
            continue;
        }
        count += 1;
        let host = str_field(event, "destIp");
        if !hosts.iter().any(|h| h == host) {
            hosts.push(host.to_string());
        }
    }
    (count, hosts)
}

fn list_security_events<Tz: TimeZone>(
    ctx: &mut Ctx,
    days_ago: u64,
    organization_names: &[String],
    filter: Option<&str>,
    now: DateTime<Tz>,
) -> Result<()>
where
    Tz::Offset: std::fmt::Display,
{
    let (start, end) = event_window(now, days_ago)?;
    let client = ctx.client;
    let mut orgs = with_spinner("Finding organizations", || find_orgs_by_name(client, None))?;
    if !organization_names.is_empty() {
        orgs.retain(|org| organization_names.iter().any(|n| n == str_field(org, "name")));
    }
    ctx.say(format!("Found {} organizations.", orgs.len()))?;

    ctx.say(format!(
        " Displaying events from {} to {}.",
        start.format(WINDOW_FORMAT),
        end.format(WINDOW_FORMAT)
    ))?;
    let query = [("t0", start.to_rfc3339()), ("t1", end.to_rfc3339())];

    let progress = bar(orgs.len() as u64);
    let mut matched = Vec::new();
    for org in &orgs {
        let path = format!("organizations/{}/appliance/security/events", id_of(org));
        progress.inc(1);
        let events = match client.get_all(&path, &query) {
            Ok(events) => events,
            Err(err) => {
                info!(org = %id_of(org), error = %err, "skipping organization");
                continue;
            }
        };
        let (count, hosts) = summarize_events(&events, filter);
        if count > 0 {
            matched.push((str_field(org, "name").to_string(), count, hosts));
        }
    }
    progress.finish_and_clear();

    for (name, count, hosts) in matched {
        ctx.say(format!("{name} matched {count} events."))?;
        for host in hosts {
            ctx.say(format!(" {host}"))?;
        }
    }
    Ok(())
}

fn update_settings(
    ctx: &mut Ctx,
    organization_name: &str,
    network_filter: Option<&str>,
    confirm: bool,
    settings: &SettingsArgs,
) -> Result<()> {
    let body = settings.requested();
    if body.is_empty() {
        return ctx.say("No settings changed.");
    }

    let org = ctx.org(organization_name)?;
    let org_id = id_of(&org);
    let networks: Vec<Value> = ctx
        .client
        .get_all(&format!("organizations/{org_id}/networks"), &[])?
        .into_iter()
        .filter(|net| matches_text(str_field(net, "name"), network_filter))
        .collect();
    if networks.is_empty() {
        bail!(
            "No network found matching '{}'",
            network_filter.unwrap_or_default()
        );
    }

    for net in &networks {
        ctx.say(format!(" {}", str_field(net, "name")))?;
    }
    let question = format!("Queue updates for {} networks?", networks.len());
    if !ctx.confirm(&question, confirm)? {
        bail!("Aborted");
    }

    let actions: Vec<Action> = networks
        .iter()
        .map(|net| {
            Action::update(
                format!("/networks/{}/settings", id_of(net)),
                Value::Object(body.clone()),
            )
        })
        .collect();

    let client = ctx.client;
    let interval = ctx.poll_interval;
    let batches = with_spinner("Waiting for action batch", || {
        action_batch::run(client, &org_id, &actions, interval)
    })?;

    let mut failed = 0;
    for batch in &batches {
        if batch.status.failed {
            failed += 1;
            ctx.say(format!("Action batch {} failed:", batch.id))?;
            for error in &batch.status.errors {
                ctx.say(format!(" - {error}"))?;
            }
        } else {
            ctx.say(format!("Action batch {} completed.", batch.id))?;
        }
    }
    if failed > 0 {
        bail!("{failed} of {} action batches failed", batches.len());
    }
    ctx.say(format!(
        "Updated {} for {} networks.",
        body.keys().cloned().collect::<Vec<_>>().join(", "),
        networks.len()
    ))
}
