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

use super::{Ctx, require_some};
use crate::lookup::{device_label, id_of};
use crate::output::{Report, cell, value_to_str};
use crate::poll::poll_until;
use crate::progress::with_spinner;
use crate::select::{
    TagChange, apply_tag_changes, bool_field, filter_by_model, sort_by_key, str_field, tags,
};
use crate::types::{DeviceModel, DeviceSortKey};
use anyhow::{Result, bail};
use clap::Subcommand;
use serde_json::{Map, Value, json};
use tracing::debug;

#[derive(Subcommand, Debug)]
pub enum DevicesCommand {
    /// List devices in a network
    List {
        organization_name: String,
        network_name: String,
        /// Only devices of this model family
        #[arg(long, value_enum)]
        model: Option<DeviceModel>,
        #[arg(long, value_enum, default_value_t = DeviceSortKey::Model)]
        sort_by: DeviceSortKey,
        #[arg(long)]
        sort_reverse: bool,
    },
    /// Update name, address, notes or tags of devices
    Update {
        #[arg(long = "serial", required = true)]
        serials: Vec<String>,
        #[arg(long)]
        name: Option<String>,
        /// Street address; also moves the map marker
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long = "add-tag")]
        add_tags: Vec<String>,
        #[arg(long = "remove-tag")]
        remove_tags: Vec<String>,
    },
    /// Show CDP/LLDP neighbours of devices
    ShowLldp {
        #[arg(long = "serial")]
        serials: Vec<String>,
        /// Add every device of this organization
        #[arg(long)]
        organization_name: Option<String>,
        /// Narrow --organization-name to one network
        #[arg(long, requires = "organization_name")]
        network_name: Option<String>,
    },
    /// Reboot devices
    Reboot {
        #[arg(long = "serial")]
        serials: Vec<String>,
    },
    /// Blink device LEDs
    BlinkLed {
        #[arg(long = "serial")]
        serials: Vec<String>,
        /// Seconds
        #[arg(long, default_value_t = 20, value_parser = clap::value_parser!(u32).range(5..=120))]
        duration: u32,
    },
    /// Ping from a device to a target, or to the Meraki cloud
    Ping {
        serial: String,
        /// IP or FQDN; the Meraki cloud when omitted
        #[arg(long)]
        target: Option<String>,
        #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u32).range(1..=5))]
        count: u32,
    },
}

pub fn handle(ctx: &mut Ctx, cmd: DevicesCommand) -> Result<()> {
    match cmd {
        DevicesCommand::List {
            organization_name,
            network_name,
            model,
            sort_by,
            sort_reverse,
        } => list(ctx, &organization_name, &network_name, model, sort_by, sort_reverse),
        DevicesCommand::Update {
            serials,
            name,
            address,
            notes,
            add_tags,
            remove_tags,
        } => update(
            ctx,
            &serials,
            &DeviceChanges {
                name,
                address,
                notes,
                add_tags,
                remove_tags,
            },
        ),
        DevicesCommand::ShowLldp {
            serials,
            organization_name,
            network_name,
        } => show_lldp(
            ctx,
            &serials,
            organization_name.as_deref(),
            network_name.as_deref(),
        ),
        DevicesCommand::Reboot { serials } => reboot(ctx, &serials),
        DevicesCommand::BlinkLed { serials, duration } => blink_led(ctx, &serials, duration),
        DevicesCommand::Ping {
            serial,
            target,
            count,
        } => ping(ctx, &serial, target.as_deref(), count),
    }
}

fn list(
    ctx: &mut Ctx,
    organization_name: &str,
    network_name: &str,
    model: Option<DeviceModel>,
    sort_by: DeviceSortKey,
    reverse: bool,
) -> Result<()> {
    let net = ctx.network(organization_name, network_name)?;
    let net_name = str_field(&net, "name");
    let mut devices = ctx
        .client
        .get_list(&format!("networks/{}/devices", id_of(&net)), &[])?;

    if let Some(model) = model {
        devices = filter_by_model(devices, model);
    }
    sort_by_key(&mut devices, sort_by.as_str(), reverse);

    let mut report = Report::new(&["Name", "Serial", "Network", "Model", "Tags", "Firmware"])
        .titled(format!("Devices in {net_name}"));
    for device in &devices {
        report.row([
            cell(device, "name"),
            cell(device, "serial"),
            net_name.to_string(),
            cell(device, "model"),
            tags(device).join(","),
            cell(device, "firmware"),
        ]);
    }
    ctx.show(&report)
}

#[derive(Debug, Default)]
struct DeviceChanges {
    name: Option<String>,
    address: Option<String>,
    notes: Option<String>,
    add_tags: Vec<String>,
    remove_tags: Vec<String>,
}

impl DeviceChanges {
    /// Update body for one device plus a line per applied change.
    fn body_for(&self, device: &Value) -> (Map<String, Value>, Vec<String>) {
        let mut body = Map::new();
        let mut notes = Vec::new();
        let mut label = device_label(device);

        if let Some(name) = &self.name {
            notes.push(format!(" Renamed {label} to {name}"));
            body.insert("name".into(), json!(name));
            label = name.clone();
        }
        if let Some(address) = &self.address {
            notes.push(format!(" Assigned address to {label}"));
            body.insert("address".into(), json!(address));
            body.insert("moveMapMarker".into(), json!(true));
        }
        if let Some(text) = &self.notes {
            notes.push(format!(" Added notes to {label}"));
            body.insert("notes".into(), json!(text));
        }
        if !self.add_tags.is_empty() || !self.remove_tags.is_empty() {
            let (new_tags, changes) =
                apply_tag_changes(&tags(device), &self.add_tags, &self.remove_tags);
            for change in changes {
                notes.push(match change {
                    TagChange::Added(tag) => format!(" Added tag {tag} to {label}"),
                    TagChange::Removed(tag) => format!(" Removed tag {tag} from {label}"),
                });
            }
            body.insert("tags".into(), json!(new_tags));
        }
        (body, notes)
    }
}

fn update(ctx: &mut Ctx, serials: &[String], changes: &DeviceChanges) -> Result<()> {
    require_some(serials, "You must specify a device using --serial")?;

    let mut devices = Vec::new();
    for serial in serials {
        let device = ctx.client.get(&format!("devices/{serial}"), &[])?;
        ctx.say(format!(
            "Found device named {} with serial {serial}",
            device_label(&device)
        ))?;
        devices.push(device);
    }

    if changes.name.is_some() && devices.len() > 1 {
        ctx.say(format!("You specified a name for {} devices", devices.len()))?;
        if !ctx.confirm(" Do you want to assign the same name to multiple devices?", true)? {
            bail!("Aborted");
        }
    }

    for device in &devices {
        let (body, notes) = changes.body_for(device);
        for note in &notes {
            ctx.say(note)?;
        }
        if body.is_empty() {
            ctx.say(format!("No changes for {}", device_label(device)))?;
            continue;
        }
        let serial = str_field(device, "serial");
        let updated = ctx.client.put(&format!("devices/{serial}"), &Value::Object(body))?;
        ctx.say(format!("Updated device {}", device_label(&updated)))?;
    }
    Ok(())
}

/// One row per port, followed by one per CDP and LLDP neighbour.
fn lldp_report(device: &Value, neighbours: &Value) -> Report {
    let mut report = Report::new(&["Port", "Type", "System Name", "Remote Port", "Mgmt Address"])
        .titled(format!("{} ({})", device_label(device), str_field(device, "serial")));
    let Some(ports) = neighbours.get("ports").and_then(Value::as_object) else {
        return report;
    };
    for (port, data) in ports {
        report.row([port.as_str()]);
        if let Some(cdp) = data.get("cdp") {
            report.row([
                String::new(),
                "CDP".into(),
                cell(cdp, "deviceId"),
                cell(cdp, "portId"),
                cell(cdp, "address"),
            ]);
        }
        if let Some(lldp) = data.get("lldp") {
            report.row([
                String::new(),
                "LLDP".into(),
                cell(lldp, "systemName"),
                cell(lldp, "portId"),
                cell(lldp, "managementAddress"),
            ]);
        }
    }
    report
}

fn show_lldp(
    ctx: &mut Ctx,
    serials: &[String],
    organization_name: Option<&str>,
    network_name: Option<&str>,
) -> Result<()> {
    let mut devices = Vec::new();
    for serial in serials {
        devices.push(ctx.client.get(&format!("devices/{serial}"), &[])?);
    }

    match (organization_name, network_name) {
        (Some(org), Some(net)) => {
            let net = ctx.network(org, net)?;
            devices.extend(
                ctx.client
                    .get_list(&format!("networks/{}/devices", id_of(&net)), &[])?,
            );
        }
        (Some(org), None) => {
            let org = ctx.org(org)?;
            devices.extend(
                ctx.client
                    .get_all(&format!("organizations/{}/devices", id_of(&org)), &[])?,
            );
        }
        (None, Some(_)) => {
            bail!("You cannot specify a network name without an organization name.")
        }
        (None, None) => {}
    }

    if devices.is_empty() {
        bail!("No devices found.");
    }

    ctx.say(format!("Getting CDP/LLDP data for {} devices", devices.len()))?;
    let mut reports = Vec::new();
    for device in &devices {
        let serial = str_field(device, "serial");
        let neighbours = ctx.client.get(&format!("devices/{serial}/lldpCdp"), &[])?;
        let empty = neighbours
            .get("ports")
            .and_then(Value::as_object)
            .is_none_or(|ports| ports.is_empty());
        if empty {
            ctx.say(format!("No CDP/LLDP data found for {}", device_label(device)))?;
            continue;
        }
        reports.push(lldp_report(device, &neighbours));
    }
    ctx.show_all(&reports)
}

fn reboot(ctx: &mut Ctx, serials: &[String]) -> Result<()> {
    require_some(serials, "No serial numbers entered.")?;
    for serial in serials {
        let result = ctx.client.post(&format!("devices/{serial}/reboot"), &json!({}))?;
        if bool_field(&result, "success") {
            ctx.say(format!("Rebooted device with SN {serial}"))?;
        } else {
            ctx.say(format!("Unable to reboot device with SN {serial}"))?;
        }
    }
    Ok(())
}

fn blink_led(ctx: &mut Ctx, serials: &[String], duration: u32) -> Result<()> {
    require_some(serials, "No serial numbers entered.")?;
    for serial in serials {
        let blink = ctx.client.post(
            &format!("devices/{serial}/blinkLeds"),
            &json!({"duration": duration}),
        )?;
        ctx.say(format!(
            "Blinking {serial} LEDs for {} seconds",
            value_to_str(blink.get("duration").unwrap_or(&Value::Null))
        ))?;
    }
    Ok(())
}

fn ping_pending(job: &Value) -> bool {
    matches!(str_field(job, "status"), "new" | "running")
}

/// Lines in the shape of UNIX `ping` output.
fn ping_lines(target: &str, results: &Value) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(replies) = results.get("replies").and_then(Value::as_array) {
        for reply in replies {
            lines.push(format!(
                "{} bytes from {target}: icmp_seq={} time={}",
                cell(reply, "size"),
                cell(reply, "sequenceId"),
                cell(reply, "latency"),
            ));
        }
    }
    lines.push(String::new());
    lines.push(format!("--- {target} ping statistics ---"));
    lines.push(format!(
        "{} packets transmitted, {} packets received, {}% packet loss",
        cell(results, "sent"),
        cell(results, "received"),
        results
            .pointer("/loss/percentage")
            .map(value_to_str)
            .unwrap_or_default(),
    ));
    if let Some(latencies) = results.get("latencies") {
        lines.push(format!(
            "round-trip min/avg/max = {}/{}/{}",
            cell(latencies, "minimum"),
            cell(latencies, "average"),
            cell(latencies, "maximum"),
        ));
    }
    lines
}

fn ping(ctx: &mut Ctx, serial: &str, target: Option<&str>, count: u32) -> Result<()> {
    let client = ctx.client;
    let interval = ctx.poll_interval;
    let (kind, body) = match target {
        Some(target) => ("ping", json!({"target": target, "count": count})),
        None => ("pingDevice", json!({"count": count})),
    };
    let create_path = format!("devices/{serial}/liveTools/{kind}");

    let job = with_spinner("Pinging device", || {
        let job = client.post(&create_path, &body)?;
        debug!(serial, job = %job, "ping job created");
        poll_until(
            job,
            interval,
            |job| client.get(&format!("{create_path}/{}", str_field(job, "pingId")), &[]),
            |job| !ping_pending(job),
        )
    })?;

    let target = target.unwrap_or("Meraki cloud");
    ctx.say(format!("Ping from Meraki device {serial}"))?;
    let results = job.get("results").cloned().unwrap_or(Value::Null);
    for line in ping_lines(target, &results) {
        ctx.say(line)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::{client, mock_network, run};
    use crate::output::OutputFormat;
    use crate::prompt::ScriptedPrompter;
    use httpmock::prelude::*;

    fn mock_devices(server: &MockServer) {
        mock_network(server, json!({"id": "N_1", "name": "HQ"}));
        server.mock(|when, then| {
            when.method(GET).path("/networks/N_1/devices");
            then.status(200).json_body(json!([
                {"name": "lobby-ap", "serial": "Q2AA", "model": "MR46", "tags": ["lobby"], "firmware": "wireless-29-5"},
                {"name": "core-sw", "serial": "Q2BB", "model": "MS425-32", "tags": [], "firmware": "switch-16-7"},
                {"name": "edge-fw", "serial": "Q2CC", "model": "MX85", "tags": ["edge"], "firmware": "wired-18-1"}
            ]));
        });
    }

    #[test]
    fn list_filters_by_model() {
        let server = MockServer::start();
        mock_devices(&server);

        let client = client(&server);
        let (result, out) = run(&client, &mut ScriptedPrompter::default(), |ctx| {
            list(ctx, "Acme", "HQ", Some(DeviceModel::Ms), DeviceSortKey::Name, false)
        });

        result.unwrap();
        assert!(out.starts_with("Devices in HQ"));
        assert!(out.contains("core-sw"));
        assert!(!out.contains("lobby-ap"));
    }

    #[test]
    fn list_sorts_by_model_descending() {
        let server = MockServer::start();
        mock_devices(&server);

        let client = client(&server);
        let (result, out) = run(&client, &mut ScriptedPrompter::default(), |ctx| {
            list(ctx, "Acme", "HQ", None, DeviceSortKey::Model, true)
        });

        result.unwrap();
        let ms = out.find("MS425-32").unwrap();
        let mr = out.find("MR46").unwrap();
        assert!(ms < mr);
    }

    #[test]
    fn changes_build_partial_body() {
        let changes = DeviceChanges {
            address: Some("1 Main St".into()),
            add_tags: vec!["new".into(), "lobby".into()],
            remove_tags: vec!["old".into()],
            ..DeviceChanges::default()
        };
        let device = json!({"serial": "Q2AA", "name": "ap", "tags": ["lobby", "old"]});
        let (body, notes) = changes.body_for(&device);

        assert_eq!(body["address"], "1 Main St");
        assert_eq!(body["moveMapMarker"], true);
        assert_eq!(body["tags"], json!(["lobby", "new"]));
        assert!(!body.contains_key("name"));
        assert_eq!(notes.len(), 3);
    }

    #[test]
    fn renaming_several_devices_requires_confirmation() {
        let server = MockServer::start();
        for serial in ["Q2AA", "Q2BB"] {
            server.mock(|when, then| {
                when.method(GET).path(format!("/devices/{serial}"));
                then.status(200).json_body(json!({"serial": serial, "name": serial}));
            });
        }
        let put = server.mock(|when, then| {
            when.method(PUT).path_contains("/devices/");
            then.status(200).json_body(json!({"serial": "x", "name": "twin"}));
        });

        let changes = DeviceChanges {
            name: Some("twin".into()),
            ..DeviceChanges::default()
        };
        let client = client(&server);
        let serials = vec!["Q2AA".to_string(), "Q2BB".to_string()];
        let mut prompter = ScriptedPrompter::confirming(false);
        let (result, _) = run(&client, &mut prompter, |ctx| update(ctx, &serials, &changes));

        assert!(result.is_err());
        put.assert_hits(0);
    }

    #[test]
    fn lldp_rows_per_neighbour() {
        let device = json!({"serial": "Q2BB", "name": "core-sw"});
        let neighbours = json!({"ports": {
            "1": {
                "cdp": {"deviceId": "upstream", "portId": "Gi0/1", "address": "10.0.0.1"},
                "lldp": {"systemName": "upstream", "portId": "Gi0/1", "managementAddress": "10.0.0.1"}
            }
        }});
        let mut out = Vec::new();
        lldp_report(&device, &neighbours)
            .render(OutputFormat::Json, &mut out)
            .unwrap();
        let rows: Vec<Value> = serde_json::from_slice(&out).unwrap();
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn network_without_org_is_rejected() {
        let server = MockServer::start();
        let client = client(&server);
        let (result, _) = run(&client, &mut ScriptedPrompter::default(), |ctx| {
            show_lldp(ctx, &[], None, Some("HQ"))
        });
        assert!(result.unwrap_err().to_string().contains("without an organization"));
    }

    #[test]
    fn reboot_reports_each_device() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/devices/Q2AA/reboot");
            then.status(202).json_body(json!({"success": true}));
        });
        server.mock(|when, then| {
            when.method(POST).path("/devices/Q2BB/reboot");
            then.status(202).json_body(json!({"success": false}));
        });

        let client = client(&server);
        let serials = vec!["Q2AA".to_string(), "Q2BB".to_string()];
        let (result, out) = run(&client, &mut ScriptedPrompter::default(), |ctx| {
            reboot(ctx, &serials)
        });

        result.unwrap();
        assert!(out.contains("Rebooted device with SN Q2AA"));
        assert!(out.contains("Unable to reboot device with SN Q2BB"));
    }

    #[test]
    fn ping_polls_until_done() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST)
                .path("/devices/Q2AA/liveTools/ping")
                .json_body(json!({"target": "8.8.8.8", "count": 2}));
            then.status(201).json_body(json!({"pingId": "P1", "status": "new"}));
        });
        let poll = server.mock(|when, then| {
            when.method(GET).path("/devices/Q2AA/liveTools/ping/P1");
            then.status(200).json_body(json!({
                "pingId": "P1",
                "status": "complete",
                "results": {
                    "sent": 2,
                    "received": 2,
                    "loss": {"percentage": 0},
                    "latencies": {"minimum": 1.1, "average": 1.5, "maximum": 1.9},
                    "replies": [
                        {"sequenceId": 0, "size": 64, "latency": 1.1},
                        {"sequenceId": 1, "size": 64, "latency": 1.9}
                    ]
                }
            }));
        });

        let client = client(&server);
        let (result, out) = run(&client, &mut ScriptedPrompter::default(), |ctx| {
            ping(ctx, "Q2AA", Some("8.8.8.8"), 2)
        });

        result.unwrap();
        poll.assert_hits(1);
        assert!(out.contains("64 bytes from 8.8.8.8: icmp_seq=1 time=1.9"));
        assert!(out.contains("2 packets transmitted, 2 packets received, 0% packet loss"));
        assert!(out.contains("round-trip min/avg/max = 1.1/1.5/1.9"));
    }

    #[test]
    fn ping_lines_without_replies() {
        let summary = json!({"sent": 1, "received": 0, "loss": {"percentage": 100}});
        let lines = ping_lines("Meraki cloud", &summary);
        assert_eq!(lines[1], "--- Meraki cloud ping statistics ---");
        assert_eq!(lines.len(), 3);
    }
}
