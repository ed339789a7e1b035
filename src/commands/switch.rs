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
use crate::lookup::{device_label, id_of};
use crate::output::{Report, cell};
use crate::progress::{bar, with_spinner};
use crate::select::{has_any_tag, is_model, str_field, string_list, without_tags};
use crate::types::{DeviceModel, InterfaceMode, TrafficDirection};
use anyhow::{Result, bail};
use clap::Subcommand;
use serde_json::Value;
use tracing::{debug, info};

const STACK_MEMBER_ERROR: &str = "switches in switch stack";
const KBPS_PER_MBPS: f64 = 1024.0;

#[derive(Subcommand, Debug)]
pub enum SwitchCommand {
    /// List switch stacks in a network
    ListStacks {
        organization_name: String,
        network_name: String,
    },
    /// List L3 routed interfaces of a switch or its stack
    ListRoutingInterfaces {
        organization_name: String,
        network_name: String,
        serial: String,
        #[arg(long)]
        include_dhcp: bool,
    },
    /// Find the busiest connected switchports in a network
    ///
    /// Queries every switch, so this can take a while on large networks.
    DiagSwitchportTraffic {
        organization_name: String,
        network_name: String,
        #[arg(long, default_value_t = 100)]
        top: usize,
        #[arg(long, value_enum, default_value_t = TrafficDirection::Total)]
        sort_by: TrafficDirection,
        /// Only ports configured in this mode
        #[arg(long, value_enum)]
        interface_mode: Option<InterfaceMode>,
        /// Skip switches carrying any of these tags
        #[arg(long = "ignore-device-tag")]
        ignore_device_tags: Vec<String>,
        /// Skip ports carrying any of these tags
        #[arg(long = "ignore-switchport-tag")]
        ignore_switchport_tags: Vec<String>,
    },
}

pub fn handle(ctx: &mut Ctx, cmd: SwitchCommand) -> Result<()> {
    match cmd {
        SwitchCommand::ListStacks {
            organization_name,
            network_name,
        } => list_stacks(ctx, &organization_name, &network_name),
        SwitchCommand::ListRoutingInterfaces {
            organization_name,
            network_name,
            serial,
            include_dhcp,
        } => list_routing_interfaces(ctx, &organization_name, &network_name, &serial, include_dhcp),
        SwitchCommand::DiagSwitchportTraffic {
            organization_name,
            network_name,
            top,
            sort_by,
            interface_mode,
            ignore_device_tags,
            ignore_switchport_tags,
        } => diag_switchport_traffic(
            ctx,
            &organization_name,
            &network_name,
            &TrafficQuery {
                top,
                sort_by,
                interface_mode,
                ignore_device_tags,
                ignore_switchport_tags,
            },
        ),
    }
}

fn list_stacks(ctx: &mut Ctx, organization_name: &str, network_name: &str) -> Result<()> {
    let net = ctx.network(organization_name, network_name)?;
    let client = ctx.client;
    let path = format!("networks/{}/switch/stacks", id_of(&net));
    let stacks = with_spinner("Accessing API...", || client.get_list(&path, &[]))?;

    if stacks.is_empty() {
        return ctx.say("No switch stacks found.");
    }

    let mut report = Report::new(&["Name", "Serials"])
        .titled(format!("Switch stacks in {}", str_field(&net, "name")));
    for stack in &stacks {
        report.row([cell(stack, "name"), string_list(stack, "serials").join(", ")]);
    }
    ctx.show(&report)
}

/// Where routing interfaces live: on the switch itself or on its stack.
enum InterfaceOwner {
    Switch(String),
    Stack { network_id: String, stack_id: String },
}

impl InterfaceOwner {
    fn interfaces_path(&self) -> String {
        match self {
            InterfaceOwner::Switch(serial) => format!("devices/{serial}/switch/routing/interfaces"),
            InterfaceOwner::Stack {
                network_id,
                stack_id,
            } => format!("networks/{network_id}/switch/stacks/{stack_id}/routing/interfaces"),
        }
    }

    fn dhcp_path(&self, interface_id: &str) -> String {
        format!("{}/{interface_id}/dhcp", self.interfaces_path())
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn describe_dhcp(dhcp: &Value) -> String {
    match str_field(dhcp, "dhcpMode") {
        "dhcpDisabled" => "Disabled".into(),
        "dhcpServer" => match str_field(dhcp, "dnsNameserversOption") {
            "custom" => format!(
                "Server DNS: {}",
                string_list(dhcp, "dnsCustomNameservers").join(", ")
            ),
            option => format!("Server {}", capitalize(option)),
        },
        "dhcpRelay" => format!(
            "Relay Servers: {}",
            string_list(dhcp, "dhcpRelayServerIps").join(", ")
        ),
        other => capitalize(other),
    }
}

fn list_routing_interfaces(
    ctx: &mut Ctx,
    organization_name: &str,
    network_name: &str,
    serial: &str,
    include_dhcp: bool,
) -> Result<()> {
    let net = ctx.network(organization_name, network_name)?;
    let network_id = id_of(&net);
    let client = ctx.client;

    let mut owner = InterfaceOwner::Switch(serial.to_string());
    let interfaces = match client.get_list(&owner.interfaces_path(), &[]) {
        Ok(interfaces) => interfaces,
        Err(err) if err.mentions(STACK_MEMBER_ERROR) => {
            ctx.say("This switch is a member of a stack.")?;
            let stacks = client.get_list(&format!("networks/{network_id}/switch/stacks"), &[])?;
            let Some(stack) = stacks
                .iter()
                .find(|stack| string_list(stack, "serials").iter().any(|member| member == serial))
            else {
                bail!("No switch stack in {} contains {serial}", str_field(&net, "name"));
            };
            info!(serial, stack = %id_of(stack), "using stack routing interfaces");
            owner = InterfaceOwner::Stack {
                network_id: network_id.clone(),
                stack_id: id_of(stack),
            };
            client.get_list(&owner.interfaces_path(), &[])?
        }
        Err(err) => return Err(err.into()),
    };

    if interfaces.is_empty() {
        return ctx.say("No routing interfaces found.");
    }

    let mut report =
        Report::new(&["Name", "Subnet", "Interface IP", "VLAN ID"]).titled("Routing interfaces");
    if include_dhcp {
        report.push_header("DHCP");
    }
    for interface in &interfaces {
        let mut row = vec![
            cell(interface, "name"),
            cell(interface, "subnet"),
            cell(interface, "interfaceIp"),
            cell(interface, "vlanId"),
        ];
        if include_dhcp {
            let path = owner.dhcp_path(str_field(interface, "interfaceId"));
            let dhcp = with_spinner("Accessing API...", || client.get(&path, &[]))?;
            row.push(describe_dhcp(&dhcp));
        }
        report.row(row);
    }
    ctx.show(&report)
}

#[derive(Debug)]
struct TrafficQuery {
    top: usize,
    sort_by: TrafficDirection,
    interface_mode: Option<InterfaceMode>,
    ignore_device_tags: Vec<String>,
    ignore_switchport_tags: Vec<String>,
}

/// Connected ports of one switch, each status record overlaid with the
/// port's configuration and tagged with the switch name.
fn merge_ports(switch_name: &str, configs: &[Value], statuses: &[Value]) -> Vec<Value> {
    statuses
        .iter()
        .filter(|status| str_field(status, "status") == "Connected")
        .filter_map(|status| {
            let port_id = status.get("portId")?;
            let config = configs.iter().find(|c| c.get("portId") == Some(port_id));
            let mut merged = status.as_object()?.clone();
            if let Some(config) = config.and_then(Value::as_object) {
                merged.extend(config.clone());
            }
            merged.insert("switch_name".into(), Value::String(switch_name.to_string()));
            Some(Value::Object(merged))
        })
        .collect()
}

fn traffic_kbps(port: &Value, direction: TrafficDirection) -> f64 {
    port.get("trafficInKbps")
        .and_then(|t| t.get(direction.as_str()))
        .and_then(Value::as_f64)
        .unwrap_or(0.0)
}

fn mbps(kbps: f64) -> String {
    format!("{:.2} Mbps", kbps / KBPS_PER_MBPS)
}

/// Highest traffic first; ties keep collection order.
fn rank_ports(mut ports: Vec<Value>, direction: TrafficDirection, top: usize) -> Vec<Value> {
    ports.sort_by(|a, b| {
        traffic_kbps(b, direction)
            .partial_cmp(&traffic_kbps(a, direction))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ports.truncate(top);
    ports
}

fn discovery_name(port: &Value) -> String {
    ["cdp", "lldp"]
        .iter()
        .find_map(|key| port.get(*key))
        .map(|d| cell(d, "systemName"))
        .unwrap_or_default()
}

fn diag_switchport_traffic(
    ctx: &mut Ctx,
    organization_name: &str,
    network_name: &str,
    query: &TrafficQuery,
) -> Result<()> {
    let net = ctx.network(organization_name, network_name)?;
    let client = ctx.client;
    let path = format!("networks/{}/devices", id_of(&net));
    let devices = with_spinner("Accessing API...", || client.get_list(&path, &[]))?;

    ctx.say("Analyzing each switchport on the network, this may take a few minutes")?;
    let progress = bar(devices.len() as u64);
    let mut ports = Vec::new();
    for device in &devices {
        let name = device_label(device);
        progress.set_message(format!("Processing device '{name}'"));
        progress.inc(1);

        if !is_model(device, DeviceModel::Ms) || has_any_tag(device, &query.ignore_device_tags) {
            continue;
        }

        let serial = str_field(device, "serial");
        let configs = client.get_list(&format!("devices/{serial}/switch/ports"), &[])?;
        let statuses = client.get_list(&format!("devices/{serial}/switch/ports/statuses"), &[])?;
        let merged = without_tags(
            merge_ports(&name, &configs, &statuses),
            &query.ignore_switchport_tags,
        );
        debug!(serial, connected = merged.len(), "collected switchports");

        ports.extend(merged.into_iter().filter(|port| {
            query
                .interface_mode
                .is_none_or(|mode| str_field(port, "type") == mode.as_str())
        }));
    }
    progress.finish_with_message(format!("Processed {} devices.", devices.len()));

    let ports = rank_ports(ports, query.sort_by, query.top);
    let mut report = Report::new(&[
        "Device",
        "Port",
        "Status",
        "Traffic (Total)",
        "Traffic (Sent)",
        "Traffic (Received)",
        "# of Clients",
        "CDP/LLDP",
        "Errors/Warnings",
    ])
    .titled(format!("Top {} switchports", query.top));
    for port in &ports {
        let mut problems = string_list(port, "errors");
        problems.extend(string_list(port, "warnings"));
        report.row([
            cell(port, "switch_name"),
            format!("{} ({})", cell(port, "portId"), cell(port, "name")),
            format!("{} ({})", cell(port, "status"), cell(port, "speed")),
            mbps(traffic_kbps(port, TrafficDirection::Total)),
            mbps(traffic_kbps(port, TrafficDirection::Sent)),
            mbps(traffic_kbps(port, TrafficDirection::Recv)),
            cell(port, "clientCount"),
            discovery_name(port),
            problems.join(", "),
        ]);
    }
    ctx.show(&report)
}
