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

//! MX security appliance commands: VLANs, static routes and 1:1 NAT.

use super::{Ctx, require_some};
use crate::client::ApiError;
use crate::flags::{NatSpec, PortRule, parse_all, parse_nat, parse_port_rule, parse_route};
use crate::lookup::id_of;
use crate::output::{Report, cell, enabled};
use crate::progress::with_spinner;
use crate::select::{bool_field, matches_text, str_field, string_list};
use crate::types::Uplink;
use anyhow::{Result, bail};
use clap::Subcommand;
use serde_json::{Value, json};
use tracing::warn;

#[derive(Subcommand, Debug)]
pub enum ApplianceCommand {
    /// List VLANs, or the single LAN when VLANs are disabled
    ListVlans {
        organization_name: String,
        network_name: String,
        /// Include DHCP handling for each subnet
        #[arg(long)]
        include_dhcp: bool,
    },
    /// List static routes
    ListRoutes {
        organization_name: String,
        network_name: String,
        /// Only routes whose name contains this text
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        subnet: Option<String>,
        #[arg(long)]
        gateway: Option<String>,
    },
    /// Add static routes
    AddStaticRoute {
        organization_name: String,
        network_name: String,
        /// `cidr`, `name!cidr` or `name!cidr!nexthop`; repeatable
        #[arg(long = "route")]
        routes: Vec<String>,
        /// Next hop for routes given without one
        #[arg(long)]
        default_next_hop: Option<String>,
    },
    /// Add 1:1 NAT rules
    CreateStaticNat {
        organization_name: String,
        network_name: String,
        /// `publicIp!lanIp` or `name!publicIp!lanIp`; repeatable
        #[arg(long = "nat")]
        nats: Vec<String>,
        /// `protocol!ports` or `protocol!ports!allowedIps`, applied to every new rule
        #[arg(long = "port")]
        ports: Vec<String>,
        #[arg(long, value_enum, default_value_t = Uplink::Internet1)]
        uplink: Uplink,
        #[arg(long)]
        no_confirm: bool,
    },
}

pub fn handle(ctx: &mut Ctx, cmd: ApplianceCommand) -> Result<()> {
    match cmd {
        ApplianceCommand::ListVlans {
            organization_name,
            network_name,
            include_dhcp,
        } => list_vlans(ctx, &organization_name, &network_name, include_dhcp),
        ApplianceCommand::ListRoutes {
            organization_name,
            network_name,
            name,
            subnet,
            gateway,
        } => list_routes(
            ctx,
            &organization_name,
            &network_name,
            &RouteFilter {
                name,
                subnet,
                gateway,
            },
        ),
        ApplianceCommand::AddStaticRoute {
            organization_name,
            network_name,
            routes,
            default_next_hop,
        } => add_static_routes(
            ctx,
            &organization_name,
            &network_name,
            &routes,
            default_next_hop.as_deref(),
        ),
        ApplianceCommand::CreateStaticNat {
            organization_name,
            network_name,
            nats,
            ports,
            uplink,
            no_confirm,
        } => create_static_nat(
            ctx,
            &organization_name,
            &network_name,
            &nats,
            &ports,
            uplink,
            !no_confirm,
        ),
    }
}

fn dhcp_cells(vlan: &Value) -> [String; 2] {
    let handling = str_field(vlan, "dhcpHandling");
    let details = if handling.contains("Relay") {
        format!("Relays: {}", string_list(vlan, "dhcpRelayServerIps").join(", "))
    } else if handling.contains("DHCP server") {
        format!("Lease time: {}", cell(vlan, "dhcpLeaseTime"))
    } else {
        String::new()
    };
    [handling.to_string(), details]
}

fn list_vlans(
    ctx: &mut Ctx,
    organization_name: &str,
    network_name: &str,
    include_dhcp: bool,
) -> Result<()> {
    let net = ctx.network(organization_name, network_name)?;
    let net_id = id_of(&net);
    let client = ctx.client;

    let vlans = with_spinner("Getting VLANs", || -> Result<Vec<Value>, ApiError> {
        let settings = client.get(&format!("networks/{net_id}/appliance/vlans/settings"), &[])?;
        if bool_field(&settings, "vlansEnabled") {
            client.get_list(&format!("networks/{net_id}/appliance/vlans"), &[])
        } else {
            let mut lan = client.get(&format!("networks/{net_id}/appliance/singleLan"), &[])?;
            if let Some(obj) = lan.as_object_mut() {
                obj.entry("name").or_insert_with(|| json!("Single LAN"));
            }
            Ok(vec![lan])
        }
    })?;

    let mut report = Report::new(&["Name", "ID", "Subnet", "Appliance IP"]);
    if include_dhcp {
        report.push_header("DHCP");
        report.push_header("Details");
    }
    for vlan in &vlans {
        let mut row = vec![
            cell(vlan, "name"),
            id_of(vlan),
            cell(vlan, "subnet"),
            cell(vlan, "applianceIp"),
        ];
        if include_dhcp {
            row.extend(dhcp_cells(vlan));
        }
        report.row(row);
    }
    ctx.show(&report)
}

#[derive(Debug, Default)]
struct RouteFilter {
    name: Option<String>,
    subnet: Option<String>,
    gateway: Option<String>,
}

impl RouteFilter {
    fn matches(&self, route: &Value) -> bool {
        matches_text(str_field(route, "name"), self.name.as_deref())
            && matches_text(str_field(route, "subnet"), self.subnet.as_deref())
            && matches_text(str_field(route, "gatewayIp"), self.gateway.as_deref())
    }
}

fn list_routes(
    ctx: &mut Ctx,
    organization_name: &str,
    network_name: &str,
    filter: &RouteFilter,
) -> Result<()> {
    let net = ctx.network(organization_name, network_name)?;
    let client = ctx.client;
    let path = format!("networks/{}/appliance/staticRoutes", id_of(&net));
    let routes = with_spinner("Getting routes", || client.get_list(&path, &[]))?;

    ctx.say(format!("Found {} total routes.", routes.len()))?;
    if routes.is_empty() {
        bail!("No static routes in {}", str_field(&net, "name"));
    }

    let mut report = Report::new(&["Name", "Subnet", "Gateway", "Enabled"]);
    for route in routes.iter().filter(|r| filter.matches(r)) {
        report.row([
            cell(route, "name"),
            cell(route, "subnet"),
            cell(route, "gatewayIp"),
            enabled(bool_field(route, "enabled")).to_string(),
        ]);
    }
    ctx.show(&report)
}

fn add_static_routes(
    ctx: &mut Ctx,
    organization_name: &str,
    network_name: &str,
    routes: &[String],
    default_next_hop: Option<&str>,
) -> Result<()> {
    require_some(routes, "No routes provided.")?;
    let specs = parse_all(routes, |input| parse_route(input, default_next_hop))?;

    let net = ctx.network(organization_name, network_name)?;
    let path = format!("networks/{}/appliance/staticRoutes", id_of(&net));
    let client = ctx.client;

    let mut failed = 0;
    for spec in &specs {
        let body = json!({
            "name": spec.name,
            "subnet": spec.subnet.to_string(),
            "gatewayIp": spec.next_hop.to_string(),
        });
        match with_spinner("Adding static route", || client.post(&path, &body)) {
            Ok(_) => ctx.say(format!(
                "Created new route {} with subnet {}",
                spec.name, spec.subnet
            ))?,
            Err(err) => {
                warn!(route = %spec.name, error = %err, "route rejected");
                failed += 1;
                ctx.say(format!("Failed to create route {}:", spec.name))?;
                for message in err.messages() {
                    ctx.say(format!(" - {message}"))?;
                }
            }
        }
    }

    if failed > 0 {
        bail!("{failed} of {} routes were not created", specs.len());
    }
    Ok(())
}

fn describe_inbound(rule: &Value) -> String {
    let Some(allowed) = rule.get("allowedInbound").and_then(Value::as_array) else {
        return String::new();
    };
    allowed
        .iter()
        .map(|entry| {
            format!(
                "{} {} from {}",
                str_field(entry, "protocol"),
                string_list(entry, "destinationPorts").join(","),
                string_list(entry, "allowedIps").join(","),
            )
        })
        .collect::<Vec<_>>()
        .join("; ")
}

fn nat_report(rules: &[Value], title: &str) -> Report {
    let mut report =
        Report::new(&["Name", "Public IP", "LAN IP", "Uplink", "Allowed Inbound"]).titled(title);
    for rule in rules {
        report.row([
            cell(rule, "name"),
            cell(rule, "publicIp"),
            cell(rule, "lanIp"),
            cell(rule, "uplink"),
            describe_inbound(rule),
        ]);
    }
    report
}

fn nat_rule(spec: &NatSpec, uplink: Uplink, ports: &[PortRule]) -> Value {
    json!({
        "name": spec.name,
        "lanIp": spec.lan_ip.to_string(),
        "publicIp": spec.public_ip.to_string(),
        "uplink": uplink.as_str(),
        "allowedInbound": ports,
    })
}

fn create_static_nat(
    ctx: &mut Ctx,
    organization_name: &str,
    network_name: &str,
    nats: &[String],
    ports: &[String],
    uplink: Uplink,
    confirm: bool,
) -> Result<()> {
    require_some(nats, "No NATs provided.")?;
    let ports = parse_all(ports, parse_port_rule)?;
    let nats = parse_all(nats, parse_nat)?;

    let net = ctx.network(organization_name, network_name)?;
    let path = format!("networks/{}/appliance/firewall/oneToOneNatRules", id_of(&net));
    let current = ctx.client.get(&path, &[])?;
    let mut rules = current
        .get("rules")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let new_rules: Vec<Value> = nats.iter().map(|spec| nat_rule(spec, uplink, &ports)).collect();
    ctx.show_all(&[
        nat_report(&rules, "Existing 1:1 NAT Rules"),
        nat_report(&new_rules, "New 1:1 NAT Rules"),
    ])?;

    if !ctx.confirm("Do you want to continue adding new rules?", confirm)? {
        bail!("Rules not added");
    }

    rules.extend(new_rules);
    ctx.client.put(&path, &json!({"rules": rules}))?;
    ctx.say(format!("Added {} 1:1 NAT rules", nats.len()))
}
