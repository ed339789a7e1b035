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
use crate::flags::{parse_all, parse_ip_object};
use crate::lookup::{find_orgs_by_name, id_of};
use crate::output::{Report, cell, enabled};
use crate::progress::with_spinner;
use crate::select::str_field;
use anyhow::{Result, bail};
use clap::Subcommand;
use serde_json::{Value, json};
use tracing::warn;

#[derive(Subcommand, Debug)]
pub enum OrganizationsCommand {
    /// List organizations
    List {
        /// Only organizations whose name contains this text
        #[arg(long)]
        name: Option<String>,
        /// Count networks and devices of API-enabled organizations
        #[arg(long)]
        include_counts: bool,
    },
    /// Show, enable or disable API access for an organization
    Api {
        organization_name: String,
        #[arg(long, conflicts_with = "disable")]
        enable: bool,
        #[arg(long)]
        disable: bool,
    },
    /// Create IP policy objects, optionally grouped
    CreateIpObjects {
        organization_name: String,
        /// `cidr` or `name!cidr`; repeatable
        #[arg(long = "object")]
        objects: Vec<String>,
        /// Create a group containing the new objects
        #[arg(long)]
        group_name: Option<String>,
    },
    /// List the API request log of an organization
    ListApiRequests { organization_name: String },
}

pub fn handle(ctx: &mut Ctx, cmd: OrganizationsCommand) -> Result<()> {
    match cmd {
        OrganizationsCommand::List {
            name,
            include_counts,
        } => list(ctx, name.as_deref(), include_counts),
        OrganizationsCommand::Api {
            organization_name,
            enable,
            disable,
        } => api(ctx, &organization_name, super::toggle(enable, disable)),
        OrganizationsCommand::CreateIpObjects {
            organization_name,
            objects,
            group_name,
        } => create_ip_objects(ctx, &organization_name, &objects, group_name.as_deref()),
        OrganizationsCommand::ListApiRequests { organization_name } => {
            list_api_requests(ctx, &organization_name)
        }
    }
}

fn api_enabled(org: &Value) -> bool {
    org.pointer("/api/enabled")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

fn list(ctx: &mut Ctx, name: Option<&str>, include_counts: bool) -> Result<()> {
    let client = ctx.client;
    let orgs = with_spinner("Accessing API...", || find_orgs_by_name(client, name))?;
    ctx.say(format!("Found {} organizations", orgs.len()))?;
    if orgs.is_empty() {
        bail!("No organization found matching '{}'", name.unwrap_or_default());
    }

    let mut report =
        Report::new(&["Name", "ID", "API", "Networks", "Devices"]).titled("Organizations");
    for org in &orgs {
        let id = id_of(org);
        let mut networks = String::new();
        let mut devices = String::new();
        if include_counts && api_enabled(org) {
            let counts = with_spinner("Accessing API...", || {
                let nets = client.get_all(&format!("organizations/{id}/networks"), &[])?;
                let devs = client.get_all(&format!("organizations/{id}/devices"), &[])?;
                Ok::<_, crate::client::ApiError>((nets.len(), devs.len()))
            });
            match counts {
                Ok((nets, devs)) => {
                    networks = nets.to_string();
                    devices = devs.to_string();
                }
                Err(err) => {
                    warn!(org = %id, error = %err, "counting failed");
                    ctx.say(format!("Unable to access {}", str_field(org, "name")))?;
                }
            }
        }
        report.row([
            cell(org, "name"),
            id,
            enabled(api_enabled(org)).to_string(),
            networks,
            devices,
        ]);
    }
    ctx.show(&report)
}

fn api(ctx: &mut Ctx, organization_name: &str, enable: Option<bool>) -> Result<()> {
    let org = ctx.org(organization_name)?;
    let name = str_field(&org, "name");
    let current = api_enabled(&org);
    let state = |on: bool| if on { "enabled" } else { "disabled" };
    ctx.say(format!("API for {name} is currently {}.", state(current)))?;

    let Some(enable) = enable else {
        return Ok(());
    };
    if enable == current {
        ctx.say(format!(" No change. API is already {}.", state(current)))?;
        return Ok(());
    }

    let client = ctx.client;
    let path = format!("organizations/{}", id_of(&org));
    let body = json!({"name": name, "api": {"enabled": enable}});
    with_spinner("Accessing API...", || client.put(&path, &body))?;
    ctx.say(format!(" API is now {}", state(enable)))
}

fn create_ip_objects(
    ctx: &mut Ctx,
    organization_name: &str,
    objects: &[String],
    group_name: Option<&str>,
) -> Result<()> {
    require_some(objects, "No objects provided; use --object")?;
    let specs = parse_all(objects, parse_ip_object)?;
    let org = ctx.org(organization_name)?;
    let org_id = id_of(&org);

    let mut created = Vec::new();
    for spec in &specs {
        let object = ctx.client.post(
            &format!("organizations/{org_id}/policyObjects"),
            &json!({
                "name": spec.name,
                "category": "network",
                "type": "cidr",
                "cidr": spec.cidr.to_string(),
            }),
        )?;
        created.push(id_of(&object));
        ctx.say(format!("Created object named {} with IP {}", spec.name, spec.cidr))?;
    }

    if let Some(group) = group_name {
        ctx.client.post(
            &format!("organizations/{org_id}/policyObjects/groups"),
            &json!({
                "name": group,
                "category": "NetworkObjectGroup",
                "objectIds": created,
            }),
        )?;
        ctx.say(format!("Created group named {group}"))?;
    }
    Ok(())
}

fn list_api_requests(ctx: &mut Ctx, organization_name: &str) -> Result<()> {
    let org = ctx.org(organization_name)?;
    let client = ctx.client;
    let path = format!("organizations/{}/apiRequests", id_of(&org));
    let requests = with_spinner("Accessing API...", || client.get_all(&path, &[]))?;

    let mut report = Report::new(&["Method", "Path", "Response Code", "Source IP", "Time"])
        .titled(format!("API Requests for {}", str_field(&org, "name")));
    for req in &requests {
        report.row([
            cell(req, "method"),
            format!("{}{}", str_field(req, "path"), str_field(req, "queryString")),
            cell(req, "responseCode"),
            cell(req, "sourceIp"),
            cell(req, "ts"),
        ]);
    }
    ctx.show(&report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::{client, run};
    use crate::prompt::ScriptedPrompter;
    use httpmock::prelude::*;

    fn mock_orgs(server: &MockServer) {
        server.mock(|when, then| {
            when.method(GET).path("/organizations");
            then.status(200).json_body(json!([
                {"id": "1", "name": "Acme", "api": {"enabled": true}},
                {"id": "2", "name": "Globex", "api": {"enabled": false}}
            ]));
        });
    }

    #[test]
    fn lists_with_counts_only_for_api_enabled() {
        let server = MockServer::start();
        mock_orgs(&server);
        let nets = server.mock(|when, then| {
            when.method(GET).path("/organizations/1/networks");
            then.status(200).json_body(json!([{"id": "N_1"}, {"id": "N_2"}]));
        });
        server.mock(|when, then| {
            when.method(GET).path("/organizations/1/devices");
            then.status(200).json_body(json!([{"serial": "Q2"}]));
        });
        let globex = server.mock(|when, then| {
            when.method(GET).path("/organizations/2/networks");
            then.status(200).json_body(json!([]));
        });

        let client = client(&server);
        let (result, out) = run(&client, &mut ScriptedPrompter::default(), |ctx| {
            list(ctx, None, true)
        });

        result.unwrap();
        nets.assert();
        globex.assert_hits(0);
        assert!(out.contains("Found 2 organizations"));
        assert!(out.contains("Enabled"));
        assert!(out.contains("Disabled"));
    }

    #[test]
    fn empty_match_aborts() {
        let server = MockServer::start();
        mock_orgs(&server);

        let client = client(&server);
        let (result, _) = run(&client, &mut ScriptedPrompter::default(), |ctx| {
            list(ctx, Some("Initech"), false)
        });
        assert!(result.unwrap_err().to_string().contains("Initech"));
    }

    #[test]
    fn api_already_in_state_makes_no_call() {
        let server = MockServer::start();
        mock_orgs(&server);
        let update = server.mock(|when, then| {
            when.method(PUT).path("/organizations/1");
            then.status(200).json_body(json!({}));
        });

        let client = client(&server);
        let (result, out) = run(&client, &mut ScriptedPrompter::default(), |ctx| {
            api(ctx, "Acme", Some(true))
        });

        result.unwrap();
        update.assert_hits(0);
        assert!(out.contains("No change"));
    }

    #[test]
    fn api_enable_updates_org() {
        let server = MockServer::start();
        mock_orgs(&server);
        let update = server.mock(|when, then| {
            when.method(PUT)
                .path("/organizations/2")
                .json_body(json!({"name": "Globex", "api": {"enabled": true}}));
            then.status(200).json_body(json!({"id": "2"}));
        });

        let client = client(&server);
        let (result, out) = run(&client, &mut ScriptedPrompter::default(), |ctx| {
            api(ctx, "Globex", Some(true))
        });

        result.unwrap();
        update.assert();
        assert!(out.contains("API is now enabled"));
    }

    #[test]
    fn ip_objects_are_created_then_grouped() {
        let server = MockServer::start();
        mock_orgs(&server);
        let object = server.mock(|when, then| {
            when.method(POST)
                .path("/organizations/1/policyObjects")
                .json_body_partial(r#"{"name": "web", "type": "cidr", "cidr": "10.1.0.0/24"}"#);
            then.status(201).json_body(json!({"id": "101"}));
        });
        let group = server.mock(|when, then| {
            when.method(POST)
                .path("/organizations/1/policyObjects/groups")
                .json_body(json!({"name": "servers", "category": "NetworkObjectGroup", "objectIds": ["101"]}));
            then.status(201).json_body(json!({"id": "7"}));
        });

        let client = client(&server);
        let objects = vec!["web!10.1.0.0/24".to_string()];
        let (result, out) = run(&client, &mut ScriptedPrompter::default(), |ctx| {
            create_ip_objects(ctx, "Acme", &objects, Some("servers"))
        });

        result.unwrap();
        object.assert();
        group.assert();
        assert!(out.contains("Created group named servers"));
    }

    #[test]
    fn malformed_object_fails_before_any_call() {
        let server = MockServer::start();
        let orgs = server.mock(|when, then| {
            when.method(GET).path("/organizations");
            then.status(200).json_body(json!([]));
        });

        let client = client(&server);
        let objects = vec!["a!b!c".to_string()];
        let (result, _) = run(&client, &mut ScriptedPrompter::default(), |ctx| {
            create_ip_objects(ctx, "Acme", &objects, None)
        });

        assert!(result.is_err());
        orgs.assert_hits(0);
    }
}
