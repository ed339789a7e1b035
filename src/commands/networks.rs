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

use super::{Ctx, toggle};
use crate::lookup::id_of;
use crate::output::{Report, cell};
use crate::progress::with_spinner;
use crate::select::{changed_fields, filter_by_product_type, sort_by_key, str_field, string_list};
use crate::types::{ProductType, TrafficAnalysisMode};
use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use serde_json::{Map, Value, json};

#[derive(Subcommand, Debug)]
pub enum NetworksCommand {
    /// List networks in an organization
    List {
        organization_name: String,
        #[arg(long, value_enum)]
        product_type: Option<ProductType>,
    },
    /// Update network settings
    UpdateSettings {
        organization_name: String,
        network_name: String,
        /// Skip confirming the network name
        #[arg(long)]
        no_confirm: bool,
        #[command(flatten)]
        settings: SettingsArgs,
        #[arg(long, value_enum)]
        traffic_analysis: Option<TrafficAnalysisMode>,
    },
}

/// Status page toggles shared with `multi-network update-settings`.
#[derive(Args, Debug, Clone, Default)]
pub struct SettingsArgs {
    /// Local device status pages
    #[arg(long, conflicts_with = "disable_local_status")]
    pub enable_local_status: bool,
    #[arg(long)]
    pub disable_local_status: bool,
    /// Remote device status pages
    #[arg(long, conflicts_with = "disable_remote_status")]
    pub enable_remote_status: bool,
    #[arg(long)]
    pub disable_remote_status: bool,
}

impl SettingsArgs {
    pub fn desired(&self) -> Vec<(&'static str, Option<Value>)> {
        vec![
            (
                "localStatusPageEnabled",
                toggle(self.enable_local_status, self.disable_local_status).map(Value::Bool),
            ),
            (
                "remoteStatusPageEnabled",
                toggle(self.enable_remote_status, self.disable_remote_status).map(Value::Bool),
            ),
        ]
    }

    /// The requested changes without comparing against current settings.
    pub fn requested(&self) -> Map<String, Value> {
        changed_fields(&Value::Null, self.desired())
    }
}

pub fn handle(ctx: &mut Ctx, cmd: NetworksCommand) -> Result<()> {
    match cmd {
        NetworksCommand::List {
            organization_name,
            product_type,
        } => list(ctx, &organization_name, product_type),
        NetworksCommand::UpdateSettings {
            organization_name,
            network_name,
            no_confirm,
            settings,
            traffic_analysis,
        } => update_settings(
            ctx,
            &organization_name,
            &network_name,
            !no_confirm,
            &settings,
            traffic_analysis,
        ),
    }
}

fn list(ctx: &mut Ctx, organization_name: &str, product_type: Option<ProductType>) -> Result<()> {
    let org = ctx.org(organization_name)?;
    let client = ctx.client;
    let path = format!("organizations/{}/networks", id_of(&org));
    let mut networks = with_spinner("Accessing API...", || client.get_all(&path, &[]))?;

    if let Some(product) = product_type {
        networks = filter_by_product_type(networks, product);
    }
    sort_by_key(&mut networks, "name", false);

    let mut report = Report::new(&["Name", "Type", "ID", "Time Zone"]);
    for net in &networks {
        report.row([
            cell(net, "name"),
            string_list(net, "productTypes").join(", "),
            id_of(net),
            cell(net, "timeZone"),
        ]);
    }
    ctx.show(&report)
}

fn update_settings(
    ctx: &mut Ctx,
    organization_name: &str,
    network_name: &str,
    confirm: bool,
    settings: &SettingsArgs,
    traffic_analysis: Option<TrafficAnalysisMode>,
) -> Result<()> {
    let net = ctx.network(organization_name, network_name)?;
    let net_id = id_of(&net);
    let name = str_field(&net, "name");
    let client = ctx.client;
    let settings_path = format!("networks/{net_id}/settings");
    let current = with_spinner("Getting current settings..", || client.get(&settings_path, &[]))?;

    if confirm {
        ctx.say(format!("Network is named {name}"))?;
        if !ctx.confirm("Do you want to continue?", true)? {
            bail!("Aborted");
        }
    }

    let mut updated: Vec<String> = Vec::new();

    let update = changed_fields(&current, settings.desired());
    if !update.is_empty() {
        with_spinner("Updating settings..", || {
            client.put(&settings_path, &Value::Object(update.clone()))
        })?;
        updated.extend(update.keys().cloned());
    }

    if let Some(mode) = traffic_analysis {
        let path = format!("networks/{net_id}/trafficAnalysis");
        let current = client.get(&path, &[])?;
        if str_field(&current, "mode") != mode.as_str() {
            client.put(&path, &json!({"mode": mode.as_str()}))?;
            updated.push("trafficAnalysis".into());
        }
    }

    if updated.is_empty() {
        return ctx.say("No settings changed.");
    }
    ctx.say(format!("Settings for '{name}' have been updated."))?;
    ctx.say(format!(
        " The following parameters were updated: {}",
        updated.join(", ")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::{client, mock_network, run};
    use crate::prompt::ScriptedPrompter;
    use httpmock::prelude::*;

    fn hq() -> Value {
        json!({"id": "N_1", "name": "HQ", "productTypes": ["appliance", "wireless"], "timeZone": "UTC"})
    }

    #[test]
    fn list_filters_by_product_and_sorts() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/organizations");
            then.status(200).json_body(json!([{"id": "1", "name": "Acme"}]));
        });
        server.mock(|when, then| {
            when.method(GET).path("/organizations/1/networks");
            then.status(200).json_body(json!([
                {"id": "N_3", "name": "Zurich", "productTypes": ["wireless"]},
                {"id": "N_2", "name": "Cameras", "productTypes": ["camera"]},
                {"id": "N_1", "name": "Berlin", "productTypes": ["switch", "wireless"]}
            ]));
        });

        let client = client(&server);
        let (result, out) = run(&client, &mut ScriptedPrompter::default(), |ctx| {
            list(ctx, "Acme", Some(ProductType::Wireless))
        });

        result.unwrap();
        assert!(!out.contains("Cameras"));
        let berlin = out.find("Berlin").unwrap();
        let zurich = out.find("Zurich").unwrap();
        assert!(berlin < zurich);
        assert!(out.contains("switch, wireless"));
    }

    #[test]
    fn only_changed_settings_are_sent() {
        let server = MockServer::start();
        mock_network(&server, hq());
        server.mock(|when, then| {
            when.method(GET).path("/networks/N_1/settings");
            then.status(200).json_body(
                json!({"localStatusPageEnabled": true, "remoteStatusPageEnabled": true}),
            );
        });
        let update = server.mock(|when, then| {
            when.method(PUT)
                .path("/networks/N_1/settings")
                .json_body(json!({"remoteStatusPageEnabled": false}));
            then.status(200).json_body(json!({}));
        });

        let settings = SettingsArgs {
            enable_local_status: true,
            disable_remote_status: true,
            ..SettingsArgs::default()
        };
        let client = client(&server);
        let mut prompter = ScriptedPrompter::confirming(true);
        let (result, out) = run(&client, &mut prompter, |ctx| {
            update_settings(ctx, "Acme", "HQ", true, &settings, None)
        });

        result.unwrap();
        update.assert();
        assert!(out.contains("remoteStatusPageEnabled"));
        assert!(!out.contains("localStatusPageEnabled"));
    }

    #[test]
    fn nothing_to_change_skips_the_update() {
        let server = MockServer::start();
        mock_network(&server, hq());
        server.mock(|when, then| {
            when.method(GET).path("/networks/N_1/settings");
            then.status(200).json_body(json!({"localStatusPageEnabled": true}));
        });
        let update = server.mock(|when, then| {
            when.method(PUT).path("/networks/N_1/settings");
            then.status(200).json_body(json!({}));
        });

        let settings = SettingsArgs {
            enable_local_status: true,
            ..SettingsArgs::default()
        };
        let client = client(&server);
        let (result, out) = run(&client, &mut ScriptedPrompter::default(), |ctx| {
            update_settings(ctx, "Acme", "HQ", false, &settings, None)
        });

        result.unwrap();
        update.assert_hits(0);
        assert!(out.contains("No settings changed."));
    }

    #[test]
    fn declined_confirmation_aborts() {
        let server = MockServer::start();
        mock_network(&server, hq());
        server.mock(|when, then| {
            when.method(GET).path("/networks/N_1/settings");
            then.status(200).json_body(json!({}));
        });

        let settings = SettingsArgs::default();
        let client = client(&server);
        let mut prompter = ScriptedPrompter::confirming(false);
        let (result, _) = run(&client, &mut prompter, |ctx| {
            update_settings(ctx, "Acme", "HQ", true, &settings, None)
        });

        assert!(result.is_err());
        assert_eq!(prompter.asked, vec!["Do you want to continue?"]);
    }

    #[test]
    fn traffic_analysis_mode_is_set() {
        let server = MockServer::start();
        mock_network(&server, hq());
        server.mock(|when, then| {
            when.method(GET).path("/networks/N_1/settings");
            then.status(200).json_body(json!({}));
        });
        server.mock(|when, then| {
            when.method(GET).path("/networks/N_1/trafficAnalysis");
            then.status(200).json_body(json!({"mode": "basic"}));
        });
        let update = server.mock(|when, then| {
            when.method(PUT)
                .path("/networks/N_1/trafficAnalysis")
                .json_body(json!({"mode": "detailed"}));
            then.status(200).json_body(json!({"mode": "detailed"}));
        });

        let settings = SettingsArgs::default();
        let client = client(&server);
        let (result, out) = run(&client, &mut ScriptedPrompter::default(), |ctx| {
            update_settings(
                ctx,
                "Acme",
                "HQ",
                false,
                &settings,
                Some(TrafficAnalysisMode::Detailed),
            )
        });

        result.unwrap();
        update.assert();
        assert!(out.contains("trafficAnalysis"));
    }

    #[test]
    fn requested_ignores_unset_pairs() {
        let settings = SettingsArgs {
            disable_local_status: true,
            ..SettingsArgs::default()
        };
        let requested = settings.requested();
        assert_eq!(requested.len(), 1);
        assert_eq!(requested["localStatusPageEnabled"], json!(false));
    }
}
