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

//! MR access point commands: SSIDs, radio settings, RF profiles and mesh.

use super::Ctx;
use crate::lookup::{DeviceCache, id_of};
use crate::output::{Report, cell, enabled, value_to_str};
use crate::progress::with_spinner;
use crate::select::{
    bool_field, changed_fields, filter_by_model, has_product_type, sort_by_key, str_field,
    string_list,
};
use crate::types::{
    DeviceModel, IpAssignmentMode, ProductType, SsidAuthMode, SsidEncryptionMode,
    WpaEncryptionMode,
};
use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use serde_json::{Value, json};
use std::collections::HashMap;

const DISABLED_POWER: f64 = -1.0;

#[derive(Subcommand, Debug)]
pub enum WirelessCommand {
    /// List SSIDs of a network
    ListSsids {
        organization_name: String,
        network_name: String,
        #[arg(long)]
        include_disabled: bool,
        /// Show pre-shared keys
        #[arg(long)]
        include_psk: bool,
    },
    /// Show configured and actual radio settings of every AP
    ListRf {
        organization_name: String,
        network_name: String,
    },
    /// List RF profiles, including template profiles
    ListRfProfiles {
        organization_name: String,
        network_name: String,
    },
    /// Show mesh routes and performance
    ListMesh {
        organization_name: String,
        network_name: String,
    },
    /// Print one SSID as JSON
    ShowSsid {
        organization_name: String,
        network_name: String,
        #[arg(value_parser = clap::value_parser!(u8).range(0..=15))]
        number: u8,
    },
    /// Update an SSID
    UpdateSsid {
        organization_name: String,
        network_name: String,
        #[arg(value_parser = clap::value_parser!(u8).range(0..=15))]
        number: u8,
        /// Skip confirming the current SSID name
        #[arg(long)]
        no_confirm: bool,
        #[command(flatten)]
        fields: SsidFields,
    },
}

#[derive(Args, Debug, Default)]
pub struct SsidFields {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub enabled: Option<bool>,
    #[arg(long, value_enum)]
    pub auth_mode: Option<SsidAuthMode>,
    #[arg(long, value_enum)]
    pub encryption_mode: Option<SsidEncryptionMode>,
    #[arg(long, value_enum)]
    pub wpa_encryption_mode: Option<WpaEncryptionMode>,
    /// Direct traffic to specific VLANs
    #[arg(long)]
    pub tag_vlan: Option<bool>,
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..=4094))]
    pub default_vlan_id: Option<u16>,
    #[arg(long)]
    pub pre_shared_key: Option<String>,
    /// Mbps
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=54))]
    pub min_bitrate: Option<u8>,
    #[arg(long, value_enum)]
    pub ip_assignment_mode: Option<IpAssignmentMode>,
}

impl SsidFields {
    fn desired(&self) -> Vec<(&'static str, Option<Value>)> {
        vec![
            ("name", self.name.as_ref().map(|v| json!(v))),
            ("enabled", self.enabled.map(Value::Bool)),
            ("useVlanTagging", self.tag_vlan.map(Value::Bool)),
            ("defaultVlanId", self.default_vlan_id.map(|v| json!(v))),
            ("authMode", self.auth_mode.map(|v| json!(v.as_str()))),
            ("encryptionMode", self.encryption_mode.map(|v| json!(v.as_str()))),
            ("wpaEncryptionMode", self.wpa_encryption_mode.map(|v| json!(v.as_str()))),
            ("minBitrate", self.min_bitrate.map(|v| json!(v))),
            ("psk", self.pre_shared_key.as_ref().map(|v| json!(v))),
            ("ipAssignmentMode", self.ip_assignment_mode.map(|v| json!(v.as_str()))),
        ]
    }
}

pub fn handle(ctx: &mut Ctx, cmd: WirelessCommand) -> Result<()> {
    match cmd {
        WirelessCommand::ListSsids {
            organization_name,
            network_name,
            include_disabled,
            include_psk,
        } => list_ssids(ctx, &organization_name, &network_name, include_disabled, include_psk),
        WirelessCommand::ListRf {
            organization_name,
            network_name,
        } => list_rf(ctx, &organization_name, &network_name),
        WirelessCommand::ListRfProfiles {
            organization_name,
            network_name,
        } => list_rf_profiles(ctx, &organization_name, &network_name),
        WirelessCommand::ListMesh {
            organization_name,
            network_name,
        } => list_mesh(ctx, &organization_name, &network_name),
        WirelessCommand::ShowSsid {
            organization_name,
            network_name,
            number,
        } => show_ssid(ctx, &organization_name, &network_name, number),
        WirelessCommand::UpdateSsid {
            organization_name,
            network_name,
            number,
            no_confirm,
            fields,
        } => update_ssid(ctx, &organization_name, &network_name, number, !no_confirm, &fields),
    }
}

/// Resolve the network and make sure it holds access points.
fn wireless_network(ctx: &mut Ctx, organization_name: &str, network_name: &str) -> Result<Value> {
    let net = ctx.network(organization_name, network_name)?;
    if !has_product_type(&net, ProductType::Wireless) {
        bail!("This network does not contain any MR devices");
    }
    Ok(net)
}

fn describe_auth(ssid: &Value, include_psk: bool) -> String {
    let encryption = match str_field(ssid, "encryptionMode") {
        "" => "open",
        mode => mode,
    };
    let mut text = format!("{encryption} / {}", str_field(ssid, "authMode"));
    if include_psk && let Some(psk) = ssid.get("psk").and_then(Value::as_str) {
        text.push(' ');
        text.push_str(psk);
    }
    text
}

fn list_ssids(
    ctx: &mut Ctx,
    organization_name: &str,
    network_name: &str,
    include_disabled: bool,
    include_psk: bool,
) -> Result<()> {
    let net = wireless_network(ctx, organization_name, network_name)?;
    let mut ssids = ctx
        .client
        .get_list(&format!("networks/{}/wireless/ssids", id_of(&net)), &[])?;
    if !include_disabled {
        ssids.retain(|ssid| bool_field(ssid, "enabled"));
    }

    let mut report = Report::new(&[
        "Name",
        "Enabled",
        "Authentication",
        "Mode",
        "VLAN Tag",
        "Band",
        "Visible",
        "Availability",
    ])
    .titled(format!("SSIDs for {}", str_field(&net, "name")));
    for ssid in &ssids {
        report.row([
            cell(ssid, "name"),
            enabled(bool_field(ssid, "enabled")).to_string(),
            describe_auth(ssid, include_psk),
            cell(ssid, "ipAssignmentMode"),
            if bool_field(ssid, "useVlanTagging") {
                cell(ssid, "defaultVlanId")
            } else {
                "none".into()
            },
            cell(ssid, "bandSelection"),
            if bool_field(ssid, "visible") { "Visible" } else { "Not visible" }.to_string(),
            if bool_field(ssid, "availableOnAllAps") {
                "All APs".to_string()
            } else {
                format!("Tags: {}", string_list(ssid, "availabilityTags").join(", "))
            },
        ]);
    }
    ctx.show(&report)
}

/// Manual channel and power of one band, e.g. `ch 36 / 14 dBm`.
fn describe_radio(band: Option<&Value>) -> String {
    let Some(band) = band else {
        return String::new();
    };
    let power = band.get("targetPower").and_then(Value::as_f64);
    if power == Some(DISABLED_POWER) {
        return "disabled".into();
    }
    let mut parts = Vec::new();
    if let Some(channel) = band.get("channel").filter(|c| !c.is_null()) {
        parts.push(format!("ch {}", value_to_str(channel)));
    }
    if let Some(power) = power {
        parts.push(format!("{power} dBm"));
    }
    parts.join(" / ")
}

/// First enabled and broadcasting BSS on `band`, as `ch N / power`.
fn broadcasting(status: &Value, band: &str) -> String {
    status
        .get("basicServiceSets")
        .and_then(Value::as_array)
        .and_then(|sets| {
            sets.iter().find(|bss| {
                bool_field(bss, "enabled")
                    && bool_field(bss, "broadcasting")
                    && str_field(bss, "band") == band
            })
        })
        .map(|bss| format!("ch {} / {}", cell(bss, "channel"), cell(bss, "power")))
        .unwrap_or_else(|| "Not broadcasting".into())
}

fn list_rf(ctx: &mut Ctx, organization_name: &str, network_name: &str) -> Result<()> {
    let net = wireless_network(ctx, organization_name, network_name)?;
    let net_id = id_of(&net);
    let client = ctx.client;

    let report = with_spinner("Accessing API...", || -> Result<Report> {
        let devices = client.get_list(&format!("networks/{net_id}/devices"), &[])?;
        let mut aps = filter_by_model(devices, DeviceModel::Mr);
        sort_by_key(&mut aps, "name", false);

        let mut profiles: HashMap<String, String> = HashMap::new();
        let mut report = Report::new(&[
            "AP Name",
            "RF Profile",
            "2.4Ghz Manual Settings",
            "2.4Ghz Actual",
            "5Ghz Manual Settings",
            "5Ghz Actual",
        ])
        .titled(format!("RF Settings for {}", str_field(&net, "name")));

        for ap in &aps {
            let serial = str_field(ap, "serial");
            let radio = client.get(&format!("devices/{serial}/wireless/radio/settings"), &[])?;
            let status = client.get(&format!("devices/{serial}/wireless/status"), &[])?;

            let profile = match radio.get("rfProfileId").map(value_to_str) {
                Some(id) if !id.is_empty() => {
                    if !profiles.contains_key(&id) {
                        let path = format!("networks/{net_id}/wireless/rfProfiles/{id}");
                        let profile = client.get(&path, &[])?;
                        profiles.insert(id.clone(), cell(&profile, "name"));
                    }
                    profiles[&id].clone()
                }
                _ => "None".into(),
            };

            report.row([
                cell(ap, "name"),
                profile,
                describe_radio(radio.get("twoFourGhzSettings")),
                broadcasting(&status, "2.4 GHz"),
                describe_radio(radio.get("fiveGhzSettings")),
                broadcasting(&status, "5 GHz"),
            ]);
        }
        Ok(report)
    })?;
    ctx.show(&report)
}

fn list_rf_profiles(ctx: &mut Ctx, organization_name: &str, network_name: &str) -> Result<()> {
    let net = wireless_network(ctx, organization_name, network_name)?;
    let client = ctx.client;
    let path = format!("networks/{}/wireless/rfProfiles", id_of(&net));
    let query = [("includeTemplateProfiles", "true".to_string())];
    let profiles = with_spinner("Accessing API...", || client.get_list(&path, &query))?;
    if profiles.is_empty() {
        bail!("No RF Profiles found");
    }

    let mut report = Report::new(&[
        "Name",
        "Client Balancing",
        "Band Settings",
        "2.4GHz Power",
        "2.4GHz Min. Bitrate",
        "2.4GHz AutoChannel",
        "5GHz Power",
        "5GHz Min. Bitrate",
        "5GHz AutoChannel",
        "5GHz Width",
    ])
    .titled(format!("RF Profiles for {}", str_field(&net, "name")));
    for profile in &profiles {
        report.row(rf_profile_row(profile));
    }
    ctx.show(&report)
}

fn rf_profile_row(profile: &Value) -> Vec<String> {
    let null = Value::Null;
    let two_four = profile.get("twoFourGhzSettings").unwrap_or(&null);
    let five = profile.get("fiveGhzSettings").unwrap_or(&null);
    let per_band_bitrate = str_field(profile, "minBitrateType") == "band";

    let bands = if str_field(profile, "bandSelectionType") == "ap" {
        let settings = profile.get("apBandSettings").unwrap_or(&null);
        let steering = if bool_field(settings, "bandSteeringEnabled") {
            "Band Steering Enabled"
        } else {
            "Band Steering Disabled"
        };
        format!("{} / {steering}", cell(settings, "bandOperationMode"))
    } else {
        "per SSID".into()
    };
    let bitrate = |band: &Value| {
        if per_band_bitrate {
            format!("{}Mbps", cell(band, "minBitrate"))
        } else {
            "per SSID".into()
        }
    };
    let power = |band: &Value| format!("{}-{}dBm", cell(band, "minPower"), cell(band, "maxPower"));
    let width = match cell(five, "channelWidth").as_str() {
        "auto" => "auto".to_string(),
        other => format!("{other}MHz"),
    };

    vec![
        cell(profile, "name"),
        enabled(bool_field(profile, "clientBalancingEnabled")).to_string(),
        bands,
        power(two_four),
        bitrate(two_four),
        cell(two_four, "validAutoChannels"),
        power(five),
        bitrate(five),
        cell(five, "validAutoChannels"),
        width,
    ]
}

fn list_mesh(ctx: &mut Ctx, organization_name: &str, network_name: &str) -> Result<()> {
    let net = wireless_network(ctx, organization_name, network_name)?;
    let client = ctx.client;
    let path = format!("networks/{}/wireless/meshStatuses", id_of(&net));
    let mesh = match with_spinner("Accessing API...", || client.get_list(&path, &[])) {
        Ok(mesh) => mesh,
        Err(err) => {
            if let Some(message) = err.messages().first() {
                bail!("{message}");
            }
            return Err(err.into());
        }
    };

    let mut devices = DeviceCache::new(client);
    let mut report = Report::new(&["AP Name", "Mesh Route", "Mbps", "Metric", "Usage"])
        .titled(format!("Mesh Status for {}", str_field(&net, "name")));
    for ap in &mesh {
        let mut hops = Vec::new();
        for serial in string_list(ap, "meshRoute") {
            hops.push(devices.label(&serial)?);
        }
        let performance = ap.get("latestMeshPerformance").cloned().unwrap_or(Value::Null);
        report.row([
            devices.label(str_field(ap, "serial"))?,
            hops.join(" -> "),
            format!("{}Mbps", cell(&performance, "mbps")),
            cell(&performance, "metric"),
            cell(&performance, "usagePercentage"),
        ]);
    }
    ctx.show(&report)
}

fn show_ssid(ctx: &mut Ctx, organization_name: &str, network_name: &str, number: u8) -> Result<()> {
    let net = wireless_network(ctx, organization_name, network_name)?;
    let client = ctx.client;
    let path = format!("networks/{}/wireless/ssids/{number}", id_of(&net));
    let ssid = with_spinner("Accessing API...", || client.get(&path, &[]))?;
    ctx.show_json(&ssid)
}

fn update_ssid(
    ctx: &mut Ctx,
    organization_name: &str,
    network_name: &str,
    number: u8,
    confirm: bool,
    fields: &SsidFields,
) -> Result<()> {
    let net = wireless_network(ctx, organization_name, network_name)?;
    let client = ctx.client;
    let path = format!("networks/{}/wireless/ssids/{number}", id_of(&net));
    let ssid = with_spinner("Accessing API...", || client.get(&path, &[]))?;

    if confirm {
        ctx.say(format!(
            "SSID number {number} is named {}",
            str_field(&ssid, "name")
        ))?;
        if !ctx.confirm("Do you want to continue?", true)? {
            bail!("Aborted");
        }
    }

    let update = changed_fields(&ssid, fields.desired());
    if update.is_empty() {
        return ctx.say("No settings changed.");
    }

    let keys: Vec<String> = update.keys().cloned().collect();
    let updated = client.put(&path, &Value::Object(update))?;
    ctx.say(format!("SSID '{}' has been updated.", str_field(&updated, "name")))?;
    ctx.say(format!(
        " The following parameters were updated: {}",
        keys.join(", ")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::{client, mock_network, run};
    use crate::prompt::ScriptedPrompter;
    use httpmock::prelude::*;

    fn office() -> Value {
        json!({"id": "N_1", "name": "Office", "productTypes": ["wireless"]})
    }

    #[test]
    fn non_wireless_networks_abort() {
        let server = MockServer::start();
        mock_network(&server, json!({"id": "N_1", "name": "Office", "productTypes": ["switch"]}));
        let ssids = server.mock(|when, then| {
            when.method(GET).path("/networks/N_1/wireless/ssids");
            then.status(200).json_body(json!([]));
        });

        let client = client(&server);
        let (result, _) = run(&client, &mut ScriptedPrompter::default(), |ctx| {
            list_ssids(ctx, "Acme", "Office", false, false)
        });

        assert_eq!(
            result.unwrap_err().to_string(),
            "This network does not contain any MR devices"
        );
        ssids.assert_hits(0);
    }

    #[test]
    fn single_ssid_commands_need_a_wireless_network() {
        let server = MockServer::start();
        mock_network(&server, json!({"id": "N_1", "name": "Office", "productTypes": ["switch"]}));
        let ssid = server.mock(|when, then| {
            when.method(GET).path("/networks/N_1/wireless/ssids/0");
            then.status(200).json_body(json!({"number": 0}));
        });

        let client = client(&server);
        let fields = SsidFields {
            name: Some("guest".into()),
            ..SsidFields::default()
        };
        let (shown, _) = run(&client, &mut ScriptedPrompter::default(), |ctx| {
            show_ssid(ctx, "Acme", "Office", 0)
        });
        let (updated, _) = run(&client, &mut ScriptedPrompter::default(), |ctx| {
            update_ssid(ctx, "Acme", "Office", 0, false, &fields)
        });

        for result in [shown, updated] {
            assert_eq!(
                result.unwrap_err().to_string(),
                "This network does not contain any MR devices"
            );
        }
        ssid.assert_hits(0);
    }

    #[test]
    fn disabled_ssids_hidden_by_default() {
        let server = MockServer::start();
        mock_network(&server, office());
        server.mock(|when, then| {
            when.method(GET).path("/networks/N_1/wireless/ssids");
            then.status(200).json_body(json!([
                {"number": 0, "name": "corp", "enabled": true, "authMode": "psk", "encryptionMode": "wpa",
                 "psk": "s3cret", "ipAssignmentMode": "Bridge mode", "useVlanTagging": true, "defaultVlanId": 20,
                 "bandSelection": "Dual band operation", "visible": true, "availableOnAllAps": true},
                {"number": 1, "name": "Unconfigured SSID 2", "enabled": false, "authMode": "open"}
            ]));
        });

        let client = client(&server);
        let (result, out) = run(&client, &mut ScriptedPrompter::default(), |ctx| {
            list_ssids(ctx, "Acme", "Office", false, false)
        });

        result.unwrap();
        assert!(out.contains("corp"));
        assert!(out.contains("wpa / psk"));
        assert!(!out.contains("s3cret"));
        assert!(!out.contains("Unconfigured"));
    }

    #[test]
    fn auth_cell_with_psk() {
        let ssid = json!({"authMode": "psk", "encryptionMode": "wpa", "psk": "s3cret"});
        assert_eq!(describe_auth(&ssid, true), "wpa / psk s3cret");
        assert_eq!(describe_auth(&json!({"authMode": "open"}), true), "open / open");
    }

    #[test]
    fn radio_descriptions() {
        assert_eq!(
            describe_radio(Some(&json!({"channel": 36, "targetPower": 14.0}))),
            "ch 36 / 14 dBm"
        );
        assert_eq!(
            describe_radio(Some(&json!({"channel": null, "targetPower": -1.0}))),
            "disabled"
        );
        assert_eq!(describe_radio(Some(&json!({"channel": 6, "targetPower": null}))), "ch 6");
    }

    #[test]
    fn picks_first_broadcasting_bss() {
        let status = json!({"basicServiceSets": [
            {"band": "5 GHz", "enabled": true, "broadcasting": false, "channel": 36, "power": "14 dBm"},
            {"band": "5 GHz", "enabled": true, "broadcasting": true, "channel": 44, "power": "17 dBm"}
        ]});
        assert_eq!(broadcasting(&status, "5 GHz"), "ch 44 / 17 dBm");
        assert_eq!(broadcasting(&status, "2.4 GHz"), "Not broadcasting");
    }

    #[test]
    fn rf_profile_cells() {
        let profile = json!({
            "name": "High density",
            "clientBalancingEnabled": true,
            "bandSelectionType": "ap",
            "minBitrateType": "band",
            "apBandSettings": {"bandOperationMode": "dual", "bandSteeringEnabled": true},
            "twoFourGhzSettings": {"minPower": 5, "maxPower": 30, "minBitrate": 11, "validAutoChannels": [1, 6, 11]},
            "fiveGhzSettings": {"minPower": 8, "maxPower": 30, "minBitrate": 12, "validAutoChannels": [36, 40], "channelWidth": "40"}
        });
        let row = rf_profile_row(&profile);
        assert_eq!(row[2], "dual / Band Steering Enabled");
        assert_eq!(row[3], "5-30dBm");
        assert_eq!(row[4], "11Mbps");
        assert_eq!(row[5], "1, 6, 11");
        assert_eq!(row[9], "40MHz");
    }

    #[test]
    fn mesh_routes_use_device_names_once() {
        let server = MockServer::start();
        mock_network(&server, office());
        server.mock(|when, then| {
            when.method(GET).path("/networks/N_1/wireless/meshStatuses");
            then.status(200).json_body(json!([{
                "serial": "Q2R1",
                "meshRoute": ["Q2R1", "Q2GW"],
                "latestMeshPerformance": {"mbps": 54, "metric": 1200, "usagePercentage": "12%"}
            }]));
        });
        let repeater = server.mock(|when, then| {
            when.method(GET).path("/devices/Q2R1");
            then.status(200).json_body(json!({"serial": "Q2R1", "name": "yard-ap"}));
        });
        server.mock(|when, then| {
            when.method(GET).path("/devices/Q2GW");
            then.status(200).json_body(json!({"serial": "Q2GW", "name": "gate-ap"}));
        });

        let client = client(&server);
        let (result, out) = run(&client, &mut ScriptedPrompter::default(), |ctx| {
            list_mesh(ctx, "Acme", "Office")
        });

        result.unwrap();
        repeater.assert_hits(1);
        assert!(out.contains("yard-ap -> gate-ap"));
        assert!(out.contains("54Mbps"));
    }

    #[test]
    fn update_sends_only_differences() {
        let server = MockServer::start();
        mock_network(&server, office());
        server.mock(|when, then| {
            when.method(GET).path("/networks/N_1/wireless/ssids/3");
            then.status(200)
                .json_body(json!({"number": 3, "name": "guest", "enabled": true, "authMode": "open"}));
        });
        let put = server.mock(|when, then| {
            when.method(PUT)
                .path("/networks/N_1/wireless/ssids/3")
                .json_body(json!({"authMode": "psk", "psk": "welcome123"}));
            then.status(200).json_body(json!({"number": 3, "name": "guest"}));
        });

        let fields = SsidFields {
            enabled: Some(true),
            auth_mode: Some(SsidAuthMode::Psk),
            pre_shared_key: Some("welcome123".into()),
            ..SsidFields::default()
        };
        let client = client(&server);
        let mut prompter = ScriptedPrompter::confirming(true);
        let (result, out) = run(&client, &mut prompter, |ctx| {
            update_ssid(ctx, "Acme", "Office", 3, true, &fields)
        });

        result.unwrap();
        put.assert();
        assert!(out.contains("SSID number 3 is named guest"));
        assert!(out.contains("SSID 'guest' has been updated."));
    }
}
