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

//! Enumerations mirroring string values used by the Dashboard API.
//!
//! Each enum is selectable on the command line through `clap::ValueEnum` and
//! exposes the exact string the API expects through `as_str`.

use clap::ValueEnum;
use std::fmt;

macro_rules! api_values {
    ($name:ident { $($variant:ident => $value:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $value),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProductType {
    Appliance,
    Switch,
    Wireless,
    Camera,
    SystemsManager,
    Environmental,
    Sensor,
    CellularGateway,
}

api_values!(ProductType {
    Appliance => "appliance",
    Switch => "switch",
    Wireless => "wireless",
    Camera => "camera",
    SystemsManager => "systemsManager",
    Environmental => "environmental",
    Sensor => "sensor",
    CellularGateway => "cellularGateway",
});

/// Model family prefixes; `MS` matches `MS225-48LP`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DeviceModel {
    #[value(name = "MX", alias = "mx")]
    Mx,
    #[value(name = "MR", alias = "mr")]
    Mr,
    #[value(name = "MS", alias = "ms")]
    Ms,
    #[value(name = "MV", alias = "mv")]
    Mv,
    #[value(name = "MT", alias = "mt")]
    Mt,
    #[value(name = "Z", alias = "z")]
    Z,
}

api_values!(DeviceModel {
    Mx => "MX",
    Mr => "MR",
    Ms => "MS",
    Mv => "MV",
    Mt => "MT",
    Z => "Z",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DeviceSortKey {
    Name,
    Model,
}

api_values!(DeviceSortKey {
    Name => "name",
    Model => "model",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Uplink {
    Internet1,
    Internet2,
}

api_values!(Uplink {
    Internet1 => "internet1",
    Internet2 => "internet2",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TrafficDirection {
    Total,
    Recv,
    Sent,
}

api_values!(TrafficDirection {
    Total => "total",
    Recv => "recv",
    Sent => "sent",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InterfaceMode {
    Access,
    Trunk,
}

api_values!(InterfaceMode {
    Access => "access",
    Trunk => "trunk",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SsidAuthMode {
    Open,
    Psk,
    OpenWithRadius,
    #[value(name = "8021x-meraki")]
    Dot1xMeraki,
    #[value(name = "8021x-radius")]
    Dot1xRadius,
    #[value(name = "8021x-google")]
    Dot1xGoogle,
    #[value(name = "8021x-localradius")]
    Dot1xLocalRadius,
    IpskWithRadius,
    IpskWithoutRadius,
}

api_values!(SsidAuthMode {
    Open => "open",
    Psk => "psk",
    OpenWithRadius => "open-with-radius",
    Dot1xMeraki => "8021x-meraki",
    Dot1xRadius => "8021x-radius",
    Dot1xGoogle => "8021x-google",
    Dot1xLocalRadius => "8021x-localradius",
    IpskWithRadius => "ipsk-with-radius",
    IpskWithoutRadius => "ipsk-without-radius",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SsidEncryptionMode {
    Wep,
    Wpa,
}

api_values!(SsidEncryptionMode {
    Wep => "wep",
    Wpa => "wpa",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WpaEncryptionMode {
    Wpa1Only,
    Wpa1AndWpa2,
    Wpa2Only,
    Wpa3Transition,
    Wpa3Only,
}

api_values!(WpaEncryptionMode {
    Wpa1Only => "WPA1 only",
    Wpa1AndWpa2 => "WPA1 and WPA2",
    Wpa2Only => "WPA2 only",
    Wpa3Transition => "WPA3 Transition Mode",
    Wpa3Only => "WPA3 only",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum IpAssignmentMode {
    Nat,
    Bridge,
    L3Roaming,
    L3RoamingConcentrator,
    Vpn,
}

api_values!(IpAssignmentMode {
    Nat => "NAT mode",
    Bridge => "Bridge mode",
    L3Roaming => "Layer 3 roaming",
    L3RoamingConcentrator => "Layer 3 roaming with a concentrator",
    Vpn => "VPN",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TrafficAnalysisMode {
    Disabled,
    Basic,
    Detailed,
}

api_values!(TrafficAnalysisMode {
    Disabled => "disabled",
    Basic => "basic",
    Detailed => "detailed",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SensorMetric {
    Battery,
    Temperature,
    Humidity,
    Water,
    Door,
    Noise,
    Co2,
    Tvoc,
    IndoorAirQuality,
    Pm25,
    Button,
}

api_values!(SensorMetric {
    Battery => "battery",
    Temperature => "temperature",
    Humidity => "humidity",
    Water => "water",
    Door => "door",
    Noise => "noise",
    Co2 => "co2",
    Tvoc => "tvoc",
    IndoorAirQuality => "indoorAirQuality",
    Pm25 => "pm25",
    Button => "button",
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_names_map_to_api_values() {
        let auth = SsidAuthMode::from_str("8021x-radius", false).unwrap();
        assert_eq!(auth.as_str(), "8021x-radius");

        let model = DeviceModel::from_str("ms", false).unwrap();
        assert_eq!(model, DeviceModel::Ms);
        assert_eq!(model.to_string(), "MS");

        let product = ProductType::from_str("cellular-gateway", false).unwrap();
        assert_eq!(product.as_str(), "cellularGateway");

        let metric = SensorMetric::from_str("indoor-air-quality", false).unwrap();
        assert_eq!(metric.as_str(), "indoorAirQuality");

        assert_eq!(WpaEncryptionMode::Wpa3Transition.as_str(), "WPA3 Transition Mode");
    }
}
