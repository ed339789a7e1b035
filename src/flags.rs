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

//! Parsing of `!`-delimited composite flag values such as
//! `--route name!10.0.0.0/24!192.168.1.1`.

use ipnetwork::IpNetwork;
use serde::Serialize;
use std::net::IpAddr;
use thiserror::Error;

const DELIMITER: char = '!';
const PROTOCOLS: [&str; 4] = ["tcp", "udp", "icmp", "any"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FlagError {
    #[error("incorrect --{flag} formatting `{input}`; expected {expected}")]
    Arity {
        flag: &'static str,
        input: String,
        expected: &'static str,
    },
    #[error("invalid subnet `{input}` in --{flag}: {reason}")]
    Cidr {
        flag: &'static str,
        input: String,
        reason: String,
    },
    #[error("invalid IP address `{input}` in --{flag}")]
    Ip { flag: &'static str, input: String },
    #[error("route `{0}` has no next hop; use name!cidr!nexthop or pass --default-next-hop")]
    MissingNextHop(String),
    #[error("incorrect --port protocol `{0}`; protocol must be one of [tcp, udp, icmp, any]")]
    Protocol(String),
    #[error("empty value in --{flag} `{input}`")]
    Empty { flag: &'static str, input: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSpec {
    pub name: String,
    pub subnet: IpNetwork,
    pub next_hop: IpAddr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NatSpec {
    pub name: String,
    pub public_ip: IpAddr,
    pub lan_ip: IpAddr,
}

/// Inbound allowance attached to every 1:1 NAT rule created in one call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortRule {
    pub protocol: String,
    pub destination_ports: Vec<String>,
    pub allowed_ips: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpObjectSpec {
    pub name: String,
    pub cidr: IpNetwork,
}

fn split(input: &str, flag: &'static str) -> Result<Vec<String>, FlagError> {
    let parts: Vec<String> = input
        .split(DELIMITER)
        .map(|p| p.trim().to_string())
        .collect();
    if parts.iter().any(|p| p.is_empty()) {
        return Err(FlagError::Empty {
            flag,
            input: input.to_string(),
        });
    }
    Ok(parts)
}

fn cidr(input: &str, flag: &'static str) -> Result<IpNetwork, FlagError> {
    let net = input.parse::<IpNetwork>().map_err(|err| FlagError::Cidr {
        flag,
        input: input.to_string(),
        reason: err.to_string(),
    })?;
    if net.ip() != net.network() {
        return Err(FlagError::Cidr {
            flag,
            input: input.to_string(),
            reason: "host bits are set".into(),
        });
    }
    Ok(net)
}

fn ip(input: &str, flag: &'static str) -> Result<IpAddr, FlagError> {
    input.parse::<IpAddr>().map_err(|_| FlagError::Ip {
        flag,
        input: input.to_string(),
    })
}

fn dashed(input: &str) -> String {
    input.replace(['.', '/', ':'], "-")
}

/// `cidr`, `name!cidr` or `name!cidr!nexthop`.
pub fn parse_route(input: &str, default_next_hop: Option<&str>) -> Result<RouteSpec, FlagError> {
    const FLAG: &str = "route";
    let parts = split(input, FLAG)?;
    let (name, subnet, next_hop) = match parts.as_slice() {
        [subnet] => {
            let hop = default_next_hop.ok_or_else(|| FlagError::MissingNextHop(input.into()))?;
            (dashed(subnet), subnet.as_str(), hop)
        }
        [name, subnet] => {
            let hop = default_next_hop.ok_or_else(|| FlagError::MissingNextHop(input.into()))?;
            (name.clone(), subnet.as_str(), hop)
        }
        [name, subnet, hop] => (name.clone(), subnet.as_str(), hop.as_str()),
        _ => {
            return Err(FlagError::Arity {
                flag: FLAG,
                input: input.into(),
                expected: "cidr, name!cidr or name!cidr!nexthop",
            });
        }
    };

    Ok(RouteSpec {
        name,
        subnet: cidr(subnet, FLAG)?,
        next_hop: ip(next_hop.trim(), FLAG)?,
    })
}

/// `publicIp!lanIp` or `name!publicIp!lanIp`.
pub fn parse_nat(input: &str) -> Result<NatSpec, FlagError> {
    const FLAG: &str = "nat";
    let parts = split(input, FLAG)?;
    let (name, public, lan) = match parts.as_slice() {
        [public, lan] => (dashed(public), public, lan),
        [name, public, lan] => (name.clone(), public, lan),
        _ => {
            return Err(FlagError::Arity {
                flag: FLAG,
                input: input.into(),
                expected: "publicIp!lanIp or name!publicIp!lanIp",
            });
        }
    };

    Ok(NatSpec {
        name,
        public_ip: ip(public, FLAG)?,
        lan_ip: ip(lan, FLAG)?,
    })
}

/// `protocol!ports` or `protocol!ports!allowedIps`, lists comma separated.
pub fn parse_port_rule(input: &str) -> Result<PortRule, FlagError> {
    const FLAG: &str = "port";
    let parts = split(input, FLAG)?;
    let (protocol, ports, allowed) = match parts.as_slice() {
        [protocol, ports] => (protocol, ports, "any"),
        [protocol, ports, allowed] => (protocol, ports, allowed.as_str()),
        _ => {
            return Err(FlagError::Arity {
                flag: FLAG,
                input: input.into(),
                expected: "protocol!ports or protocol!ports!allowedIps",
            });
        }
    };

    let protocol = protocol.to_ascii_lowercase();
    if !PROTOCOLS.contains(&protocol.as_str()) {
        return Err(FlagError::Protocol(protocol));
    }

    let allowed_ips = comma_list(allowed, FLAG, input)?;
    for entry in &allowed_ips {
        if entry != "any" {
            cidr(entry, FLAG)?;
        }
    }

    Ok(PortRule {
        protocol,
        destination_ports: comma_list(ports, FLAG, input)?,
        allowed_ips,
    })
}

/// `cidr` or `name!cidr`.
pub fn parse_ip_object(input: &str) -> Result<IpObjectSpec, FlagError> {
    const FLAG: &str = "object";
    let parts = split(input, FLAG)?;
    let (name, value) = match parts.as_slice() {
        [value] => (dashed(value), value),
        [name, value] => (name.clone(), value),
        _ => {
            return Err(FlagError::Arity {
                flag: FLAG,
                input: input.into(),
                expected: "cidr or name!cidr",
            });
        }
    };

    Ok(IpObjectSpec {
        name,
        cidr: cidr(value, FLAG)?,
    })
}

/// Parse every value of a repeatable flag, stopping at the first bad one.
pub fn parse_all<T, F>(inputs: &[String], parse: F) -> Result<Vec<T>, FlagError>
where
    F: Fn(&str) -> Result<T, FlagError>,
{
    inputs.iter().map(|input| parse(input)).collect()
}

fn comma_list(raw: &str, flag: &'static str, input: &str) -> Result<Vec<String>, FlagError> {
    let items: Vec<String> = raw.split(',').map(|s| s.trim().to_string()).collect();
    if items.iter().any(|s| s.is_empty()) {
        return Err(FlagError::Empty {
            flag,
            input: input.to_string(),
        });
    }
    Ok(items)
}
