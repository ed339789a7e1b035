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

//! Command handlers, one module per resource group.

pub mod appliance;
pub mod devices;
pub mod multi_network;
pub mod networks;
pub mod organizations;
pub mod sensor;
pub mod switch;
pub mod wireless;

use crate::client::DashboardClient;
use crate::lookup;
use crate::output::{self, OutputFormat, Report};
use crate::prompt::Prompter;
use anyhow::{Result, bail};
use serde_json::Value;
use std::io::Write;
use std::time::Duration;

/// Everything a handler needs besides its own arguments.
pub struct Ctx<'a> {
    pub client: &'a DashboardClient,
    pub format: OutputFormat,
    pub poll_interval: Duration,
    prompter: &'a mut dyn Prompter,
    out: &'a mut dyn Write,
}

impl<'a> Ctx<'a> {
    pub fn new(
        client: &'a DashboardClient,
        format: OutputFormat,
        poll_interval: Duration,
        prompter: &'a mut dyn Prompter,
        out: &'a mut dyn Write,
    ) -> Self {
        Self {
            client,
            format,
            poll_interval,
            prompter,
            out,
        }
    }

    /// Informational line. Goes to stderr in JSON mode so stdout stays
    /// machine readable.
    pub fn say(&mut self, message: impl AsRef<str>) -> Result<()> {
        match self.format {
            OutputFormat::Table => writeln!(self.out, "{}", message.as_ref())?,
            OutputFormat::Json => eprintln!("{}", message.as_ref()),
        }
        Ok(())
    }

    pub fn show(&mut self, report: &Report) -> Result<()> {
        report.render(self.format, &mut *self.out)
    }

    /// Reports that belong to one command's output.
    pub fn show_all(&mut self, reports: &[Report]) -> Result<()> {
        output::render_all(reports, self.format, &mut *self.out)
    }

    pub fn show_json(&mut self, value: &Value) -> Result<()> {
        writeln!(self.out, "{}", serde_json::to_string_pretty(value)?)?;
        Ok(())
    }

    /// Ask for confirmation unless `ask` is false.
    pub fn confirm(&mut self, question: &str, ask: bool) -> Result<bool> {
        if !ask {
            return Ok(true);
        }
        self.prompter.confirm(question)
    }

    pub fn org(&mut self, name: &str) -> Result<Value> {
        lookup::find_org_by_name(self.client, name, &mut *self.prompter)
    }

    pub fn network(&mut self, org_name: &str, network_name: &str) -> Result<Value> {
        lookup::find_network_by_name(self.client, org_name, network_name, &mut *self.prompter)
    }
}

/// Collapse an `--enable-x`/`--disable-x` flag pair.
pub fn toggle(enable: bool, disable: bool) -> Option<bool> {
    match (enable, disable) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

/// Fail unless at least one value was given for a repeatable flag.
pub fn require_some<T>(values: &[T], message: &str) -> Result<()> {
    if values.is_empty() {
        bail!("{message}");
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::prompt::ScriptedPrompter;
    use httpmock::prelude::*;
    use serde_json::json;

    pub fn client(server: &MockServer) -> DashboardClient {
        DashboardClient::new(&server.base_url(), "key", Duration::from_secs(5)).unwrap()
    }

    /// Run a handler against a buffer; returns its result and table output.
    pub fn run<F>(
        client: &DashboardClient,
        prompter: &mut ScriptedPrompter,
        f: F,
    ) -> (Result<()>, String)
    where
        F: FnOnce(&mut Ctx<'_>) -> Result<()>,
    {
        run_as(OutputFormat::Table, client, prompter, f)
    }

    pub fn run_as<F>(
        format: OutputFormat,
        client: &DashboardClient,
        prompter: &mut ScriptedPrompter,
        f: F,
    ) -> (Result<()>, String)
    where
        F: FnOnce(&mut Ctx<'_>) -> Result<()>,
    {
        let mut out = Vec::new();
        let result = {
            let mut ctx = Ctx::new(client, format, Duration::ZERO, prompter, &mut out);
            f(&mut ctx)
        };
        (result, String::from_utf8(out).unwrap())
    }

    /// Mock organization `1` named "Acme" holding `network`.
    pub fn mock_network(server: &MockServer, network: Value) {
        server.mock(|when, then| {
            when.method(GET).path("/organizations");
            then.status(200)
                .json_body(json!([{"id": "1", "name": "Acme", "api": {"enabled": true}}]));
        });
        server.mock(|when, then| {
            when.method(GET).path("/organizations/1/networks");
            then.status(200).json_body(json!([network]));
        });
    }

    #[test]
    fn toggle_pairs() {
        assert_eq!(toggle(true, false), Some(true));
        assert_eq!(toggle(false, true), Some(false));
        assert_eq!(toggle(false, false), None);
    }
}
