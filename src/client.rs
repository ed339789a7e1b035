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

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, LINK};
use reqwest::{Method, Url};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

const USER_AGENT: &str = concat!("merakictl/", env!("CARGO_PKG_VERSION"));

pub const DEFAULT_PER_PAGE: u32 = 1000;
/// Smallest page size the Dashboard accepts.
pub const MIN_PER_PAGE: u32 = 3;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{method} {path} returned HTTP {status}{}", format_errors(.errors))]
    Status {
        method: Method,
        path: String,
        status: u16,
        errors: Vec<String>,
    },
    #[error("{method} {path} could not be sent")]
    Transport {
        method: Method,
        path: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("response from {path} is not valid JSON")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid request path `{0}`")]
    Path(String),
}

impl ApiError {
    /// Error messages reported by the Dashboard, if any.
    pub fn messages(&self) -> &[String] {
        match self {
            ApiError::Status { errors, .. } => errors,
            _ => &[],
        }
    }

    pub fn mentions(&self, needle: &str) -> bool {
        let needle = needle.to_ascii_lowercase();
        self.messages()
            .iter()
            .any(|m| m.to_ascii_lowercase().contains(&needle))
    }
}

fn format_errors(errors: &[String]) -> String {
    if errors.is_empty() {
        String::new()
    } else {
        format!(": {}", errors.join("; "))
    }
}

#[derive(Debug, Clone)]
pub struct DashboardClient {
    base_url: Url,
    http: Client,
    api_key: String,
    per_page: u32,
}

impl DashboardClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        // Url::join drops the last path segment unless the base ends in '/'.
        let mut base = base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let parsed = Url::parse(&base).context("parsing base URL")?;
        let http = Client::builder()
            .user_agent(HeaderValue::from_static(USER_AGENT))
            .timeout(timeout)
            .build()
            .context("building HTTP client")?;

        Ok(Self {
            base_url: parsed,
            http,
            api_key: api_key.to_string(),
            per_page: DEFAULT_PER_PAGE,
        })
    }

    pub fn with_per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page.max(MIN_PER_PAGE);
        self
    }

    pub fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value, ApiError> {
        let url = self.url(path, query)?;
        self.send(Method::GET, path, url, Option::<&Value>::None)
            .map(|(json, _)| json)
    }

    /// GET a list endpoint that does not paginate.
    pub fn get_list(&self, path: &str, query: &[(&str, String)]) -> Result<Vec<Value>, ApiError> {
        Ok(match self.get(path, query)? {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            other => vec![other],
        })
    }

    /// Fetch every page of a list endpoint by following `Link: rel=next`.
    pub fn get_all(&self, path: &str, query: &[(&str, String)]) -> Result<Vec<Value>, ApiError> {
        self.get_all_capped(path, query, u32::MAX)
    }

    /// Like [`get_all`](Self::get_all) for endpoints whose page size is capped
    /// below the configured one.
    pub fn get_all_capped(
        &self,
        path: &str,
        query: &[(&str, String)],
        max_per_page: u32,
    ) -> Result<Vec<Value>, ApiError> {
        let mut query = query.to_vec();
        query.push(("perPage", self.per_page.min(max_per_page).to_string()));
        let mut next = Some(self.url(path, &query)?);
        let mut items = Vec::new();

        while let Some(url) = next.take() {
            let (page, link) = self.send(Method::GET, path, url, Option::<&Value>::None)?;
            match page {
                Value::Array(mut arr) => items.append(&mut arr),
                Value::Null => {}
                other => items.push(other),
            }
            next = link;
        }

        debug!(path, count = items.len(), "collected paginated results");
        Ok(items)
    }

    pub fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<Value, ApiError> {
        let url = self.url(path, &[])?;
        self.send(Method::POST, path, url, Some(body))
            .map(|(json, _)| json)
    }

    pub fn put<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<Value, ApiError> {
        let url = self.url(path, &[])?;
        self.send(Method::PUT, path, url, Some(body))
            .map(|(json, _)| json)
    }

    fn url(&self, path: &str, query: &[(&str, String)]) -> Result<Url, ApiError> {
        let normalized = path.trim_start_matches('/');
        let mut url = self
            .base_url
            .join(normalized)
            .map_err(|_| ApiError::Path(path.to_string()))?;
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        }
        Ok(url)
    }

    fn send<T: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        url: Url,
        body: Option<&T>,
    ) -> Result<(Value, Option<Url>), ApiError> {
        debug!(%method, %url, "dashboard request");

        let mut request = self
            .http
            .request(method.clone(), url)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(ACCEPT, HeaderValue::from_static("application/json"));

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().map_err(|source| ApiError::Transport {
            method: method.clone(),
            path: path.to_string(),
            source,
        })?;

        let status = response.status();
        let next = next_link(response.headers());
        let text = response.text().map_err(|source| ApiError::Transport {
            method: method.clone(),
            path: path.to_string(),
            source,
        })?;

        if !status.is_success() {
            debug!(%method, path, status = status.as_u16(), "dashboard error");
            return Err(ApiError::Status {
                method,
                path: path.to_string(),
                status: status.as_u16(),
                errors: error_messages(&text),
            });
        }

        if text.trim().is_empty() {
            return Ok((Value::Null, next));
        }

        let json = serde_json::from_str(&text).map_err(|source| ApiError::Decode {
            path: path.to_string(),
            source,
        })?;
        Ok((json, next))
    }
}

fn error_messages(body: &str) -> Vec<String> {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    if let Some(errors) = parsed
        .as_ref()
        .and_then(|v| v.get("errors"))
        .and_then(|e| e.as_array())
    {
        return errors
            .iter()
            .map(|e| match e {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect();
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        Vec::new()
    } else {
        vec![trimmed.to_string()]
    }
}

fn next_link(headers: &HeaderMap) -> Option<Url> {
    let raw = headers.get(LINK)?.to_str().ok()?;
    raw.split(',').find_map(|entry| {
        let mut parts = entry.split(';');
        let target = parts
            .next()?
            .trim()
            .trim_start_matches('<')
            .trim_end_matches('>');
        let is_next = parts.any(|p| {
            let p = p.trim();
            p == "rel=next" || p == "rel=\"next\""
        });
        if is_next { Url::parse(target).ok() } else { None }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client(server: &MockServer) -> DashboardClient {
        DashboardClient::new(&server.base_url(), "test-key", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn sends_bearer_key_and_parses_json() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/organizations/1")
                .header("Authorization", "Bearer test-key");
            then.status(200).json_body(json!({"id": "1", "name": "Acme"}));
        });

        let org = client(&server).get("/organizations/1", &[]).unwrap();

        mock.assert();
        assert_eq!(org["name"], "Acme");
    }

    #[test]
    fn keeps_base_path_prefix() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/api/v1/organizations");
            then.status(200).json_body(json!([]));
        });

        let client = DashboardClient::new(
            &server.url("/api/v1"),
            "test-key",
            Duration::from_secs(5),
        )
        .unwrap();
        client.get("organizations", &[]).unwrap();

        mock.assert();
    }

    #[test]
    fn get_list_tolerates_null_and_objects() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/devices/Q2XX/lldpCdp");
            then.status(200).body("null");
        });
        server.mock(|when, then| {
            when.method(GET).path("/devices/Q2XX/switch/ports");
            then.status(200).json_body(json!({"portId": "1"}));
        });

        let client = client(&server);
        assert!(client.get_list("devices/Q2XX/lldpCdp", &[]).unwrap().is_empty());
        let ports = client.get_list("devices/Q2XX/switch/ports", &[]).unwrap();
        assert_eq!(ports, vec![json!({"portId": "1"})]);
    }

    #[test]
    fn follows_next_links_across_pages() {
        let server = MockServer::start();
        let next = server.url("/organizations/1/networks?startingAfter=N_2");
        let first = server.mock(|when, then| {
            when.method(GET)
                .path("/organizations/1/networks")
                .query_param("perPage", "3");
            then.status(200)
                .header("Link", format!("<{next}>; rel=next"))
                .json_body(json!([{"id": "N_1"}, {"id": "N_2"}]));
        });
        let second = server.mock(|when, then| {
            when.method(GET)
                .path("/organizations/1/networks")
                .query_param("startingAfter", "N_2");
            then.status(200).json_body(json!([{"id": "N_3"}]));
        });

        let items = client(&server)
            .with_per_page(3)
            .get_all("/organizations/1/networks", &[])
            .unwrap();

        first.assert();
        second.assert();
        let ids: Vec<_> = items.iter().map(|n| n["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["N_1", "N_2", "N_3"]);
    }

    #[test]
    fn page_size_is_clamped_and_capped() {
        let server = MockServer::start();
        let small = server.mock(|when, then| {
            when.method(GET)
                .path("/organizations")
                .query_param("perPage", "3");
            then.status(200).json_body(json!([]));
        });
        let capped = server.mock(|when, then| {
            when.method(GET)
                .path("/organizations/1/sensor/readings/latest")
                .query_param("perPage", "100");
            then.status(200).json_body(json!([]));
        });

        client(&server)
            .with_per_page(1)
            .get_all("organizations", &[])
            .unwrap();
        client(&server)
            .get_all_capped("organizations/1/sensor/readings/latest", &[], 100)
            .unwrap();

        small.assert();
        capped.assert();
    }

    #[test]
    fn decodes_dashboard_errors() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(PUT).path("/devices/Q2XX");
            then.status(400)
                .json_body(json!({"errors": ["Name is too long", "Tags invalid"]}));
        });

        let err = client(&server)
            .put("/devices/Q2XX", &json!({"name": "x"}))
            .unwrap_err();

        assert_eq!(err.messages(), ["Name is too long", "Tags invalid"]);
        assert!(err.mentions("too LONG"));
        let rendered = err.to_string();
        assert!(rendered.contains("HTTP 400"));
        assert!(rendered.contains("Name is too long; Tags invalid"));
    }

    #[test]
    fn empty_body_is_null() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(PUT).path("/networks/N_1/trafficAnalysis");
            then.status(204);
        });

        let value = client(&server)
            .put("/networks/N_1/trafficAnalysis", &json!({"mode": "basic"}))
            .unwrap();
        assert!(value.is_null());
    }

    #[test]
    fn parses_link_header_variants() {
        let mut headers = HeaderMap::new();
        headers.insert(
            LINK,
            HeaderValue::from_static(
                "<https://api.example/a?x=1>; rel=first, <https://api.example/a?startingAfter=9>; rel=\"next\"",
            ),
        );
        let next = next_link(&headers).unwrap();
        assert_eq!(next.as_str(), "https://api.example/a?startingAfter=9");

        headers.insert(LINK, HeaderValue::from_static("<https://api.example/a>; rel=prev"));
        assert!(next_link(&headers).is_none());
    }
}
