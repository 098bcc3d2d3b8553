//! HTTP client for the assistant v1 workspaces API.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::Deserialize;
use tracing::debug;

use crate::core::resolver::matches_pattern;
use crate::core::skill::{SkillDocument, SkillRecord};
use crate::error::{Result, WaError};

use super::SkillService;

pub const DEFAULT_API_VERSION: &str = "2020-02-05";

const RATE_LIMIT_HEADERS: [&str; 3] = [
    "X-RateLimit-Reset",
    "X-RateLimit-Remaining",
    "X-RateLimit-Limit",
];

#[derive(Debug, Clone)]
pub struct WatsonServiceConfig {
    pub apikey: String,
    pub url: String,
    pub api_version: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
struct WorkspaceList {
    #[serde(default)]
    workspaces: Vec<WorkspaceSummary>,
    #[serde(default)]
    pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
struct WorkspaceSummary {
    workspace_id: String,
    name: String,
    #[serde(default)]
    updated: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Pagination {
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WorkspaceStatus {
    #[serde(default)]
    status: Option<String>,
}

/// Workspaces API client authenticated with an apikey.
pub struct WatsonService {
    client: Client,
    base_url: String,
    apikey: String,
    api_version: String,
}

impl WatsonService {
    pub fn new(config: &WatsonServiceConfig) -> Result<Self> {
        if config.apikey.trim().is_empty() {
            return Err(WaError::MissingConfig(
                "apikey (set WA_APIKEY or pass --apikey)".to_string(),
            ));
        }
        if config.url.trim().is_empty() {
            return Err(WaError::MissingConfig(
                "service url (set WA_URL or pass --url)".to_string(),
            ));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|err| WaError::Config(format!("http client: {err}")))?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            apikey: config.apikey.clone(),
            api_version: config.api_version.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/v1/{path}", self.base_url)
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .basic_auth("apikey", Some(&self.apikey))
            .query(&[("version", self.api_version.as_str())])
    }

    fn send(&self, action: &str, builder: RequestBuilder) -> Result<Response> {
        let response = self.authed(builder).send()?;
        trace_rate_limits(action, &response);
        Ok(response)
    }

    fn expect_json<T: serde::de::DeserializeOwned>(action: &str, response: Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(WaError::remote(action, format!("HTTP {status}: {body}")));
        }
        response
            .json()
            .map_err(|err| WaError::remote(action, format!("parse response: {err}")))
    }

    fn list_all(&self) -> Result<Vec<SkillRecord>> {
        let mut records = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut request = self
                .client
                .get(self.endpoint("workspaces"))
                .query(&[("include_audit", "true")]);
            if let Some(cursor) = cursor.as_deref() {
                request = request.query(&[("cursor", cursor)]);
            }
            let response = self.send("list_workspaces", request)?;
            let page: WorkspaceList = Self::expect_json("list_workspaces", response)?;
            records.extend(page.workspaces.into_iter().map(|workspace| SkillRecord {
                id: workspace.workspace_id,
                name: workspace.name,
                updated_on: workspace.updated.unwrap_or_default(),
            }));
            cursor = page.pagination.and_then(|p| p.next_cursor);
            if cursor.is_none() {
                break;
            }
        }
        Ok(records)
    }

    fn status_succeeded(action: &str, response: Response, expected: StatusCode) -> Result<bool> {
        let status = response.status();
        if status == expected {
            return Ok(true);
        }
        if status.is_client_error() || status.is_server_error() {
            let body = response.text().unwrap_or_default();
            return Err(WaError::remote(action, format!("HTTP {status}: {body}")));
        }
        Ok(false)
    }
}

impl SkillService for WatsonService {
    fn list(&self, pattern: &str) -> Result<Vec<SkillRecord>> {
        let mut records = self.list_all()?;
        records.retain(|record| matches_pattern(&record.name, pattern));
        Ok(records)
    }

    fn get(&self, id: &str) -> Result<SkillDocument> {
        let request = self
            .client
            .get(self.endpoint(&format!("workspaces/{id}")))
            .query(&[
                ("export", "true"),
                ("sort", "stable"),
                ("include_audit", "true"),
            ]);
        let response = self.send("get_workspace", request)?;
        let mut document: SkillDocument = Self::expect_json("get_workspace", response)?;
        document.strip_nested_audit();
        Ok(document)
    }

    fn status(&self, id: &str) -> Result<String> {
        let request = self.client.get(self.endpoint(&format!("workspaces/{id}")));
        let response = self.send("get_workspace", request)?;
        let status: WorkspaceStatus = Self::expect_json("get_workspace", response)?;
        Ok(status.status.unwrap_or_default())
    }

    fn create(&self, document: &SkillDocument) -> Result<bool> {
        let mut body = document.clone();
        body.id = None;
        let request = self.client.post(self.endpoint("workspaces")).json(&body);
        let response = self.send("create_workspace", request)?;
        Self::status_succeeded("create_workspace", response, StatusCode::CREATED)
    }

    fn update(&self, document: &SkillDocument) -> Result<bool> {
        let id = document.id.clone().ok_or_else(|| {
            WaError::remote("update_workspace", format!("skill {} has no id", document.name))
        })?;
        let mut body = document.clone();
        body.id = None;
        let request = self
            .client
            .post(self.endpoint(&format!("workspaces/{id}")))
            .json(&body);
        let response = self.send("update_workspace", request)?;
        Self::status_succeeded("update_workspace", response, StatusCode::OK)
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let request = self.client.delete(self.endpoint(&format!("workspaces/{id}")));
        let response = self.send("delete_workspace", request)?;
        Self::status_succeeded("delete_workspace", response, StatusCode::OK)
    }
}

fn trace_rate_limits(action: &str, response: &Response) {
    let headers = response.headers();
    let limits: Vec<String> = RATE_LIMIT_HEADERS
        .iter()
        .filter_map(|name| {
            let value = headers.get(*name)?.to_str().ok()?;
            Some(format!("{name}={}", format_reset(name, value)))
        })
        .collect();
    debug!(action, status = %response.status(), rate_limit = %limits.join(", "), "service call");
}

fn format_reset(header: &str, value: &str) -> String {
    if header != "X-RateLimit-Reset" {
        return value.to_string();
    }
    value
        .parse::<i64>()
        .ok()
        .and_then(|secs| chrono::DateTime::<chrono::Utc>::from_timestamp(secs, 0))
        .map_or_else(
            || value.to_string(),
            |at| at.format("%Y-%m-%d %H:%M:%S").to_string(),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn service(server: &MockServer) -> WatsonService {
        WatsonService::new(&WatsonServiceConfig {
            apikey: "key".to_string(),
            url: server.base_url(),
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[test]
    fn list_follows_pagination_and_filters() {
        let server = MockServer::start();
        let first = server.mock(|when, then| {
            when.method(GET)
                .path("/v1/workspaces")
                .query_param("version", DEFAULT_API_VERSION)
                .query_param_missing("cursor");
            then.status(200).json_body(json!({
                "workspaces": [
                    {"workspace_id": "1", "name": "billing", "updated": "2024-01-01T00:00:00Z"}
                ],
                "pagination": {"next_cursor": "abc"}
            }));
        });
        let second = server.mock(|when, then| {
            when.method(GET)
                .path("/v1/workspaces")
                .query_param("cursor", "abc");
            then.status(200).json_body(json!({
                "workspaces": [
                    {"workspace_id": "2", "name": "topic__billing", "updated": "2024-01-02T00:00:00Z"},
                    {"workspace_id": "3", "name": "support", "updated": "2024-01-03T00:00:00Z"}
                ],
                "pagination": {}
            }));
        });

        let svc = service(&server);
        let all = svc.list("").unwrap();
        assert_eq!(all.len(), 3);
        let billing = svc.list("*billing").unwrap();
        assert_eq!(
            billing.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
            vec!["1", "2"]
        );
        first.assert_hits(2);
        second.assert_hits(2);
    }

    #[test]
    fn get_strips_nested_audit_fields() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET)
                .path("/v1/workspaces/1")
                .query_param("export", "true");
            then.status(200).json_body(json!({
                "name": "billing",
                "description": "",
                "workspace_id": "1",
                "updated": "2024-01-01T00:00:00Z",
                "intents": [{"intent": "pay", "updated": "2023-01-01"}]
            }));
        });
        let doc = service(&server).get("1").unwrap();
        assert_eq!(doc.updated.as_deref(), Some("2024-01-01T00:00:00Z"));
        assert_eq!(doc.extra["intents"], json!([{"intent": "pay"}]));
    }

    #[test]
    fn create_reports_created_status() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/v1/workspaces");
            then.status(201).json_body(json!({"workspace_id": "9"}));
        });
        let created = service(&server)
            .create(&SkillDocument::new("billing", "desc"))
            .unwrap();
        assert!(created);
        mock.assert();
    }

    #[test]
    fn delete_failure_is_remote_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(DELETE).path("/v1/workspaces/1");
            then.status(404).body("not found");
        });
        let err = service(&server).delete("1").unwrap_err();
        assert!(matches!(err, WaError::Remote { .. }));
    }

    #[test]
    fn missing_apikey_is_configuration_error() {
        let err = WatsonService::new(&WatsonServiceConfig {
            apikey: String::new(),
            url: "http://localhost".to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout_secs: 5,
        })
        .err()
        .unwrap();
        assert!(matches!(err, WaError::MissingConfig(_)));
    }
}
