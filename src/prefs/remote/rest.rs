use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::RemotePreferences;
use crate::config::RestConfig;
use crate::prefs::key::PreferenceKey;
use crate::prefs::outcome::{RemoteFetch, RemoteSave};
use crate::time::{ms_to_rfc3339, now_ms};
use crate::{AppError, AppResult};

/// Postgres "undefined_table" and PostgREST "table not in schema cache".
const MISSING_RELATION_CODES: &[&str] = &["42P01", "PGRST205"];

/// Hosted table exposed through a PostgREST-compatible REST endpoint.
#[derive(Debug, Clone)]
pub struct RestRemote {
    http: Client,
    config: RestConfig,
}

#[derive(Debug, Deserialize)]
struct ValueRow {
    value: Value,
}

#[derive(Debug, Serialize)]
struct UpsertRow<'a> {
    owner_id: &'a str,
    preference_key: &'a str,
    value: &'a Value,
    updated_at: String,
}

#[derive(Debug, Default, Deserialize)]
struct PostgrestError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

enum Failure {
    NotProvisioned,
    Transient(AppError),
}

impl RestRemote {
    pub fn new(config: RestConfig) -> AppResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("matrix-prefs/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(AppError::from)?;
        Ok(Self { http, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/rest/v1/{}", self.config.base_url, self.config.table)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let bearer = self
            .config
            .access_token
            .as_deref()
            .unwrap_or(&self.config.api_key);
        request
            .header("apikey", &self.config.api_key)
            .bearer_auth(bearer)
    }
}

fn classify_failure(status: StatusCode, body: &str) -> Failure {
    if status == StatusCode::NOT_IMPLEMENTED {
        return Failure::NotProvisioned;
    }

    let parsed: PostgrestError = serde_json::from_str(body).unwrap_or_default();
    let missing_code = parsed
        .code
        .as_deref()
        .map(|code| MISSING_RELATION_CODES.contains(&code))
        .unwrap_or(false);
    let missing_message = parsed
        .message
        .as_deref()
        .map(|msg| msg.contains("relation") && msg.contains("does not exist"))
        .unwrap_or(false);
    if missing_code || missing_message {
        return Failure::NotProvisioned;
    }

    let message = parsed
        .message
        .unwrap_or_else(|| format!("remote responded with {status}"));
    let mut error =
        AppError::new("REMOTE/HTTP", message).with_context("status", status.as_u16().to_string());
    if let Some(code) = parsed.code {
        error = error.with_context("remote_code", code);
    }
    Failure::Transient(error)
}

#[async_trait]
impl RemotePreferences for RestRemote {
    fn name(&self) -> &'static str {
        "rest"
    }

    async fn fetch(&self, owner_id: &str, key: &PreferenceKey) -> RemoteFetch {
        let request = self.authorize(self.http.get(self.endpoint())).query(&[
            ("owner_id", format!("eq.{owner_id}")),
            ("preference_key", format!("eq.{key}")),
            ("select", "value".to_string()),
        ]);

        let res = match request.send().await {
            Ok(res) => res,
            Err(err) => return RemoteFetch::Transient(AppError::from(err)),
        };

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return match classify_failure(status, &body) {
                Failure::NotProvisioned => RemoteFetch::NotProvisioned,
                Failure::Transient(err) => RemoteFetch::Transient(err),
            };
        }

        match res.json::<Vec<ValueRow>>().await {
            Ok(rows) => match rows.into_iter().next() {
                Some(row) => RemoteFetch::Found(row.value),
                None => RemoteFetch::NotFound,
            },
            Err(err) => RemoteFetch::Transient(AppError::from(err)),
        }
    }

    async fn save(&self, owner_id: &str, key: &PreferenceKey, value: &Value) -> RemoteSave {
        let rows = [UpsertRow {
            owner_id,
            preference_key: key.as_str(),
            value,
            updated_at: ms_to_rfc3339(now_ms()),
        }];
        let request = self
            .authorize(self.http.post(self.endpoint()))
            .query(&[("on_conflict", "owner_id,preference_key")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&rows);

        let res = match request.send().await {
            Ok(res) => res,
            Err(err) => return RemoteSave::Transient(AppError::from(err)),
        };

        let status = res.status();
        if status.is_success() {
            return RemoteSave::Saved;
        }
        let body = res.text().await.unwrap_or_default();
        match classify_failure(status, &body) {
            Failure::NotProvisioned => RemoteSave::NotProvisioned,
            Failure::Transient(err) => RemoteSave::Transient(err),
        }
    }
}
