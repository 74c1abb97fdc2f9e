//! SQL REST API warehouse driver
//!
//! Speaks the warehouse's HTTP statement API over `reqwest`: a session
//! login for password credentials, or a signed key-pair JWT presented as
//! a bearer token. One `RestConnection` is one warehouse session; the
//! pool holds at most one per tenant.

use crate::config::tenant::{Credential, TenantConnectionConfig};
use crate::error::{SnowError, SnowResult};
use crate::warehouse::driver::{RowSet, WarehouseConnection, WarehouseDriver, WarehouseValue};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 150;

/// Driver options. The base URL override exists for tests and private
/// deployments; when unset the account identifier forms the hostname.
#[derive(Debug, Clone)]
pub struct RestDriverOptions {
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub base_url_override: Option<String>,
}

impl Default for RestDriverOptions {
    fn default() -> Self {
        Self {
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            base_url_override: None,
        }
    }
}

/// Warehouse driver over the SQL REST API
pub struct RestWarehouseDriver {
    http: Client,
    options: RestDriverOptions,
}

enum SessionAuth {
    /// `Authorization: Snowflake Token="…"` from the login handshake
    SessionToken(String),
    /// `Authorization: Bearer …` with the KEYPAIR_JWT token type header
    KeyPairJwt(String),
}

impl RestWarehouseDriver {
    pub fn new(options: RestDriverOptions) -> SnowResult<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(options.connect_timeout_secs))
            .timeout(Duration::from_secs(options.request_timeout_secs))
            .build()
            .map_err(|e| SnowError::connection(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { http, options })
    }

    fn base_url(&self, config: &TenantConnectionConfig) -> String {
        self.options
            .base_url_override
            .clone()
            .unwrap_or_else(|| format!("https://{}.snowflakecomputing.com", config.account))
    }

    /// Password handshake: exchange credentials for a session token.
    async fn login(&self, base_url: &str, config: &TenantConnectionConfig) -> SnowResult<String> {
        let Credential::Password(password) = &config.credential else {
            return Err(SnowError::connection("login requires a password credential"));
        };

        let body = json!({
            "data": {
                "ACCOUNT_NAME": config.account,
                "LOGIN_NAME": config.user,
                "PASSWORD": password,
            }
        });

        let response = self
            .http
            .post(format!("{base_url}/session/v1/login-request"))
            .json(&body)
            .send()
            .await
            .map_err(|e| SnowError::connection(format!("login request failed: {e}")))?;

        let status = response.status();
        let payload: Value = response
            .json()
            .await
            .map_err(|e| SnowError::connection(format!("malformed login response: {e}")))?;

        if !status.is_success() || !payload["success"].as_bool().unwrap_or(false) {
            let message = payload["message"].as_str().unwrap_or("authentication failed");
            return Err(SnowError::connection(format!(
                "warehouse login rejected: {message}"
            )));
        }

        payload["data"]["token"]
            .as_str()
            .map(|t| t.to_string())
            .ok_or_else(|| SnowError::connection("login response carried no session token"))
    }
}

#[async_trait]
impl WarehouseDriver for RestWarehouseDriver {
    async fn connect(
        &self,
        config: &TenantConnectionConfig,
    ) -> SnowResult<Arc<dyn WarehouseConnection>> {
        let base_url = self.base_url(config);

        let auth = match &config.credential {
            Credential::Password(_) => {
                let token = self.login(&base_url, config).await?;
                SessionAuth::SessionToken(token)
            }
            Credential::KeyPair(material) => SessionAuth::KeyPairJwt(material.clone()),
        };

        let connection = RestConnection {
            http: self.http.clone(),
            statements_url: format!("{base_url}/api/v2/statements"),
            auth,
            database: config.database.clone(),
            schema: config.default_schema().to_string(),
            warehouse: config.warehouse.clone(),
            role: config.role.clone(),
            alive: AtomicBool::new(true),
        };

        // Key-pair mode has no login round trip, so verify the session
        // is actually usable before handing it to the pool.
        if matches!(connection.auth, SessionAuth::KeyPairJwt(_)) {
            connection
                .execute("SELECT 1")
                .await
                .map_err(|e| SnowError::connection(format!("key-pair handshake failed: {e}")))?;
        }

        debug!(account = %config.account, "warehouse session established");
        Ok(Arc::new(connection))
    }
}

struct RestConnection {
    http: Client,
    statements_url: String,
    auth: SessionAuth,
    database: String,
    schema: String,
    warehouse: String,
    role: String,
    alive: AtomicBool,
}

#[async_trait]
impl WarehouseConnection for RestConnection {
    async fn ping(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn execute(&self, sql: &str) -> SnowResult<RowSet> {
        let body = json!({
            "statement": sql,
            "database": self.database,
            "schema": self.schema,
            "warehouse": self.warehouse,
            "role": self.role,
        });

        // Fresh idempotency key per submission; the API dedupes retried
        // statements by this id.
        let request_id = Uuid::new_v4();
        let mut request = self
            .http
            .post(&self.statements_url)
            .query(&[("requestId", request_id.to_string())])
            .json(&body);
        request = match &self.auth {
            SessionAuth::SessionToken(token) => {
                request.header("Authorization", format!("Snowflake Token=\"{token}\""))
            }
            SessionAuth::KeyPairJwt(jwt) => request
                .header("Authorization", format!("Bearer {jwt}"))
                .header("X-Snowflake-Authorization-Token-Type", "KEYPAIR_JWT"),
        };

        let response = request.send().await.map_err(|e| {
            // Transport failure: the session may be gone entirely.
            self.alive.store(false, Ordering::SeqCst);
            SnowError::connection(format!("statement request failed: {e}"))
        })?;

        let status = response.status();
        let payload: Value = response
            .json()
            .await
            .map_err(|e| SnowError::execution(format!("malformed statement response: {e}")))?;

        if status == reqwest::StatusCode::UNAUTHORIZED {
            self.alive.store(false, Ordering::SeqCst);
            return Err(SnowError::connection("warehouse session expired"));
        }
        if !status.is_success() {
            let message = payload["message"].as_str().unwrap_or("statement failed");
            return Err(SnowError::execution(message.to_string()));
        }

        parse_row_set(&payload)
    }

    async fn close(&self) {
        // The server reaps idle sessions; locally the flag is what the
        // pool consults.
        self.alive.store(false, Ordering::SeqCst);
    }
}

/// Decode the statement API result payload into a [`RowSet`].
fn parse_row_set(payload: &Value) -> SnowResult<RowSet> {
    let row_type = payload["resultSetMetaData"]["rowType"]
        .as_array()
        .cloned()
        .unwrap_or_default();

    let columns: Vec<String> = row_type
        .iter()
        .map(|c| c["name"].as_str().unwrap_or("").to_string())
        .collect();
    let types: Vec<String> = row_type
        .iter()
        .map(|c| c["type"].as_str().unwrap_or("text").to_ascii_lowercase())
        .collect();

    let mut rows = Vec::new();
    if let Some(data) = payload["data"].as_array() {
        for raw_row in data {
            let cells = raw_row.as_array().cloned().unwrap_or_default();
            let mut row = Vec::with_capacity(columns.len());
            for (idx, cell) in cells.iter().enumerate() {
                let declared = types.get(idx).map(|t| t.as_str()).unwrap_or("text");
                row.push(decode_cell(cell, declared));
            }
            rows.push(row);
        }
    }

    Ok(RowSet { columns, rows })
}

/// Map one wire cell to a typed value. The API encodes every non-null
/// cell as a string; unparseable cells fall back to text rather than
/// failing the whole result.
fn decode_cell(cell: &Value, declared_type: &str) -> WarehouseValue {
    let Some(text) = cell.as_str() else {
        return WarehouseValue::Null;
    };

    match declared_type {
        "fixed" => {
            if let Ok(n) = text.parse::<i64>() {
                WarehouseValue::Int(n)
            } else if let Ok(f) = text.parse::<f64>() {
                WarehouseValue::Float(f)
            } else {
                WarehouseValue::Text(text.to_string())
            }
        }
        "real" | "float" | "double" => text
            .parse::<f64>()
            .map(WarehouseValue::Float)
            .unwrap_or_else(|_| WarehouseValue::Text(text.to_string())),
        "boolean" => match text {
            "true" | "TRUE" | "1" => WarehouseValue::Bool(true),
            "false" | "FALSE" | "0" => WarehouseValue::Bool(false),
            other => WarehouseValue::Text(other.to_string()),
        },
        "date" | "time" | "timestamp_ltz" | "timestamp_ntz" | "timestamp_tz" => {
            parse_timestamp(text)
                .map(WarehouseValue::Timestamp)
                .unwrap_or_else(|| WarehouseValue::Text(text.to_string()))
        }
        "binary" => decode_hex(text)
            .map(WarehouseValue::Binary)
            .unwrap_or_else(|| WarehouseValue::Text(text.to_string())),
        _ => WarehouseValue::Text(text.to_string()),
    }
}

/// Timestamps arrive either as RFC 3339 text or as (fractional) epoch
/// seconds depending on session formatting.
fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    let epoch: f64 = text.trim().parse().ok()?;
    let secs = epoch.trunc() as i64;
    let nanos = (epoch.fract() * 1e9).round() as u32;
    Utc.timestamp_opt(secs, nanos).single()
}

fn decode_hex(text: &str) -> Option<Vec<u8>> {
    if text.len() % 2 != 0 {
        return None;
    }
    (0..text.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(text.get(i..i + 2)?, 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_metadata_and_typed_cells() {
        let payload = json!({
            "resultSetMetaData": {
                "rowType": [
                    {"name": "ID", "type": "fixed"},
                    {"name": "NAME", "type": "text"},
                    {"name": "ACTIVE", "type": "boolean"},
                    {"name": "SIGNED_UP", "type": "timestamp_ntz"},
                ]
            },
            "data": [
                ["42", "Ada", "true", "2024-03-01T12:30:00+00:00"],
                [null, "Grace", "false", "1709294400"],
            ]
        });

        let rows = parse_row_set(&payload).unwrap();
        assert_eq!(rows.columns, vec!["ID", "NAME", "ACTIVE", "SIGNED_UP"]);
        assert_eq!(rows.rows[0][0], WarehouseValue::Int(42));
        assert_eq!(rows.rows[1][0], WarehouseValue::Null);
        assert_eq!(rows.rows[0][2], WarehouseValue::Bool(true));
        assert!(matches!(rows.rows[0][3], WarehouseValue::Timestamp(_)));
        assert!(matches!(rows.rows[1][3], WarehouseValue::Timestamp(_)));
    }

    #[test]
    fn decimal_fixed_cells_become_floats() {
        assert_eq!(decode_cell(&json!("12.5"), "fixed"), WarehouseValue::Float(12.5));
    }

    #[test]
    fn binary_cells_decode_from_hex() {
        assert_eq!(
            decode_cell(&json!("deadbeef"), "binary"),
            WarehouseValue::Binary(vec![0xde, 0xad, 0xbe, 0xef])
        );
    }

    #[test]
    fn unparseable_cells_fall_back_to_text() {
        assert_eq!(
            decode_cell(&json!("not-a-number"), "fixed"),
            WarehouseValue::Text("not-a-number".to_string())
        );
        assert_eq!(
            decode_cell(&json!("zz"), "binary"),
            WarehouseValue::Text("zz".to_string())
        );
    }

    #[test]
    fn empty_payload_yields_empty_row_set() {
        let rows = parse_row_set(&json!({})).unwrap();
        assert!(rows.columns.is_empty());
        assert!(rows.rows.is_empty());
    }
}
