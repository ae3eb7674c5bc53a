//! Snowflake warehouse over the SQL API v2
//!
//! Statements are submitted to `/api/v2/statements` with their `?` bindings
//! sent as TEXT values. Long-running statements answer 202 and are polled by
//! handle; large results arrive in partitions fetched one by one.

use super::{Connector, Warehouse};
use crate::config::SnowflakeConfig;
use crate::error::CoreError;
use crate::models::{ResultTable, Value};
use crate::query::{Dialect, Statement};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Opens Snowflake sessions from the `[snowflake]` secrets section
#[derive(Debug, Clone)]
pub struct SnowflakeConnector {
    config: SnowflakeConfig,
}

impl SnowflakeConnector {
    pub fn new(config: SnowflakeConfig) -> Result<Self, CoreError> {
        config.validate()?;
        Ok(Self { config })
    }
}

#[async_trait]
impl Connector for SnowflakeConnector {
    fn describe(&self) -> String {
        let login = self
            .config
            .user
            .as_deref()
            .map(|user| format!("{}@", user))
            .unwrap_or_default();
        format!(
            "snowflake://{}{}/{}.{}",
            login, self.config.account, self.config.database, self.config.schema
        )
    }

    fn dialect(&self) -> Dialect {
        Dialect::Snowflake
    }

    async fn connect(&self) -> Result<Arc<dyn Warehouse>, CoreError> {
        let started = Instant::now();
        let warehouse = SnowflakeWarehouse::new(self.config.clone())?;

        // Credentials are only checked by the first request
        warehouse
            .execute(&Statement::raw("SELECT 1"))
            .await
            .map_err(|e| match e {
                CoreError::Query { message, .. } => CoreError::connection(message),
                other => other,
            })?;

        tracing::info!(
            account = %self.config.account,
            warehouse = %self.config.warehouse,
            duration_ms = started.elapsed().as_millis(),
            "Snowflake session verified"
        );
        Ok(Arc::new(warehouse))
    }
}

/// An authenticated SQL API client
pub struct SnowflakeWarehouse {
    client: Client,
    config: SnowflakeConfig,
    base_url: String,
}

impl SnowflakeWarehouse {
    pub fn new(config: SnowflakeConfig) -> Result<Self, CoreError> {
        let client = Client::builder()
            .user_agent(concat!("iplboard/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout() + Duration::from_secs(10))
            .build()
            .map_err(|e| CoreError::connection_with("failed to build HTTP client", e))?;

        Ok(Self {
            client,
            base_url: config.base_url(),
            config,
        })
    }

    fn statements_url(&self) -> String {
        format!("{}/api/v2/statements", self.base_url)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .bearer_auth(&self.config.password)
            .header("X-Snowflake-Authorization-Token-Type", &self.config.token_type)
            .header(reqwest::header::ACCEPT, "application/json")
    }

    async fn submit(&self, statement: &Statement) -> Result<StatementResponse, CoreError> {
        let body = StatementRequest::new(&self.config, statement);
        let response = self
            .authorized(self.client.post(self.statements_url()))
            .json(&body)
            .send()
            .await
            .map_err(request_error)?;

        let mut result = read_response(response).await?;

        // 202: still running, poll until the handle resolves
        let deadline = Instant::now() + self.config.timeout();
        while let StatementResponse::Running { handle } = result {
            if Instant::now() >= deadline {
                return Err(CoreError::Query {
                    message: format!(
                        "statement {} did not finish within {}s",
                        handle, self.config.timeout_secs
                    ),
                    sql_state: None,
                });
            }
            tracing::debug!(handle = %handle, "Statement still running");
            tokio::time::sleep(POLL_INTERVAL).await;

            let response = self
                .authorized(
                    self.client
                        .get(format!("{}/{}", self.statements_url(), handle)),
                )
                .send()
                .await
                .map_err(request_error)?;
            result = read_response(response).await?;
        }
        Ok(result)
    }

    async fn fetch_partition(&self, handle: &str, partition: usize) -> Result<Vec<RawRow>, CoreError> {
        let response = self
            .authorized(
                self.client
                    .get(format!("{}/{}", self.statements_url(), handle))
                    .query(&[("partition", partition)]),
            )
            .send()
            .await
            .map_err(request_error)?;

        match read_response(response).await? {
            StatementResponse::Complete(body) => Ok(body.data),
            StatementResponse::Running { handle } => Err(CoreError::query(format!(
                "partition {} of {} not ready",
                partition, handle
            ))),
        }
    }
}

#[async_trait]
impl Warehouse for SnowflakeWarehouse {
    fn dialect(&self) -> Dialect {
        Dialect::Snowflake
    }

    async fn execute(&self, statement: &Statement) -> Result<ResultTable, CoreError> {
        let StatementResponse::Complete(first) = self.submit(statement).await? else {
            return Err(CoreError::query("statement did not complete"));
        };

        let meta = first.result_set_meta_data.unwrap_or_default();
        let mut rows = first.data;

        if meta.partition_info.len() > 1 {
            let handle = first.statement_handle.as_deref().ok_or_else(|| {
                CoreError::query("partitioned result without a statement handle")
            })?;
            for partition in 1..meta.partition_info.len() {
                rows.extend(self.fetch_partition(handle, partition).await?);
            }
        }

        tracing::debug!(
            partitions = meta.partition_info.len(),
            expected_rows = meta.partition_info.iter().map(|p| p.row_count).sum::<u64>(),
            rows = rows.len(),
            "Statement results fetched"
        );
        to_table(&meta.row_type, rows)
    }
}

// ===================
// Wire format
// ===================

#[derive(Debug, Serialize)]
struct StatementRequest<'a> {
    statement: &'a str,
    timeout: u64,
    database: &'a str,
    schema: &'a str,
    warehouse: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    bindings: BTreeMap<String, Binding<'a>>,
}

impl<'a> StatementRequest<'a> {
    fn new(config: &'a SnowflakeConfig, statement: &'a Statement) -> Self {
        let bindings = statement
            .params()
            .iter()
            .enumerate()
            .map(|(i, value)| {
                (
                    (i + 1).to_string(),
                    Binding {
                        kind: "TEXT",
                        value: value.as_str(),
                    },
                )
            })
            .collect();

        Self {
            statement: statement.sql(),
            timeout: config.timeout_secs,
            database: &config.database,
            schema: &config.schema,
            warehouse: &config.warehouse,
            role: config.role.as_deref(),
            bindings,
        }
    }
}

#[derive(Debug, Serialize)]
struct Binding<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    value: &'a str,
}

type RawRow = Vec<Option<String>>;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultSet {
    #[serde(default)]
    statement_handle: Option<String>,
    #[serde(default)]
    result_set_meta_data: Option<ResultSetMetaData>,
    #[serde(default)]
    data: Vec<RawRow>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultSetMetaData {
    #[serde(default)]
    row_type: Vec<ColumnType>,
    #[serde(default)]
    partition_info: Vec<PartitionInfo>,
}

#[derive(Debug, Deserialize)]
struct ColumnType {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    scale: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PartitionInfo {
    #[serde(default)]
    row_count: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    sql_state: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunningStatement {
    #[serde(default)]
    statement_handle: Option<String>,
}

enum StatementResponse {
    Complete(ResultSet),
    Running { handle: String },
}

fn request_error(err: reqwest::Error) -> CoreError {
    if err.is_timeout() {
        CoreError::connection_with("Snowflake request timed out", err)
    } else {
        CoreError::connection_with("Snowflake is unreachable", err)
    }
}

async fn read_response(response: Response) -> Result<StatementResponse, CoreError> {
    let status = response.status();
    let body = response.text().await.map_err(request_error)?;
    classify(status, &body)
}

/// Turn a status and body into a result set, a pending handle or an error
fn classify(status: StatusCode, body: &str) -> Result<StatementResponse, CoreError> {
    match status {
        StatusCode::OK => serde_json::from_str(body)
            .map(StatementResponse::Complete)
            .map_err(|e| CoreError::query(format!("malformed result set: {}", e))),
        StatusCode::ACCEPTED => {
            let running: RunningStatement = serde_json::from_str(body).unwrap_or_default();
            running
                .statement_handle
                .map(|handle| StatementResponse::Running { handle })
                .ok_or_else(|| CoreError::query("202 response without a statement handle"))
        }
        _ => Err(status_error(status, body)),
    }
}

fn status_error(status: StatusCode, body: &str) -> CoreError {
    let api: ApiError = serde_json::from_str(body).unwrap_or_default();
    let message = match (api.message, api.code) {
        (Some(message), Some(code)) => format!("{} (code {})", message, code),
        (Some(message), None) => message,
        (None, _) => format!("HTTP {}", status),
    };

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            CoreError::connection(format!("authentication rejected: {}", message))
        }
        StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
            CoreError::connection(message)
        }
        _ => CoreError::Query {
            message,
            sql_state: api.sql_state,
        },
    }
}

/// Build a table from the row type and the string-encoded cells
fn to_table(row_type: &[ColumnType], rows: Vec<RawRow>) -> Result<ResultTable, CoreError> {
    let mut table = ResultTable::new(row_type.iter().map(|c| c.name.as_str()));
    for raw in rows {
        if raw.len() != row_type.len() {
            return Err(CoreError::query(format!(
                "row has {} cells, expected {}",
                raw.len(),
                row_type.len()
            )));
        }
        let row = raw
            .into_iter()
            .zip(row_type)
            .map(|(cell, column)| convert_cell(column, cell))
            .collect();
        table.push_row(row);
    }
    Ok(table)
}

fn convert_cell(column: &ColumnType, cell: Option<String>) -> Value {
    let Some(raw) = cell else {
        return Value::Null;
    };

    match column.kind.to_ascii_lowercase().as_str() {
        "fixed" if column.scale.unwrap_or(0) == 0 => raw
            .parse::<i64>()
            .map(Value::Int)
            .or_else(|_| raw.parse::<f64>().map(Value::Float))
            .unwrap_or(Value::Text(raw)),
        "fixed" | "real" => raw.parse::<f64>().map(Value::Float).unwrap_or(Value::Text(raw)),
        "boolean" => match raw.as_str() {
            "true" | "TRUE" | "1" => Value::Int(1),
            "false" | "FALSE" | "0" => Value::Int(0),
            _ => Value::Text(raw),
        },
        _ => Value::Text(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterState;
    use crate::query::QueryBuilder;

    fn config() -> SnowflakeConfig {
        toml::from_str(
            r#"
account = "xy12345"
user = "ANALYST"
password = "token"
warehouse = "COMPUTE_WH"
database = "IPL"
schema = "MARTS"
role = "REPORTER"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_request_body_carries_bindings() {
        let config = config();
        let stmt = QueryBuilder::default()
            .build("total-matches", &FilterState::parse(["2019", "2020"]).unwrap())
            .unwrap();

        let body = serde_json::to_value(StatementRequest::new(&config, &stmt)).unwrap();
        assert_eq!(body["database"], "IPL");
        assert_eq!(body["role"], "REPORTER");
        assert_eq!(body["timeout"], 60);
        assert_eq!(body["bindings"]["1"]["type"], "TEXT");
        assert_eq!(body["bindings"]["1"]["value"], "2019");
        assert_eq!(body["bindings"]["2"]["value"], "2020");
        assert!(body["statement"].as_str().unwrap().contains("season IN (?,?)"));
    }

    #[test]
    fn test_request_body_without_bindings() {
        let config = config();
        let stmt = Statement::raw("SELECT 1");
        let body = serde_json::to_value(StatementRequest::new(&config, &stmt)).unwrap();
        assert!(body.get("bindings").is_none());
    }

    #[test]
    fn test_result_set_conversion() {
        let body = r#"{
            "statementHandle": "01b2-0000",
            "resultSetMetaData": {
                "numRows": 2,
                "rowType": [
                    {"name": "PLAYER", "type": "text"},
                    {"name": "RUNS", "type": "fixed", "scale": 0},
                    {"name": "STRIKE_RATE", "type": "fixed", "scale": 2},
                    {"name": "RATIO", "type": "real"}
                ],
                "partitionInfo": [{"rowCount": 2}]
            },
            "data": [
                ["V Kohli", "973", "152.03", "0.5"],
                ["DA Warner", null, null, null]
            ]
        }"#;

        let StatementResponse::Complete(result) = classify(StatusCode::OK, body).unwrap() else {
            panic!("expected a complete result");
        };
        let meta = result.result_set_meta_data.unwrap();
        let table = to_table(&meta.row_type, result.data).unwrap();

        assert_eq!(table.columns(), ["PLAYER", "RUNS", "STRIKE_RATE", "RATIO"]);
        let first = table.row(0).unwrap();
        assert_eq!(first.get("RUNS").unwrap(), &Value::Int(973));
        assert_eq!(first.get("STRIKE_RATE").unwrap(), &Value::Float(152.03));
        assert_eq!(first.get("RATIO").unwrap(), &Value::Float(0.5));
        assert_eq!(table.row(1).unwrap().get("RUNS").unwrap(), &Value::Null);
    }

    #[test]
    fn test_accepted_yields_handle() {
        let body = r#"{"code": "333334", "statementHandle": "01b2-abcd", "message": "Asynchronous execution in progress."}"#;
        match classify(StatusCode::ACCEPTED, body).unwrap() {
            StatementResponse::Running { handle } => assert_eq!(handle, "01b2-abcd"),
            StatementResponse::Complete(_) => panic!("expected a running statement"),
        }
    }

    #[test]
    fn test_error_classification() {
        let auth = classify(
            StatusCode::UNAUTHORIZED,
            r#"{"code": "390303", "message": "Invalid OAuth access token."}"#,
        )
        .err()
        .unwrap();
        assert!(matches!(auth, CoreError::Connection { .. }));

        let sql = classify(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"code": "002003", "sqlState": "42S02", "message": "Object 'FCT_MISSING' does not exist."}"#,
        )
        .err()
        .unwrap();
        match sql {
            CoreError::Query { message, sql_state } => {
                assert!(message.contains("FCT_MISSING"));
                assert_eq!(sql_state.as_deref(), Some("42S02"));
            }
            other => panic!("unexpected error: {other}"),
        }

        let opaque = classify(StatusCode::INTERNAL_SERVER_ERROR, "<html>").err().unwrap();
        assert!(opaque.to_string().contains("HTTP 500"));
    }

    #[test]
    fn test_ragged_row_rejected() {
        let row_type = vec![ColumnType {
            name: "TOTAL".to_string(),
            kind: "fixed".to_string(),
            scale: Some(0),
        }];
        let err = to_table(&row_type, vec![vec![Some("1".into()), Some("2".into())]]).unwrap_err();
        assert!(matches!(err, CoreError::Query { .. }));
    }

    #[test]
    fn test_wide_fixed_falls_back_to_float() {
        let column = ColumnType {
            name: "BIG".to_string(),
            kind: "FIXED".to_string(),
            scale: Some(0),
        };
        let value = convert_cell(&column, Some("99999999999999999999".to_string()));
        assert!(matches!(value, Value::Float(_)));
    }

    #[test]
    fn test_connector_describe_and_validation() {
        let connector = SnowflakeConnector::new(config()).unwrap();
        assert_eq!(connector.describe(), "snowflake://ANALYST@xy12345/IPL.MARTS");

        let mut anonymous = config();
        anonymous.user = None;
        assert_eq!(
            SnowflakeConnector::new(anonymous).unwrap().describe(),
            "snowflake://xy12345/IPL.MARTS"
        );

        let mut incomplete = config();
        incomplete.warehouse.clear();
        assert!(SnowflakeConnector::new(incomplete).is_err());
    }
}
