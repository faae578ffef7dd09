//! XML-RPC connection to the remote object store.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, instrument};

use oerpfs_config::{MountConfig, Secret};
use oerpfs_core::{Criterion, ImportReport, ImportRequest, ObjectService, Record, RecordId, RemoteError};

use crate::xmlrpc;

/// A logged-in session against `/xmlrpc/common` and `/xmlrpc/object`.
///
/// Login happens on first use and the uid is kept for the lifetime of the
/// connection. Nothing else is remembered between calls.
pub struct XmlRpcConnection {
    client: Client,
    endpoint: String,
    dbname: String,
    user: String,
    password: Secret,
    uid: OnceCell<i64>,
}

impl XmlRpcConnection {
    pub fn new(config: &MountConfig) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .build()
            .map_err(|e| RemoteError::connection(config.endpoint(), e))?;

        Ok(XmlRpcConnection {
            client,
            endpoint: config.endpoint(),
            dbname: config.dbname.clone(),
            user: config.user.clone(),
            password: config.password.clone(),
            uid: OnceCell::new(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call(&self, service: &str, method: &str, params: &[Value]) -> Result<Value, RemoteError> {
        let url = format!("{}/xmlrpc/{}", self.endpoint, service);
        let body = xmlrpc::encode_call(method, params);

        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "text/xml")
            .body(body)
            .send()
            .await
            .map_err(|e| RemoteError::connection(url.as_str(), e))?;

        if !response.status().is_success() {
            return Err(RemoteError::Protocol(format!(
                "{} returned status {}",
                url,
                response.status()
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| RemoteError::connection(url.as_str(), e))?;
        xmlrpc::decode_response(&text)
    }

    async fn uid(&self) -> Result<i64, RemoteError> {
        self.uid
            .get_or_try_init(|| async {
                let params = [
                    Value::from(self.dbname.as_str()),
                    Value::from(self.user.as_str()),
                    Value::from(self.password.expose()),
                ];
                let uid = self.call("common", "login", &params).await?;
                match uid.as_i64().filter(|uid| *uid > 0) {
                    Some(uid) => {
                        debug!(user = %self.user, uid, "logged in");
                        Ok(uid)
                    }
                    None => Err(RemoteError::AuthenticationFailed(self.user.clone())),
                }
            })
            .await
            .copied()
    }

    #[instrument(skip(self, args), fields(endpoint = %self.endpoint))]
    async fn execute(&self, model: &str, method: &str, args: Vec<Value>) -> Result<Value, RemoteError> {
        let uid = self.uid().await?;
        let mut params = vec![
            Value::from(self.dbname.as_str()),
            Value::from(uid),
            Value::from(self.password.expose()),
            Value::from(model),
            Value::from(method),
        ];
        params.extend(args);
        self.call("object", "execute", &params).await
    }
}

fn to_ids(value: Value) -> Result<Vec<RecordId>, RemoteError> {
    let Value::Array(items) = value else {
        return Err(RemoteError::Protocol(format!("expected an id list, got {}", value)));
    };
    items
        .into_iter()
        .map(|item| {
            item.as_i64()
                .ok_or_else(|| RemoteError::Protocol(format!("expected an integer id, got {}", item)))
        })
        .collect()
}

fn to_records(value: Value) -> Result<Vec<Record>, RemoteError> {
    let Value::Array(items) = value else {
        return Err(RemoteError::Protocol(format!("expected a record list, got {}", value)));
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::Object(record) => Ok(record),
            other => Err(RemoteError::Protocol(format!("expected a record, got {}", other))),
        })
        .collect()
}

/// Interpret what `import_data` returned.
///
/// The store answers `[position, 0, 0, 0]` on success and
/// `[-1, record, message, ...]` when a row was refused.
fn to_import_report(value: Value, rows: usize) -> Result<ImportReport, RemoteError> {
    match value {
        Value::Array(items) => {
            let imported = items.first().and_then(Value::as_i64).ok_or_else(|| {
                RemoteError::Protocol("import_data returned no row count".to_string())
            })?;
            let message = items
                .get(2)
                .and_then(Value::as_str)
                .filter(|m| !m.is_empty())
                .map(str::to_string);
            Ok(ImportReport { imported, message })
        }
        Value::Bool(true) => Ok(ImportReport::success(rows as i64)),
        Value::Bool(false) => Ok(ImportReport::failure("import_data returned false")),
        other => Err(RemoteError::Protocol(format!(
            "unexpected import_data result {}",
            other
        ))),
    }
}

#[async_trait]
impl ObjectService for XmlRpcConnection {
    async fn search(&self, model: &str, criteria: &[Criterion]) -> Result<Vec<RecordId>, RemoteError> {
        let domain = Value::Array(criteria.iter().map(Criterion::to_domain_term).collect());
        let result = self.execute(model, "search", vec![domain]).await?;
        to_ids(result)
    }

    async fn read(
        &self,
        model: &str,
        ids: &[RecordId],
        fields: &[&str],
    ) -> Result<Vec<Record>, RemoteError> {
        let ids = Value::Array(ids.iter().map(|id| Value::from(*id)).collect());
        let fields = Value::Array(fields.iter().map(|f| Value::from(*f)).collect());
        let result = self.execute(model, "read", vec![ids, fields]).await?;
        to_records(result)
    }

    async fn import_data(
        &self,
        model: &str,
        request: &ImportRequest,
    ) -> Result<ImportReport, RemoteError> {
        let args = vec![
            Value::from(request.fields.clone()),
            Value::Array(request.rows.iter().map(|row| Value::from(row.clone())).collect()),
            Value::from(request.mode.as_str()),
            Value::from(request.current_module.as_str()),
            Value::Bool(request.noupdate),
            Value::Object(request.context.clone()),
        ];
        let result = self.execute(model, "import_data", args).await?;
        to_import_report(result, request.rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_connection() {
        let config = MountConfig::default();
        let conn = XmlRpcConnection::new(&config).unwrap();
        assert_eq!(conn.endpoint(), "http://localhost:8069");
    }

    #[test]
    fn test_to_ids() {
        assert_eq!(to_ids(json!([4, 2])).unwrap(), vec![4, 2]);
        assert!(to_ids(json!([])).unwrap().is_empty());
        assert!(matches!(to_ids(json!(false)), Err(RemoteError::Protocol(_))));
        assert!(matches!(to_ids(json!(["x"])), Err(RemoteError::Protocol(_))));
    }

    #[test]
    fn test_to_records() {
        let records = to_records(json!([{"id": 1, "model": "res.partner"}])).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["model"], json!("res.partner"));
        assert!(to_records(json!([1])).is_err());
    }

    #[test]
    fn test_import_report_success_tuple() {
        let report = to_import_report(json!([2, 0, 0, 0]), 2).unwrap();
        assert!(report.succeeded());
        assert_eq!(report.imported, 2);
        assert_eq!(report.message, None);
    }

    #[test]
    fn test_import_report_failure_tuple() {
        let report = to_import_report(json!([-1, {"name": "x"}, "Line 1 : bad value", ""]), 1).unwrap();
        assert!(!report.succeeded());
        assert_eq!(report.message.as_deref(), Some("Line 1 : bad value"));
    }

    #[test]
    fn test_import_report_bool() {
        assert!(to_import_report(json!(true), 3).unwrap().succeeded());
        assert!(!to_import_report(json!(false), 3).unwrap().succeeded());
        assert!(to_import_report(json!("?"), 3).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_store_is_connection_error() {
        // Port 9 (discard) on localhost is not an XML-RPC server.
        let config = MountConfig {
            server: "127.0.0.1".to_string(),
            port: 9,
            ..Default::default()
        };
        let conn = XmlRpcConnection::new(&config).unwrap();
        let err = conn.search("ir.model", &[]).await.unwrap_err();
        assert!(err.is_transient(), "expected connection failure, got {:?}", err);
    }
}
