use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::RemoteError;

/// Integer id of a record in the remote store.
pub type RecordId = i64;

/// One record as returned by `read`: field name to value.
pub type Record = Map<String, Value>;

/// Model describing every other model (`ir.model`).
pub const MODEL_MODEL: &str = "ir.model";

/// Model holding file attachments (`ir.attachment`).
pub const ATTACHMENT_MODEL: &str = "ir.attachment";

/// A single `(field, "=", value)` search term.
///
/// Equality is the only operator the filesystem needs, so it is the only
/// one this type can express.
#[derive(Debug, Clone, PartialEq)]
pub struct Criterion {
    pub field: String,
    pub value: Value,
}

impl Criterion {
    /// `field = value`.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Criterion {
            field: field.into(),
            value: value.into(),
        }
    }

    /// The operator of this term.
    pub fn operator(&self) -> &'static str {
        "="
    }

    /// The term in the store's domain notation: `[field, "=", value]`.
    pub fn to_domain_term(&self) -> Value {
        Value::Array(vec![
            Value::String(self.field.clone()),
            Value::String(self.operator().to_string()),
            self.value.clone(),
        ])
    }

    /// True if `record` satisfies this term.
    pub fn matches(&self, record: &Record) -> bool {
        record.get(&self.field) == Some(&self.value)
    }
}

/// Arguments of a bulk tabular import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportRequest {
    /// Field names, from the header row.
    pub fields: Vec<String>,
    /// Data rows, one cell per field.
    pub rows: Vec<Vec<String>>,
    /// Import mode understood by the store.
    pub mode: String,
    /// Module the imported records are attributed to.
    pub current_module: String,
    /// Whether imported records are protected from later updates.
    pub noupdate: bool,
    /// Extra context passed through to the store.
    pub context: Map<String, Value>,
}

impl ImportRequest {
    /// An `init`-mode import with `{"import": true}` as context.
    pub fn init(fields: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let mut context = Map::new();
        context.insert("import".to_string(), Value::Bool(true));
        ImportRequest {
            fields,
            rows,
            mode: "init".to_string(),
            current_module: String::new(),
            noupdate: false,
            context,
        }
    }
}

/// What the store said about an import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    /// Rows imported, or a negative value when the store refused the data.
    pub imported: i64,
    /// Diagnostic text from the store, if any.
    pub message: Option<String>,
}

impl ImportReport {
    pub fn success(imported: i64) -> Self {
        ImportReport {
            imported,
            message: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        ImportReport {
            imported: -1,
            message: Some(message.into()),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.imported >= 0
    }
}

/// The remote object store, as seen by the filesystem.
///
/// Every call is a fresh query. Implementations must not cache.
#[async_trait]
pub trait ObjectService: Send + Sync + 'static {
    /// Ids of the records of `model` matching every criterion.
    async fn search(&self, model: &str, criteria: &[Criterion])
        -> Result<Vec<RecordId>, RemoteError>;

    /// Read `fields` of the records `ids` of `model`.
    async fn read(
        &self,
        model: &str,
        ids: &[RecordId],
        fields: &[&str],
    ) -> Result<Vec<Record>, RemoteError>;

    /// Bulk-import tabular data into `model`.
    async fn import_data(
        &self,
        model: &str,
        request: &ImportRequest,
    ) -> Result<ImportReport, RemoteError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_criterion_domain_term() {
        let term = Criterion::eq("res_model", "res.partner");
        assert_eq!(term.to_domain_term(), json!(["res_model", "=", "res.partner"]));

        let term = Criterion::eq("id", 17);
        assert_eq!(term.to_domain_term(), json!(["id", "=", 17]));
    }

    #[test]
    fn test_criterion_matches() {
        let record: Record = json!({"id": 9, "res_model": "res.partner"})
            .as_object()
            .cloned()
            .unwrap();
        assert!(Criterion::eq("id", 9).matches(&record));
        assert!(Criterion::eq("res_model", "res.partner").matches(&record));
        assert!(!Criterion::eq("id", 10).matches(&record));
        assert!(!Criterion::eq("missing", 1).matches(&record));
    }

    #[test]
    fn test_import_request_init() {
        let request = ImportRequest::init(
            vec!["name".to_string()],
            vec![vec!["Alice".to_string()]],
        );
        assert_eq!(request.mode, "init");
        assert_eq!(request.current_module, "");
        assert!(!request.noupdate);
        assert_eq!(Value::Object(request.context), json!({"import": true}));
    }

    #[test]
    fn test_import_report() {
        assert!(ImportReport::success(3).succeeded());
        assert!(ImportReport::success(0).succeeded());

        let failed = ImportReport::failure("Line 2 : bad email");
        assert!(!failed.succeeded());
        assert_eq!(failed.message.as_deref(), Some("Line 2 : bad email"));
    }
}
