use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{Map, Value};

use oerpfs_core::{
    Criterion, ImportReport, ImportRequest, ObjectService, Record, RecordId, RemoteError,
    ATTACHMENT_MODEL, MODEL_MODEL,
};

/// In-memory object store for testing.
///
/// Holds one table per model, in insertion order, and counts every call so
/// tests can assert how many remote queries an operation cost.
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Vec<Record>>>,
    imports: Mutex<Vec<(String, ImportRequest)>>,
    import_result: Mutex<Option<ImportReport>>,
    queries: AtomicUsize,
    unreachable: AtomicBool,
}

impl MemoryStore {
    /// Create a store that only knows `ir.model` and `ir.attachment`.
    pub fn new() -> Self {
        let mut tables = HashMap::new();
        tables.insert(MODEL_MODEL.to_string(), Vec::new());
        tables.insert(ATTACHMENT_MODEL.to_string(), Vec::new());
        MemoryStore {
            tables: RwLock::new(tables),
            imports: Mutex::new(Vec::new()),
            import_result: Mutex::new(None),
            queries: AtomicUsize::new(0),
            unreachable: AtomicBool::new(false),
        }
    }

    /// Register a model so it shows up in `ir.model` and can hold records.
    pub fn add_model(&self, model: &str) {
        let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
        if tables.contains_key(model) {
            return;
        }
        tables.insert(model.to_string(), Vec::new());

        let registry = tables.entry(MODEL_MODEL.to_string()).or_default();
        let id = registry.len() as RecordId + 1;
        registry.push(record(&[("id", Value::from(id)), ("model", Value::from(model))]));
    }

    /// Add a record with only an id.
    pub fn add_record(&self, model: &str, id: RecordId) {
        self.add_record_with(model, id, Map::new());
    }

    /// Add a record with extra fields. The model is registered if needed.
    pub fn add_record_with(&self, model: &str, id: RecordId, mut fields: Record) {
        self.add_model(model);
        fields.insert("id".to_string(), Value::from(id));
        let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
        tables.entry(model.to_string()).or_default().push(fields);
    }

    /// Attach `content` to `(model, res_id)`, stored base64-encoded.
    pub fn add_attachment(&self, model: &str, res_id: RecordId, id: RecordId, name: &str, content: &[u8]) {
        self.add_attachment_raw(model, res_id, id, name, Value::from(BASE64.encode(content)));
    }

    /// Attach a payload exactly as the store would return it (`false` for
    /// an empty binary, or pre-encoded text).
    pub fn add_attachment_raw(&self, model: &str, res_id: RecordId, id: RecordId, name: &str, datas: Value) {
        let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
        tables.entry(ATTACHMENT_MODEL.to_string()).or_default().push(record(&[
            ("id", Value::from(id)),
            ("name", Value::from(name)),
            ("res_model", Value::from(model)),
            ("res_id", Value::from(res_id)),
            ("datas", datas),
        ]));
    }

    /// Make every subsequent call fail as if the store were down.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Answer subsequent imports with `report` instead of success.
    pub fn set_import_result(&self, report: ImportReport) {
        *self.import_result.lock().unwrap_or_else(|e| e.into_inner()) = Some(report);
    }

    /// Number of calls made so far.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    /// Every import received, as `(model, request)`.
    pub fn imports(&self) -> Vec<(String, ImportRequest)> {
        self.imports.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn begin_call(&self) -> Result<(), RemoteError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(RemoteError::connection(
                "memory://",
                std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "store unreachable"),
            ));
        }
        Ok(())
    }

    fn missing_model(model: &str) -> RemoteError {
        RemoteError::Fault {
            code: "warning -- Object Error".to_string(),
            message: format!("Object {} doesn't exist", model),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn record(fields: &[(&str, Value)]) -> Record {
    fields
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[async_trait]
impl ObjectService for MemoryStore {
    async fn search(&self, model: &str, criteria: &[Criterion]) -> Result<Vec<RecordId>, RemoteError> {
        self.begin_call()?;
        let tables = self.tables.read().unwrap_or_else(|e| e.into_inner());
        let table = tables.get(model).ok_or_else(|| Self::missing_model(model))?;

        Ok(table
            .iter()
            .filter(|r| criteria.iter().all(|c| c.matches(r)))
            .filter_map(|r| r.get("id").and_then(Value::as_i64))
            .collect())
    }

    async fn read(
        &self,
        model: &str,
        ids: &[RecordId],
        fields: &[&str],
    ) -> Result<Vec<Record>, RemoteError> {
        self.begin_call()?;
        let tables = self.tables.read().unwrap_or_else(|e| e.into_inner());
        let table = tables.get(model).ok_or_else(|| Self::missing_model(model))?;

        ids.iter()
            .map(|id| {
                let found = table
                    .iter()
                    .find(|r| r.get("id").and_then(Value::as_i64) == Some(*id))
                    .ok_or_else(|| RemoteError::NotFound(format!("{},{}", model, id)))?;
                let mut out = Map::new();
                out.insert("id".to_string(), Value::from(*id));
                for field in fields {
                    // Unset fields read back as false, like the real store.
                    let value = found.get(*field).cloned().unwrap_or(Value::Bool(false));
                    out.insert(field.to_string(), value);
                }
                Ok(out)
            })
            .collect()
    }

    async fn import_data(
        &self,
        model: &str,
        request: &ImportRequest,
    ) -> Result<ImportReport, RemoteError> {
        self.begin_call()?;
        self.imports
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((model.to_string(), request.clone()));

        let configured = self
            .import_result
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        Ok(configured.unwrap_or_else(|| ImportReport::success(request.rows.len() as i64)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_models_registered_in_order() {
        let store = MemoryStore::new();
        store.add_model("res.partner");
        store.add_model("account.invoice");
        store.add_model("res.partner");

        let ids = store.search(MODEL_MODEL, &[]).await.unwrap();
        let records = store.read(MODEL_MODEL, &ids, &["model"]).await.unwrap();
        let names: Vec<_> = records.iter().map(|r| r["model"].clone()).collect();
        assert_eq!(names, vec![json!("res.partner"), json!("account.invoice")]);
    }

    #[tokio::test]
    async fn test_search_with_criteria() {
        let store = MemoryStore::new();
        store.add_record("res.partner", 17);
        store.add_record("res.partner", 18);

        let ids = store
            .search("res.partner", &[Criterion::eq("id", 17)])
            .await
            .unwrap();
        assert_eq!(ids, vec![17]);

        let ids = store.search("res.partner", &[]).await.unwrap();
        assert_eq!(ids, vec![17, 18]);
    }

    #[tokio::test]
    async fn test_search_unknown_model_faults() {
        let store = MemoryStore::new();
        let err = store.search("res.nothing", &[]).await.unwrap_err();
        assert!(matches!(err, RemoteError::Fault { .. }));
    }

    #[tokio::test]
    async fn test_attachment_stored_base64() {
        let store = MemoryStore::new();
        store.add_attachment("res.partner", 17, 9, "contract.pdf", b"HELLO");

        let ids = store
            .search(
                ATTACHMENT_MODEL,
                &[Criterion::eq("res_model", "res.partner"), Criterion::eq("res_id", 17)],
            )
            .await
            .unwrap();
        assert_eq!(ids, vec![9]);

        let records = store.read(ATTACHMENT_MODEL, &ids, &["datas", "name"]).await.unwrap();
        assert_eq!(records[0]["datas"], json!("SEVMTE8="));
        assert_eq!(records[0]["name"], json!("contract.pdf"));
    }

    #[tokio::test]
    async fn test_read_unset_field_is_false() {
        let store = MemoryStore::new();
        store.add_record("res.partner", 1);
        let records = store.read("res.partner", &[1], &["email"]).await.unwrap();
        assert_eq!(records[0]["email"], json!(false));
    }

    #[tokio::test]
    async fn test_query_count() {
        let store = MemoryStore::new();
        assert_eq!(store.query_count(), 0);
        let _ = store.search(MODEL_MODEL, &[]).await;
        let _ = store.read(MODEL_MODEL, &[], &[]).await;
        assert_eq!(store.query_count(), 2);
    }

    #[tokio::test]
    async fn test_unreachable() {
        let store = MemoryStore::new();
        store.set_unreachable(true);
        let err = store.search(MODEL_MODEL, &[]).await.unwrap_err();
        assert!(err.is_transient());

        store.set_unreachable(false);
        assert!(store.search(MODEL_MODEL, &[]).await.is_ok());
    }

    #[tokio::test]
    async fn test_import_recorded() {
        let store = MemoryStore::new();
        let request = ImportRequest::init(vec!["name".into()], vec![vec!["A".into()], vec!["B".into()]]);

        let report = store.import_data("res.partner", &request).await.unwrap();
        assert_eq!(report.imported, 2);

        let imports = store.imports();
        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0].0, "res.partner");
        assert_eq!(imports[0].1, request);
    }

    #[tokio::test]
    async fn test_import_result_override() {
        let store = MemoryStore::new();
        store.set_import_result(ImportReport::failure("Line 1 : nope"));
        let request = ImportRequest::init(vec!["name".into()], vec![]);
        let report = store.import_data("res.partner", &request).await.unwrap();
        assert!(!report.succeeded());
    }
}
