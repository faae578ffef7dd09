//! Flat write-only tree that imports each uploaded file as CSV on close.

use std::collections::HashMap;
use std::sync::Arc;

use oerpfs_core::{ImportReport, ImportRequest, ObjectService};
use tracing::{info, warn};

use crate::address::PathAddress;
use crate::error::{ImportError, TreeError};
use crate::metadata::{EntryKind, Listing, Metadata};

/// Import-Buffer tree. Owns the bytes of every upload not yet closed,
/// keyed by absolute path.
pub struct CsvImport<S> {
    store: Arc<S>,
    pending: HashMap<String, Vec<u8>>,
}

impl<S: ObjectService> CsvImport<S> {
    pub fn new(store: Arc<S>) -> Self {
        CsvImport {
            store,
            pending: HashMap::new(),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Attributes of the root or of a pending upload.
    pub fn stat(&self, path: &str) -> Option<Metadata> {
        if PathAddress::parse(path).is_root() {
            return Some(Metadata::drop_box());
        }
        self.pending
            .get(path)
            .map(|buffer| Metadata::pending_upload(buffer.len() as u64))
    }

    /// Uploads still open, sorted by name.
    pub fn list(&self, path: &str) -> Result<Listing, TreeError> {
        if !PathAddress::parse(path).is_root() {
            return if self.pending.contains_key(path) {
                Err(TreeError::NotADirectory(path.to_string()))
            } else {
                Err(TreeError::NotFound(path.to_string()))
            };
        }
        let mut names: Vec<String> = self
            .pending
            .keys()
            .map(|p| p.trim_start_matches('/').to_string())
            .collect();
        names.sort();
        Ok(Listing::new(EntryKind::File, names))
    }

    /// Start an upload at `path`, discarding any earlier buffer there.
    pub fn create(&mut self, path: &str) -> Result<Metadata, TreeError> {
        if PathAddress::parse(path).depth() != 1 {
            return Err(TreeError::PermissionDenied(path.to_string()));
        }
        if self.pending.insert(path.to_string(), Vec::new()).is_some() {
            warn!(path, "upload restarted, earlier bytes discarded");
        }
        Ok(Metadata::pending_upload(0))
    }

    /// Append `data` to the upload at `path`.
    ///
    /// Writes are expected to arrive in order; `offset` is only checked.
    pub fn write(&mut self, path: &str, data: &[u8], offset: u64) -> Result<usize, TreeError> {
        let buffer = self
            .pending
            .get_mut(path)
            .ok_or_else(|| TreeError::NotFound(path.to_string()))?;
        if offset != buffer.len() as u64 {
            warn!(path, offset, buffered = buffer.len(), "non-sequential write, appending");
        }
        buffer.extend_from_slice(data);
        Ok(data.len())
    }

    pub fn has_pending(&self, path: &str) -> bool {
        self.pending.contains_key(path)
    }

    /// Attribute changes are accepted and ignored so copy tools can
    /// preserve modes and times.
    pub fn setattr(&self, path: &str) -> Metadata {
        self.stat(path)
            .unwrap_or_else(|| Metadata::pending_upload(0))
    }

    /// Commit the upload at `path`: parse it and import it into the model
    /// named after the file.
    ///
    /// The buffer is gone afterwards whatever the outcome.
    pub async fn release(&mut self, path: &str) -> Result<ImportReport, TreeError> {
        let buffer = self
            .pending
            .remove(path)
            .ok_or_else(|| TreeError::NotFound(path.to_string()))?;
        let model = model_from_path(path);

        let (fields, rows) =
            parse_csv(&buffer).map_err(|e| TreeError::import(&model, e))?;
        let request = ImportRequest::init(fields, rows);

        info!(
            model = %model,
            fields = request.fields.len(),
            rows = request.rows.len(),
            "importing upload"
        );

        let report = self
            .store
            .import_data(&model, &request)
            .await
            .map_err(|e| TreeError::import(&model, ImportError::Remote(e)))?;

        if !report.succeeded() {
            let message = report
                .message
                .clone()
                .unwrap_or_else(|| "no reason given".to_string());
            warn!(model = %model, %message, "import refused");
            return Err(TreeError::import(&model, ImportError::Rejected(message)));
        }

        info!(model = %model, imported = report.imported, "import committed");
        Ok(report)
    }
}

/// Target model of an upload: the file name without its leading `/` and
/// without a trailing `.csv`.
pub fn model_from_path(path: &str) -> String {
    let name = path.trim_start_matches('/');
    let len = name.len();
    if len >= 4 && name.is_char_boundary(len - 4) && name[len - 4..].eq_ignore_ascii_case(".csv") {
        name[..len - 4].to_string()
    } else {
        name.to_string()
    }
}

/// Split an upload into its header row and data rows.
pub fn parse_csv(bytes: &[u8]) -> Result<(Vec<String>, Vec<Vec<String>>), ImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut records = reader.records();
    let header = match records.next() {
        Some(record) => record?.iter().map(str::to_string).collect(),
        None => return Err(ImportError::Empty),
    };

    let mut rows = Vec::new();
    for record in records {
        rows.push(record?.iter().map(str::to_string).collect());
    }
    Ok((header, rows))
}
