//! Read-only `/model/record_id/attachment_label` tree.
//!
//! Every operation re-queries the store. Nothing resolved here outlives the
//! call that resolved it.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use oerpfs_core::{
    Criterion, ObjectService, RecordId, RemoteError, ATTACHMENT_MODEL, MODEL_MODEL,
};
use serde_json::Value;
use tracing::debug;

use crate::address::{attachment_label, id_from_label, parse_id, PathAddress, MAX_DEPTH};
use crate::error::TreeError;
use crate::metadata::{EntryKind, Listing};

/// What a path address denotes in the model tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Root,
    Model,
    Record,
    /// An attachment and the decoded length of its content.
    Attachment { size: u64 },
    NotFound,
}

pub struct ModelTree<S> {
    store: Arc<S>,
}

impl<S: ObjectService> ModelTree<S> {
    pub fn new(store: Arc<S>) -> Self {
        ModelTree { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Resolve an address against the store.
    ///
    /// Absent objects resolve to `NotFound`; a store that cannot be reached
    /// is an error.
    pub async fn resolve(&self, address: &PathAddress) -> Result<Resolution, TreeError> {
        if !address.is_well_formed() {
            return Ok(Resolution::NotFound);
        }

        let Some(model) = address.segment(0) else {
            return Ok(Resolution::Root);
        };
        if !self.model_exists(model).await? {
            return Ok(Resolution::NotFound);
        }

        let Some(raw_id) = address.segment(1) else {
            return Ok(Resolution::Model);
        };
        let Some(record_id) = parse_id(raw_id) else {
            return Ok(Resolution::NotFound);
        };
        if !self.record_exists(model, record_id).await? {
            return Ok(Resolution::NotFound);
        }

        let Some(label) = address.segment(2) else {
            return Ok(Resolution::Record);
        };
        match self.attachment_content(model, record_id, label).await? {
            Some(content) => Ok(Resolution::Attachment {
                size: content.len() as u64,
            }),
            None => Ok(Resolution::NotFound),
        }
    }

    /// Children of a directory address, in the store's order.
    ///
    /// The address is assumed to have been resolved already; it is not
    /// validated again.
    pub async fn list(&self, address: &PathAddress) -> Result<Listing, TreeError> {
        match address.segments() {
            [] => {
                let ids = self.store.search(MODEL_MODEL, &[]).await?;
                let names = self
                    .read_field(MODEL_MODEL, &ids, "model")
                    .await?
                    .into_iter()
                    .filter_map(|(_, value)| value.as_str().map(str::to_string))
                    .collect();
                Ok(Listing::new(EntryKind::Directory, names))
            }
            [model] => {
                let ids = self.store.search(model, &[]).await?;
                let names = ids.iter().map(RecordId::to_string).collect();
                Ok(Listing::new(EntryKind::Directory, names))
            }
            [model, raw_id] => {
                let record_id = parse_id(raw_id)
                    .ok_or_else(|| TreeError::NotFound(address.to_path()))?;
                let ids = self
                    .store
                    .search(
                        ATTACHMENT_MODEL,
                        &[
                            Criterion::eq("res_model", model.as_str()),
                            Criterion::eq("res_id", record_id),
                        ],
                    )
                    .await?;
                let names = self
                    .read_field(ATTACHMENT_MODEL, &ids, "name")
                    .await?
                    .into_iter()
                    .map(|(id, name)| attachment_label(id, name.as_str().unwrap_or("")))
                    .collect();
                Ok(Listing::new(EntryKind::File, names))
            }
            segments if segments.len() == MAX_DEPTH => {
                Err(TreeError::NotADirectory(address.to_path()))
            }
            _ => Err(TreeError::NotFound(address.to_path())),
        }
    }

    /// Read `size` bytes at `offset` from an attachment.
    ///
    /// The whole payload is fetched and decoded on every call; the range is
    /// clamped to the content, so reading at or past the end yields nothing.
    pub async fn read(
        &self,
        address: &PathAddress,
        offset: u64,
        size: u32,
    ) -> Result<Vec<u8>, TreeError> {
        if !address.is_well_formed() {
            return Err(TreeError::NotFound(address.to_path()));
        }

        let [model, raw_id, label] = address.segments() else {
            return Err(TreeError::IsADirectory(address.to_path()));
        };
        let record_id =
            parse_id(raw_id).ok_or_else(|| TreeError::NotFound(address.to_path()))?;

        let content = self
            .attachment_content(model, record_id, label)
            .await?
            .ok_or_else(|| TreeError::NotFound(address.to_path()))?;

        Ok(byte_range(&content, offset, size).to_vec())
    }

    async fn model_exists(&self, model: &str) -> Result<bool, RemoteError> {
        let ids = self
            .store
            .search(MODEL_MODEL, &[Criterion::eq("model", model)])
            .await?;
        debug!(model, found = !ids.is_empty(), "model lookup");
        Ok(!ids.is_empty())
    }

    async fn record_exists(&self, model: &str, record_id: RecordId) -> Result<bool, RemoteError> {
        let ids = self
            .store
            .search(model, &[Criterion::eq("id", record_id)])
            .await?;
        Ok(!ids.is_empty())
    }

    /// Decoded content of the attachment named by `label` on
    /// `(model, record_id)`, or `None` if there is no such attachment.
    async fn attachment_content(
        &self,
        model: &str,
        record_id: RecordId,
        label: &str,
    ) -> Result<Option<Vec<u8>>, RemoteError> {
        let Some(attachment_id) = id_from_label(label) else {
            return Ok(None);
        };

        let ids = self
            .store
            .search(
                ATTACHMENT_MODEL,
                &[
                    Criterion::eq("res_model", model),
                    Criterion::eq("res_id", record_id),
                    Criterion::eq("id", attachment_id),
                ],
            )
            .await?;
        if ids.is_empty() {
            return Ok(None);
        }

        // Deleted between the search and the read.
        let records = match self.store.read(ATTACHMENT_MODEL, &ids[..1], &["datas"]).await {
            Ok(records) => records,
            Err(RemoteError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        match records.first() {
            Some(record) => {
                let payload = record.get("datas").unwrap_or(&Value::Null);
                decode_payload(payload).map(Some)
            }
            None => Ok(None),
        }
    }

    /// `(id, value)` of one field for each of `ids`, skipping the read when
    /// there is nothing to read.
    async fn read_field(
        &self,
        model: &str,
        ids: &[RecordId],
        field: &str,
    ) -> Result<Vec<(RecordId, Value)>, RemoteError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let records = self.store.read(model, ids, &[field]).await?;
        Ok(records
            .into_iter()
            .filter_map(|mut record| {
                let id = record.get("id").and_then(Value::as_i64)?;
                let value = record.remove(field).unwrap_or(Value::Null);
                Some((id, value))
            })
            .collect())
    }
}

/// Decode an attachment payload as the store transports it.
///
/// An empty binary comes back as `false`. Encoders may wrap base64 lines, so
/// whitespace is dropped before decoding.
pub fn decode_payload(payload: &Value) -> Result<Vec<u8>, RemoteError> {
    match payload {
        Value::String(encoded) => {
            let compact: String = encoded
                .chars()
                .filter(|c| !c.is_ascii_whitespace())
                .collect();
            BASE64
                .decode(compact)
                .map_err(|e| RemoteError::Protocol(format!("attachment payload is not base64: {}", e)))
        }
        Value::Bool(false) | Value::Null => Ok(Vec::new()),
        other => Err(RemoteError::Protocol(format!(
            "unexpected attachment payload {}",
            other
        ))),
    }
}

/// `[offset, offset + size)` of `content`, clamped to its length.
pub fn byte_range(content: &[u8], offset: u64, size: u32) -> &[u8] {
    let start = usize::try_from(offset).unwrap_or(usize::MAX);
    if start >= content.len() {
        return &[];
    }
    let end = start.saturating_add(size as usize).min(content.len());
    &content[start..end]
}
