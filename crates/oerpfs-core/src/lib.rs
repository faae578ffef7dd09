mod error;
mod traits;

pub use error::RemoteError;
pub use traits::{
    Criterion, ImportReport, ImportRequest, ObjectService, Record, RecordId, ATTACHMENT_MODEL,
    MODEL_MODEL,
};
