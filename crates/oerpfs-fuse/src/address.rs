//! Parsing of filesystem paths into semantic addresses.
//!
//! A path `/model/record_id/attachment_label` becomes up to three ordered
//! segments. Anything deeper is never a valid address.

use oerpfs_core::RecordId;

/// Deepest meaningful address: model, record, attachment.
pub const MAX_DEPTH: usize = 3;

/// A path split into its segments, leading `/` dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathAddress {
    segments: Vec<String>,
}

impl PathAddress {
    /// Split `path` on `/`. The root (`/` or the empty string) has no
    /// segments; a single trailing slash is ignored.
    pub fn parse(path: &str) -> Self {
        let trimmed = path.strip_prefix('/').unwrap_or(path);
        let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);

        let segments = if trimmed.is_empty() {
            Vec::new()
        } else {
            trimmed.split('/').map(str::to_string).collect()
        };

        PathAddress { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn segment(&self, index: usize) -> Option<&str> {
        self.segments.get(index).map(String::as_str)
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// False for addresses that can never name anything: too deep, or
    /// with an empty segment (`//`).
    pub fn is_well_formed(&self) -> bool {
        self.depth() <= MAX_DEPTH && self.segments.iter().all(|s| !s.is_empty())
    }

    /// The address rendered back to an absolute path.
    pub fn to_path(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }
}

/// Parse a record or attachment id. Ids are non-negative integers.
pub fn parse_id(text: &str) -> Option<RecordId> {
    text.parse::<RecordId>().ok().filter(|id| *id >= 0)
}

/// The attachment id encoded in a `"<id>-<name>"` label.
///
/// Only the part before the first hyphen matters.
pub fn id_from_label(label: &str) -> Option<RecordId> {
    let prefix = label.split('-').next().unwrap_or(label);
    parse_id(prefix)
}

/// Display label for an attachment: `"<id>-<name>"`.
///
/// Characters that cannot appear in a file name are replaced; the name is
/// decoration and never used for lookup.
pub fn attachment_label(id: RecordId, name: &str) -> String {
    let name: String = name
        .chars()
        .map(|c| if c == '/' || c == '\0' { '_' } else { c })
        .collect();
    format!("{}-{}", id, name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_root() {
        assert!(PathAddress::parse("/").is_root());
        assert!(PathAddress::parse("").is_root());
        assert_eq!(PathAddress::parse("/").depth(), 0);
    }

    #[test]
    fn test_parse_segments() {
        let addr = PathAddress::parse("/res.partner/17/9-contract.pdf");
        assert_eq!(addr.depth(), 3);
        assert_eq!(addr.segment(0), Some("res.partner"));
        assert_eq!(addr.segment(1), Some("17"));
        assert_eq!(addr.segment(2), Some("9-contract.pdf"));
        assert_eq!(addr.segment(3), None);
        assert!(addr.is_well_formed());
    }

    #[test]
    fn test_parse_trailing_slash() {
        assert_eq!(PathAddress::parse("/res.partner/"), PathAddress::parse("/res.partner"));
    }

    #[test]
    fn test_too_deep_is_not_well_formed() {
        let addr = PathAddress::parse("/a/b/c/d");
        assert_eq!(addr.depth(), 4);
        assert!(!addr.is_well_formed());
    }

    #[test]
    fn test_empty_segment_is_not_well_formed() {
        assert!(!PathAddress::parse("/a//b").is_well_formed());
    }

    #[test]
    fn test_to_path() {
        assert_eq!(PathAddress::parse("/").to_path(), "/");
        assert_eq!(PathAddress::parse("/a/1").to_path(), "/a/1");
    }

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("17"), Some(17));
        assert_eq!(parse_id("0"), Some(0));
        assert_eq!(parse_id("-3"), None);
        assert_eq!(parse_id("abc"), None);
        assert_eq!(parse_id(""), None);
        assert_eq!(parse_id("99999999999999999999999"), None);
    }

    #[test]
    fn test_id_from_label_splits_on_first_hyphen() {
        assert_eq!(id_from_label("42-invoice.pdf"), Some(42));
        assert_eq!(id_from_label("42-inv-oice.pdf"), Some(42));
        assert_eq!(id_from_label("42"), Some(42));
        assert_eq!(id_from_label("42-"), Some(42));
    }

    #[test]
    fn test_id_from_label_rejects_garbage() {
        assert_eq!(id_from_label("invoice.pdf"), None);
        assert_eq!(id_from_label("-42-x"), None);
        assert_eq!(id_from_label("x42-y"), None);
    }

    #[test]
    fn test_attachment_label() {
        assert_eq!(attachment_label(9, "contract.pdf"), "9-contract.pdf");
        assert_eq!(attachment_label(9, "a/b.pdf"), "9-a_b.pdf");
        assert_eq!(attachment_label(3, ""), "3-");
    }

    #[test]
    fn test_label_round_trips_to_id() {
        for (id, name) in [(1, "x"), (42, "inv-2024-01.pdf"), (7, "a/b")] {
            assert_eq!(id_from_label(&attachment_label(id, name)), Some(id));
        }
    }
}
