//! Record model for crawl segment containers
//!
//! A segment container interleaves several record kinds under text keys.
//! Only [`RecordValue::ParseData`] contributes tuples; every other kind is
//! carried as [`RecordValue::Other`] so readers never have to reject it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Kind tag used for parse-data values in serialized containers
pub const PARSE_DATA_KIND: &str = "parse_data";

/// Content metadata bag of a parsed page
///
/// Keys are unique and case-sensitive; iteration order is unspecified.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(HashMap<String, String>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value stored under `key`, if any
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Store `value` under `key`, replacing any previous value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Parse output for a single fetched page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseData {
    pub title: Option<String>,
    pub content_meta: Metadata,
}

impl ParseData {
    pub fn new(title: Option<String>, content_meta: Metadata) -> Self {
        Self {
            title,
            content_meta,
        }
    }
}

/// Value half of a container record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawValue", into = "RawValue")]
pub enum RecordValue {
    ParseData(ParseData),
    /// Any other record kind sharing the container (parse text, crawl datum, ...)
    Other { kind: String },
}

impl RecordValue {
    pub fn other(kind: impl Into<String>) -> Self {
        RecordValue::Other { kind: kind.into() }
    }

    pub fn kind(&self) -> &str {
        match self {
            RecordValue::ParseData(_) => PARSE_DATA_KIND,
            RecordValue::Other { kind } => kind,
        }
    }

    pub fn as_parse_data(&self) -> Option<&ParseData> {
        match self {
            RecordValue::ParseData(pd) => Some(pd),
            RecordValue::Other { .. } => None,
        }
    }
}

impl From<ParseData> for RecordValue {
    fn from(pd: ParseData) -> Self {
        RecordValue::ParseData(pd)
    }
}

/// One keyed entry of a segment container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub key: String,
    pub value: RecordValue,
}

impl Record {
    pub fn new(key: impl Into<String>, value: impl Into<RecordValue>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Flat wire shape of a value: unknown kinds decode to `Other` instead of failing
#[derive(Serialize, Deserialize)]
struct RawValue {
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    content_meta: Metadata,
}

impl From<RawValue> for RecordValue {
    fn from(raw: RawValue) -> Self {
        if raw.kind == PARSE_DATA_KIND {
            RecordValue::ParseData(ParseData::new(raw.title, raw.content_meta))
        } else {
            RecordValue::Other { kind: raw.kind }
        }
    }
}

impl From<RecordValue> for RawValue {
    fn from(value: RecordValue) -> Self {
        match value {
            RecordValue::ParseData(pd) => RawValue {
                kind: PARSE_DATA_KIND.to_string(),
                title: pd.title,
                content_meta: pd.content_meta,
            },
            RecordValue::Other { kind } => RawValue {
                kind,
                title: None,
                content_meta: Metadata::default(),
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_parse_data_line() {
        let line = r#"{"key":"http://ex/","value":{"kind":"parse_data","title":"Example","content_meta":{"url":"http://ex/","type":"text/html"}}}"#;
        let record: Record = serde_json::from_str(line).unwrap();

        assert_eq!(record.key, "http://ex/");
        let pd = record.value.as_parse_data().unwrap();
        assert_eq!(pd.title.as_deref(), Some("Example"));
        assert_eq!(pd.content_meta.get("type"), Some("text/html"));
        assert_eq!(pd.content_meta.get("length"), None);
    }

    #[test]
    fn test_null_title_is_absent() {
        let line = r#"{"key":"k","value":{"kind":"parse_data","title":null}}"#;
        let record: Record = serde_json::from_str(line).unwrap();
        let pd = record.value.as_parse_data().unwrap();
        assert_eq!(pd.title, None);
        assert!(pd.content_meta.is_empty());
    }

    #[test]
    fn test_unknown_kind_decodes_as_other() {
        let line = r#"{"key":"k","value":{"kind":"parse_text","text":"body"}}"#;
        let record: Record = serde_json::from_str(line).unwrap();
        assert_eq!(record.value, RecordValue::other("parse_text"));
        assert!(record.value.as_parse_data().is_none());
    }

    #[test]
    fn test_metadata_keys_are_case_sensitive() {
        let meta: Metadata = [("URL", "upper")].into_iter().collect();
        assert_eq!(meta.get("URL"), Some("upper"));
        assert_eq!(meta.get("url"), None);
    }
}
