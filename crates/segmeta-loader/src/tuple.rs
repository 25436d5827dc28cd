//! Output tuple and the schema declared to the query engine
//!
//! [`PAGE_FIELDS`] is the single table both the projection and the schema
//! declaration read from, so the two cannot drift apart.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::record::{Metadata, ParseData};

/// Number of fields in every emitted tuple
pub const TUPLE_ARITY: usize = 6;

/// Where a tuple field's value comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSource {
    /// Lookup in the content-metadata bag under this key
    Metadata(&'static str),
    /// The parse-data title slot
    Title,
}

/// Positional output fields: (name, source)
pub const PAGE_FIELDS: [(&str, FieldSource); TUPLE_ARITY] = [
    ("url", FieldSource::Metadata("url")),
    ("title", FieldSource::Title),
    ("length", FieldSource::Metadata("length")),
    ("date", FieldSource::Metadata("date")),
    ("type", FieldSource::Metadata("type")),
    ("collection", FieldSource::Metadata("collection")),
];

/// Field type as declared to the query engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    CharArray,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::CharArray => write!(f, "chararray"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSchema {
    pub name: &'static str,
    pub data_type: DataType,
}

/// Output schema of the loader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub fields: Vec<FieldSchema>,
}

impl Schema {
    /// The per-page metadata schema: six chararray fields
    pub fn page_metadata() -> Self {
        Self {
            fields: PAGE_FIELDS
                .iter()
                .map(|(name, _)| FieldSchema {
                    name: *name,
                    data_type: DataType::CharArray,
                })
                .collect(),
        }
    }

    pub fn field_names(&self) -> Vec<&'static str> {
        self.fields.iter().map(|f| f.name).collect()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}:{}", field.name, field.data_type)?;
        }
        write!(f, ")")
    }
}

/// Host capability that turns projected field values into engine tuples
pub trait TupleFactory {
    type Tuple;

    fn new_tuple(&self, fields: [String; TUPLE_ARITY]) -> Self::Tuple;
}

/// Builds [`Tuple`] values
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTupleFactory;

impl TupleFactory for DefaultTupleFactory {
    type Tuple = Tuple;

    fn new_tuple(&self, fields: [String; TUPLE_ARITY]) -> Tuple {
        let [url, title, length, date, content_type, collection] = fields;
        Tuple {
            url,
            title,
            length,
            date,
            content_type,
            collection,
        }
    }
}

/// One page's metadata row
///
/// Every field is a string; missing inputs are empty strings, never absent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tuple {
    pub url: String,
    pub title: String,
    pub length: String,
    pub date: String,
    #[serde(rename = "type")]
    pub content_type: String,
    pub collection: String,
}

impl Tuple {
    pub const ARITY: usize = TUPLE_ARITY;

    pub fn len(&self) -> usize {
        Self::ARITY
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Field at `position`, in schema order
    pub fn get(&self, position: usize) -> Option<&str> {
        self.fields().get(position).copied()
    }

    pub fn fields(&self) -> [&str; TUPLE_ARITY] {
        [
            &self.url,
            &self.title,
            &self.length,
            &self.date,
            &self.content_type,
            &self.collection,
        ]
    }

    pub fn into_fields(self) -> [String; TUPLE_ARITY] {
        [
            self.url,
            self.title,
            self.length,
            self.date,
            self.content_type,
            self.collection,
        ]
    }

    /// Rebuild a parse-data record from this tuple
    ///
    /// Every metadata field is written back, including empty ones, and the
    /// title goes to the title slot.
    pub fn to_parse_data(&self) -> ParseData {
        let fields = self.fields();
        let mut meta = Metadata::new();
        let mut title = None;

        for ((_, source), value) in PAGE_FIELDS.iter().zip(fields) {
            match source {
                FieldSource::Metadata(key) => meta.set(*key, value),
                FieldSource::Title => title = Some(value.to_string()),
            }
        }

        ParseData::new(title, meta)
    }
}
