//! Shared fixtures for loader integration tests

#![allow(dead_code)]

use segmeta_loader::{Metadata, ParseData, Record, RecordValue};
use std::io::Write;
use std::path::Path;

/// Parse-data record with the given title and metadata pairs
pub fn page(title: Option<&str>, meta: &[(&str, &str)]) -> Record {
    let bag: Metadata = meta.iter().copied().collect();
    let key = bag.get("url").unwrap_or("no-url").to_string();
    Record::new(key, ParseData::new(title.map(String::from), bag))
}

/// Parse-data record carrying only a url
pub fn page_url(url: &str) -> Record {
    page(None, &[("url", url)])
}

/// Record of a kind the loader does not project
pub fn foreign(kind: &str) -> Record {
    Record::new(format!("{kind}-key"), RecordValue::other(kind))
}

/// Write records as a JSON-lines container file, creating parent directories
pub fn write_container(path: &Path, records: &[Record]) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut file = std::fs::File::create(path).unwrap();
    for record in records {
        writeln!(file, "{}", serde_json::to_string(record).unwrap()).unwrap();
    }
}

/// Lay out `segment/parse_data/part-NNNNN/data` map-files, one per part
pub fn write_segment(root: &Path, segment: &str, parts: &[Vec<Record>]) {
    for (i, records) in parts.iter().enumerate() {
        let data = root
            .join(segment)
            .join("parse_data")
            .join(format!("part-{i:05}"))
            .join("data");
        write_container(&data, records);
    }
}
