//! JSON-lines product feed
//!
//! The default sink: one JSON object per line, stamped with the emission
//! time. Field order and schema are whatever the record serializes to;
//! consumers wanting a different shape supply their own sink.

use crate::model::CatalogItem;
use crate::output::traits::{OutputResult, ProductSink};
use chrono::Utc;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Writes one cleaned, timestamped JSON object per emitted item
pub struct JsonLinesSink {
    writer: BufWriter<File>,
    written: u64,
}

impl JsonLinesSink {
    pub fn create(path: &Path) -> OutputResult<Self> {
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            written: 0,
        })
    }

    /// Items written so far
    pub fn written(&self) -> u64 {
        self.written
    }
}

impl ProductSink for JsonLinesSink {
    fn emit(&mut self, item: &CatalogItem) -> OutputResult<()> {
        let mut value = serde_json::to_value(item)?;

        clean_value(&mut value);

        if let serde_json::Value::Object(map) = &mut value {
            map.insert(
                "timestamp".to_string(),
                serde_json::Value::from(Utc::now().timestamp()),
            );
        }

        serde_json::to_writer(&mut self.writer, &value)?;
        self.writer.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> OutputResult<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Trims string fields recursively; the feed should not carry stray
/// whitespace from upstream payloads
fn clean_value(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.len() != s.len() {
                *s = trimmed.to_string();
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                clean_value(item);
            }
        }
        serde_json::Value::Object(map) => {
            for (_, item) in map.iter_mut() {
                clean_value(item);
            }
        }
        _ => {}
    }
}
