//! Output sink trait and error types
//!
//! The crawl core emits a stream of catalog items to a caller-supplied
//! sink; what happens to them (file, stream, downstream queue) is the
//! sink's decision, not the crawler's.

use crate::model::CatalogItem;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("Failed to serialize item: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Receiver of the crawl output stream
///
/// Items arrive in completion order, not request order. Implementations
/// are driven from multiple worker tasks through a mutex, so `emit`
/// should return quickly.
pub trait ProductSink: Send {
    /// Receives one extracted item
    fn emit(&mut self, item: &CatalogItem) -> OutputResult<()>;

    /// Called once after the crawl finishes or is cancelled
    fn finish(&mut self) -> OutputResult<()> {
        Ok(())
    }
}

/// Sink that collects items in memory; used by tests and small runs
#[derive(Debug, Default)]
pub struct VecSink {
    pub items: Vec<CatalogItem>,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProductSink for VecSink {
    fn emit(&mut self, item: &CatalogItem) -> OutputResult<()> {
        self.items.push(item.clone());
        Ok(())
    }
}
