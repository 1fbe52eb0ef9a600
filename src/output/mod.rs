//! Output module
//!
//! The crawl core hands every extracted item to a [`ProductSink`]; this
//! module provides the trait, the default JSON-lines implementation, and
//! the run accounting surfaced at the end of a crawl.

mod jsonl;
pub mod stats;
mod traits;

pub use jsonl::JsonLinesSink;
pub use stats::{print_summary, RunStats, RunSummary};
pub use traits::{OutputError, OutputResult, ProductSink, VecSink};
