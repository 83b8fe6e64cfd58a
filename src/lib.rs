//! High-throughput delimited-text reader: build a compact field index in
//! one SIMD-accelerated pass over a memory-mapped buffer, then materialize
//! typed column vectors lazily, on demand, directly from the mapped bytes.
//!
//! Entry point: [`parser::parse`] / [`parser::parse_file`].

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub mod buffer;
pub mod column;
pub mod config;
pub mod core;
pub mod dialect;
pub mod dialect_detect;
pub mod error;
pub mod index;
pub mod parser;
pub mod sidecar;
pub mod simd;
pub mod state_machine;
pub mod types;

pub use buffer::AlignedBuffer;
pub use column::{ExtractionConfig, ExtractionConfigSet, FieldSpan, LazyColumn};
pub use config::Config;
pub use dialect::Dialect;
pub use dialect_detect::DetectionResult;
pub use error::{ErrorCode, ErrorCollector, ErrorMode, LoadError, ParseError, Severity};
pub use index::{FileIndex, IndexCollection, ParseIndex};
pub use parser::{parse, parse_file, ParseFacadeError, ParseOptions, ParseResult};
pub use types::{guess_column_type, ColumnType};
