// ISHNE 1.0 Holter ECG Reader
// Main library entry point

pub mod core;

// Re-export main types
pub use crate::core::data_handle::handle_ws_fetch;
pub use crate::core::error::{ErrorKind, IshneError, Result};
pub use crate::core::export::{export, ChunkSink, ExportChunks, StringSink, WriterSink};
pub use crate::core::format::{
    lead_label, ExportFormat, ExportOptions, IshneHeader, RecordingSummary, SampleSet,
};
pub use crate::core::reader::{decode_samples, parse_header, summarize, IshneReader};
