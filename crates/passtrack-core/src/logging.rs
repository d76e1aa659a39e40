//! JSONL logging for tracker sessions
//!
//! Each process run writes its own append-only JSONL file, so several CLI
//! invocations (or a CLI next to a long-running app) never interleave
//! partial lines.
//!
//! ```text
//! logs/
//! ├── 2026-10-18_alice.jsonl     # signed-in session
//! └── 2026-10-18_local.jsonl     # local-only session
//! ```
//!
//! ```ignore
//! use passtrack_core::logging::LoggingBuilder;
//!
//! LoggingBuilder::new("./logs", "alice")
//!     .with_filter("passtrack_core=debug")
//!     .init()?;
//! ```
//!
//! Entries are plain JSON objects and can be filtered with `jq`:
//!
//! ```bash
//! jq 'select(.level == "warn")' logs/*.jsonl
//! ```

mod entry;
mod layer;
mod writer;

pub use entry::JsonLogEntry;
pub use layer::{JsonlLayer, LoggingBuilder};
pub use writer::SessionLogWriter;
