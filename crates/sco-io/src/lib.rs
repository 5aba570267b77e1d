//! # sco-io: input documents for setpoint optimization
//!
//! Loads the JSON document written by the sensitivity generator into a
//! [`sco_core::NetworkModel`].
//!
//! ```rust,no_run
//! use sco_io::importers::parse_document;
//!
//! fn main() -> anyhow::Result<()> {
//!     let result = parse_document("sensitivities.json")?;
//!     let stats = result.network.stats();
//!
//!     println!("HVDCs: {}, PSTs: {}", stats.hvdcs, stats.psts);
//!     println!("{}", result.diagnostics.diagnostics);
//!
//!     Ok(())
//! }
//! ```
//!
//! Malformed elements are skipped and reported in the diagnostics rather than
//! aborting the import; a document that is not valid JSON, or whose top level
//! is not an object, is an error. [`ImportResult::ensure_valid`] turns
//! rejected definitions into an error for callers that must not run on a
//! partial network.

pub mod importers;

pub use importers::{load_network, parse_document, parse_document_str, ImportResult};
