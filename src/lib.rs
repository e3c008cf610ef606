// Allow some clippy lints that are too pedantic for this project
#![allow(clippy::type_complexity)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::enum_variant_names)]
// Allow unused for tests
#![cfg_attr(test, allow(dead_code))]

//! # pdf_cosign
//!
//! Multi-party PDF form signing.
//!
//! ## Core Features
//!
//! - **Field detection**: find the text, checkbox and radio fields of an
//!   uploaded template, with page and rectangle
//! - **Master building**: rebuild the form from a field layout, tagging every
//!   field with its owner and semantic type
//! - **Flattening**: burn the current values into page content for display
//! - **Chained signatures**: a DocMDP certification followed by one FieldMDP
//!   approval per signer, each an incremental `adbe.pkcs7.detached` revision
//! - **Workflows**: signer turns, lazy snapshots and optimistic concurrency
//!
//! ## Architecture
//!
//! - [`document`] loads a PDF into an object map and writes it back, either
//!   whole or as an appended revision
//! - [`forms`] and [`signatures`] operate on that object map
//! - [`workflow`] sequences them behind a pluggable [`workflow::WorkflowStore`]
//!
//! ## Quick Start
//!
//! ```ignore
//! use pdf_cosign::forms::{extract_fields, flatten_pdf};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let bytes = std::fs::read("form.pdf")?;
//! for field in extract_fields(&bytes)? {
//!     println!("{} ({}) on page {}", field.field_name, field.field_type, field.page);
//! }
//! std::fs::write("flat.pdf", flatten_pdf(&bytes)?)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## License
//!
//! Licensed under either of:
//!
//! * Apache License, Version 2.0 (<http://www.apache.org/licenses/LICENSE-2.0>)
//! * MIT license (<http://opensource.org/licenses/MIT>)
//!
//! at your option.

#![warn(missing_docs)]

// Error handling
pub mod error;

// Core PDF parsing
pub mod document;
pub mod lexer;
pub mod object;
pub mod objstm;
pub mod parser;
pub mod xref;
pub mod xref_reconstruction;

// Stream decoders
pub mod decoders;

// Standard 14 font metrics and encoding
pub mod fonts;

// PDF writing
pub mod writer;

// Interactive forms
pub mod forms;

// Digital signatures
pub mod signatures;

// Signing workflows
pub mod config;
pub mod workflow;

#[cfg(test)]
mod test_support;

// Re-exports
pub use config::WorkflowConfig;
pub use document::PdfDocument;
pub use error::{Error, ErrorKind, Result};
pub use workflow::WorkflowService;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
