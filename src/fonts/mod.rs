//! Standard font support for generated appearances.
//!
//! Appearances only ever use the non-embedded Helvetica faces, so all that
//! is needed is WinAnsi encoding and the advance widths used for sizing.

pub mod encoding;
pub mod metrics;

pub use encoding::{encode_winansi, is_winansi_char, unicode_to_winansi};
pub use metrics::StandardFont;
