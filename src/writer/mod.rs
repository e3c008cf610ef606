//! PDF writing.
//!
//! ```text
//! ContentStreamBuilder (operators -> content bytes)
//!     ↓
//! AppearanceStreamBuilder (content + resources -> Form XObject)
//!     ↓
//! ObjectSerializer (objects -> bytes, used by full and incremental saves)
//! ```

mod appearance_stream;
mod content_stream;
mod object_serializer;

pub use appearance_stream::{compress_data, AppearanceStreamBuilder};
pub use content_stream::{ContentStreamBuilder, ContentStreamOp};
pub use object_serializer::{format_real, ObjectSerializer};
