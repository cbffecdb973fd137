//! Serialization-safe find and replace.
//!
//! [`Rewriter`] applies the ordered replace pairs of a migration to one
//! string, along with the multisite subdomain and protocol-mismatch rules.
//! [`ValueCodec`] walks a cell value that may hold PHP-serialized data or
//! JSON, rewriting every string inside and re-encoding the container so
//! length prefixes and escaping stay valid.
//!
//! ```
//! use search_replace::{ClassPolicy, Rewriter, ValueCodec};
//! use sync_core::{Intent, MigrationContext, Stage};
//!
//! let context = MigrationContext::new(Intent::Push, Stage::Migrate)
//!     .with_pairs([("//old.example", "//new.example")]);
//! let rewriter = Rewriter::register(&context, "wp_options");
//! let mut codec = ValueCodec::new(rewriter, ClassPolicy::AllowAll);
//! codec.set_column("option_value");
//!
//! let out = codec.transform(b"a:1:{i:0;s:20:\"http://old.example/a\";}");
//! assert_eq!(out, b"a:1:{i:0;s:20:\"http://new.example/a\";}".to_vec());
//! ```

mod bytes;
mod codec;
mod error;
pub mod json;
mod rewriter;
pub mod url;

pub use bytes::{contains_ignore_ascii_case, find_ignore_ascii_case, ireplace, ireplace_pairs};
pub use codec::{ClassPolicy, ValueCodec, MAX_DEPTH};
pub use error::EncodingError;
pub use rewriter::Rewriter;
