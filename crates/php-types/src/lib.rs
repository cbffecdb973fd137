//! PHP native serialization for wp-db-sync.
//!
//! WordPress stores options, metadata and widget settings as PHP
//! `serialize()` output. Strings in that format carry their byte length, so
//! a plain text replacement that changes a string's length corrupts the
//! payload. This crate decodes such payloads into [`PhpValue`] so callers can
//! rewrite the strings inside and encode the result with correct lengths.
//!
//! Decoding is byte-exact: [`unserialize`] followed by [`serialize`] gives
//! back the input for every payload it accepts. Float lexemes are kept as
//! written, and the opaque tags (`C:`, `E:`, `r:`, `R:`) are re-emitted
//! verbatim.

mod emit;
mod parse;
mod value;

pub use emit::{serialize, serialize_into};
pub use parse::{is_serialized, trim, unserialize, ParseError, MAX_DEPTH};
pub use value::{ArrayKey, PhpValue};
