use thiserror::Error;

/// A cell value could not be rewritten and re-encoded.
///
/// Never escapes [`crate::ValueCodec::transform`]; the codec logs it and
/// keeps the original value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    #[error("value nested deeper than {0} levels")]
    TooDeep(usize),

    #[error("rewritten JSON string is not valid UTF-8")]
    InvalidUtf8,
}
