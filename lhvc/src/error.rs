use thiserror::Error;

pub type Result<T> = std::result::Result<T, CodecError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("end of stream at bit {position}")]
    EndOfStream { position: u64 },

    #[error(
        "block {block_w}x{block_h} at ({x}, {y}) displaced by ({dx}, {dy}) reads outside {plane_w}x{plane_h} plane"
    )]
    OutOfBounds {
        x: u32,
        y: u32,
        block_w: u32,
        block_h: u32,
        dx: i32,
        dy: i32,
        plane_w: u32,
        plane_h: u32,
    },

    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("inter prediction requested without a reference frame")]
    ReferenceMissing,

    #[error("frame dimension mismatch: expected {expected_w}x{expected_h}, got {got_w}x{got_h}")]
    DimensionMismatch {
        expected_w: u32,
        expected_h: u32,
        got_w: u32,
        got_h: u32,
    },

    #[error("invalid stream: {0}")]
    InvalidStream(String),
}

impl CodecError {
    /// Errors caused by the bytes being decoded rather than by the caller.
    pub fn is_stream_error(&self) -> bool {
        matches!(
            self,
            CodecError::EndOfStream { .. }
                | CodecError::ReferenceMissing
                | CodecError::InvalidStream(_)
        )
    }
}
