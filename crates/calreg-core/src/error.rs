use thiserror::Error;

#[derive(Error, Debug)]
pub enum CalregError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid frame dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Movie size {size} bytes is not a whole number of {frame_bytes}-byte frames")]
    MisalignedStream { size: usize, frame_bytes: usize },

    #[error("Frame index {index} out of range (total: {total})")]
    FrameIndexOutOfRange { index: usize, total: usize },

    #[error("Too few frames for registration: {got} (minimum {min})")]
    TooFewFrames { got: usize, min: usize },

    #[error("Pipeline error: {0}")]
    Pipeline(String),

    #[error("Empty frame sequence")]
    EmptySequence,
}

pub type Result<T> = std::result::Result<T, CalregError>;
