use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Framing errors
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Invalid head byte: expected 0xCF, got 0x{0:02X}")]
    BadHead(u8),

    #[error("Frame length mismatch: LEN field implies {expected} bytes, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("CRC mismatch: computed 0x{expected:04X}, frame carries 0x{actual:04X}")]
    CrcMismatch { expected: u16, actual: u16 },

    #[error("Payload too large: {0} bytes (max 255)")]
    PayloadTooLarge(usize),

    // Builder validation
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create an invalid frame error.
    pub fn invalid_frame(message: impl Into<String>) -> Self {
        Self::InvalidFrame(message.into())
    }

    /// Create an invalid parameter error.
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
