//! Error types for audio output

/// Error types for audio backends.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// WAV file read/write error.
    #[error("WAV file error: {0}")]
    Wav(#[from] hound::Error),

    /// Audio stream setup or runtime error.
    #[error("Audio stream error: {0}")]
    Stream(String),

    /// No audio device available on the system.
    #[error("No audio device available")]
    NoDevice,

    /// The requested audio device was not found.
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// The device's sample format is not supported.
    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),

    /// A handle that this backend never allocated, or already released.
    #[error("Unknown stream handle: {0}")]
    UnknownStream(usize),
}

/// Convenience result type for audio output operations.
pub type Result<T> = std::result::Result<T, Error>;
