//! Error types for keyboard-piano

use thiserror::Error;

/// Result type alias for keyboard-piano operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in keyboard-piano
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration file could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// No MIDI output endpoint is available
    #[error("No MIDI outputs found. Install a virtual MIDI port or connect a device.")]
    NoOutputDevice,

    /// The interactive output choice was not a valid index
    #[error("Invalid output selection: {0}")]
    InvalidSelection(String),

    /// MIDI backend error
    #[error("MIDI error: {0}")]
    Midi(String),

    /// JACK connection error
    #[error("JACK error: {0}")]
    Jack(#[from] jack::Error),

    /// Keyboard event source error
    #[error("Keyboard error: {0}")]
    Keyboard(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
