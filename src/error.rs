use thiserror::Error;

/// Main player error type
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("File error: {0}")]
    File(#[from] std::io::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Effect error: {0}")]
    Effect(#[from] EffectError),

    #[error("Player has been destroyed")]
    Closed,
}

impl PlayerError {
    /// Get user-friendly error message with suggested solutions
    pub fn user_message(&self) -> String {
        match self {
            PlayerError::Audio(err) => err.user_message(),
            PlayerError::File(err) => Self::format_file_error(err),
            PlayerError::Decode(err) => err.user_message(),
            PlayerError::Config(err) => err.user_message(),
            PlayerError::Effect(err) => err.user_message(),
            PlayerError::Closed => "The music player has already been shut down".to_string(),
        }
    }

    /// Get suggested recovery actions for the error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            PlayerError::Audio(err) => err.recovery_suggestions(),
            PlayerError::File(err) => Self::file_error_suggestions(err),
            PlayerError::Decode(err) => err.recovery_suggestions(),
            PlayerError::Config(err) => err.recovery_suggestions(),
            PlayerError::Effect(err) => err.recovery_suggestions(),
            PlayerError::Closed => vec!["Create a new player instance".to_string()],
        }
    }

    /// Check if this error allows for automatic recovery
    pub fn is_recoverable(&self) -> bool {
        match self {
            PlayerError::Audio(err) => err.is_recoverable(),
            PlayerError::File(_) => false, // File errors usually require user intervention
            PlayerError::Decode(err) => err.is_recoverable(),
            PlayerError::Config(err) => err.is_recoverable(),
            PlayerError::Effect(err) => err.is_recoverable(),
            PlayerError::Closed => false, // Destroy is terminal
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            PlayerError::Audio(AudioError::LineUnavailable(_)) => ErrorSeverity::Error,
            PlayerError::Audio(_) => ErrorSeverity::Critical,
            PlayerError::File(_) => ErrorSeverity::Error,
            PlayerError::Decode(DecodeError::UnsupportedFormat { .. }) => ErrorSeverity::Warning,
            PlayerError::Decode(_) => ErrorSeverity::Error,
            PlayerError::Config(_) => ErrorSeverity::Warning,
            PlayerError::Effect(EffectError::PoolShutdown) => ErrorSeverity::Info,
            PlayerError::Effect(_) => ErrorSeverity::Error,
            PlayerError::Closed => ErrorSeverity::Info,
        }
    }

    fn format_file_error(err: &std::io::Error) -> String {
        match err.kind() {
            std::io::ErrorKind::NotFound => "File or directory not found".to_string(),
            std::io::ErrorKind::PermissionDenied => "Permission denied - cannot access file".to_string(),
            std::io::ErrorKind::InvalidData => "File contains invalid or corrupted data".to_string(),
            std::io::ErrorKind::UnexpectedEof => "File appears to be truncated or corrupted".to_string(),
            _ => format!("File system error: {}", err),
        }
    }

    fn file_error_suggestions(err: &std::io::Error) -> Vec<String> {
        match err.kind() {
            std::io::ErrorKind::NotFound => vec![
                "Check that the file path is correct".to_string(),
                "Try using absolute path instead of relative path".to_string(),
            ],
            std::io::ErrorKind::PermissionDenied => vec![
                "Check file permissions".to_string(),
                "Ensure the file is not locked by another application".to_string(),
            ],
            std::io::ErrorKind::InvalidData | std::io::ErrorKind::UnexpectedEof => vec![
                "Try re-downloading or re-copying the file".to_string(),
                "Verify file integrity with a checksum if available".to_string(),
            ],
            _ => vec!["Try the operation again".to_string()],
        }
    }
}

/// Error severity levels for logging and user feedback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl ErrorSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorSeverity::Info => "INFO",
            ErrorSeverity::Warning => "WARNING",
            ErrorSeverity::Error => "ERROR",
            ErrorSeverity::Critical => "CRITICAL",
        }
    }

    pub fn log_level(&self) -> log::Level {
        match self {
            ErrorSeverity::Info => log::Level::Info,
            ErrorSeverity::Warning => log::Level::Warn,
            ErrorSeverity::Error => log::Level::Error,
            ErrorSeverity::Critical => log::Level::Error,
        }
    }
}

/// Output line errors
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Line unavailable: {0}")]
    LineUnavailable(String),

    #[error("Device not found: {device}")]
    DeviceNotFound { device: String },

    #[error("Unsupported format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Stream error: {0}")]
    StreamError(String),
}

impl AudioError {
    pub fn user_message(&self) -> String {
        match self {
            AudioError::LineUnavailable(msg) => {
                format!("No audio output line could be opened: {}", msg)
            }
            AudioError::DeviceNotFound { device } => {
                format!("Audio device '{}' is not available or has been disconnected", device)
            }
            AudioError::UnsupportedFormat { format } => {
                format!("The output device cannot play '{}'", format)
            }
            AudioError::StreamError(msg) => {
                format!("Audio playback interrupted: {}", msg)
            }
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            AudioError::LineUnavailable(_) => vec![
                "Close other applications holding exclusive access to the device".to_string(),
                "Issue the play command again once the device is free".to_string(),
            ],
            AudioError::DeviceNotFound { .. } => vec![
                "Run 'cadence devices' to see available output devices".to_string(),
                "Remove 'preferred_device' from the configuration to use the default device".to_string(),
            ],
            AudioError::UnsupportedFormat { .. } => vec![
                "Convert the file to a sample rate the device supports (e.g. 44100 or 48000 Hz)".to_string(),
                "Try a different output device".to_string(),
            ],
            AudioError::StreamError(_) => vec![
                "Stop and play the track again".to_string(),
                "Check audio device connections".to_string(),
            ],
        }
    }

    pub fn is_recoverable(&self) -> bool {
        match self {
            AudioError::LineUnavailable(_) => true, // A later play may succeed
            AudioError::DeviceNotFound { .. } => true, // Can fallback to default device
            AudioError::UnsupportedFormat { .. } => false, // No sample-rate conversion
            AudioError::StreamError(_) => true, // Can restart the pass
        }
    }
}

/// Audio decoding errors
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Unsupported format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Corrupted file: {0}")]
    CorruptedFile(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DecodeError {
    pub fn user_message(&self) -> String {
        match self {
            DecodeError::UnsupportedFormat { format } => {
                format!("Audio format '{}' is not supported by this player", format)
            }
            DecodeError::CorruptedFile(msg) => {
                format!("Audio file appears to be corrupted or damaged: {}", msg)
            }
            DecodeError::Io(err) => {
                format!("Cannot read audio source: {}", err)
            }
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            DecodeError::UnsupportedFormat { format } => vec![
                "Supported formats: FLAC, WAV, MP3, OGG/Vorbis, AAC/ALAC".to_string(),
                format!("Convert '{}' to a supported format using audio conversion software", format),
            ],
            DecodeError::CorruptedFile(_) => vec![
                "Try re-downloading or re-copying the file".to_string(),
                "Try playing the file in another audio player to confirm corruption".to_string(),
            ],
            DecodeError::Io(_) => vec![
                "Check that the file exists and is readable".to_string(),
            ],
        }
    }

    pub fn is_recoverable(&self) -> bool {
        match self {
            DecodeError::UnsupportedFormat { .. } => false, // Requires different file
            DecodeError::CorruptedFile(_) => false, // Requires file repair/replacement
            DecodeError::Io(_) => true, // Can retry
        }
    }
}

/// Sound effect errors, surfaced synchronously by the effect factory
#[derive(Debug, Error)]
pub enum EffectError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Effect pool has been shut down")]
    PoolShutdown,

    #[error("Effect pool initialization failed: {0}")]
    PoolInit(String),
}

impl EffectError {
    pub fn user_message(&self) -> String {
        match self {
            EffectError::Io(err) => format!("Cannot read sound effect: {}", err),
            EffectError::Decode(err) => err.user_message(),
            EffectError::PoolShutdown => "Sound effects are no longer accepted".to_string(),
            EffectError::PoolInit(msg) => format!("Failed to start the effect workers: {}", msg),
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            EffectError::Io(_) => vec!["Check that the effect file exists and is readable".to_string()],
            EffectError::Decode(err) => err.recovery_suggestions(),
            EffectError::PoolShutdown => vec!["Create a new effect factory".to_string()],
            EffectError::PoolInit(_) => vec!["Restart the application".to_string()],
        }
    }

    pub fn is_recoverable(&self) -> bool {
        match self {
            EffectError::Io(_) => true,
            EffectError::Decode(err) => err.is_recoverable(),
            EffectError::PoolShutdown => false,
            EffectError::PoolInit(_) => false,
        }
    }
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found")]
    ConfigDirNotFound,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] toml::ser::Error),

    #[error("Deserialization error: {0}")]
    DeserializationError(#[from] toml::de::Error),
}

impl ConfigError {
    pub fn user_message(&self) -> String {
        match self {
            ConfigError::ConfigDirNotFound => {
                "Cannot find or create configuration directory".to_string()
            }
            ConfigError::IoError(err) => {
                format!("Cannot access configuration file: {}", err)
            }
            ConfigError::SerializationError(_) => {
                "Failed to save configuration settings".to_string()
            }
            ConfigError::DeserializationError(_) => {
                "Configuration file is corrupted or has invalid format".to_string()
            }
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            ConfigError::ConfigDirNotFound => vec![
                "Check that you have write permissions to your home directory".to_string(),
                "Try creating the directory manually: ~/.config/cadence/".to_string(),
            ],
            ConfigError::IoError(_) => vec![
                "Check file permissions for the configuration directory".to_string(),
                "Ensure the disk is not full".to_string(),
            ],
            ConfigError::SerializationError(_) => vec![
                "Configuration will use default values".to_string(),
            ],
            ConfigError::DeserializationError(_) => vec![
                "Delete the configuration file to reset to defaults".to_string(),
                "Check the configuration file format manually".to_string(),
            ],
        }
    }

    pub fn is_recoverable(&self) -> bool {
        // Every configuration problem can fall back to defaults
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_player_error_from_audio_error() {
        let audio_error = AudioError::LineUnavailable("busy".to_string());
        let player_error: PlayerError = audio_error.into();

        match player_error {
            PlayerError::Audio(AudioError::LineUnavailable(msg)) => {
                assert_eq!(msg, "busy");
            }
            _ => panic!("Expected Audio error variant"),
        }
    }

    #[test]
    fn test_player_error_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let player_error: PlayerError = io_error.into();

        assert!(matches!(player_error, PlayerError::File(_)));
        assert_eq!(player_error.user_message(), "File or directory not found");
        assert!(!player_error.is_recoverable());
    }

    #[test]
    fn test_effect_error_wraps_decode_error() {
        let decode_error = DecodeError::UnsupportedFormat {
            format: "UNKNOWN".to_string(),
        };
        let effect_error: EffectError = decode_error.into();
        let player_error: PlayerError = effect_error.into();

        match player_error {
            PlayerError::Effect(EffectError::Decode(DecodeError::UnsupportedFormat { format })) => {
                assert_eq!(format, "UNKNOWN");
            }
            _ => panic!("Expected Effect(Decode) error variant"),
        }
    }

    #[test]
    fn test_audio_error_display() {
        let error = AudioError::LineUnavailable("no device".to_string());
        assert_eq!(format!("{}", error), "Line unavailable: no device");

        let error = AudioError::DeviceNotFound {
            device: "Test Device".to_string(),
        };
        assert_eq!(format!("{}", error), "Device not found: Test Device");

        let error = AudioError::StreamError("Stream failed".to_string());
        assert_eq!(format!("{}", error), "Stream error: Stream failed");
    }

    #[test]
    fn test_decode_error_display() {
        let error = DecodeError::UnsupportedFormat {
            format: "UNKNOWN".to_string(),
        };
        assert_eq!(format!("{}", error), "Unsupported format: UNKNOWN");

        let error = DecodeError::CorruptedFile("Bad file".to_string());
        assert_eq!(format!("{}", error), "Corrupted file: Bad file");
    }

    #[test]
    fn test_severity_mapping() {
        let error = PlayerError::Effect(EffectError::PoolShutdown);
        assert_eq!(error.severity(), ErrorSeverity::Info);
        assert_eq!(error.severity().log_level(), log::Level::Info);

        let error = PlayerError::Audio(AudioError::LineUnavailable("x".to_string()));
        assert_eq!(error.severity().as_str(), "ERROR");

        assert_eq!(PlayerError::Closed.severity(), ErrorSeverity::Info);
    }

    #[test]
    fn test_error_source_chain() {
        use std::error::Error;

        let io_error = io::Error::new(io::ErrorKind::PermissionDenied, "Permission denied");
        let config_error = ConfigError::IoError(io_error);
        let player_error = PlayerError::Config(config_error);

        let mut current_error: &dyn Error = &player_error;
        let mut error_count = 0;

        while let Some(source) = current_error.source() {
            current_error = source;
            error_count += 1;
        }

        assert!(error_count >= 1);
    }
}
