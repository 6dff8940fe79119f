use thiserror::Error;

/// Recoverable failures of the camera session.
///
/// Expected rejections (busy lock, capture in progress, wrong mode) are not
/// errors; they are reported through `UpdateOutcome` and `CaptureOutcome`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CameraError {
    #[error("Camera initialization error: {0}")]
    InitializationError(String),
    #[error("Configuration file error: {0}")]
    ConfigError(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Device not found: {0}")]
    DeviceNotFound(String),
    #[error("Capability error: {0}")]
    CapabilityError(String),
    #[error("Backend error: {0}")]
    BackendError(String),
    #[error("Capture error: {0}")]
    CaptureError(String),
    #[error("Recording error: {0}")]
    RecordingError(String),
}

impl From<toml::de::Error> for CameraError {
    fn from(err: toml::de::Error) -> Self {
        CameraError::ConfigError(format!("Failed to parse TOML: {}", err))
    }
}

impl From<toml::ser::Error> for CameraError {
    fn from(err: toml::ser::Error) -> Self {
        CameraError::ConfigError(format!("Failed to serialize TOML: {}", err))
    }
}

impl From<config::ConfigError> for CameraError {
    fn from(err: config::ConfigError) -> Self {
        CameraError::ConfigError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefixes() {
        let error = CameraError::InvalidConfiguration("quality uhd not supported".to_string());
        assert_eq!(
            error.to_string(),
            "Invalid configuration: quality uhd not supported"
        );

        let error = CameraError::BackendError("bind failed".to_string());
        assert!(error.to_string().starts_with("Backend error"));
    }

    #[test]
    fn test_toml_error_conversion() {
        let parse: Result<toml::Value, _> = toml::from_str("not = [valid");
        let error: CameraError = parse.unwrap_err().into();
        assert!(matches!(error, CameraError::ConfigError(_)));
    }
}
