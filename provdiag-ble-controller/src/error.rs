/// Failure reported by the platform BLE central.
///
/// `code` carries the platform's own error identifier when it has one, so the
/// operator can tell e.g. a permission problem from a missing device.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct BleError {
    pub message: String,
    pub code: Option<String>,
}

impl BleError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: Some(code.into()),
        }
    }
}

impl From<btleplug::Error> for BleError {
    fn from(e: btleplug::Error) -> Self {
        let code = match &e {
            btleplug::Error::PermissionDenied => Some("PermissionDenied"),
            btleplug::Error::DeviceNotFound => Some("DeviceNotFound"),
            btleplug::Error::NotConnected => Some("NotConnected"),
            btleplug::Error::NotSupported(_) => Some("NotSupported"),
            btleplug::Error::TimedOut(_) => Some("TimedOut"),
            btleplug::Error::Uuid(_) => Some("Uuid"),
            btleplug::Error::RuntimeError(_) => Some("RuntimeError"),
            _ => None,
        };
        Self {
            message: e.to_string(),
            code: code.map(str::to_string),
        }
    }
}
