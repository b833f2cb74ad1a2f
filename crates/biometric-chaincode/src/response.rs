use serde::{Deserialize, Serialize};

/// Outcome of one invocation as seen by the host.
///
/// A success carries an optional payload and no message; a failure carries a
/// human-readable message and never a payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub status: i32,
    pub message: String,
    pub payload: Option<Vec<u8>>,
}

impl Response {
    pub const OK: i32 = 200;
    pub const ERROR: i32 = 500;

    pub fn success(payload: Option<Vec<u8>>) -> Self {
        Self {
            status: Self::OK,
            message: String::new(),
            payload,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Self::ERROR,
            message: message.into(),
            payload: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == Self::OK
    }

    /// Payload bytes, or an empty slice when there is none.
    pub fn payload_bytes(&self) -> &[u8] {
        self.payload.as_deref().unwrap_or_default()
    }
}
