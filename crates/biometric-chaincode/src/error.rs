use crate::response::Response;
use crate::stub::StubError;
use thiserror::Error;

/// Everything that can end an invocation early.
///
/// The `Display` text is the short message handed back to the client in the
/// failure response. Underlying causes stay attached as `source` so they can
/// be logged without leaking into the response.
#[derive(Debug, Error)]
pub enum ChaincodeError {
    #[error("Error parsing input")]
    Decode(#[source] serde_json::Error),
    #[error("Invalid Token or Key")]
    Validation { field: &'static str },
    #[error("Error marshalling BiometricStruct{key}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to get asset")]
    StoreRead {
        key: String,
        #[source]
        source: StubError,
    },
    #[error("Error writing BiometricStruct: {key}")]
    StoreWrite {
        key: String,
        #[source]
        source: StubError,
    },
    #[error("a problem occurred, asset not deleted")]
    StoreDelete {
        key: String,
        #[source]
        source: StubError,
    },
    #[error("Error executing query")]
    Query(#[source] StubError),
    #[error("Error executing hash iterator")]
    Iteration(#[source] StubError),
    #[error("Invalid Invoke Function: {0}")]
    UnknownCommand(String),
    #[error("asset does not exist")]
    MissingKey(String),
    #[error("Incorrect number of arguments for {function}: expecting {expected}")]
    MissingArgument { function: String, expected: usize },
}

impl From<ChaincodeError> for Response {
    fn from(err: ChaincodeError) -> Self {
        Response::error(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_command_message_carries_name() {
        let err = ChaincodeError::UnknownCommand("transferBiometric".into());
        assert_eq!(err.to_string(), "Invalid Invoke Function: transferBiometric");
    }

    #[test]
    fn test_response_hides_source() {
        let err = ChaincodeError::Query(StubError::InvalidQuery("bad selector".into()));
        let resp: Response = err.into();
        assert_eq!(resp.status, Response::ERROR);
        assert_eq!(resp.message, "Error executing query");
        assert!(resp.payload.is_none());
    }
}
