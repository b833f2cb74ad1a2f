//! Biometric credential chaincode.
//!
//! Records are upserted under a derived key (`key_type_provider`), looked up
//! through the host's rich-query interface, scanned in full, or deleted. All
//! state lives in the host world state behind [`ChaincodeStub`].

pub mod chaincode;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod record;
pub mod response;
pub mod results;
pub mod selector;
pub mod stub;
pub mod world_state;

pub use chaincode::BiometricChaincode;
pub use config::{ChaincodeConfig, ConfigError, DeleteRouting, LogFormat};
pub use error::ChaincodeError;
pub use metrics::ChaincodeMetrics;
pub use record::BiometricRecord;
pub use response::Response;
pub use stub::{Chaincode, ChaincodeStub, KeyValue, ScopedIterator, StateQueryIterator, StubError};
pub use world_state::{Faults, MockStub, WorldState, WorldStateError};
