use crate::config::{ChaincodeConfig, DeleteRouting};
use crate::error::ChaincodeError;
use crate::metrics::ChaincodeMetrics;
use crate::record::BiometricRecord;
use crate::response::Response;
use crate::results::{drain_values, to_json_array};
use crate::stub::{Chaincode, ChaincodeStub, ScopedIterator};
use std::error::Error as _;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, Span};

/// Dispatcher for the biometric record commands.
///
/// Holds no ledger state of its own; everything durable goes through the
/// stub. The span is the diagnostic sink every invocation logs under.
pub struct BiometricChaincode {
    delete_routing: DeleteRouting,
    span: Span,
    metrics: Arc<ChaincodeMetrics>,
}

impl BiometricChaincode {
    pub fn new(config: &ChaincodeConfig, metrics: Arc<ChaincodeMetrics>) -> Self {
        Self {
            delete_routing: config.delete_routing,
            span: info_span!("chaincode", module = %config.module),
            metrics,
        }
    }

    pub fn metrics(&self) -> &ChaincodeMetrics {
        &self.metrics
    }

    fn dispatch(
        &self,
        stub: &mut dyn ChaincodeStub,
        function: &str,
        args: &[String],
    ) -> Result<Option<Vec<u8>>, ChaincodeError> {
        match function {
            "init" => Ok(None),
            "search" => self.search(&*stub, first_arg(function, args)?).map(Some),
            "insertBiometricRecord" => {
                self.insert(stub, first_arg(function, args)?)?;
                Ok(None)
            }
            "deleteBiometricRecord" => {
                let arg = first_arg(function, args)?;
                match self.delete_routing {
                    DeleteRouting::Upsert => {
                        self.insert(stub, arg)?;
                    }
                    DeleteRouting::DeleteHandler => self.delete(stub, arg)?,
                }
                Ok(None)
            }
            "queryAll" => self.query_all(&*stub).map(Some),
            other => Err(ChaincodeError::UnknownCommand(other.to_string())),
        }
    }

    /// Run a selector query and return the matching values as a JSON array.
    pub fn search(&self, stub: &dyn ChaincodeStub, query: &str) -> Result<Vec<u8>, ChaincodeError> {
        info!("beginning JSON query");
        let iter = stub.get_query_result(query).map_err(ChaincodeError::Query)?;
        let rows = drain_values(ScopedIterator::new(iter)).map_err(ChaincodeError::Query)?;
        debug!(rows = rows.len(), "query complete");
        Ok(to_json_array(&rows))
    }

    /// Insert or overwrite a record under its derived key. Returns the key.
    pub fn insert(&self, stub: &mut dyn ChaincodeStub, json: &str) -> Result<String, ChaincodeError> {
        let record = BiometricRecord::from_json(json.as_bytes())?;
        record.validate()?;

        let record = record.with_derived_key();
        let key = record.key_biometric.clone();
        let bytes = record.to_json()?;

        stub.put_state(&key, bytes)
            .map_err(|source| ChaincodeError::StoreWrite {
                key: key.clone(),
                source,
            })?;
        self.metrics.observe_write("put");
        info!(%key, "stored biometric record");
        Ok(key)
    }

    /// Remove the record stored under `id`, which must exist.
    pub fn delete(&self, stub: &mut dyn ChaincodeStub, id: &str) -> Result<(), ChaincodeError> {
        let existing = stub.get_state(id).map_err(|source| ChaincodeError::StoreRead {
            key: id.to_string(),
            source,
        })?;
        if existing.is_none() {
            return Err(ChaincodeError::MissingKey(id.to_string()));
        }

        stub.del_state(id).map_err(|source| ChaincodeError::StoreDelete {
            key: id.to_string(),
            source,
        })?;
        self.metrics.observe_write("delete");
        info!(key = %id, "deleted biometric record");
        Ok(())
    }

    /// Every value in the world state, in range-scan order, as a JSON array.
    pub fn query_all(&self, stub: &dyn ChaincodeStub) -> Result<Vec<u8>, ChaincodeError> {
        let iter = stub
            .get_state_by_range("", "")
            .map_err(ChaincodeError::Query)?;
        let rows = drain_values(ScopedIterator::new(iter)).map_err(ChaincodeError::Iteration)?;
        debug!(rows = rows.len(), "full scan complete");
        Ok(to_json_array(&rows))
    }
}

impl Chaincode for BiometricChaincode {
    fn init(&self, stub: &mut dyn ChaincodeStub) -> Response {
        let _entered = self.span.enter();
        info!(tx_id = stub.tx_id(), "initializing biometric chaincode");
        self.metrics.observe_invocation("init", true);
        Response::success(None)
    }

    fn invoke(&self, stub: &mut dyn ChaincodeStub) -> Response {
        let _entered = self.span.enter();
        let (function, args) = stub.function_and_parameters();
        let tx_id = stub.tx_id().to_string();
        debug!(%tx_id, %function, args = args.len(), ts = %stub.tx_timestamp(), "invoke");

        let result = self.dispatch(stub, &function, &args);
        self.metrics.observe_invocation(&function, result.is_ok());

        match result {
            Ok(payload) => Response::success(payload),
            Err(err) => {
                let cause = err.source().map(ToString::to_string);
                error!(%tx_id, %function, error = %err, cause = ?cause, "invocation failed");
                err.into()
            }
        }
    }
}

fn first_arg<'a>(function: &str, args: &'a [String]) -> Result<&'a str, ChaincodeError> {
    args.first()
        .map(String::as_str)
        .ok_or_else(|| ChaincodeError::MissingArgument {
            function: function.to_string(),
            expected: 1,
        })
}
