//! In-process world state and invocation stub.
//!
//! `WorldState` is the committed key space. `MockStub` is one invocation
//! over it: reads see committed data only, writes are buffered and applied
//! when the invocation succeeds. Faults can be injected on every primitive.

use crate::response::Response;
use crate::selector::RichQuery;
use crate::stub::{Chaincode, ChaincodeStub, KeyValue, StateQueryIterator, StubError};
use chrono::{DateTime, Utc};
use std::cell::Cell;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum WorldStateError {
    #[error("cannot access snapshot {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed snapshot {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("value under {0} is not UTF-8 and cannot be snapshotted")]
    NonUtf8Value(String),
}

/// Committed key/value state, ordered by key.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WorldState {
    entries: BTreeMap<String, Vec<u8>>,
}

impl WorldState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a snapshot; a missing file is an empty state.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, WorldStateError> {
        let path = path.as_ref();
        let raw = match std::fs::read(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(source) => {
                return Err(WorldStateError::Io {
                    path: path.display().to_string(),
                    source,
                })
            }
        };
        let snapshot: BTreeMap<String, String> =
            serde_json::from_slice(&raw).map_err(|source| WorldStateError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        Ok(Self {
            entries: snapshot
                .into_iter()
                .map(|(k, v)| (k, v.into_bytes()))
                .collect(),
        })
    }

    /// Write a snapshot through a temporary file so a crash never leaves a
    /// truncated one behind.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), WorldStateError> {
        let path = path.as_ref();
        let mut snapshot = BTreeMap::new();
        for (key, value) in &self.entries {
            let text = std::str::from_utf8(value)
                .map_err(|_| WorldStateError::NonUtf8Value(key.clone()))?;
            snapshot.insert(key.as_str(), text);
        }
        let io_err = |source| WorldStateError::Io {
            path: path.display().to_string(),
            source,
        };
        let body = serde_json::to_vec_pretty(&snapshot).map_err(|source| WorldStateError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, body).map_err(io_err)?;
        std::fs::rename(&tmp, path).map_err(io_err)
    }

    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    fn range(&self, start: &str, end: &str) -> Vec<KeyValue> {
        if !start.is_empty() && !end.is_empty() && start >= end {
            return Vec::new();
        }
        let lo = if start.is_empty() {
            Bound::Unbounded
        } else {
            Bound::Included(start)
        };
        let hi = if end.is_empty() {
            Bound::Unbounded
        } else {
            Bound::Excluded(end)
        };
        self.entries
            .range::<str, _>((lo, hi))
            .map(|(k, v)| KeyValue {
                key: k.clone(),
                value: v.clone(),
            })
            .collect()
    }
}

/// Failure switches for exercising error paths.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Faults {
    pub fail_get: bool,
    pub fail_put: bool,
    pub fail_del: bool,
    pub fail_query: bool,
    pub fail_range: bool,
    /// Fail the next `next_entry` once this many rows were served.
    pub fail_iteration_after: Option<usize>,
    /// Report an error from `close`; the cursor is still released.
    pub fail_close: bool,
}

/// One invocation against a [`WorldState`].
pub struct MockStub<'a> {
    state: &'a mut WorldState,
    tx_id: String,
    tx_timestamp: DateTime<Utc>,
    function: String,
    args: Vec<String>,
    writes: BTreeMap<String, Option<Vec<u8>>>,
    faults: Faults,
    open_iterators: Cell<usize>,
}

impl<'a> MockStub<'a> {
    pub fn new(
        state: &'a mut WorldState,
        tx_id: impl Into<String>,
        function: impl Into<String>,
        args: &[&str],
    ) -> Self {
        Self {
            state,
            tx_id: tx_id.into(),
            tx_timestamp: Utc::now(),
            function: function.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
            writes: BTreeMap::new(),
            faults: Faults::default(),
            open_iterators: Cell::new(0),
        }
    }

    pub fn with_timestamp(mut self, ts: DateTime<Utc>) -> Self {
        self.tx_timestamp = ts;
        self
    }

    pub fn set_faults(&mut self, faults: Faults) {
        self.faults = faults;
    }

    /// Cursors handed out and not yet closed.
    pub fn open_iterators(&self) -> usize {
        self.open_iterators.get()
    }

    pub fn pending_writes(&self) -> usize {
        self.writes.len()
    }

    /// Apply buffered writes and deletes to the committed state.
    pub fn commit(&mut self) {
        let count = self.writes.len();
        for (key, value) in std::mem::take(&mut self.writes) {
            match value {
                Some(bytes) => {
                    self.state.entries.insert(key, bytes);
                }
                None => {
                    self.state.entries.remove(&key);
                }
            }
        }
        debug!(tx_id = %self.tx_id, writes = count, "committed write set");
    }

    /// Drop buffered writes without applying them.
    pub fn rollback(&mut self) {
        self.writes.clear();
    }

    /// Run the chaincode's `invoke`, committing only on success.
    pub fn invoke(&mut self, chaincode: &dyn Chaincode) -> Response {
        let resp = chaincode.invoke(self);
        self.finish(&resp);
        resp
    }

    /// Run the chaincode's `init`, committing only on success.
    pub fn init(&mut self, chaincode: &dyn Chaincode) -> Response {
        let resp = chaincode.init(self);
        self.finish(&resp);
        resp
    }

    fn finish(&mut self, resp: &Response) {
        if resp.is_ok() {
            self.commit();
        } else {
            self.rollback();
        }
    }

    fn iterator(&self, rows: Vec<KeyValue>) -> Box<dyn StateQueryIterator + '_> {
        self.open_iterators.set(self.open_iterators.get() + 1);
        Box::new(MemIterator {
            rows: rows.into_iter(),
            served: 0,
            fail_after: self.faults.fail_iteration_after,
            fail_close: self.faults.fail_close,
            open: &self.open_iterators,
            closed: false,
        })
    }
}

impl ChaincodeStub for MockStub<'_> {
    fn function_and_parameters(&self) -> (String, Vec<String>) {
        (self.function.clone(), self.args.clone())
    }

    fn tx_id(&self) -> &str {
        &self.tx_id
    }

    fn tx_timestamp(&self) -> DateTime<Utc> {
        self.tx_timestamp
    }

    fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>, StubError> {
        if self.faults.fail_get {
            return Err(StubError::Unavailable(format!("injected read failure on {key}")));
        }
        Ok(self.state.get(key).map(<[u8]>::to_vec))
    }

    fn put_state(&mut self, key: &str, value: Vec<u8>) -> Result<(), StubError> {
        if self.faults.fail_put {
            return Err(StubError::Unavailable(format!("injected write failure on {key}")));
        }
        if key.is_empty() {
            return Err(StubError::Unavailable("key must not be empty".into()));
        }
        self.writes.insert(key.to_string(), Some(value));
        Ok(())
    }

    fn del_state(&mut self, key: &str) -> Result<(), StubError> {
        if self.faults.fail_del {
            return Err(StubError::Unavailable(format!("injected delete failure on {key}")));
        }
        self.writes.insert(key.to_string(), None);
        Ok(())
    }

    fn get_state_by_range(
        &self,
        start: &str,
        end: &str,
    ) -> Result<Box<dyn StateQueryIterator + '_>, StubError> {
        if self.faults.fail_range {
            return Err(StubError::Unavailable("injected range failure".into()));
        }
        Ok(self.iterator(self.state.range(start, end)))
    }

    fn get_query_result(
        &self,
        query: &str,
    ) -> Result<Box<dyn StateQueryIterator + '_>, StubError> {
        if self.faults.fail_query {
            return Err(StubError::Unavailable("injected query failure".into()));
        }
        let query = RichQuery::parse(query)?;
        let matched = self
            .state
            .range("", "")
            .into_iter()
            .filter(|kv| query.matches_bytes(&kv.value))
            .skip(query.skip());
        let rows = match query.limit() {
            Some(n) => matched.take(n).collect(),
            None => matched.collect(),
        };
        Ok(self.iterator(rows))
    }
}

struct MemIterator<'s> {
    rows: std::vec::IntoIter<KeyValue>,
    served: usize,
    fail_after: Option<usize>,
    fail_close: bool,
    open: &'s Cell<usize>,
    closed: bool,
}

impl StateQueryIterator for MemIterator<'_> {
    fn has_next(&self) -> bool {
        !self.closed && !self.rows.as_slice().is_empty()
    }

    fn next_entry(&mut self) -> Result<KeyValue, StubError> {
        if self.closed {
            return Err(StubError::Closed);
        }
        if self.fail_after == Some(self.served) {
            return Err(StubError::Iteration(format!(
                "injected failure after {} rows",
                self.served
            )));
        }
        let kv = self
            .rows
            .next()
            .ok_or_else(|| StubError::Iteration("no more rows".into()))?;
        self.served += 1;
        Ok(kv)
    }

    fn close(&mut self) -> Result<(), StubError> {
        if self.closed {
            return Err(StubError::Closed);
        }
        self.closed = true;
        self.open.set(self.open.get().saturating_sub(1));
        if self.fail_close {
            return Err(StubError::Unavailable("injected close failure".into()));
        }
        Ok(())
    }
}
