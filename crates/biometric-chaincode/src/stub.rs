//! Host boundary.
//!
//! The peer owns the world state and hands each invocation a stub exposing a
//! handful of primitives: point reads and writes, deletes, range scans and
//! rich queries. Scans and queries return a forward-only cursor that holds a
//! host-side resource until closed, so handlers wrap it in
//! [`ScopedIterator`].

use crate::response::Response;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::warn;

/// Failures reported by the host's world-state primitives.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StubError {
    #[error("world state unavailable: {0}")]
    Unavailable(String),
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error("iteration failed: {0}")]
    Iteration(String),
    #[error("iterator already closed")]
    Closed,
}

/// One row produced by a range scan or rich query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyValue {
    pub key: String,
    pub value: Vec<u8>,
}

/// Forward-only cursor over world-state rows.
pub trait StateQueryIterator {
    fn has_next(&self) -> bool;
    fn next_entry(&mut self) -> Result<KeyValue, StubError>;
    /// Release the host-side cursor. Must be called exactly once.
    fn close(&mut self) -> Result<(), StubError>;
}

/// Per-invocation view of the host.
pub trait ChaincodeStub {
    fn function_and_parameters(&self) -> (String, Vec<String>);
    fn tx_id(&self) -> &str;
    fn tx_timestamp(&self) -> DateTime<Utc>;

    fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>, StubError>;
    fn put_state(&mut self, key: &str, value: Vec<u8>) -> Result<(), StubError>;
    fn del_state(&mut self, key: &str) -> Result<(), StubError>;

    /// Keys in `[start, end)`; an empty bound is open on that side.
    fn get_state_by_range(
        &self,
        start: &str,
        end: &str,
    ) -> Result<Box<dyn StateQueryIterator + '_>, StubError>;

    /// Rich query in the state database's JSON selector dialect.
    fn get_query_result(&self, query: &str)
        -> Result<Box<dyn StateQueryIterator + '_>, StubError>;
}

/// Contract every chaincode exposes to the peer.
pub trait Chaincode {
    fn init(&self, stub: &mut dyn ChaincodeStub) -> Response;
    fn invoke(&self, stub: &mut dyn ChaincodeStub) -> Response;
}

/// Owns a cursor and guarantees it is closed once, whichever way the caller
/// leaves: explicit [`ScopedIterator::close`], an early `?` return, or a
/// panic unwinding through the frame.
pub struct ScopedIterator<'a> {
    inner: Box<dyn StateQueryIterator + 'a>,
    closed: bool,
}

impl<'a> ScopedIterator<'a> {
    pub fn new(inner: Box<dyn StateQueryIterator + 'a>) -> Self {
        Self {
            inner,
            closed: false,
        }
    }

    pub fn has_next(&self) -> bool {
        !self.closed && self.inner.has_next()
    }

    pub fn next_entry(&mut self) -> Result<KeyValue, StubError> {
        if self.closed {
            return Err(StubError::Closed);
        }
        self.inner.next_entry()
    }

    pub fn close(mut self) -> Result<(), StubError> {
        self.closed = true;
        self.inner.close()
    }
}

impl Drop for ScopedIterator<'_> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(err) = self.inner.close() {
            warn!(error = %err, "failed to close state iterator");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    struct CountingIter {
        rows: Vec<KeyValue>,
        closes: Rc<Cell<usize>>,
    }

    impl StateQueryIterator for CountingIter {
        fn has_next(&self) -> bool {
            !self.rows.is_empty()
        }

        fn next_entry(&mut self) -> Result<KeyValue, StubError> {
            if self.rows.is_empty() {
                return Err(StubError::Iteration("exhausted".into()));
            }
            Ok(self.rows.remove(0))
        }

        fn close(&mut self) -> Result<(), StubError> {
            self.closes.set(self.closes.get() + 1);
            Ok(())
        }
    }

    fn counting(n: usize, closes: &Rc<Cell<usize>>) -> ScopedIterator<'static> {
        let rows = (0..n)
            .map(|i| KeyValue {
                key: format!("k{i}"),
                value: vec![b'0' + i as u8],
            })
            .collect();
        ScopedIterator::new(Box::new(CountingIter {
            rows,
            closes: Rc::clone(closes),
        }))
    }

    #[test]
    fn test_explicit_close_runs_once() {
        let closes = Rc::new(Cell::new(0));
        let iter = counting(2, &closes);
        iter.close().unwrap();
        assert_eq!(closes.get(), 1);
    }

    #[test]
    fn test_drop_closes_unclosed_iterator() {
        let closes = Rc::new(Cell::new(0));
        {
            let mut iter = counting(3, &closes);
            assert!(iter.has_next());
            iter.next_entry().unwrap();
        }
        assert_eq!(closes.get(), 1);
    }

    #[test]
    fn test_early_return_still_closes() {
        fn first_two(mut iter: ScopedIterator<'_>) -> Result<(), StubError> {
            iter.next_entry()?;
            iter.next_entry()?;
            iter.next_entry()?;
            iter.close()
        }

        let closes = Rc::new(Cell::new(0));
        assert!(first_two(counting(2, &closes)).is_err());
        assert_eq!(closes.get(), 1);
    }
}
