use crate::stub::{ScopedIterator, StubError};
use tracing::warn;

/// Drain a cursor into its raw values, then close it.
///
/// On a mid-stream failure the partial rows are dropped and the cursor is
/// closed by the guard. A failed close after a complete drain only warns.
pub fn drain_values(mut iter: ScopedIterator<'_>) -> Result<Vec<Vec<u8>>, StubError> {
    let mut rows = Vec::new();
    while iter.has_next() {
        let kv = iter.next_entry()?;
        rows.push(kv.value);
    }
    if let Err(err) = iter.close() {
        warn!(error = %err, rows = rows.len(), "failed to close state iterator");
    }
    Ok(rows)
}

/// Splice already-encoded JSON values into a JSON array without re-encoding.
pub fn to_json_array(rows: &[Vec<u8>]) -> Vec<u8> {
    let body: usize = rows.iter().map(Vec::len).sum();
    let mut out = Vec::with_capacity(body + rows.len() + 2);
    out.push(b'[');
    for (i, row) in rows.iter().enumerate() {
        if i > 0 {
            out.push(b',');
        }
        out.extend_from_slice(row);
    }
    out.push(b']');
    out
}
