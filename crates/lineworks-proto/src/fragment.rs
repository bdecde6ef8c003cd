//! Fragmentation of encrypted payloads.
//!
//! An encrypted message is split into chunks of at most [`FRAGMENT_SIZE`]
//! bytes. All chunks of one message travel together as one transport message,
//! so reassembly is plain concatenation in arrival order; there is no sequence
//! number and no partial-delivery buffering.
//!
//! # Invariants
//!
//! - `reassemble(&fragment(b, n)?) == b` for every `b` and every `n > 0`
//! - Every fragment is non-empty and at most `max_size` bytes long
//! - Fragments are zero-copy slices of the input buffer

use bytes::{Bytes, BytesMut};

use crate::errors::{ProtocolError, Result};

/// Largest chunk sent as one transport frame (512 KiB).
pub const FRAGMENT_SIZE: usize = 512 * 1024;

/// Split a payload into ordered chunks of at most `max_size` bytes.
///
/// An empty payload produces no fragments.
///
/// # Errors
///
/// - `ProtocolError::ZeroFragmentSize` if `max_size` is zero
pub fn fragment(payload: impl Into<Bytes>, max_size: usize) -> Result<Vec<Bytes>> {
    if max_size == 0 {
        return Err(ProtocolError::ZeroFragmentSize);
    }

    let payload = payload.into();
    let mut fragments = Vec::with_capacity(payload.len().div_ceil(max_size));

    let mut start = 0;
    while start < payload.len() {
        let end = payload.len().min(start + max_size);
        fragments.push(payload.slice(start..end));
        start = end;
    }

    debug_assert!(fragments.iter().all(|f| !f.is_empty() && f.len() <= max_size));
    Ok(fragments)
}

/// Join the fragments of one message back into the original payload.
pub fn reassemble(fragments: &[Bytes]) -> Bytes {
    match fragments {
        [] => Bytes::new(),
        [single] => single.clone(),
        many => {
            let total = many.iter().map(Bytes::len).sum();
            let mut joined = BytesMut::with_capacity(total);
            for chunk in many {
                joined.extend_from_slice(chunk);
            }
            joined.freeze()
        },
    }
}
