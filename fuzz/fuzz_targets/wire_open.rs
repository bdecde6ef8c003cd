//! Fuzz target for opening sealed messages
//!
//! # Strategy
//!
//! - Raw input split into fragments at fuzzer-chosen points
//! - A genuine sealed request with one fuzzer-chosen byte flipped
//!
//! # Invariants
//!
//! - Opening never panics
//! - Unauthenticated input is always a crypto error, never a decoded message
//! - A tampered frame never opens

#![no_main]

use std::sync::OnceLock;

use arbitrary::Arbitrary;
use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use lineworks_crypto::CryptoScheme;
use lineworks_proto::{wire, GenerateParams, Request, WireError};

#[derive(Debug, Arbitrary)]
struct Input {
    raw: Vec<u8>,
    splits: Vec<u16>,
    prompt: String,
    flip_at: u16,
    flip_mask: u8,
}

fn scheme() -> &'static CryptoScheme {
    static SCHEME: OnceLock<CryptoScheme> = OnceLock::new();
    SCHEME.get_or_init(|| CryptoScheme::derive_with_iterations("Lineworks", 16))
}

fn split(raw: &[u8], splits: &[u16]) -> Vec<Bytes> {
    let mut points: Vec<usize> = splits.iter().map(|&s| usize::from(s) % (raw.len() + 1)).collect();
    points.sort_unstable();
    points.dedup();

    let mut fragments = Vec::new();
    let mut start = 0;
    for point in points {
        fragments.push(Bytes::copy_from_slice(&raw[start..point]));
        start = point;
    }
    fragments.push(Bytes::copy_from_slice(&raw[start..]));
    fragments
}

fuzz_target!(|input: Input| {
    let scheme = scheme();

    if let Err(e) = wire::open::<Request>(scheme, &split(&input.raw, &input.splits)) {
        assert!(matches!(e, WireError::Crypto(_)), "unauthenticated input reached the decoder: {e}");
    }

    let request = Request::Generate(GenerateParams::new(input.prompt));
    let Ok(mut fragments) = wire::seal(scheme, &request, 64) else {
        return;
    };

    if input.flip_mask != 0 {
        let total: usize = fragments.iter().map(Bytes::len).sum();
        let mut at = usize::from(input.flip_at) % total;
        for fragment in &mut fragments {
            if at < fragment.len() {
                let mut bytes = fragment.to_vec();
                bytes[at] ^= input.flip_mask;
                *fragment = Bytes::from(bytes);
                break;
            }
            at -= fragment.len();
        }
        assert!(wire::open::<Request>(scheme, &fragments).is_err());
    } else {
        assert_eq!(wire::open::<Request>(scheme, &fragments).ok(), Some(request));
    }
});
