//! Fuzz target for Request/Response decoding
//!
//! Feeds arbitrary bytes to the CBOR decoders, covering:
//! - Malformed CBOR
//! - Unknown `type` tags and mismatched `data` shapes
//! - Oversized strings and deeply nested documents
//!
//! Decoding must never panic. Anything that decodes must re-encode, and the
//! re-encoding must be stable.

#![no_main]

use libfuzzer_sys::fuzz_target;
use lineworks_proto::{Message, Request, Response};

fuzz_target!(|data: &[u8]| {
    if let Ok(request) = Request::decode(data) {
        let encoded = request.encode().expect("decoded request must re-encode");
        let again = Request::decode(&encoded).and_then(|r| r.encode()).ok();
        assert_eq!(again, Some(encoded));
    }

    if let Ok(response) = Response::decode(data) {
        let encoded = response.encode().expect("decoded response must re-encode");
        let again = Response::decode(&encoded).and_then(|r| r.encode()).ok();
        assert_eq!(again, Some(encoded));
    }
});
