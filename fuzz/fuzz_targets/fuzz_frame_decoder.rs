//! Fuzz target: `FrameDecoder`
//!
//! Drives arbitrary byte sequences into the streaming frame decoder and
//! asserts that it never panics, never yields an empty or oversize
//! payload, and never buffers more than it was fed.
//!
//! cargo fuzz run fuzz_frame_decoder

#![no_main]

use guardian::rpc::codec::FrameDecoder;
use libfuzzer_sys::fuzz_target;

const MAX: usize = 512;

fuzz_target!(|data: &[u8]| {
    let mut decoder = FrameDecoder::new(MAX);

    // First byte picks the read size so splits vary too.
    let step = usize::from(data.first().copied().unwrap_or(1)).max(1);
    for chunk in data.chunks(step) {
        decoder.feed(chunk);
        loop {
            match decoder.next_frame() {
                Ok(Some(payload)) => {
                    assert!(!payload.is_empty(), "decoder must not yield empty payload");
                    assert!(payload.len() <= MAX, "payload exceeds decoder limit");
                }
                Ok(None) => break,
                Err(_) => {
                    assert_eq!(decoder.pending(), 0, "error must reset the decoder");
                    break;
                }
            }
        }
        assert!(decoder.pending() <= data.len());
    }
});
