//! Fuzz target: request parsing and report resolution
//!
//! Arbitrary bytes must either parse into a `Request` or be rejected with
//! an error, and every parsed report must resolve to a flag pair.
//!
//! cargo fuzz run fuzz_request

#![no_main]

use guardian::rpc::engine::to_presence_report;
use guardian::rpc::messages::Request;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(Request::Report(payload)) = serde_json::from_slice::<Request>(data) {
        let report = to_presence_report(&payload, "fuzz");
        assert!(!report.device_id.is_empty());
        if matches!(payload.situation, Some(1..=3)) {
            assert_eq!(
                (report.motion_detected, report.relay_reported),
                payload.resolve()
            );
        }
    }
});
