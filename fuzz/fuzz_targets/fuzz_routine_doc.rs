//! Fuzz target: stored routines document
//!
//! Feeds arbitrary bytes to the routines-document parser and converts
//! every parsed routine, verifying:
//! - No panics under arbitrary input
//! - Converted routines never exceed `MAX_ROUTINE_STEPS` steps
//! - Labels never exceed `MAX_LABEL_LEN` bytes
//!
//! cargo fuzz run fuzz_routine_doc

#![no_main]

use libfuzzer_sys::fuzz_target;
use relaynode::config::{MAX_LABEL_LEN, MAX_ROUTINE_STEPS};
use relaynode::definitions::parse_document;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = core::str::from_utf8(data) else {
        return;
    };
    let Ok(doc) = parse_document(text) else {
        return;
    };
    for stored in &doc {
        let routine = stored.to_routine();
        assert!(routine.steps.len() <= MAX_ROUTINE_STEPS);
        assert!(routine.label.len() <= MAX_LABEL_LEN);
        for step in &routine.steps {
            assert!(step.label.len() <= MAX_LABEL_LEN);
        }
    }
});
