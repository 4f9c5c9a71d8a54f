#![no_main]

use libfuzzer_sys::fuzz_target;
use micro_bind::expr::{Arg, parse};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    for arg in parse(text) {
        if let Arg::Reference(reference) = arg {
            assert!(!reference.tokens.is_empty());
            assert_eq!(reference.tokens.join("."), reference.text);
        }
    }
});
