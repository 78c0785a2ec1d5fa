#![no_main]

use libfuzzer_sys::fuzz_target;
use mints::{StripConfig, transform};

fuzz_target!(|data: &[u8]| {
    // Limit input size to keep the fuzzer fast and avoid OOM in pathological cases.
    let data = if data.len() > 256 * 1024 {
        &data[..256 * 1024]
    } else {
        data
    };

    let source = String::from_utf8_lossy(data);

    // Lex and parse errors are expected outcomes and must never crash.
    for config in &[
        StripConfig::default(),
        StripConfig {
            preserve_const_enums: true,
            preserve_exports: true,
            preserve_comments: true,
            preserve_ts_ignore: true,
        },
    ] {
        if let Ok(out) = transform(&source, config) {
            for diagnostic in &out.diagnostics {
                assert!(diagnostic.span.end <= source.len());
            }
        }
    }
});
