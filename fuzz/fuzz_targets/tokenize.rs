#![no_main]

use libfuzzer_sys::fuzz_target;
use mints::lexer::tokenize;

fuzz_target!(|data: &[u8]| {
    let data = if data.len() > 256 * 1024 {
        &data[..256 * 1024]
    } else {
        data
    };

    let source = String::from_utf8_lossy(data);

    // Tokens must tile the input without gaps.
    if let Ok(tokens) = tokenize(&source) {
        let mut cursor = 0;
        for token in &tokens {
            assert_eq!(token.span.start, cursor);
            cursor = token.span.end;
        }
        assert_eq!(cursor, source.len());
    }
});
