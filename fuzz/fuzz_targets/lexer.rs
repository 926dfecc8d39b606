#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 64 * 1024 {
        return;
    }
    let src = String::from_utf8_lossy(data);
    let (tokens, _diags) = rbcst::tokenize(&src);
    let mut offset = 0;
    for token in &tokens {
        assert_eq!(token.range.start, offset);
        offset = token.range.end;
    }
    assert_eq!(offset, src.len());
});
