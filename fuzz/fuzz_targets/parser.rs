#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 64 * 1024 {
        return;
    }
    let src = String::from_utf8_lossy(data);
    // Only the nesting ceiling may refuse input; every other tree must reproduce it.
    if let Ok(tree) = rbcst::parse(&src) {
        assert_eq!(tree.text(), src);
        if tree.has_errors() {
            assert!(!tree.diagnostics.is_empty());
        }
    }
});
