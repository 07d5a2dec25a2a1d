#![no_main]

use libfuzzer_sys::fuzz_target;
use vdfs_builder::CompiledMask;

fuzz_target!(|data: &[u8]| {
    let rule = String::from_utf8_lossy(data);

    // Rule text is escaped before compilation, so any input compiles
    let mask = CompiledMask::compile(&rule).expect("escaped rule always compiles");

    // A rule without wildcards matches its own slash-normalized text
    if !rule.contains(['*', '?', '\\', '/']) && !mask.is_recursive() {
        assert!(mask.matches(&rule));
    }
});
