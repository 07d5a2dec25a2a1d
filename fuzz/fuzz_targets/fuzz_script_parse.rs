#![no_main]

use libfuzzer_sys::fuzz_target;
use vdfs_builder::{parse_script_bytes, InclusionRules};

fuzz_target!(|data: &[u8]| {
    // Parsing should never panic, only succeed or report MalformedScript
    let request = match parse_script_bytes(data) {
        Ok(r) => r,
        Err(_) => return,
    };

    // Every parsed rule list must compile
    let rules = InclusionRules::compile(
        &request.file_rules,
        &request.exclude_rules,
        &request.include_rules,
    )
    .expect("escaped rules always compile");

    // Matching arbitrary paths should never panic
    let _ = rules.is_included("");
    let _ = rules.is_included("a/b/c.txt");
    let _ = rules.is_included(&request.archive_name);
});
