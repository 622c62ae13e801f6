#![no_main]

use kuri::cli::load::parse_document;
use kuri::{CompileConfig, generate, validate};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Convert bytes to UTF-8 string (ignore invalid UTF-8)
    if let Ok(s) = std::str::from_utf8(data) {
        // Any document that deserializes must validate without panicking
        if let Ok(files) = parse_document(s) {
            let config = CompileConfig::default();
            let program = validate(files, &config);
            // Validated programs must lower without an internal fault
            if !program.has_errors() {
                let _ = generate(&program, &config);
            }
        }
    }
});
