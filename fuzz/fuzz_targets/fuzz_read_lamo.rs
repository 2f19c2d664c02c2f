#![no_main]
use libfuzzer_sys::fuzz_target;
use lamo_rs::{Lamo, Limits, NoPassword};

// Whole-file read under tight limits; every outcome must be a typed result
fuzz_target!(|data: &[u8]| {
    let temp_dir = match tempfile::TempDir::new() {
        Ok(dir) => dir,
        Err(_) => return,
    };
    let path = temp_dir.path().join("fuzz.lamo");
    if std::fs::write(&path, data).is_err() {
        return;
    }

    let lamo = match Lamo::builder()
        .limits(Limits {
            meta_cap: 16 * 1024,
            payload_cap: 1024 * 1024,
            max_pixels: 1024 * 1024,
        })
        .build()
    {
        Ok(lamo) => lamo,
        Err(_) => return,
    };
    let _ = lamo.read(&path, &NoPassword);
});
