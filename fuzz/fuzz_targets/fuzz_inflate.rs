#![no_main]
use libfuzzer_sys::fuzz_target;
use lamo_rs::core::compression::BoundedInflater;

const CAP: u64 = 256 * 1024;

fuzz_target!(|data: &[u8]| {
    let mut inflater = BoundedInflater::new(CAP).with_chunk_size(1024);
    match inflater.inflate(data) {
        Ok(out) => assert!(out.len() as u64 <= CAP),
        Err(_) => assert!(inflater.bytes_out() <= CAP + 1024),
    }
});
