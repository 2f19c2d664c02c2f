#![no_main]
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use lamo_rs::core::frame::{self, MAGIC, VERSION};
use lamo_rs::Limits;

#[derive(Arbitrary, Debug)]
struct FrameInput {
    keep_magic: bool,
    keep_version: bool,
    meta_len: u32,
    data_len: u32,
    body: Vec<u8>,
}

// Structured frames reach the length checks far more often than raw bytes
fuzz_target!(|input: FrameInput| {
    let mut bytes = Vec::with_capacity(input.body.len() + 13);
    if input.keep_magic {
        bytes.extend_from_slice(&MAGIC);
    } else {
        bytes.extend_from_slice(b"LMGX");
    }
    bytes.push(if input.keep_version { VERSION } else { VERSION + 1 });
    bytes.extend_from_slice(&input.meta_len.to_be_bytes());
    let split = (input.meta_len as usize).min(input.body.len());
    bytes.extend_from_slice(&input.body[..split]);
    bytes.extend_from_slice(&input.data_len.to_be_bytes());
    bytes.extend_from_slice(&input.body[split..]);

    let limits = Limits {
        meta_cap: 4096,
        payload_cap: 64 * 1024,
        ..Limits::default()
    };
    if let Ok((meta, payload)) = frame::decode(&bytes, &limits) {
        assert!(meta.len() as u64 <= limits.meta_cap);
        assert!(payload.len() as u64 <= limits.payload_cap);
    }
});
