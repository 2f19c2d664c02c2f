//! Property-based tests for the codec
//!
//! Random images and metadata survive a write/read cycle; arbitrary bytes
//! never panic the decoders.

use image::{DynamicImage, RgbaImage};
use lamo_rs::core::compression::{self, BoundedInflater};
use lamo_rs::core::frame;
use lamo_rs::{Lamo, Limits, Metadata, NoPassword};
use proptest::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

fn arb_image() -> impl Strategy<Value = DynamicImage> {
    (1u32..24, 1u32..24).prop_flat_map(|(width, height)| {
        prop::collection::vec(any::<u8>(), (width * height * 4) as usize).prop_map(
            move |pixels| {
                DynamicImage::ImageRgba8(
                    RgbaImage::from_raw(width, height, pixels).expect("buffer sized to fit"),
                )
            },
        )
    })
}

fn arb_metadata() -> impl Strategy<Value = Metadata> {
    prop::collection::vec(
        (
            "[a-z_]{1,12}".prop_filter("reserved", |k| {
                !matches!(k.as_str(), "encrypted" | "salt")
            }),
            prop_oneof![
                any::<i64>().prop_map(Value::from),
                any::<bool>().prop_map(Value::from),
                ".{0,32}".prop_map(Value::from),
            ],
        ),
        0..8,
    )
    .prop_map(|pairs| pairs.into_iter().collect())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_roundtrip_plain(image in arb_image(), metadata in arb_metadata(), level in 0u32..=9) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("p.lamo");
        let lamo = Lamo::new();

        lamo.write_with_level(&path, &image, metadata.clone(), None, level).unwrap();
        let (decoded, read_back) = lamo.read(&path, &NoPassword).unwrap();

        prop_assert_eq!(decoded.as_bytes(), image.as_bytes());
        for (key, value) in metadata.iter() {
            prop_assert_eq!(read_back.get(key), Some(value));
        }
    }

    #[test]
    fn prop_frame_decode_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = frame::decode(&bytes, &Limits::default());
    }

    #[test]
    fn prop_frame_decode_after_magic_never_panics(tail in prop::collection::vec(any::<u8>(), 0..256)) {
        let mut bytes = frame::MAGIC.to_vec();
        bytes.push(frame::VERSION);
        bytes.extend_from_slice(&tail);
        let _ = frame::decode(&bytes, &Limits::default());
    }

    #[test]
    fn prop_inflate_respects_cap(data in prop::collection::vec(any::<u8>(), 0..2048), cap in 1u64..4096) {
        let compressed = compression::compress(&data, 6).unwrap();
        let mut inflater = BoundedInflater::new(cap);
        match inflater.inflate(&compressed) {
            Ok(out) => {
                prop_assert!(out.len() as u64 <= cap);
                prop_assert_eq!(out, data);
            }
            Err(_) => prop_assert!(data.len() as u64 > cap),
        }
    }

    #[test]
    fn prop_inflate_garbage_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = compression::decompress(&bytes, 1024 * 1024);
    }
}
