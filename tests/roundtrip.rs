//! Image round-trip tests through real files

use image::{DynamicImage, GrayAlphaImage, ImageBuffer, LumaA, Rgb, RgbImage, Rgba};
use lamo_rs::{Lamo, Metadata, NoPassword, Salt, StaticPassword};
use serde_json::json;
use tempfile::TempDir;

fn noise(width: u32, height: u32, seed: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        let v = x.wrapping_mul(2654435761) ^ y.wrapping_mul(40503) ^ seed;
        Rgb([v as u8, (v >> 8) as u8, (v >> 16) as u8])
    }))
}

#[test]
fn test_plain_roundtrip_preserves_pixels_and_metadata() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("plain.lamo");
    let image = noise(97, 41, 7);

    let mut metadata = Metadata::new();
    metadata.insert("source", "noise.png");
    metadata.insert("tags", json!(["a", "b"]));

    let lamo = Lamo::new();
    lamo.write(&path, &image, metadata.clone(), None).unwrap();
    let (decoded, read_back) = lamo.read(&path, &NoPassword).unwrap();

    assert_eq!(decoded.as_bytes(), image.as_bytes());
    for (key, value) in metadata.iter() {
        assert_eq!(read_back.get(key), Some(value), "caller key {} lost", key);
    }
    assert_eq!(read_back.get("width"), Some(&json!(97)));
    assert_eq!(read_back.get("height"), Some(&json!(41)));
    assert!(!read_back.contains_key("encrypted"));
}

#[test]
fn test_encrypted_roundtrip() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("enc.lamo");
    let image = noise(33, 20, 99);

    let lamo = Lamo::new();
    lamo.write(&path, &image, Metadata::new(), Some("correct horse"))
        .unwrap();
    let (decoded, metadata) = lamo
        .read(&path, &StaticPassword::new("correct horse"))
        .unwrap();

    assert_eq!(decoded.as_bytes(), image.as_bytes());
    assert_eq!(metadata.get("encrypted"), Some(&json!(true)));
    let salt = Salt::from_base64(metadata.salt().unwrap()).unwrap();
    assert_eq!(salt.as_bytes().len(), 16);
}

#[test]
fn test_sixteen_bit_and_alpha_layouts() {
    let temp_dir = TempDir::new().unwrap();
    let lamo = Lamo::builder().zlib_level(3).build().unwrap();

    let la8 = DynamicImage::ImageLumaA8(GrayAlphaImage::from_fn(9, 9, |x, y| {
        LumaA([(x * y) as u8, 200])
    }));
    let rgba16 = DynamicImage::ImageRgba16(ImageBuffer::from_fn(6, 4, |x, y| {
        Rgba([x as u16 * 9000, y as u16 * 12000, 65535, 1])
    }));

    for (name, image, mode) in [("la8", la8, "LA"), ("rgba16", rgba16, "RGBA")] {
        let path = temp_dir.path().join(format!("{}.lamo", name));
        let written = lamo.write(&path, &image, Metadata::new(), None).unwrap();
        assert_eq!(written.mode(), Some(mode));
        let (decoded, _) = lamo.read(&path, &NoPassword).unwrap();
        assert_eq!(decoded, image, "{} changed in round trip", name);
    }
}

#[test]
fn test_every_level_roundtrips() {
    let temp_dir = TempDir::new().unwrap();
    let image = noise(16, 16, 1);
    let lamo = Lamo::new();

    for level in 0..=9 {
        let path = temp_dir.path().join(format!("level{}.lamo", level));
        let written = lamo
            .write_with_level(&path, &image, Metadata::new(), None, level)
            .unwrap();
        assert_eq!(written.zlib_level(), Some(u64::from(level)));
        let (decoded, _) = lamo.read(&path, &NoPassword).unwrap();
        assert_eq!(decoded, image);
    }
}

#[test]
fn test_rewrite_replaces_previous_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("again.lamo");
    let lamo = Lamo::new();

    lamo.write(&path, &noise(8, 8, 1), Metadata::new(), None).unwrap();
    lamo.write(&path, &noise(4, 2, 2), Metadata::new(), None).unwrap();

    let (decoded, metadata) = lamo.read(&path, &NoPassword).unwrap();
    assert_eq!(decoded, noise(4, 2, 2));
    assert_eq!(metadata.width(), Some(4));
}

#[test]
fn test_resave_of_encrypted_metadata() {
    let temp_dir = TempDir::new().unwrap();
    let first = temp_dir.path().join("first.lamo");
    let second = temp_dir.path().join("second.lamo");
    let lamo = Lamo::new();

    lamo.write(&first, &noise(5, 5, 3), Metadata::new(), Some("pw"))
        .unwrap();
    let (image, metadata) = lamo.read(&first, &StaticPassword::new("pw")).unwrap();

    // Stale encryption fields must be dropped before writing plain
    assert!(lamo.write(&second, &image, metadata.clone(), None).is_err());
    assert!(!second.exists());

    lamo.write(&second, &image, metadata.without_encryption_fields(), None)
        .unwrap();
    let (again, _) = lamo.read(&second, &NoPassword).unwrap();
    assert_eq!(again, image);
}
