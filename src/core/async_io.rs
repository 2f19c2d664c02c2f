//! Async wrappers (feature `async`)
//!
//! Each call runs on tokio's blocking pool. A deadline abandons the
//! in-flight call: the caller gets `TimedOut` while the blocking task runs
//! to completion in the background. Writes stay atomic either way.

use crate::error::{LamoError, Result};
use crate::metadata::Metadata;
use crate::password::PasswordProvider;
use crate::Lamo;
use image::DynamicImage;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinError;
use tracing::warn;

/// Read a LAMO file on the blocking pool
pub async fn read_async(
    lamo: &Lamo,
    path: impl Into<PathBuf>,
    provider: Arc<dyn PasswordProvider>,
    deadline: Option<Duration>,
) -> Result<(DynamicImage, Metadata)> {
    let lamo = lamo.clone();
    let path = path.into();
    let task = tokio::task::spawn_blocking(move || lamo.read(&path, &*provider));
    run_with_deadline(task, deadline).await
}

/// Write a LAMO file on the blocking pool
pub async fn write_async(
    lamo: &Lamo,
    path: impl Into<PathBuf>,
    image: DynamicImage,
    metadata: Metadata,
    password: Option<String>,
    deadline: Option<Duration>,
) -> Result<Metadata> {
    let lamo = lamo.clone();
    let path = path.into();
    let task = tokio::task::spawn_blocking(move || {
        lamo.write(&path, &image, metadata, password.as_deref())
    });
    run_with_deadline(task, deadline).await
}

async fn run_with_deadline<T, F>(task: F, deadline: Option<Duration>) -> Result<T>
where
    F: Future<Output = std::result::Result<Result<T>, JoinError>>,
{
    let joined = match deadline {
        Some(limit) => match tokio::time::timeout(limit, task).await {
            Ok(joined) => joined,
            Err(_) => {
                warn!("LAMO operation exceeded {:?}; abandoning", limit);
                return Err(LamoError::TimedOut);
            }
        },
        None => task.await,
    };
    joined.map_err(|e| LamoError::Stream(std::io::Error::other(e.to_string())))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::password::{NoPassword, StaticPassword};
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    fn sample() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(16, 16, |x, y| {
            Rgb([x as u8, y as u8, 0])
        }))
    }

    #[tokio::test]
    async fn test_async_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("async.lamo");
        let lamo = Lamo::new();

        write_async(&lamo, &path, sample(), Metadata::new(), None, None)
            .await
            .unwrap();
        let (image, metadata) = read_async(&lamo, &path, Arc::new(NoPassword), None)
            .await
            .unwrap();
        assert_eq!(image, sample());
        assert_eq!(metadata.width(), Some(16));
    }

    #[tokio::test]
    async fn test_async_deadline_elapses() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("slow.lamo");
        let lamo = Lamo::new();

        // Full-strength key derivation cannot finish in a microsecond
        let result = write_async(
            &lamo,
            &path,
            sample(),
            Metadata::new(),
            Some("pw".to_string()),
            Some(Duration::from_micros(1)),
        )
        .await;
        assert!(matches!(result, Err(LamoError::TimedOut)));
    }

    #[tokio::test]
    async fn test_async_error_passthrough() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing.lamo");
        let result = read_async(
            &Lamo::new(),
            &path,
            Arc::new(StaticPassword::new("pw")),
            Some(Duration::from_secs(30)),
        )
        .await;
        assert!(matches!(result, Err(LamoError::Io { .. })));
    }
}
