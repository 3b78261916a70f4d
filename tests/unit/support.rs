// Shared fixtures for the unit test suite

use async_trait::async_trait;
use bytes::Bytes;
use image::{ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thumbsmith::config::Config;
use thumbsmith::error::ThumbError;
use thumbsmith::raster::ImageBackend;
use thumbsmith::remote::{RemoteFetchCache, RemoteSource};
use thumbsmith::thumb::Thumb;

pub const FIXTURE_FONT: &str = concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/tests/fixtures/fonts/DejaVuSansMono.ttf"
);

/// Gradient test image encoded as PNG
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x * 3 % 256) as u8, (y * 5 % 256) as u8, 120, 255])
    });
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, ImageFormat::Png).unwrap();
    buffer.into_inner()
}

pub fn write_png(path: &Path, width: u32, height: u32) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, png_bytes(width, height)).unwrap();
}

/// Config with every root inside `root` and remote mirroring disabled
pub fn config_in(root: &Path) -> Config {
    let mut config = Config::default();
    config.defaults.path_images = root.join("images");
    config.defaults.path_thumbs = root.join("thumbs");
    config.defaults.path_watermarks = root.join("watermarks");
    config.defaults.path_fonts = root.join("fonts");
    config.remote.enabled = false;
    config.remote.path = root.join("remote");
    config
}

pub fn thumb_in(root: &Path) -> Thumb {
    Thumb::new(config_in(root), Arc::new(ImageBackend::default()), None)
}

/// Every file below `dir`, recursively
pub fn files_below(dir: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let entries = match std::fs::read_dir(&current) {
            Ok(entries) => entries,
            Err(_) => continue,
        };
        for entry in entries {
            let path = entry.unwrap().path();
            if path.is_dir() {
                pending.push(path);
            } else {
                found.push(path);
            }
        }
    }
    found
}

/// Remote source returning fixed bytes and counting calls
pub struct CountingSource {
    body: Option<Bytes>,
    calls: AtomicUsize,
}

impl CountingSource {
    pub fn serving(body: Vec<u8>) -> Arc<Self> {
        Arc::new(Self {
            body: Some(Bytes::from(body)),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            body: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteSource for CountingSource {
    async fn fetch(&self, url: &str) -> Result<Bytes, ThumbError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.body
            .clone()
            .ok_or_else(|| ThumbError::remote_fetch(url, "connection refused"))
    }
}

/// Engine whose remote mirror is backed by `source`
pub fn thumb_with_remote(root: &Path, source: Arc<CountingSource>) -> Thumb {
    let config = config_in(root);
    let remote = RemoteFetchCache::new(
        root.join("remote"),
        std::time::Duration::from_secs(3600),
        source,
    );
    Thumb::new(config, Arc::new(ImageBackend::default()), Some(remote))
}
