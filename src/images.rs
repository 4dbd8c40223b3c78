// 🖼️ Image Handling - background URLs, proxy helpers, side-by-side merge
// Coin cells may hold remote URLs (routed through /img_proxy) or paths
// relative to the assets directory.

use image::imageops::FilterType;
use image::RgbaImage;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;

/// Remote images larger than this are refused by the proxy (8 MiB).
pub const MAX_IMAGE_BYTES: usize = 8 * 1024 * 1024;
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Merge results cached per (front, back, w, h); cleared wholesale when full.
const MERGE_CACHE_CAPACITY: usize = 1024;

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("empty source")]
    EmptySource,
    #[error("img_proxy source missing url parameter")]
    MissingProxyUrl,
    #[error("invalid target size {0}x{1}")]
    InvalidSize(u32, u32),
    #[error("asset path escapes the assets directory: {0}")]
    PathTraversal(String),
    #[error("failed to read asset: {0}")]
    Io(#[from] std::io::Error),
    #[error("image fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),
    #[error("upstream returned status {0}")]
    UpstreamStatus(u16),
    #[error("image decode/encode failed: {0}")]
    Codec(#[from] image::ImageError),
}

// ============================================================================
// URL CLASSIFICATION
// ============================================================================

/// True when the value looks like a URL (`scheme://…`) or a data URI.
pub fn is_url(value: &str) -> bool {
    if value.starts_with("data:") {
        return true;
    }
    let Some(pos) = value.find("://") else {
        return false;
    };
    let scheme = &value[..pos];
    let mut chars = scheme.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '-'))
}

/// Normalize a relative file path: backslashes to slashes, leading dots and
/// slashes stripped.
pub fn norm_path(path: &str) -> String {
    path.replace('\\', "/")
        .trim_start_matches(['.', '/'])
        .to_string()
}

/// Local proxy route for a remote image URL.
pub fn proxify(url: &str) -> String {
    format!("/img_proxy?url={}", quote_url(url))
}

// Percent-encode, keeping ':/%?&=' literal so the URL stays readable and
// already-encoded sequences survive.
fn quote_url(url: &str) -> String {
    let mut out = String::with_capacity(url.len());
    for byte in url.bytes() {
        let keep = byte.is_ascii_alphanumeric()
            || matches!(byte, b'-' | b'_' | b'.' | b'~')
            || matches!(byte, b':' | b'/' | b'%' | b'?' | b'&' | b'=');
        if keep {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}

/// Turn a raw CSV cell into a usable background-image URL: remote URLs go
/// through the proxy, anything else is treated as an assets-relative path.
/// Empty cells yield None.
pub fn bg_url_from_value(raw: &str) -> Option<String> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }
    if is_url(value) {
        Some(proxify(value))
    } else {
        Some(format!("/assets/{}", norm_path(value)))
    }
}

// ============================================================================
// MERGE ENGINE
// ============================================================================

/// Loads image sources and merges coin fronts and backs side by side.
/// Identical merge requests are served from an in-memory cache.
pub struct ImageMerger {
    assets_dir: PathBuf,
    client: reqwest::Client,
    cache: Mutex<HashMap<String, Vec<u8>>>,
}

impl ImageMerger {
    pub fn new(assets_dir: impl Into<PathBuf>) -> Result<Self, ImageError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(READ_TIMEOUT)
            .build()?;
        Ok(ImageMerger {
            assets_dir: assets_dir.into(),
            client,
            cache: Mutex::new(HashMap::new()),
        })
    }

    /// Merge two coin images into one w×h PNG: left half from the front
    /// image, right half from the back image. Both inputs are resized to
    /// w×h first, which may distort aspect ratio.
    pub async fn merge_side_by_side(
        &self,
        front: &str,
        back: &str,
        w: u32,
        h: u32,
    ) -> Result<Vec<u8>, ImageError> {
        if w == 0 || h == 0 {
            return Err(ImageError::InvalidSize(w, h));
        }

        let key = merge_cache_key(front, back, w, h);
        if let Some(cached) = self.cache.lock().unwrap().get(&key) {
            return Ok(cached.clone());
        }

        let front_bytes = self.load_bytes(front).await?;
        let back_bytes = self.load_bytes(back).await?;

        let front_img = image::load_from_memory(&front_bytes)?
            .resize_exact(w, h, FilterType::Triangle)
            .to_rgba8();
        let back_img = image::load_from_memory(&back_bytes)?
            .resize_exact(w, h, FilterType::Triangle)
            .to_rgba8();

        let mid = w / 2;
        let mut merged = RgbaImage::new(w, h);
        for y in 0..h {
            for x in 0..w {
                let pixel = if x < mid {
                    front_img.get_pixel(x, y)
                } else {
                    back_img.get_pixel(x, y)
                };
                merged.put_pixel(x, y, *pixel);
            }
        }

        let mut buffer = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(merged).write_to(&mut buffer, image::ImageFormat::Png)?;
        let png = buffer.into_inner();

        let mut cache = self.cache.lock().unwrap();
        if cache.len() >= MERGE_CACHE_CAPACITY {
            cache.clear();
        }
        cache.insert(key, png.clone());

        Ok(png)
    }

    /// Resolve a source string (assets path, nested proxy route, or direct
    /// URL) to raw bytes.
    async fn load_bytes(&self, src: &str) -> Result<Vec<u8>, ImageError> {
        if src.is_empty() {
            return Err(ImageError::EmptySource);
        }

        if let Some(rel) = src.strip_prefix("/assets/") {
            return self.read_asset(rel);
        }

        if src.starts_with("/img_proxy") {
            let url = proxy_url_param(src).ok_or(ImageError::MissingProxyUrl)?;
            return self.fetch(&url).await;
        }

        if src.starts_with("http://") || src.starts_with("https://") {
            return self.fetch(src).await;
        }

        // Fallback: treat as an assets-relative path
        self.read_asset(&norm_path(src))
    }

    fn read_asset(&self, rel: &str) -> Result<Vec<u8>, ImageError> {
        if Path::new(rel)
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(ImageError::PathTraversal(rel.to_string()));
        }
        Ok(std::fs::read(self.assets_dir.join(rel))?)
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ImageError> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(ImageError::UpstreamStatus(response.status().as_u16()));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

fn merge_cache_key(front: &str, back: &str, w: u32, h: u32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}|{}|{}x{}", front, back, w, h));
    format!("{:x}", hasher.finalize())
}

/// Extract the decoded `url` query parameter from a `/img_proxy?url=…` source.
fn proxy_url_param(src: &str) -> Option<String> {
    let query = src.split_once('?')?.1;
    for pair in query.split('&') {
        if let Some(value) = pair.strip_prefix("url=") {
            return urlencoding::decode(value).ok().map(|v| v.into_owned());
        }
    }
    None
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.org/a.png"));
        assert!(is_url("http://example.org"));
        assert!(is_url("ftp+ssl://host/x"));
        assert!(is_url("data:image/png;base64,AAAA"));
        assert!(!is_url("pics/coin.png"));
        assert!(!is_url("C:\\pics\\coin.png"));
        assert!(!is_url("1http://bad-scheme"));
    }

    #[test]
    fn test_norm_path() {
        assert_eq!(norm_path("pics\\coin.png"), "pics/coin.png");
        assert_eq!(norm_path("./pics/coin.png"), "pics/coin.png");
        assert_eq!(norm_path("//x/y"), "x/y");
    }

    #[test]
    fn test_proxify_keeps_url_structure() {
        let proxied = proxify("https://example.org/a b.png?x=1&y=2");
        assert_eq!(
            proxied,
            "/img_proxy?url=https://example.org/a%20b.png?x=1&y=2"
        );
    }

    #[test]
    fn test_bg_url_from_value() {
        assert_eq!(bg_url_from_value(""), None);
        assert_eq!(bg_url_from_value("   "), None);
        assert_eq!(
            bg_url_from_value("pics\\a.png").as_deref(),
            Some("/assets/pics/a.png")
        );
        assert_eq!(
            bg_url_from_value("https://example.org/a.png").as_deref(),
            Some("/img_proxy?url=https://example.org/a.png")
        );
    }

    #[test]
    fn test_proxy_url_param() {
        assert_eq!(
            proxy_url_param("/img_proxy?url=https%3A%2F%2Fexample.org%2Fa.png").as_deref(),
            Some("https://example.org/a.png")
        );
        assert_eq!(proxy_url_param("/img_proxy"), None);
        assert_eq!(proxy_url_param("/img_proxy?other=1"), None);
    }

    fn write_solid_png(path: &Path, rgba: [u8; 4]) {
        let mut img = RgbaImage::new(10, 10);
        for pixel in img.pixels_mut() {
            *pixel = image::Rgba(rgba);
        }
        img.save(path).unwrap();
    }

    #[tokio::test]
    async fn test_merge_side_by_side_halves() {
        let dir = std::env::temp_dir().join(format!("dive-merge-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        write_solid_png(&dir.join("front.png"), [255, 0, 0, 255]);
        write_solid_png(&dir.join("back.png"), [0, 0, 255, 255]);

        let merger = ImageMerger::new(&dir).unwrap();
        let png = merger
            .merge_side_by_side("/assets/front.png", "/assets/back.png", 8, 8)
            .await
            .unwrap();

        let merged = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(merged.dimensions(), (8, 8));
        assert_eq!(merged.get_pixel(1, 4).0, [255, 0, 0, 255]); // left = front
        assert_eq!(merged.get_pixel(6, 4).0, [0, 0, 255, 255]); // right = back

        // Second call is served from cache
        let again = merger
            .merge_side_by_side("/assets/front.png", "/assets/back.png", 8, 8)
            .await
            .unwrap();
        assert_eq!(png, again);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_merge_rejects_zero_size() {
        let merger = ImageMerger::new("assets").unwrap();
        let result = merger.merge_side_by_side("a", "b", 0, 8).await;
        assert!(matches!(result, Err(ImageError::InvalidSize(0, 8))));
    }

    #[test]
    fn test_path_traversal_rejected() {
        let merger = ImageMerger::new("assets").unwrap();
        let result = merger.read_asset("../secret.png");
        assert!(matches!(result, Err(ImageError::PathTraversal(_))));
    }
}
