//! Image resources for `drawImage`.
//!
//! Images are looked up by identifier through an [`ImageProvider`]. The
//! bundled [`ImageStore`] resolves registered in-memory images, base64 or
//! percent-encoded data URIs, and files below an optional asset root.
//! Decoded images are kept in a bounded [`TextureCache`].

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tiny_skia::{ColorU8, Pixmap};

use crate::error::{RenderError, RenderResult};
use crate::texture_cache::{CacheStats, TextureCache};

/// Source format of a decoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// PNG with alpha support.
    Png,
    /// JPEG (no alpha).
    Jpeg,
    /// WebP (alpha support).
    WebP,
    /// Built in memory or of an unrecognized format.
    Unknown,
}

impl ImageFormat {
    /// Detect format from magic bytes.
    #[must_use]
    pub fn from_magic_bytes(data: &[u8]) -> Self {
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
            Self::Png
        } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Self::Jpeg
        } else if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
            Self::WebP
        } else {
            Self::Unknown
        }
    }
}

/// A decoded image, held premultiplied and ready to be used as a pattern.
#[derive(Debug, Clone)]
pub struct Texture {
    pixmap: Pixmap,
    format: ImageFormat,
}

impl Texture {
    /// Build a texture from straight (non-premultiplied) RGBA8 pixels.
    ///
    /// # Errors
    ///
    /// Returns an error if the size is zero or does not match `rgba`.
    pub fn from_rgba(width: u32, height: u32, rgba: &[u8], format: ImageFormat) -> RenderResult<Self> {
        let expected = u64::from(width) * u64::from(height) * 4;
        if expected != rgba.len() as u64 {
            return Err(RenderError::Resource(format!(
                "pixel buffer of {} bytes does not match {width}x{height}",
                rgba.len()
            )));
        }
        let mut pixmap =
            Pixmap::new(width, height).ok_or(RenderError::InvalidDimensions { width, height })?;
        for (dst, src) in pixmap.pixels_mut().iter_mut().zip(rgba.chunks_exact(4)) {
            *dst = ColorU8::from_rgba(src[0], src[1], src[2], src[3]).premultiply();
        }
        Ok(Self { pixmap, format })
    }

    /// Build a single-colour texture.
    ///
    /// # Errors
    ///
    /// Returns an error if either dimension is zero.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> RenderResult<Self> {
        let mut pixmap =
            Pixmap::new(width, height).ok_or(RenderError::InvalidDimensions { width, height })?;
        pixmap.fill(tiny_skia::Color::from_rgba8(rgba[0], rgba[1], rgba[2], rgba[3]));
        Ok(Self {
            pixmap,
            format: ImageFormat::Unknown,
        })
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    /// Format the texture was decoded from.
    #[must_use]
    pub fn format(&self) -> ImageFormat {
        self.format
    }

    /// Premultiplied pixels.
    #[must_use]
    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    /// Size of the decoded pixels in bytes.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.pixmap.data().len()
    }
}

/// Decode an image from raw encoded bytes.
///
/// # Errors
///
/// Returns an error if the image cannot be decoded.
pub fn load_image_from_bytes(data: &[u8]) -> RenderResult<Texture> {
    let format = ImageFormat::from_magic_bytes(data);

    let img = image::load_from_memory(data)
        .map_err(|e| RenderError::Resource(format!("Failed to decode image: {e}")))?;

    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    Texture::from_rgba(width, height, rgba.as_raw(), format)
}

/// Decode an image from a data URI.
///
/// Supports base64 (`data:image/png;base64,iVBOR...`) and percent-encoded payloads.
///
/// # Errors
///
/// Returns an error if the data URI is malformed or the image cannot be decoded.
pub fn load_image_from_data_uri(uri: &str) -> RenderResult<Texture> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| RenderError::Resource("Not a data URI".to_string()))?;

    let (metadata, payload) = rest
        .split_once(',')
        .ok_or_else(|| RenderError::Resource("Invalid data URI: missing comma".to_string()))?;

    let bytes = if metadata.ends_with(";base64") {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD
            .decode(payload)
            .map_err(|e| RenderError::Resource(format!("Failed to decode base64: {e}")))?
    } else {
        percent_decode(payload)?
    };

    load_image_from_bytes(&bytes)
}

fn percent_decode(input: &str) -> RenderResult<Vec<u8>> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let byte = input
                .get(i + 1..i + 3)
                .and_then(|hex| u8::from_str_radix(hex, 16).ok())
                .ok_or_else(|| RenderError::Resource("Invalid URL encoding".to_string()))?;
            out.push(byte);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    Ok(out)
}

/// Lookup of image resources by identifier.
///
/// Implementations are shared read-only between surfaces and called from
/// the rasterizer's blocking threads.
pub trait ImageProvider: Send + Sync {
    /// Resolve `id` to a decoded texture.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::ImageNotFound`] when nothing is known under `id`,
    /// or [`RenderError::Resource`] when the resource exists but cannot be decoded.
    fn resolve(&self, id: &str) -> RenderResult<Arc<Texture>>;
}

/// Configuration for an [`ImageStore`].
#[derive(Debug, Clone)]
pub struct ImageStoreConfig {
    /// Directory that relative image identifiers are resolved against.
    pub asset_root: Option<PathBuf>,
    /// Upper bound on decoded bytes kept in the cache.
    pub max_cache_bytes: usize,
    /// Upper bound on cached entries.
    pub max_cache_entries: usize,
}

impl Default for ImageStoreConfig {
    fn default() -> Self {
        Self {
            asset_root: None,
            max_cache_bytes: 64 * 1024 * 1024,
            max_cache_entries: 256,
        }
    }
}

impl ImageStoreConfig {
    /// Set the asset root.
    #[must_use]
    pub fn with_asset_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.asset_root = Some(root.into());
        self
    }
}

/// Default [`ImageProvider`]: registered images, data URIs and asset files.
///
/// Lookup order for an identifier is registered images, then the decode
/// cache, then a `data:` URI, then a file below the asset root.
pub struct ImageStore {
    registered: RwLock<HashMap<String, Arc<Texture>>>,
    cache: Mutex<TextureCache>,
    asset_root: Option<PathBuf>,
}

impl ImageStore {
    /// Create an empty store with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ImageStoreConfig::default())
    }

    /// Create an empty store.
    #[must_use]
    pub fn with_config(config: ImageStoreConfig) -> Self {
        Self {
            registered: RwLock::new(HashMap::new()),
            cache: Mutex::new(TextureCache::new(
                config.max_cache_bytes,
                config.max_cache_entries,
            )),
            asset_root: config.asset_root,
        }
    }

    /// Register a decoded texture under `id`, replacing any previous one.
    pub fn register(&self, id: impl Into<String>, texture: Texture) {
        let id = id.into();
        tracing::debug!(id = %id, width = texture.width(), height = texture.height(), "registered image");
        self.registered
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::new(texture));
    }

    /// Decode `bytes` and register the result under `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes cannot be decoded.
    pub fn register_bytes(&self, id: impl Into<String>, bytes: &[u8]) -> RenderResult<()> {
        let texture = load_image_from_bytes(bytes)?;
        self.register(id, texture);
        Ok(())
    }

    /// Remove a registered image. Returns whether one was present.
    pub fn unregister(&self, id: &str) -> bool {
        self.registered
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .is_some()
    }

    /// Decode cache statistics.
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .stats()
            .clone()
    }

    fn asset_path(&self, id: &str) -> Option<PathBuf> {
        let root = self.asset_root.as_ref()?;
        let relative = Path::new(id);
        let confined = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        confined.then(|| root.join(relative))
    }

    fn load_uncached(&self, id: &str) -> RenderResult<Texture> {
        if id.starts_with("data:") {
            return load_image_from_data_uri(id);
        }
        let path = self
            .asset_path(id)
            .filter(|p| p.is_file())
            .ok_or_else(|| RenderError::ImageNotFound(id.to_string()))?;
        let bytes = std::fs::read(&path)
            .map_err(|e| RenderError::Resource(format!("{}: {e}", path.display())))?;
        load_image_from_bytes(&bytes)
    }
}

impl Default for ImageStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageProvider for ImageStore {
    fn resolve(&self, id: &str) -> RenderResult<Arc<Texture>> {
        if let Some(texture) = self
            .registered
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
        {
            return Ok(Arc::clone(texture));
        }

        if let Some(texture) = self
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
        {
            return Ok(texture);
        }

        let texture = Arc::new(self.load_uncached(id)?);
        tracing::debug!(id = %truncate_id(id), bytes = texture.byte_len(), "decoded image");
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string(), Arc::clone(&texture));
        Ok(texture)
    }
}

impl<P: ImageProvider + ?Sized> ImageProvider for Arc<P> {
    fn resolve(&self, id: &str) -> RenderResult<Arc<Texture>> {
        (**self).resolve(id)
    }
}

/// Data URIs make poor log fields.
fn truncate_id(id: &str) -> &str {
    match id.char_indices().nth(48) {
        Some((end, _)) => &id[..end],
        None => id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba(rgba));
        let mut buf = std::io::Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png)
            .expect("encode png");
        buf.into_inner()
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(
            ImageFormat::from_magic_bytes(&[0x89, 0x50, 0x4E, 0x47, 0x0D]),
            ImageFormat::Png
        );
        assert_eq!(
            ImageFormat::from_magic_bytes(&[0xFF, 0xD8, 0xFF, 0xE0]),
            ImageFormat::Jpeg
        );
        assert_eq!(ImageFormat::from_magic_bytes(b"RIFF\0\0\0\0WEBP"), ImageFormat::WebP);
        assert_eq!(ImageFormat::from_magic_bytes(&[1, 2]), ImageFormat::Unknown);
    }

    #[test]
    fn test_texture_premultiplies() {
        let texture =
            Texture::from_rgba(1, 1, &[200, 100, 50, 128], ImageFormat::Unknown).expect("texture");
        let px = texture.pixmap().pixels()[0];
        assert_eq!(px.alpha(), 128);
        assert!(px.red() < 200);
    }

    #[test]
    fn test_texture_size_mismatch() {
        let result = Texture::from_rgba(2, 2, &[0; 4], ImageFormat::Unknown);
        assert!(matches!(result, Err(RenderError::Resource(_))));
    }

    #[test]
    fn test_load_png_bytes() {
        let texture = load_image_from_bytes(&png_bytes(3, 2, [1, 2, 3, 255])).expect("decode");
        assert_eq!((texture.width(), texture.height()), (3, 2));
        assert_eq!(texture.format(), ImageFormat::Png);
    }

    #[test]
    fn test_data_uri_base64() {
        use base64::Engine;
        let encoded = base64::engine::general_purpose::STANDARD.encode(png_bytes(1, 1, [9, 9, 9, 255]));
        let texture =
            load_image_from_data_uri(&format!("data:image/png;base64,{encoded}")).expect("decode");
        assert_eq!(texture.width(), 1);
    }

    #[test]
    fn test_data_uri_rejects_malformed() {
        assert!(load_image_from_data_uri("image/png;base64,abc").is_err());
        assert!(load_image_from_data_uri("data:image/png;base64").is_err());
        assert!(percent_decode("%zz").is_err());
        assert_eq!(percent_decode("a%20b").expect("decode"), b"a b");
    }

    #[test]
    fn test_store_registered_and_missing() {
        let store = ImageStore::new();
        store.register("img", Texture::solid(4, 4, [255, 0, 0, 255]).expect("solid"));

        assert_eq!(store.resolve("img").expect("registered").width(), 4);
        assert!(matches!(store.resolve("abc"), Err(RenderError::ImageNotFound(id)) if id == "abc"));

        assert!(store.unregister("img"));
        assert!(store.resolve("img").is_err());
    }

    #[test]
    fn test_store_asset_root_and_cache() {
        let dir = std::env::temp_dir().join(format!("canvas-renderer-assets-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("mkdir");
        std::fs::write(dir.join("logo.png"), png_bytes(2, 2, [0, 0, 255, 255])).expect("write");

        let store = ImageStore::with_config(ImageStoreConfig::default().with_asset_root(&dir));
        let first = store.resolve("logo.png").expect("asset");
        let second = store.resolve("logo.png").expect("cached");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.cache_stats().hits, 1);

        assert!(store.resolve("../logo.png").is_err());
        std::fs::remove_dir_all(&dir).ok();
    }
}
