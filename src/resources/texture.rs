//! Path-keyed texture cache.
//!
//! [`TextureCache`] is the service that turns texture paths into shared
//! [`Texture`]s. It replaces a process-wide texture map: each cache owns its
//! registry, its settings and a reference to the backend, so tests and tools
//! can run isolated caches side by side.
//!
//! The registry only keeps `Weak` references. Being cached never keeps a
//! texture alive; the last `Arc<Texture>` going away frees the backend object
//! and erases the entry.

use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{Arc, Mutex, RwLock, Weak},
};

use crate::{
    data_structures::{
        pixel_format::{self, PixelFormat},
        texture::Texture,
    },
    error::TextureError,
    lock,
    render::RenderBackend,
    resources::{self, DecodedImage, ImageContainer, normalize_path},
};

/// Knobs consulted by every load and create call of a cache.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureSettings {
    /// Format used when a loader has to pick an RGBA variant on its own.
    /// `Closest` lets the backend choose the nearest supported one.
    pub default_rgba_format: PixelFormat,
    pub generate_mipmaps: bool,
    /// Relative texture paths are resolved against this directory.
    pub asset_root: PathBuf,
}

impl Default for TextureSettings {
    fn default() -> Self {
        Self {
            default_rgba_format: PixelFormat::Rgba8888,
            generate_mipmaps: true,
            asset_root: PathBuf::from("./assets"),
        }
    }
}

/// One line of a [`TextureCache::dump`] report.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureInfo {
    pub pathname: String,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub size_in_bytes: usize,
    pub mip_levels: u32,
    /// Owners holding the texture, the report's own handle excluded.
    pub owners: usize,
}

/// Normalized path to texture, non-owning.
#[derive(Debug, Default)]
pub struct Registry {
    entries: Mutex<HashMap<String, Weak<Texture>>>,
}

impl Registry {
    /// Drops `path` if it still points at `texture`.
    ///
    /// A newer load may already have replaced an entry whose texture was being
    /// destroyed, so the pointer has to match.
    pub(crate) fn forget(&self, path: &str, texture: *const Texture) {
        let mut entries = lock(&self.entries);
        if entries
            .get(path)
            .is_some_and(|weak| std::ptr::eq(weak.as_ptr(), texture))
        {
            entries.remove(path);
            log::debug!("Removed {} from the texture registry", path);
        }
    }

    fn lookup(&self, path: &str) -> Option<Weak<Texture>> {
        lock(&self.entries).get(path).cloned()
    }

    fn snapshot(&self) -> Vec<Weak<Texture>> {
        lock(&self.entries).values().cloned().collect()
    }

    fn len(&self) -> usize {
        lock(&self.entries)
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }
}

/// Loads, deduplicates and creates textures for one backend.
pub struct TextureCache {
    backend: Arc<dyn RenderBackend>,
    registry: Arc<Registry>,
    settings: RwLock<TextureSettings>,
    placeholder: Arc<Texture>,
}

impl TextureCache {
    /// Create a cache for `backend`.
    ///
    /// This also creates the placeholder texture, so it fails when the backend
    /// can't hold a single 8x8 RGBA texture.
    pub fn new(
        backend: Arc<dyn RenderBackend>,
        settings: TextureSettings,
    ) -> Result<Self, TextureError> {
        let placeholder =
            Texture::from_pixels(&backend, PixelFormat::Rgba8888, &checkerboard(8, 8), 8, 8)?;
        placeholder.set_debug_info("placeholder");
        Ok(Self {
            backend,
            registry: Arc::new(Registry::default()),
            settings: RwLock::new(settings),
            placeholder,
        })
    }

    pub fn backend(&self) -> &Arc<dyn RenderBackend> {
        &self.backend
    }

    pub fn settings(&self) -> TextureSettings {
        self.settings
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn update_settings(&self, update: impl FnOnce(&mut TextureSettings)) {
        let mut settings = self
            .settings
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        update(&mut settings);
    }

    pub fn enable_mipmap_generation(&self) {
        self.update_settings(|s| s.generate_mipmaps = true);
    }

    pub fn disable_mipmap_generation(&self) {
        self.update_settings(|s| s.generate_mipmaps = false);
    }

    pub fn is_mipmap_generation_enabled(&self) -> bool {
        self.settings().generate_mipmaps
    }

    /// Sets the RGBA format files are converted to on load.
    ///
    /// ```ignore
    /// cache.set_default_rgba_format(PixelFormat::Rgba4444);
    /// let small = cache.load("textures/ui.png")?;
    /// cache.set_default_rgba_format(PixelFormat::Rgba8888);
    /// ```
    pub fn set_default_rgba_format(&self, format: PixelFormat) {
        self.update_settings(|s| s.default_rgba_format = format);
    }

    pub fn default_rgba_format(&self) -> PixelFormat {
        self.settings().default_rgba_format
    }

    /// Create an anonymous texture from raw pixel data.
    ///
    /// Mip levels are generated right away when generation is enabled and the
    /// format allows it.
    pub fn create_from_pixels(
        &self,
        format: PixelFormat,
        data: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Arc<Texture>, TextureError> {
        let texture = Texture::from_pixels(&self.backend, format, data, width, height)?;
        self.apply_mipmap_policy(&texture)?;
        Ok(texture)
    }

    /// Like [`create_from_pixels`](Self::create_from_pixels), tagging the
    /// texture with `info` so it can be told apart in dumps and captures.
    pub fn create_text_from_pixels(
        &self,
        format: PixelFormat,
        data: &[u8],
        width: u32,
        height: u32,
        info: &str,
    ) -> Result<Arc<Texture>, TextureError> {
        let texture = self.create_from_pixels(format, data, width, height)?;
        texture.set_debug_info(&format!("text texture: {info}"));
        Ok(texture)
    }

    pub fn create_render_target(
        &self,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Result<Arc<Texture>, TextureError> {
        let format = match format {
            PixelFormat::Closest => {
                let ideal = self.default_rgba_format();
                self.backend
                    .capabilities()
                    .closest(ideal)
                    .ok_or(TextureError::UnsupportedFormat(ideal))?
            }
            format => format,
        };
        Texture::create_render_target(&self.backend, width, height, format)
    }

    /// Returns the texture for `path`, loading it on first use.
    ///
    /// The registry stays locked from lookup to insert, so concurrent loads of
    /// the same path decode once and all callers get the same instance.
    /// Loads of already cached paths don't decode at all.
    ///
    /// # Errors
    ///
    /// * `UnsupportedExtension` for anything but `.png` and `.pvr`
    /// * `UnsupportedPlatform` for `.pvr` on backends without PVRTC
    /// * `Io` / `Decode` when the file can't be read or parsed
    /// * every error of [`Texture::from_levels`]
    pub fn load(&self, path: &str) -> Result<Arc<Texture>, TextureError> {
        let key = normalize_path(path);
        let mut entries = lock(&self.registry.entries);
        if let Some(texture) = entries.get(&key).and_then(Weak::upgrade) {
            log::debug!("Texture cache hit for {}", key);
            return Ok(texture);
        }

        let container = ImageContainer::from_path(&key)?;
        if container == ImageContainer::Pvr {
            let caps = self.backend.capabilities();
            if !caps.supports(PixelFormat::Pvr4) && !caps.supports(PixelFormat::Pvr2) {
                return Err(TextureError::UnsupportedPlatform {
                    format: PixelFormat::Pvr4,
                    backend: self.backend.kind(),
                });
            }
        }
        let settings = self.settings();
        let bytes = resources::load_binary(&settings.asset_root, &key)?;
        let image = container.decode(&key, &bytes)?;
        let texture = self.texture_from_image(&image, &key, &settings)?;
        texture.link_registry(&self.registry);
        entries.insert(key, Arc::downgrade(&texture));
        Ok(texture)
    }

    /// Loads `path`, or logs the failure and hands out the placeholder.
    pub fn load_or_placeholder(&self, path: &str) -> Arc<Texture> {
        match self.load(path) {
            Ok(texture) => texture,
            Err(e) => {
                log::error!("Texture {} is missing or invalid: {}", path, e);
                self.placeholder()
            }
        }
    }

    /// The cached texture for `path`, without loading it.
    pub fn get(&self, path: &str) -> Option<Arc<Texture>> {
        self.registry
            .lookup(&normalize_path(path))
            .and_then(|weak| weak.upgrade())
    }

    /// The 8x8 magenta/black checkerboard that stands in for missing textures.
    pub fn placeholder(&self) -> Arc<Texture> {
        self.placeholder.clone()
    }

    /// Installs the image at `path` as mip `level` of `texture`, bypassing
    /// generation. The file is converted to the texture's format.
    pub fn load_mip_level_from_file(
        &self,
        texture: &Texture,
        level: u32,
        path: &str,
    ) -> Result<(), TextureError> {
        let settings = self.settings();
        let key = normalize_path(path);
        let image = resources::load_image(&settings.asset_root, &key)?;
        let data = convert_level(&image, 0, texture.format())?;
        texture.upload_mip_level(level, image.width, image.height, &data)
    }

    /// Number of live registry entries.
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lists every live registry entry and logs the totals.
    pub fn dump(&self) -> Vec<TextureInfo> {
        // Upgrade outside the registry lock: a handle taken here can become
        // the last owner, and its drop needs the lock.
        let textures: Vec<Arc<Texture>> = self
            .registry
            .snapshot()
            .iter()
            .filter_map(Weak::upgrade)
            .collect();
        let mut report: Vec<TextureInfo> = textures
            .iter()
            .map(|texture| TextureInfo {
                pathname: texture.pathname().unwrap_or_default().to_string(),
                width: texture.width(),
                height: texture.height(),
                format: texture.format(),
                size_in_bytes: texture.size_in_bytes(),
                mip_levels: texture.mip_levels(),
                owners: Arc::strong_count(texture) - 1,
            })
            .collect();
        report.sort_by(|a, b| a.pathname.cmp(&b.pathname));

        let total: usize = report.iter().map(|info| info.size_in_bytes).sum();
        log::info!("============= Textures: {} =============", report.len());
        for info in &report {
            log::info!(
                "{} {}x{} {} {} bytes, {} owner(s)",
                info.pathname,
                info.width,
                info.height,
                info.format,
                info.size_in_bytes,
                info.owners
            );
        }
        log::info!("Total texture memory: {} bytes", total);
        report
    }

    fn texture_from_image(
        &self,
        image: &DecodedImage,
        key: &str,
        settings: &TextureSettings,
    ) -> Result<Arc<Texture>, TextureError> {
        if image.format.is_compressed() {
            // The container ships its own chain; it is used as-is.
            let levels: Vec<&[u8]> = image.levels.iter().map(Vec::as_slice).collect();
            return Texture::from_levels(
                &self.backend,
                image.format,
                image.width,
                image.height,
                &levels,
                Some(key),
            );
        }

        let caps = self.backend.capabilities();
        let ideal = match settings.default_rgba_format {
            PixelFormat::Closest | PixelFormat::Invalid => PixelFormat::Rgba8888,
            format => format,
        };
        let format = caps
            .closest(ideal)
            .ok_or(TextureError::UnsupportedFormat(ideal))?;
        let data = convert_level(image, 0, format)?;
        let texture = Texture::from_levels(
            &self.backend,
            format,
            image.width,
            image.height,
            &[&data],
            Some(key),
        )?;
        if settings.generate_mipmaps {
            texture.generate_mipmaps()?;
        }
        Ok(texture)
    }

    fn apply_mipmap_policy(&self, texture: &Texture) -> Result<(), TextureError> {
        if !self.is_mipmap_generation_enabled() {
            return Ok(());
        }
        if texture.format().is_compressed() {
            log::warn!(
                "Skipping mip generation for compressed {} texture",
                texture.format()
            );
            return Ok(());
        }
        texture.generate_mipmaps()
    }
}

fn convert_level(
    image: &DecodedImage,
    level: usize,
    format: PixelFormat,
) -> Result<Vec<u8>, TextureError> {
    let data = image.levels.get(level).ok_or(TextureError::InvalidData {
        expected: image.format.data_size(image.width, image.height),
        actual: 0,
    })?;
    if image.format == format {
        return Ok(data.clone());
    }
    let rgba = pixel_format::to_rgba8(image.format, data)
        .ok_or(TextureError::UnsupportedFormat(image.format))?;
    pixel_format::from_rgba8(format, &rgba).ok_or(TextureError::UnsupportedFormat(format))
}

fn checkerboard(width: usize, height: usize) -> Vec<u8> {
    (0..width * height)
        .flat_map(|i| {
            let (x, y) = (i % width, i / width);
            if (x + y) % 2 == 0 {
                [255, 0, 255, 255]
            } else {
                [0, 0, 0, 255]
            }
        })
        .collect()
}
