//! Image loading.
//!
//! Only the formats hand sign photographs are commonly stored in are supported: PNG and JPEG.
//! Files are recognized by their extension, case-insensitively.

use std::path::Path;

use image::{imageops, ImageBuffer, Rgba, RgbaImage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ImageFormat {
    Jpeg,
    Png,
}

impl ImageFormat {
    /// Determines the image format from the file extension of `path`.
    ///
    /// Returns [`None`] if the extension is missing or not one of `png`, `jpg`, or `jpeg` (in any
    /// capitalization).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match &*ext {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            _ => None,
        }
    }

    fn to_image_format(self) -> image::ImageFormat {
        match self {
            Self::Jpeg => image::ImageFormat::Jpeg,
            Self::Png => image::ImageFormat::Png,
        }
    }
}

/// Returns whether `path` has the extension of a supported image format.
pub fn is_supported_image(path: &Path) -> bool {
    ImageFormat::from_path(path).is_some()
}

/// An 8-bit sRGB image with alpha channel.
#[derive(Clone)]
pub struct Image {
    pub(crate) buf: RgbaImage,
}

impl Image {
    /// Loads an image from the filesystem.
    ///
    /// The path must have a supported file extension (`jpeg`, `jpg` or `png`). The file contents
    /// are decoded with the format its extension indicates. If that fails, the format is guessed
    /// from the contents instead, so a PNG file named `*.jpg` still loads.
    pub fn load<A: AsRef<Path>>(path: A) -> anyhow::Result<Self> {
        Self::load_impl(path.as_ref())
    }

    fn load_impl(path: &Path) -> anyhow::Result<Self> {
        let Some(format) = ImageFormat::from_path(path) else {
            anyhow::bail!(
                "invalid image path '{}' (must have one of the supported extensions)",
                path.display()
            );
        };

        let data = std::fs::read(path)?;
        let expected = format.to_image_format();
        let decoded = match image::load_from_memory_with_format(&data, expected) {
            Ok(decoded) => decoded,
            Err(e) => match image::guess_format(&data) {
                Ok(actual) if actual != expected => {
                    log::debug!(
                        "{} contains {actual:?} data, not {expected:?}",
                        path.display()
                    );
                    image::load_from_memory_with_format(&data, actual)?
                }
                _ => return Err(e.into()),
            },
        };
        Ok(Self {
            buf: decoded.to_rgba8(),
        })
    }

    /// Creates an image of a specified size, filled with a single color.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        Self {
            buf: ImageBuffer::from_pixel(width, height, Rgba(rgba)),
        }
    }

    /// Returns the width of this image, in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.buf.width()
    }

    /// Returns the height of this image, in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.buf.height()
    }

    /// Gets the RGBA color at the given pixel coordinates.
    ///
    /// # Panics
    ///
    /// This will panic if `(x, y)` is outside the bounds of this image.
    pub fn get(&self, x: u32, y: u32) -> [u8; 4] {
        self.buf[(x, y)].0
    }

    /// Pads the image with black bars on the right or bottom edge to make it square.
    ///
    /// The original image stays at the top left corner, so pixel coordinates are unchanged.
    pub fn pad_to_square(&self) -> Image {
        let size = self.width().max(self.height());
        if self.width() == self.height() {
            return self.clone();
        }

        let mut buf = RgbaImage::from_pixel(size, size, Rgba([0, 0, 0, 255]));
        imageops::replace(&mut buf, &self.buf, 0, 0);
        Image { buf }
    }

    /// Resamples the image to `width`x`height` pixels, ignoring the aspect ratio.
    pub fn resize(&self, width: u32, height: u32) -> Image {
        Image {
            buf: imageops::resize(&self.buf, width, height, imageops::FilterType::Triangle),
        }
    }
}
