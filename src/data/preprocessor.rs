// ============================================================
// Layer 4 — Image Preprocessor
// ============================================================
// Turns an encoded character image into the flat intensity
// buffer the network expects.
//
// Omniglot drawings are 105x105 black strokes on a white
// background. Steps (applied in order):
//   1. Decode (PNG) and convert to 8-bit grayscale
//   2. Resize to the configured side length if it differs
//   3. Invert, so strokes are bright (255) and background is 0
//
// Reference: image crate documentation

use anyhow::{Context, Result};
use image::{imageops::FilterType, DynamicImage};
use std::{fs, path::Path};

#[derive(Debug, Clone)]
pub struct Preprocessor {
    /// Target width and height in pixels
    side: u32,
}

impl Preprocessor {
    pub fn new(side: usize) -> Self {
        Self { side: side as u32 }
    }

    pub fn side(&self) -> usize {
        self.side as usize
    }

    /// Read and preprocess an image file from disk.
    pub fn load(&self, path: &Path) -> Result<Vec<u8>> {
        let bytes = fs::read(path)
            .with_context(|| format!("Cannot read image '{}'", path.display()))?;
        self.decode(&bytes)
            .with_context(|| format!("Cannot decode image '{}'", path.display()))
    }

    /// Preprocess an already-encoded image held in memory.
    pub fn decode(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        let img = image::load_from_memory(bytes).context("Cannot decode image bytes")?;
        Ok(self.process(img))
    }

    /// Grayscale → resize → invert. Returns `side * side` bytes, row-major.
    pub fn process(&self, img: DynamicImage) -> Vec<u8> {
        let gray = img.to_luma8();

        let gray = if gray.dimensions() == (self.side, self.side) {
            gray
        } else {
            tracing::trace!(
                "Resizing {}x{} → {}x{}",
                gray.width(), gray.height(), self.side, self.side
            );
            image::imageops::resize(&gray, self.side, self.side, FilterType::Triangle)
        };

        let mut pixels = gray.into_raw();
        pixels.iter_mut().for_each(|p| *p = 255 - *p);
        pixels
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new(105)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, ImageFormat, Luma};
    use std::io::Cursor;

    fn png_bytes(img: GrayImage) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageLuma8(img)
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_inverts_strokes() {
        // White page with one black stroke pixel at (1, 0)
        let mut img = GrayImage::from_pixel(3, 3, Luma([255]));
        img.put_pixel(1, 0, Luma([0]));

        let pixels = Preprocessor::new(3).decode(&png_bytes(img)).unwrap();
        assert_eq!(pixels.len(), 9);
        assert_eq!(pixels[1], 255);
        assert_eq!(pixels.iter().filter(|&&p| p == 0).count(), 8);
    }

    #[test]
    fn test_load_reads_file_from_disk() {
        let tmp  = tempfile::tempdir().unwrap();
        let path = tmp.path().join("glyph.png");
        std::fs::write(&path, png_bytes(GrayImage::from_pixel(2, 2, Luma([200])))).unwrap();

        let pixels = Preprocessor::new(2).load(&path).unwrap();
        assert_eq!(pixels, vec![55; 4]);
    }

    #[test]
    fn test_load_names_the_bad_file() {
        let tmp  = tempfile::tempdir().unwrap();
        let path = tmp.path().join("broken.png");
        std::fs::write(&path, b"not an image").unwrap();

        let err = Preprocessor::new(2).load(&path).unwrap_err();
        assert!(err.to_string().contains("broken.png"));
        assert!(Preprocessor::new(2).load(&tmp.path().join("missing.png")).is_err());
    }

    #[test]
    fn test_resizes_to_target_side() {
        let img = GrayImage::from_pixel(10, 10, Luma([255]));
        let pixels = Preprocessor::new(5).decode(&png_bytes(img)).unwrap();
        assert_eq!(pixels.len(), 25);
        assert!(pixels.iter().all(|&p| p == 0));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(Preprocessor::new(5).decode(b"not an image").is_err());
    }
}
