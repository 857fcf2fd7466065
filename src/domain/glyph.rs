// ============================================================
// Layer 3 — Glyph Domain Type
// ============================================================
// A single handwritten drawing of one character, as found in
// the Omniglot dataset:
//
//   images_background/
//     Latin/
//       character01/
//         0001_01.png   ← one glyph (drawer 01 of character 0001)
//         0001_02.png
//
// The pixels are already decoded and resized by the data layer,
// stored row-major as single-channel intensities where
// 0 = background and 255 = stroke.

use std::sync::Arc;

/// Identifies one character class: the alphabet it belongs to
/// plus the character directory name inside that alphabet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CharacterId {
    pub alphabet:  String,
    pub character: String,
}

impl CharacterId {
    pub fn new(alphabet: impl Into<String>, character: impl Into<String>) -> Self {
        Self {
            alphabet:  alphabet.into(),
            character: character.into(),
        }
    }
}

impl std::fmt::Display for CharacterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.alphabet, self.character)
    }
}

/// One decoded drawing.
///
/// Pixels live behind an `Arc` so pairs and tasks can share the
/// same drawing without copying ~11 KB per sample.
#[derive(Debug, Clone)]
pub struct Glyph {
    /// Which character this drawing shows
    pub class: CharacterId,

    /// File name the drawing was read from (kept for traceability)
    pub source: String,

    /// Width and height in pixels (drawings are square)
    pub side: usize,

    /// Row-major intensities, `side * side` values
    pub pixels: Arc<[u8]>,
}

impl Glyph {
    pub fn new(
        class:  CharacterId,
        source: impl Into<String>,
        side:   usize,
        pixels: Vec<u8>,
    ) -> Self {
        debug_assert_eq!(pixels.len(), side * side);
        Self {
            class,
            source: source.into(),
            side,
            pixels: pixels.into(),
        }
    }

    /// A drawing whose character is unknown, e.g. an image handed
    /// to `compare` on the command line.
    pub fn unlabeled(source: impl Into<String>, side: usize, pixels: Vec<u8>) -> Self {
        let source = source.into();
        Self::new(CharacterId::new("?", source.clone()), source, side, pixels)
    }

    /// Pixel intensities scaled to [0.0, 1.0]
    pub fn normalized(&self) -> impl Iterator<Item = f32> + '_ {
        self.pixels.iter().map(|&p| p as f32 / 255.0)
    }

    pub fn same_class(&self, other: &Glyph) -> bool {
        self.class == other.class
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_range() {
        let g = Glyph::new(CharacterId::new("Latin", "a"), "a.png", 2, vec![0, 255, 51, 102]);
        let v: Vec<f32> = g.normalized().collect();
        assert_eq!(v, vec![0.0, 1.0, 0.2, 0.4]);
    }

    #[test]
    fn test_same_class() {
        let a = Glyph::new(CharacterId::new("Latin", "a"), "1.png", 1, vec![0]);
        let b = Glyph::new(CharacterId::new("Latin", "a"), "2.png", 1, vec![9]);
        let c = Glyph::new(CharacterId::new("Greek", "a"), "3.png", 1, vec![0]);
        assert!(a.same_class(&b));
        assert!(!a.same_class(&c));
        assert_eq!(c.class.to_string(), "Greek/a");
    }

    #[test]
    fn test_unlabeled_glyphs_differ_by_source() {
        let a = Glyph::unlabeled("x.png", 1, vec![0]);
        let b = Glyph::unlabeled("y.png", 1, vec![0]);
        assert!(!a.same_class(&b));
        assert_eq!(a.source, "x.png");
    }
}
