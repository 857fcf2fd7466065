// ============================================================
// Layer 4 — Omniglot Loader
// ============================================================
// Loads character drawings from an Omniglot-style directory:
//
//   root/
//     <alphabet>/
//       <character>/
//         *.png        ← one file per drawer
//
// Both `images_background` and `images_evaluation` follow this
// layout. Entries are visited in sorted order so the same
// directory always produces the same glyph order.
//
// Reference: Rust Book §9 (Error Handling)

use anyhow::{Context, Result};
use std::{fs, path::{Path, PathBuf}};

use crate::data::preprocessor::Preprocessor;
use crate::domain::glyph::{CharacterId, Glyph};
use crate::domain::traits::GlyphSource;

/// Loads every drawing under an Omniglot image root.
/// Implements the GlyphSource trait from Layer 3.
pub struct OmniglotLoader {
    root:         PathBuf,
    preprocessor: Preprocessor,
}

impl OmniglotLoader {
    pub fn new(root: impl Into<PathBuf>, preprocessor: Preprocessor) -> Self {
        Self { root: root.into(), preprocessor }
    }
}

impl GlyphSource for OmniglotLoader {
    fn load_all(&self) -> Result<Vec<Glyph>> {
        // Missing directory → empty corpus; the caller decides whether
        // that is fatal.
        if !self.root.exists() {
            tracing::warn!(
                "Image directory '{}' does not exist, returning empty corpus",
                self.root.display()
            );
            return Ok(Vec::new());
        }

        let mut glyphs = Vec::new();

        for alphabet_dir in sorted_dirs(&self.root)? {
            let alphabet = dir_name(&alphabet_dir);

            for character_dir in sorted_dirs(&alphabet_dir)? {
                let class = CharacterId::new(alphabet.clone(), dir_name(&character_dir));

                for path in sorted_pngs(&character_dir)? {
                    match self.preprocessor.load(&path) {
                        Ok(pixels) => glyphs.push(Glyph::new(
                            class.clone(),
                            dir_name(&path),
                            self.preprocessor.side(),
                            pixels,
                        )),
                        // Skip unreadable drawings rather than failing the whole load
                        Err(e) => tracing::warn!("Skipping '{}': {:#}", path.display(), e),
                    }
                }
            }
            tracing::debug!("Loaded alphabet '{}' ({} glyphs so far)", alphabet, glyphs.len());
        }

        tracing::info!(
            "Loaded {} glyphs from '{}'",
            glyphs.len(),
            self.root.display()
        );
        Ok(glyphs)
    }
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string()
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = fs::read_dir(dir)
        .with_context(|| format!("Cannot read directory '{}'", dir.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()
        .with_context(|| format!("Cannot list directory '{}'", dir.display()))?;
    paths.sort();
    Ok(paths)
}

fn sorted_dirs(dir: &Path) -> Result<Vec<PathBuf>> {
    Ok(sorted_entries(dir)?.into_iter().filter(|p| p.is_dir()).collect())
}

fn sorted_pngs(dir: &Path) -> Result<Vec<PathBuf>> {
    Ok(sorted_entries(dir)?
        .into_iter()
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("png"))
        })
        .collect())
}
