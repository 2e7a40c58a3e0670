//! Filename Matcher Module
//! Resolves logical file names against a directory regardless of whether the
//! filesystem stored them composed (NFC) or decomposed (NFD).
//!
//! macOS historically writes Hangul file names decomposed while most other
//! systems write them composed, so the same visual name can arrive as two
//! different byte strings. Matching is done in two phases: the directory is
//! listed once into a normalization-keyed index, then each lookup is a pair of
//! hash probes.

use log::debug;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

#[derive(Error, Debug)]
pub enum MatchError {
    #[error("No file matching '{name}' in {}", .dir.display())]
    NotFound { name: String, dir: PathBuf },
    #[error("Cannot list directory {}: {source}", .dir.display())]
    Directory {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Composed (NFC) form of `text`.
pub fn nfc(text: &str) -> String {
    text.nfc().collect()
}

/// Decomposed (NFD) form of `text`.
pub fn nfd(text: &str) -> String {
    text.nfd().collect()
}

/// True when `a` and `b` are canonically equivalent.
pub fn canonical_eq(a: &str, b: &str) -> bool {
    a == b || nfc(a) == nfc(b)
}

/// Normalization-keyed index of the regular files in one directory.
#[derive(Debug, Clone)]
pub struct NameMatcher {
    dir: PathBuf,
    by_name: HashMap<String, PathBuf>,
}

impl NameMatcher {
    /// List `dir` once and index every regular file under its NFC and NFD names.
    ///
    /// Entries are visited in byte order of their raw names; if two entries
    /// normalize to the same key the first one visited keeps it.
    pub fn index(dir: &Path) -> Result<Self, MatchError> {
        let read_dir = fs::read_dir(dir).map_err(|source| MatchError::Directory {
            dir: dir.to_path_buf(),
            source,
        })?;

        let mut entries: Vec<(String, PathBuf)> = Vec::new();
        for entry in read_dir {
            let entry = entry.map_err(|source| MatchError::Directory {
                dir: dir.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => entries.push((name, path)),
                Err(raw) => debug!("Skipping non UTF-8 file name {:?}", raw),
            }
        }
        entries.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

        let file_count = entries.len();
        let mut by_name = HashMap::with_capacity(file_count * 2);
        for (name, path) in entries {
            for key in [nfc(&name), nfd(&name)] {
                by_name.entry(key).or_insert_with(|| path.clone());
            }
        }

        debug!("Indexed {} file(s) in {}", file_count, dir.display());

        Ok(Self {
            dir: dir.to_path_buf(),
            by_name,
        })
    }

    /// Find the file whose name is canonically equivalent to `name`.
    pub fn resolve(&self, name: &str) -> Result<&Path, MatchError> {
        self.by_name
            .get(&nfc(name))
            .or_else(|| self.by_name.get(&nfd(name)))
            .map(PathBuf::as_path)
            .ok_or_else(|| MatchError::NotFound {
                name: name.to_string(),
                dir: self.dir.clone(),
            })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// One-shot lookup: index `dir` and resolve `name`.
pub fn find_file(dir: &Path, name: &str) -> Result<PathBuf, MatchError> {
    NameMatcher::index(dir)?.resolve(name).map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hangul_forms_are_equivalent() {
        let composed = "송도고_환경데이터.csv";
        let decomposed = nfd(composed);

        assert_ne!(composed, decomposed);
        assert!(canonical_eq(composed, &decomposed));
        assert_eq!(nfc(&decomposed), composed);
    }

    #[test]
    fn distinct_names_are_not_equivalent() {
        assert!(!canonical_eq("송도고.csv", "하늘고.csv"));
    }
}
