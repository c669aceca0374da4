//! Directory-backed corpus input.
//!
//! Every `*.txt` file directly inside the root becomes one [`CorpusEntry`]: the file
//! stem is the id, the file name is the source identifier, and the language
//! tag is the first `_<lowercase letters>_` segment of the name
//! (`cv_en_042.txt` -> `en`). Subdirectories are not descended, which keeps
//! stems unique.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::CorpusEntry;

const COMPONENT: &str = "corpus";
pub const UNKNOWN_LANGUAGE: &str = "unknown";

pub fn load_corpus_dir(root: &Path) -> Result<Vec<CorpusEntry>> {
    let files = list_txt_files(root)?;
    if files.is_empty() {
        tracing::warn!(root = %root.display(), "no .txt files found");
    }
    files.iter().map(|path| read_entry(path)).collect()
}

/// Number of `*.txt` documents directly inside `root`, or 0 when it does not exist.
pub fn count_corpus_dir(root: &Path) -> Result<usize> {
    if !root.exists() {
        return Ok(0);
    }
    Ok(list_txt_files(root)?.len())
}

fn read_entry(path: &Path) -> Result<CorpusEntry> {
    let bytes = fs::read(path).map_err(|e| Error::store(COMPONENT, format!("{}: {e}", path.display())))?;
    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    };
    let source = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let id = path
        .file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| source.clone());
    let language = language_from_name(&source);
    Ok(CorpusEntry { id, source, text, language })
}

pub fn language_from_name(name: &str) -> String {
    let parts: Vec<&str> = name.split('_').collect();
    // A tag needs an underscore on both sides, so skip the first and last pieces.
    if parts.len() < 3 {
        return UNKNOWN_LANGUAGE.to_string();
    }
    parts[1..parts.len() - 1]
        .iter()
        .find(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_lowercase()))
        .map_or_else(|| UNKNOWN_LANGUAGE.to_string(), |p| (*p).to_string())
}

fn list_txt_files(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(Error::store(COMPONENT, format!("{} is not a directory", root.display())));
    }
    let mut txt_files = Vec::new();
    for entry in walkdir::WalkDir::new(root).max_depth(1).into_iter().filter_map(std::result::Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("txt") {
            txt_files.push(path.to_path_buf());
        }
    }
    txt_files.sort();
    Ok(txt_files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_tag_from_file_name() {
        assert_eq!(language_from_name("cv_en_001.txt"), "en");
        assert_eq!(language_from_name("cv_fr_backend_2.txt"), "fr");
        assert_eq!(language_from_name("resume.txt"), UNKNOWN_LANGUAGE);
        assert_eq!(language_from_name("cv_EN_1.txt"), UNKNOWN_LANGUAGE);
        assert_eq!(language_from_name("cv_en.txt"), UNKNOWN_LANGUAGE);
    }
}
