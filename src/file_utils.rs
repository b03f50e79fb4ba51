use std::fs;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub(crate) const VIDEO_EXTENSIONS: &[&str] =
    &["mp4", "mkv", "webm", "mov", "avi", "m4v", "flv", "wmv"];

pub(crate) fn read_json_file<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let file = fs::File::open(path)
        .with_context(|| format!("failed to open json file {}", path.display()))?;
    let reader = BufReader::new(file);
    serde_json::from_reader(reader)
        .with_context(|| format!("failed to parse json from {}", path.display()))
}

pub(crate) fn write_json_file<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let tmp_path = path.with_extension("tmp");
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    let file = fs::File::create(&tmp_path)
        .with_context(|| format!("failed to create temp file {}", tmp_path.display()))?;
    serde_json::to_writer_pretty(&file, value)
        .with_context(|| format!("failed to write json to {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| {
        format!(
            "failed to atomically rename {} -> {}",
            tmp_path.display(),
            path.display()
        )
    })?;
    Ok(())
}

/// Best-effort read that treats a missing or unparsable file as "no prior state".
pub(crate) fn read_json_file_opt<T: for<'de> Deserialize<'de>>(path: &Path) -> Option<T> {
    if !path.exists() {
        return None;
    }
    match read_json_file(path) {
        Ok(v) => Some(v),
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "failed to read json file, treating as absent");
            None
        }
    }
}

pub(crate) fn is_video_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .map(|e| VIDEO_EXTENSIONS.contains(&e.as_str()))
        .unwrap_or(false)
}

pub(crate) fn is_video_mime(path: &Path) -> bool {
    mime_guess::from_path(path)
        .first()
        .map(|m| m.type_() == mime_guess::mime::VIDEO)
        .unwrap_or(false)
}

pub(crate) fn is_video_file(path: &Path, extra_extensions: &[String]) -> bool {
    if is_video_extension(path) {
        return true;
    }
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        let ext = ext.to_ascii_lowercase();
        if extra_extensions
            .iter()
            .any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(&ext))
        {
            return true;
        }
    }
    is_video_mime(path)
}

pub(crate) fn mime_for_path(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        value: u32,
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.json");
        write_json_file(&path, &Sample { value: 42 }).unwrap();
        let loaded: Sample = read_json_file(&path).unwrap();
        assert_eq!(loaded, Sample { value: 42 });
    }

    #[test]
    fn read_opt_returns_none_for_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let loaded: Option<Sample> = read_json_file_opt(&path);
        assert!(loaded.is_none());
    }

    #[test]
    fn recognizes_video_extensions_and_rejects_others() {
        assert!(is_video_extension(Path::new("movie.mp4")));
        assert!(is_video_extension(Path::new("movie.MKV")));
        assert!(!is_video_extension(Path::new("notes.txt")));
    }

    #[test]
    fn extra_extensions_extend_detection() {
        let extra = vec![".ts".to_string()];
        assert!(is_video_file(Path::new("clip.ts"), &extra));
        assert!(!is_video_file(Path::new("clip.ts"), &[]));
    }
}
