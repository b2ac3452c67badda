use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::shared::constants::{
    EMBEDDING_MODEL_NAME, EMBEDDING_MODEL_URL, YOLO_MODEL_NAME, YOLO_MODEL_URL,
};

const APP_DIR: &str = "FaceVeil";
const DOWNLOAD_CHUNK: usize = 1024 * 1024;

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("failed to create model directory {path}: {source}")]
    CacheDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to write model to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not determine a cache directory for models")]
    NoCacheDir,
    #[error("model {name} not found in {}; it cannot be downloaded and must be copied there", dir.display())]
    Missing { name: &'static str, dir: PathBuf },
}

/// A model file and where to fetch it from. Models without a URL must be
/// copied into the models directory by hand.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModelSpec {
    pub name: &'static str,
    pub url: Option<&'static str>,
}

pub const DETECTION_MODEL: ModelSpec = ModelSpec {
    name: YOLO_MODEL_NAME,
    url: Some(YOLO_MODEL_URL),
};

pub const EMBEDDING_MODEL: ModelSpec = ModelSpec {
    name: EMBEDDING_MODEL_NAME,
    url: Some(EMBEDDING_MODEL_URL),
};

/// `(bytes_downloaded, total_bytes)`; total is 0 without a Content-Length.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send>;

/// Finds `spec` locally or downloads it.
///
/// Looks in `models_dir` first (when given), then the user cache dir, and
/// downloads into whichever of the two applies.
pub fn resolve(
    spec: &ModelSpec,
    models_dir: Option<&Path>,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    let target_dir = match models_dir {
        Some(dir) => dir.to_path_buf(),
        None => model_cache_dir()?,
    };
    if let Some(found) = find_existing(spec.name, &[target_dir.as_path()]) {
        return Ok(found);
    }
    let Some(url) = spec.url else {
        return Err(ModelResolveError::Missing {
            name: spec.name,
            dir: target_dir,
        });
    };

    fs::create_dir_all(&target_dir).map_err(|source| ModelResolveError::CacheDir {
        path: target_dir.clone(),
        source,
    })?;
    let dest = target_dir.join(spec.name);
    log::info!("Downloading {} to {}", spec.name, dest.display());
    download(url, &dest, progress)?;
    Ok(dest)
}

/// First `dir/name` that exists.
pub fn find_existing(name: &str, dirs: &[&Path]) -> Option<PathBuf> {
    dirs.iter()
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Per-user model cache: `<data dir>/FaceVeil/models` on macOS,
/// `<cache dir>/FaceVeil/models` elsewhere.
pub fn model_cache_dir() -> Result<PathBuf, ModelResolveError> {
    #[cfg(target_os = "macos")]
    let base = dirs::data_dir();
    #[cfg(not(target_os = "macos"))]
    let base = dirs::cache_dir();

    base.map(|d| d.join(APP_DIR).join("models"))
        .ok_or(ModelResolveError::NoCacheDir)
}

/// Streams `url` into `dest` through a `.part` file that is removed on failure.
fn download(url: &str, dest: &Path, progress: Option<ProgressFn>) -> Result<(), ModelResolveError> {
    let part = dest.with_extension("part");
    let result = stream_to(url, &part, progress).and_then(|()| {
        fs::rename(&part, dest).map_err(|source| ModelResolveError::Write {
            path: dest.to_path_buf(),
            source,
        })
    });
    if result.is_err() {
        let _ = fs::remove_file(&part);
    }
    result
}

fn stream_to(url: &str, part: &Path, progress: Option<ProgressFn>) -> Result<(), ModelResolveError> {
    let mut response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|source| ModelResolveError::Download {
            url: url.to_string(),
            source,
        })?;
    let total = response.content_length().unwrap_or(0);

    let write_err = |source| ModelResolveError::Write {
        path: part.to_path_buf(),
        source,
    };
    let mut file = fs::File::create(part).map_err(write_err)?;
    let mut buf = vec![0u8; DOWNLOAD_CHUNK];
    let mut downloaded = 0u64;
    loop {
        let n = response.read(&mut buf).map_err(write_err)?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n]).map_err(write_err)?;
        downloaded += n as u64;
        if let Some(cb) = &progress {
            cb(downloaded, total);
        }
    }
    file.flush().map_err(write_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_prefers_existing_file_in_models_dir() {
        let tmp = TempDir::new().unwrap();
        let model = tmp.path().join("face.onnx");
        fs::write(&model, b"weights").unwrap();

        let spec = ModelSpec {
            name: "face.onnx",
            url: Some("http://invalid.nonexistent.example.com/face.onnx"),
        };
        assert_eq!(resolve(&spec, Some(tmp.path()), None).unwrap(), model);
    }

    #[test]
    fn test_find_existing_checks_dirs_in_order() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        fs::write(b.path().join("m.onnx"), b"b").unwrap();
        assert_eq!(
            find_existing("m.onnx", &[a.path(), b.path()]),
            Some(b.path().join("m.onnx"))
        );
        fs::write(a.path().join("m.onnx"), b"a").unwrap();
        assert_eq!(
            find_existing("m.onnx", &[a.path(), b.path()]),
            Some(a.path().join("m.onnx"))
        );
        assert_eq!(find_existing("other.onnx", &[a.path()]), None);
    }

    #[test]
    fn test_model_cache_dir_is_app_scoped() {
        let dir = model_cache_dir().unwrap();
        assert!(dir.ends_with(Path::new(APP_DIR).join("models")));
    }

    #[test]
    fn test_failed_download_leaves_nothing_behind() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("model.onnx");
        let result = download("http://invalid.nonexistent.example.com/model", &dest, None);
        assert!(result.is_err());
        assert!(!dest.exists());
        assert!(!dest.with_extension("part").exists());
    }

    #[test]
    fn test_unreachable_model_is_a_download_error() {
        let tmp = TempDir::new().unwrap();
        let spec = ModelSpec {
            name: "missing.onnx",
            url: Some("http://invalid.nonexistent.example.com/missing.onnx"),
        };
        let err = resolve(&spec, Some(tmp.path()), None).unwrap_err();
        assert!(matches!(err, ModelResolveError::Download { .. }));
    }

    #[test]
    fn test_model_without_url_must_be_present() {
        let tmp = TempDir::new().unwrap();
        let spec = ModelSpec {
            name: "private.onnx",
            url: None,
        };
        let err = resolve(&spec, Some(tmp.path()), None).unwrap_err();
        assert!(matches!(err, ModelResolveError::Missing { .. }));
        assert!(err.to_string().contains("private.onnx"));

        fs::write(tmp.path().join("private.onnx"), b"weights").unwrap();
        assert!(resolve(&spec, Some(tmp.path()), None).is_ok());
    }
}
