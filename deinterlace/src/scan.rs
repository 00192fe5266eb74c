//! Input scanning.
//!
//! Walks the input tree, keeps every movie-container file, and mirrors the
//! subdirectory structure beneath the output root. Hidden entries are
//! skipped at any depth.

use crate::error::{BatchError, Result};
use deinterlace_media::MovieIoRegistry;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use walkdir::WalkDir;

/// Extensions of the public movie-container family.
pub const MOVIE_EXTENSIONS: &[&str] = &["avi", "dv", "m4v", "mov", "mp4", "y4m"];

/// Output extension when the input's backend does not declare one.
const DEFAULT_OUTPUT_EXTENSION: &str = "mov";

/// One scanned movie: where it is and where its progressive copy goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedMovie {
    /// The input movie path.
    pub input: PathBuf,
    /// The mirrored output path.
    pub output: PathBuf,
}

/// Check whether a path carries a movie-container extension.
pub fn is_movie_path(path: &Path) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .map(|e| MOVIE_EXTENSIONS.contains(&e.as_str()))
        .unwrap_or(false)
}

/// The default output root: a sibling of the input root with a
/// `_deinterlaced` suffix.
pub fn default_output_root(input_root: &Path) -> PathBuf {
    let name = input_root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "input".to_string());
    input_root.with_file_name(format!("{name}_deinterlaced"))
}

/// Recursively enumerate the movies beneath `input_root`, in path order,
/// with their output paths mirrored beneath `output_root`.
///
/// Intermediate output directories are created as a side effect, so jobs
/// can open their outputs without racing on directory creation.
pub fn scan_inputs(
    input_root: &Path,
    output_root: Option<&Path>,
    registry: &MovieIoRegistry,
) -> Result<Vec<ScannedMovie>> {
    if !input_root.is_dir() {
        return Err(BatchError::InvalidInput(input_root.to_path_buf()));
    }
    let output_root = output_root
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_output_root(input_root));

    let mut movies = Vec::new();
    let walker = WalkDir::new(input_root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry.file_name()));

    for entry in walker {
        let entry = entry.map_err(|e| {
            BatchError::Io(e.into_io_error().unwrap_or_else(|| {
                std::io::Error::other("walk error")
            }))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if !is_movie_path(path) {
            trace!(path = %path.display(), "skipping non-movie file");
            continue;
        }

        let Ok(relative) = path.strip_prefix(input_root) else {
            continue;
        };
        let extension = registry
            .for_path(path)
            .map(|provider| provider.output_extension().to_string())
            .unwrap_or_else(|_| DEFAULT_OUTPUT_EXTENSION.to_string());
        let output = output_root
            .join(relative)
            .with_extension(extension);

        debug!(input = %path.display(), output = %output.display(), "found movie");
        movies.push(ScannedMovie {
            input: path.to_path_buf(),
            output,
        });
    }

    movies.sort_by(|a, b| a.input.cmp(&b.input));

    if movies.is_empty() {
        return Err(BatchError::NoMovies(input_root.to_path_buf()));
    }

    for movie in &movies {
        if let Some(parent) = movie.output.parent() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(movies)
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}
