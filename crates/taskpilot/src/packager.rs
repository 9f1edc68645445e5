use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Archive the whole of `dir` into a zip at `archive_path`.
///
/// Returns `None` when `dir` does not exist. An existing archive is overwritten.
pub async fn package_workspace(dir: &Path, archive_path: &Path) -> Result<Option<PathBuf>> {
    let dir = dir.to_path_buf();
    let archive_path = archive_path.to_path_buf();
    tokio::task::spawn_blocking(move || package_dir(&dir, &archive_path))
        .await
        .context("packaging task failed")?
}

fn package_dir(dir: &Path, archive_path: &Path) -> Result<Option<PathBuf>> {
    if !dir.is_dir() {
        return Ok(None);
    }
    if let Some(parent) = archive_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let file = File::create(archive_path)
        .with_context(|| format!("failed to create {}", archive_path.display()))?;
    // the archive may live inside the directory it packs
    let archive_abs = archive_path.canonicalize().ok();
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut files = 0usize;
    for entry in WalkDir::new(dir).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        if archive_abs.is_some() && path.canonicalize().ok() == archive_abs {
            continue;
        }
        let name = entry_name(path.strip_prefix(dir)?);

        if entry.file_type().is_dir() {
            zip.add_directory(name, options)?;
        } else if entry.file_type().is_file() {
            zip.start_file(name, options)?;
            let mut source = File::open(path)?;
            io::copy(&mut source, &mut zip)?;
            files += 1;
        }
    }
    zip.finish()?;

    info!("packaged {} files from {} into {}", files, dir.display(), archive_path.display());
    Ok(Some(archive_path.to_path_buf()))
}

fn entry_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
