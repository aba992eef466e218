//! Write package parts to disk.

use std::path::{Path, PathBuf};

use crate::package::{Package, PackagePart};

/// Export a single part to `output_dir`, named after its content-id.
pub fn export_part(part: &PackagePart, output_dir: &Path) -> anyhow::Result<PathBuf> {
    let filename = part_filename(&part.content_id, &part.content_type);
    let path = unique_path(&output_dir.join(&filename));
    std::fs::write(&path, &part.data)?;
    Ok(path)
}

/// Export the root document and every attachment part of a package.
///
/// The root is written as `root.xml`; attachments keep their content-ids
/// as file names. The progress callback receives `(current, total)`.
pub fn export_package_parts(
    package: &Package,
    output_dir: &Path,
    progress: &dyn Fn(usize, usize),
) -> anyhow::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)?;
    let mut paths = Vec::with_capacity(package.parts.len() + 1);

    let root_path = unique_path(&output_dir.join("root.xml"));
    std::fs::write(&root_path, &package.root)?;
    paths.push(root_path);

    let total = package.parts.len();
    for (i, part) in package.parts.iter().enumerate() {
        progress(i, total);
        match export_part(part, output_dir) {
            Ok(path) => paths.push(path),
            Err(e) => {
                tracing::warn!(
                    content_id = %part.content_id,
                    error = %e,
                    "Failed to export part"
                );
            }
        }
    }
    progress(total, total);

    Ok(paths)
}

/// File name for a part: sanitized content-id plus an extension guessed
/// from the content type.
pub fn part_filename(content_id: &str, content_type: &str) -> String {
    let stem = sanitize_filename_part(content_id, 150);
    match extension_for(content_type) {
        Some(ext) => format!("{stem}.{ext}"),
        None => stem,
    }
}

/// Known `(content type, extension)` pairs. The first entry for a content
/// type is its preferred extension.
const EXTENSIONS: &[(&str, &str)] = &[
    ("image/png", "png"),
    ("image/jpeg", "jpg"),
    ("image/jpeg", "jpeg"),
    ("image/gif", "gif"),
    ("application/pdf", "pdf"),
    ("application/xml", "xml"),
    ("text/xml", "xml"),
    ("text/plain", "txt"),
    ("application/json", "json"),
    ("application/zip", "zip"),
    ("application/octet-stream", "bin"),
];

fn extension_for(content_type: &str) -> Option<&'static str> {
    let essence = content_type.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    EXTENSIONS
        .iter()
        .find(|(ct, _)| *ct == essence)
        .map(|(_, ext)| *ext)
}

/// Guess a content type from a file extension, falling back to
/// `application/octet-stream`.
pub fn content_type_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    EXTENSIONS
        .iter()
        .find(|(_, e)| *e == ext)
        .map(|(ct, _)| *ct)
        .unwrap_or(crate::model::payload::DEFAULT_CONTENT_TYPE)
}

/// Sanitize a string for use in filenames.
///
/// Replaces invalid characters with `_` and truncates to `max_len`.
pub fn sanitize_filename_part(s: &str, max_len: usize) -> String {
    let sanitized: String = s
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '.' || c == '_' || c == '@' {
                c
            } else {
                '_'
            }
        })
        .take(max_len)
        .collect();

    if sanitized.is_empty() {
        "unknown".to_string()
    } else {
        sanitized
    }
}

/// If `path` already exists, append a counter to make it unique.
pub fn unique_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("file");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let parent = path.parent().unwrap_or(Path::new("."));

    for i in 1..1000 {
        let candidate = if ext.is_empty() {
            parent.join(format!("{stem}_{i}"))
        } else {
            parent.join(format!("{stem}_{i}.{ext}"))
        };
        if !candidate.exists() {
            return candidate;
        }
    }

    // Fallback — very unlikely
    parent.join(format!("{stem}_dup.{ext}"))
}
