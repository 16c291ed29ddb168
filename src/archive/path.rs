//! Entry path construction for archive members.
//!
//! Display names come from user-controlled metadata, so every name segment is
//! stripped of characters that are unsafe in file names on common platforms.
//! Only that fixed set is removed: `..` segments are left untouched.

use super::FileDescriptor;

/// Characters removed from every sanitized name
pub const UNSAFE_CHARS: [char; 10] = ['#', '<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Fallback when a file name sanitizes to nothing
pub const FILE_FALLBACK: &str = "file";

/// Fallback when a project name sanitizes to nothing
pub const PROJECT_FALLBACK: &str = "Project";

/// Fallback for the overall download name
pub const DOWNLOAD_FALLBACK: &str = "download.zip";

/// Strip [`UNSAFE_CHARS`] from `raw`, returning `fallback` if nothing is left
pub fn sanitize(raw: &str, fallback: &str) -> String {
    let cleaned: String = raw.chars().filter(|c| !UNSAFE_CHARS.contains(c)).collect();
    if cleaned.is_empty() {
        fallback.to_string()
    } else {
        cleaned
    }
}

pub fn sanitize_file_name(raw: &str) -> String {
    sanitize(raw, FILE_FALLBACK)
}

pub fn sanitize_project_name(raw: &str) -> String {
    sanitize(raw, PROJECT_FALLBACK)
}

pub fn sanitize_download_name(raw: &str) -> String {
    sanitize(raw, DOWNLOAD_FALLBACK)
}

/// Split a folder on `/` and sanitize each segment, dropping empty ones
fn sanitize_folder(folder: &str) -> Vec<String> {
    folder
        .split('/')
        .map(|segment| sanitize(segment, ""))
        .filter(|segment| !segment.is_empty())
        .collect()
}

/// Build the path of a descriptor inside the archive.
///
/// Layout is `[{project_id}.{project_name}/][{folder}/]{file_name}`. The
/// project prefix only appears for a positive project id. Folder `/`s are
/// structural: each segment is sanitized on its own and empty segments are
/// dropped, so the result never starts with `/` and never contains `//`.
pub fn build_entry_path(descriptor: &FileDescriptor) -> String {
    let mut path = String::new();

    if let Some(project_id) = descriptor.grouping_project() {
        let project = sanitize_project_name(descriptor.project_name.as_deref().unwrap_or(""));
        path.push_str(&format!("{project_id}.{project}/"));
    }

    if let Some(folder) = descriptor.folder.as_deref() {
        for segment in sanitize_folder(folder) {
            path.push_str(&segment);
            path.push('/');
        }
    }

    path.push_str(&sanitize_file_name(&descriptor.file_name));
    path
}
