//! On-disk tree layout under one store's cache root (§4.5): folder
//! directories, each holding `messages/` and `archive/`, with fixed
//! per-message filenames. Mutating writes go to a temp file and rename into
//! place so readers never observe a torn write.

use crate::error::{MailCacheError, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub const MESSAGES_DIR: &str = "messages";
pub const ARCHIVE_DIR: &str = "archive";
pub const ATTACHMENTS_DIR: &str = "attachments";
pub const HEADERS_FILE: &str = "headers.properties";
pub const CONTENT_TXT_FILE: &str = "content.txt";
pub const CONTENT_HTML_FILE: &str = "content.html";
pub const FLAGS_FILE: &str = "flags.properties";
pub const RAW_FILE: &str = "raw.eml";

/// Path helpers rooted at one store's cache directory.
#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory for a folder, given its slash-delimited path components.
    pub fn folder_dir(&self, folder_path: &str) -> PathBuf {
        let mut dir = self.root.clone();
        for part in folder_path.split('/').filter(|p| !p.is_empty()) {
            dir.push(part);
        }
        dir
    }

    pub fn messages_dir(&self, folder_path: &str) -> PathBuf {
        self.folder_dir(folder_path).join(MESSAGES_DIR)
    }

    pub fn message_dir(&self, folder_path: &str, message_dir_name: &str) -> PathBuf {
        self.messages_dir(folder_path).join(message_dir_name)
    }

    pub fn headers_file(&self, message_dir: &Path) -> PathBuf {
        message_dir.join(HEADERS_FILE)
    }

    pub fn content_txt_file(&self, message_dir: &Path) -> PathBuf {
        message_dir.join(CONTENT_TXT_FILE)
    }

    pub fn content_html_file(&self, message_dir: &Path) -> PathBuf {
        message_dir.join(CONTENT_HTML_FILE)
    }

    pub fn flags_file(&self, message_dir: &Path) -> PathBuf {
        message_dir.join(FLAGS_FILE)
    }

    pub fn raw_file(&self, message_dir: &Path) -> PathBuf {
        message_dir.join(RAW_FILE)
    }

    pub fn attachments_dir(&self, message_dir: &Path) -> PathBuf {
        message_dir.join(ATTACHMENTS_DIR)
    }

    /// The root-level archive directory, reserved and never treated as a
    /// folder or iterated over by folder listing.
    pub fn archive_root(&self) -> PathBuf {
        self.root.join(ARCHIVE_DIR)
    }

    /// A fresh, timestamp-disambiguated archival destination for `name`
    /// under `archive/`, so concurrent archivals of identically named items
    /// never collide (§5).
    pub fn archive_destination(&self, name: &str, disambiguator: u128) -> PathBuf {
        self.archive_root().join(disambiguator.to_string()).join(name)
    }
}

/// Create `dir` and all of its parents.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| MailCacheError::io(dir, e))
}

/// Write `contents` to `path` via a sibling temp file followed by a rename,
/// so a reader never observes a partially written file. Grounded in the
/// maildir UID list's own temp-then-rename save routine, generalized to any
/// message-directory file.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = path.parent().ok_or_else(|| MailCacheError::InvalidState(format!("{path:?} has no parent")))?;
    ensure_dir(dir)?;
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, contents).map_err(|e| MailCacheError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        MailCacheError::io(path, e)
    })
}

/// Recursively move `from` to `to`, creating `to`'s parent directories
/// first. Used for archival deletes of folders and messages. Falls back to
/// copy-then-remove when `from` and `to` cross filesystems.
pub fn move_dir(from: &Path, to: &Path) -> Result<()> {
    if let Some(parent) = to.parent() {
        ensure_dir(parent)?;
    }
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(_) => {
            copy_dir_recursive(from, to)?;
            fs::remove_dir_all(from).map_err(|e| MailCacheError::io(from, e))
        }
    }
}

fn copy_dir_recursive(from: &Path, to: &Path) -> Result<()> {
    ensure_dir(to)?;
    for entry in fs::read_dir(from).map_err(|e| MailCacheError::io(from, e))? {
        let entry = entry.map_err(|e| MailCacheError::io(from, e))?;
        let src = entry.path();
        let dest = to.join(entry.file_name());
        let file_type = entry.file_type().map_err(|e| MailCacheError::io(&src, e))?;
        if file_type.is_dir() {
            copy_dir_recursive(&src, &dest)?;
        } else {
            fs::copy(&src, &dest).map_err(|e| MailCacheError::io(&src, e))?;
        }
    }
    Ok(())
}

/// Total byte size and file count under `dir`, walked recursively.
pub fn walk_size(dir: &Path) -> Result<(u64, u64)> {
    let mut total_bytes = 0u64;
    let mut file_count = 0u64;
    if !dir.exists() {
        return Ok((0, 0));
    }
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        for entry in fs::read_dir(&current).map_err(|e| MailCacheError::io(&current, e))? {
            let entry = entry.map_err(|e| MailCacheError::io(&current, e))?;
            let path = entry.path();
            let file_type = entry.file_type().map_err(|e| MailCacheError::io(&path, e))?;
            if file_type.is_dir() {
                stack.push(path);
            } else {
                let meta = entry.metadata().map_err(|e| MailCacheError::io(&path, e))?;
                total_bytes += meta.len();
                file_count += 1;
            }
        }
    }
    Ok((total_bytes, file_count))
}
