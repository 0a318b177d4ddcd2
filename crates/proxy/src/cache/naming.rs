//! Physical file names inside the cache directory
//!
//! Read-only copies are named `<escaped>_rdonly_<version>` and write copies
//! `<escaped>_wr_<handle>`, where `<escaped>` is the logical path with `%`
//! doubled and every `/` replaced by `%_`. The escaping is reversible, so a
//! physical name can always be traced back to its logical path.

use std::path::{Path, PathBuf};

const READ_ONLY_TAG: &str = "_rdonly_";
const WRITE_TAG: &str = "_wr_";

/// What a parsed physical file name refers to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhysicalName {
    ReadOnly { logical: String, version: u64 },
    Write { logical: String, handle: u64 },
}

pub fn escape(logical: &str) -> String {
    let mut out = String::with_capacity(logical.len());
    for c in logical.chars() {
        match c {
            '%' => out.push_str("%%"),
            '/' => out.push_str("%_"),
            other => out.push(other),
        }
    }
    out
}

pub fn unescape(escaped: &str) -> Option<String> {
    let mut out = String::with_capacity(escaped.len());
    let mut chars = escaped.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('%') => out.push('%'),
            Some('_') => out.push('/'),
            _ => return None,
        }
    }
    Some(out)
}

pub fn read_only_path(cache_dir: &Path, logical: &str, version: u64) -> PathBuf {
    cache_dir.join(format!("{}{}{}", escape(logical), READ_ONLY_TAG, version))
}

pub fn write_path(cache_dir: &Path, logical: &str, handle: u64) -> PathBuf {
    cache_dir.join(format!("{}{}{}", escape(logical), WRITE_TAG, handle))
}

/// Parse a file name produced by [`read_only_path`] or [`write_path`].
pub fn parse(file_name: &str) -> Option<PhysicalName> {
    if let Some((escaped, version)) = split_tagged(file_name, READ_ONLY_TAG) {
        return Some(PhysicalName::ReadOnly {
            logical: unescape(escaped)?,
            version,
        });
    }
    if let Some((escaped, handle)) = split_tagged(file_name, WRITE_TAG) {
        return Some(PhysicalName::Write {
            logical: unescape(escaped)?,
            handle,
        });
    }
    None
}

fn split_tagged<'a>(file_name: &'a str, tag: &str) -> Option<(&'a str, u64)> {
    let idx = file_name.rfind(tag)?;
    let number = file_name[idx + tag.len()..].parse().ok()?;
    Some((&file_name[..idx], number))
}
