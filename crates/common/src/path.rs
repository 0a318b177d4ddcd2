//! Lexical path rules shared by proxy and server
//!
//! Client paths are always interpreted relative to the server root. A path is
//! normalized without touching the filesystem: empty and `.` components are
//! dropped and `..` pops the previous component. A path whose `..` components
//! would climb above the root is rejected.

/// Errors produced while normalizing a client path
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("path is empty")]
    Empty,
    #[error("path escapes the permitted root: {0}")]
    EscapesRoot(String),
}

/// Normalize a client path into its canonical relative form.
///
/// The root itself normalizes to the empty string.
///
/// ```
/// use common::path::normalize;
///
/// assert_eq!(normalize("/a/./b//c").unwrap(), "a/b/c");
/// assert_eq!(normalize("a/b/../c").unwrap(), "a/c");
/// assert!(normalize("../etc/passwd").is_err());
/// ```
pub fn normalize(path: &str) -> Result<String, PathError> {
    if path.is_empty() {
        return Err(PathError::Empty);
    }

    let mut parts: Vec<&str> = Vec::new();
    for component in path.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                if parts.pop().is_none() {
                    return Err(PathError::EscapesRoot(path.to_string()));
                }
            }
            other => parts.push(other),
        }
    }

    Ok(parts.join("/"))
}

/// Return true when `path` stays inside the root after normalization.
pub fn is_confined(path: &str) -> bool {
    normalize(path).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_plain() {
        assert_eq!(normalize("foo").unwrap(), "foo");
        assert_eq!(normalize("/foo").unwrap(), "foo");
        assert_eq!(normalize("/foo/").unwrap(), "foo");
        assert_eq!(normalize("foo/bar.txt").unwrap(), "foo/bar.txt");
    }

    #[test]
    fn test_normalize_dots() {
        assert_eq!(normalize("./foo/./bar").unwrap(), "foo/bar");
        assert_eq!(normalize("foo/../bar").unwrap(), "bar");
        assert_eq!(normalize("foo/bar/..").unwrap(), "foo");
    }

    #[test]
    fn test_root() {
        assert_eq!(normalize("/").unwrap(), "");
        assert_eq!(normalize(".").unwrap(), "");
        assert_eq!(normalize("foo/..").unwrap(), "");
    }

    #[test]
    fn test_rejects_empty() {
        assert_eq!(normalize(""), Err(PathError::Empty));
    }

    #[test]
    fn test_rejects_escape() {
        assert!(matches!(normalize(".."), Err(PathError::EscapesRoot(_))));
        assert!(matches!(normalize("../x"), Err(PathError::EscapesRoot(_))));
        assert!(matches!(normalize("/../x"), Err(PathError::EscapesRoot(_))));
        assert!(matches!(normalize("a/../../x"), Err(PathError::EscapesRoot(_))));
        assert!(!is_confined("a/../../x"));
        assert!(is_confined("a/../x"));
    }
}
