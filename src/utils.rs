//! Utility functions for cross-platform path handling

use std::io;
use std::path::{Component, Path, PathBuf};

/// Resolve a rendered output path to an absolute, lexically normalized path
///
/// Relative paths are anchored at the current working directory. `.` segments
/// are dropped and `..` segments pop their parent without touching the
/// filesystem (a `..` at the root stays at the root).
///
/// Rejects:
/// - empty or whitespace-only input
/// - paths that resolve to a filesystem root (`/`, `/tmp/..`, `C:\`)
pub fn resolve_output_path(raw: &str) -> io::Result<PathBuf> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return Err(invalid("resolved path is empty/invalid"));
  }

  let candidate = Path::new(trimmed);
  let absolute = if candidate.is_absolute() {
    candidate.to_path_buf()
  } else {
    std::env::current_dir()?.join(candidate)
  };

  let normalized = normalize_lexically(&absolute);
  if !normalized.components().any(|c| matches!(c, Component::Normal(_))) {
    return Err(invalid("resolved path is root and is not allowed"));
  }
  Ok(normalized)
}

/// Collapse `.` and `..` without resolving symlinks
pub fn normalize_lexically(path: &Path) -> PathBuf {
  let mut out = PathBuf::new();
  for component in path.components() {
    match component {
      Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
      Component::CurDir => {}
      Component::ParentDir => {
        // Never pop the prefix or root itself.
        if matches!(out.components().next_back(), Some(Component::Normal(_))) {
          out.pop();
        }
      }
      Component::Normal(part) => out.push(part),
    }
  }
  out
}

fn invalid(message: &str) -> io::Error {
  io::Error::new(io::ErrorKind::InvalidInput, message)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  #[cfg(not(target_os = "windows"))]
  fn test_absolute_paths_are_normalized() {
    let path = resolve_output_path("/srv/./app/../conf/a.txt").unwrap();
    assert_eq!(path, PathBuf::from("/srv/conf/a.txt"));
  }

  #[test]
  fn test_relative_paths_anchor_at_cwd() {
    let path = resolve_output_path("out/x.txt").unwrap();
    assert!(path.is_absolute());
    assert!(path.ends_with("out/x.txt"));
  }

  #[test]
  fn test_empty_is_rejected() {
    let err = resolve_output_path("   ").unwrap_err();
    assert_eq!(err.to_string(), "resolved path is empty/invalid");
  }

  #[test]
  #[cfg(not(target_os = "windows"))]
  fn test_root_is_rejected() {
    for raw in ["/", "/tmp/..", "/../..", "/./"] {
      let err = resolve_output_path(raw).unwrap_err();
      assert_eq!(err.to_string(), "resolved path is root and is not allowed", "{}", raw);
    }
  }

  #[test]
  #[cfg(not(target_os = "windows"))]
  fn test_parent_never_escapes_root() {
    assert_eq!(normalize_lexically(Path::new("/../../etc/x")), PathBuf::from("/etc/x"));
  }
}
