//! Sandbox module for path validation and security
//!
//! Every caller-supplied path goes through [`Sandbox::resolve`] before it
//! touches the filesystem. Resolution is two-staged: a lexical pass rejects
//! `..` escapes (even for paths that do not exist), then canonicalization
//! follows symlinks and the real path is checked against the canonical base.

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::types::{FsError, FsResult};

/// A canonical path proven to lie inside the sandbox
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedPath {
    absolute: PathBuf,
    relative: String,
}

impl ResolvedPath {
    pub fn as_path(&self) -> &Path {
        &self.absolute
    }

    /// Path relative to the base directory (`.` for the base itself)
    pub fn relative(&self) -> &str {
        &self.relative
    }

    pub fn is_base(&self) -> bool {
        self.relative == "."
    }
}

impl AsRef<Path> for ResolvedPath {
    fn as_ref(&self) -> &Path {
        &self.absolute
    }
}

impl fmt::Display for ResolvedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.relative)
    }
}

/// The base directory every operation is confined to
#[derive(Debug, Clone)]
pub struct Sandbox {
    inner: Arc<SandboxInner>,
}

#[derive(Debug)]
struct SandboxInner {
    /// Canonical base directory
    base: PathBuf,
    /// Base as configured, when it differs from the canonical form
    /// (e.g. a symlinked home or `/tmp` on macOS)
    alias: Option<PathBuf>,
}

impl Sandbox {
    /// Create a sandbox rooted at `base_dir`, which must be an existing directory
    pub fn new(base_dir: impl AsRef<Path>) -> FsResult<Self> {
        let configured = base_dir.as_ref();
        let absolute = if configured.is_absolute() {
            configured.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(|e| FsError::Config(format!("Cannot read working directory: {}", e)))?
                .join(configured)
        };

        let base = absolute.canonicalize().map_err(|e| {
            FsError::Config(format!(
                "Base directory {} is not accessible: {}",
                configured.display(),
                e
            ))
        })?;

        if !base.is_dir() {
            return Err(FsError::Config(format!(
                "Base directory {} is not a directory",
                configured.display()
            )));
        }

        let alias = normalize_lexically(&absolute).filter(|a| *a != base);

        Ok(Self {
            inner: Arc::new(SandboxInner { base, alias }),
        })
    }

    /// Canonical base directory
    pub fn base(&self) -> &Path {
        &self.inner.base
    }

    /// Resolve a caller-supplied path to an existing in-sandbox location
    pub fn resolve(&self, raw: &str) -> FsResult<ResolvedPath> {
        if raw.contains('\0') {
            return Err(FsError::InvalidInput("Path contains null byte".to_string()));
        }

        let relative = self.lexical_relative(raw)?;
        let joined = self.inner.base.join(&relative);
        let display = display_relative(&relative);

        let canonical = joined
            .canonicalize()
            .map_err(|e| FsError::from_io(&e, &display))?;

        self.admit(canonical).ok_or_else(|| {
            tracing::warn!(path = %raw, "Symlink escape attempt blocked");
            FsError::PathEscape(raw.to_string())
        })
    }

    /// True if `path` is the base or lies beneath it (component-wise)
    pub fn contains(&self, path: &Path) -> bool {
        path.starts_with(&self.inner.base)
    }

    /// Canonicalize a path found during traversal and keep it only if the
    /// real location is still inside the sandbox
    pub fn revalidate(&self, path: &Path) -> Option<ResolvedPath> {
        let canonical = path.canonicalize().ok()?;
        self.admit(canonical)
    }

    /// Sandbox-relative form of an absolute path, without touching the
    /// filesystem; `None` when the path lies outside
    pub fn relative(&self, path: &Path) -> Option<String> {
        let normalized = normalize_lexically(path)?;
        let bases = std::iter::once(&self.inner.base).chain(self.inner.alias.as_ref());
        for base in bases {
            if let Ok(rest) = normalized.strip_prefix(base) {
                return Some(display_relative(rest));
            }
        }
        None
    }

    fn admit(&self, canonical: PathBuf) -> Option<ResolvedPath> {
        let relative = canonical.strip_prefix(&self.inner.base).ok()?;
        let relative = display_relative(relative);
        Some(ResolvedPath {
            absolute: canonical,
            relative,
        })
    }

    /// Lexical stage: produce a normalized path relative to the base or
    /// reject the input as an escape
    fn lexical_relative(&self, raw: &str) -> FsResult<PathBuf> {
        let requested = Path::new(raw);

        if requested.is_absolute() {
            let normalized = normalize_lexically(requested)
                .ok_or_else(|| self.escape(raw, "absolute path climbs above root"))?;
            let bases = std::iter::once(&self.inner.base).chain(self.inner.alias.as_ref());
            for base in bases {
                if let Ok(rest) = normalized.strip_prefix(base) {
                    return Ok(rest.to_path_buf());
                }
            }
            return Err(self.escape(raw, "absolute path outside base"));
        }

        let mut relative = PathBuf::new();
        for component in requested.components() {
            match component {
                Component::CurDir => {}
                Component::ParentDir => {
                    if !relative.pop() {
                        return Err(self.escape(raw, "'..' climbs above base"));
                    }
                }
                Component::Normal(part) => relative.push(part),
                // Prefixes and roots only appear in absolute paths
                Component::Prefix(_) | Component::RootDir => {
                    return Err(self.escape(raw, "unexpected root component"));
                }
            }
        }
        Ok(relative)
    }

    fn escape(&self, raw: &str, reason: &str) -> FsError {
        tracing::warn!(path = %raw, reason, "Attempted access outside base directory");
        FsError::PathEscape(raw.to_string())
    }
}

/// Remove `.` and fold `..` without consulting the filesystem. Returns
/// `None` if `..` would climb above the root.
fn normalize_lexically(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // Never pop the root itself
                if !out.pop() || out.as_os_str().is_empty() {
                    return None;
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    Some(out)
}

fn display_relative(path: &Path) -> String {
    if path.as_os_str().is_empty() {
        ".".to_string()
    } else {
        path.to_string_lossy().replace('\\', "/")
    }
}
