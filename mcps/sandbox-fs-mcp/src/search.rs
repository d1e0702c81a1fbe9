//! File search
//!
//! [`search`] compiles the query and returns a lazy [`SearchIter`]. Nothing
//! is walked until the iterator is polled, so a caller that only wants the
//! first few hits stops the walk early by dropping it.
//!
//! Order is depth-first with siblings sorted by file name, which keeps
//! results reproducible for a given tree. Only regular files are reported.

use std::fs;
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use regex::Regex;
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

use crate::sandbox::{ResolvedPath, Sandbox};
use crate::types::{FsError, FsResult, SearchResult};

/// Longest snippet returned for a content match, in characters
pub const SNIPPET_MAX_CHARS: usize = 200;

const GLOB_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

#[derive(Debug, Clone)]
pub struct SearchQuery {
    /// Glob matched against file names. A pattern containing `/` matches
    /// the path relative to the search root; recursive searches also try it
    /// below every subdirectory.
    pub pattern: String,
    pub recursive: bool,
    /// Only files with a line matching this regex are reported
    pub content_regex: Option<String>,
    /// Depth limit for recursive walks
    pub max_depth: usize,
    /// Files larger than this are not scanned for content
    pub max_file_bytes: u64,
}

impl SearchQuery {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            recursive: true,
            content_regex: None,
            max_depth: 32,
            max_file_bytes: 10 * 1024 * 1024,
        }
    }
}

/// What the glob is matched against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchScope {
    FileName,
    /// Path relative to the search root
    RootPath,
    /// Relative path or any of its trailing component runs
    AnySubpath,
}

/// Start a search under `root`
///
/// Fails up front on a bad glob or regex, or if `root` is not a directory.
pub fn search(sandbox: &Sandbox, root: &ResolvedPath, query: &SearchQuery) -> FsResult<SearchIter> {
    let glob = query.pattern.trim_start_matches("./");
    let pattern = Pattern::new(glob)
        .map_err(|e| FsError::InvalidPattern(format!("glob '{}': {}", query.pattern, e.msg)))?;

    let content = query
        .content_regex
        .as_deref()
        .map(|re| {
            Regex::new(re).map_err(|e| FsError::InvalidPattern(format!("regex '{}': {}", re, e)))
        })
        .transpose()?;

    let metadata =
        fs::metadata(root.as_path()).map_err(|e| FsError::from_io(&e, root.relative()))?;
    if !metadata.is_dir() {
        return Err(FsError::NotADirectory(root.relative().to_string()));
    }

    let depth_cap = query.max_depth.max(1);
    let (scope, max_depth) = match (glob.contains('/'), query.recursive) {
        (false, true) => (MatchScope::FileName, depth_cap),
        (false, false) => (MatchScope::FileName, 1),
        (true, true) => (MatchScope::AnySubpath, depth_cap),
        (true, false) => (MatchScope::RootPath, pattern_depth(glob, depth_cap)),
    };
    let walker = WalkDir::new(root.as_path())
        .min_depth(1)
        .max_depth(max_depth)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter();

    Ok(SearchIter {
        sandbox: sandbox.clone(),
        root: root.as_path().to_path_buf(),
        walker,
        scope,
        pattern,
        content,
        max_file_bytes: query.max_file_bytes,
        cancel: None,
    })
}

/// Lazy stream of search hits
pub struct SearchIter {
    sandbox: Sandbox,
    root: PathBuf,
    walker: walkdir::IntoIter,
    pattern: Pattern,
    scope: MatchScope,
    content: Option<Regex>,
    max_file_bytes: u64,
    cancel: Option<CancellationToken>,
}

impl SearchIter {
    /// Stop yielding once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|t| t.is_cancelled())
    }

    fn name_matches(&self, path: &Path) -> bool {
        let Ok(rel) = path.strip_prefix(&self.root) else {
            return false;
        };
        match self.scope {
            MatchScope::FileName => rel.file_name().is_some_and(|name| {
                self.pattern
                    .matches_with(&name.to_string_lossy(), GLOB_OPTIONS)
            }),
            MatchScope::RootPath => self.pattern.matches_path_with(rel, GLOB_OPTIONS),
            MatchScope::AnySubpath => {
                let depth = rel.components().count();
                (0..depth).any(|skip| {
                    let tail: PathBuf = rel.components().skip(skip).collect();
                    self.pattern.matches_path_with(&tail, GLOB_OPTIONS)
                })
            }
        }
    }

    /// Build the hit for one walked entry, or `None` if it does not qualify
    fn evaluate(&self, entry: &walkdir::DirEntry) -> Option<SearchResult> {
        let path = entry.path();
        if !self.name_matches(path) {
            return None;
        }

        // A link found mid-walk may point anywhere; check where it lands
        let resolved = self.sandbox.revalidate(path)?;
        let reported = self.sandbox.relative(path)?;

        // Directories, pipes and devices are never results
        let metadata = fs::metadata(resolved.as_path()).ok()?;
        if !metadata.is_file() {
            return None;
        }
        let size_bytes = metadata.len();

        let Some(regex) = &self.content else {
            return Some(SearchResult {
                path: reported,
                size_bytes,
                line_number: None,
                matched_content_snippet: None,
            });
        };

        if size_bytes > self.max_file_bytes {
            return None;
        }

        let (line_number, snippet) = scan_file(resolved.as_path(), regex)?;
        Some(SearchResult {
            path: reported,
            size_bytes,
            line_number: Some(line_number),
            matched_content_snippet: Some(snippet),
        })
    }
}

impl Iterator for SearchIter {
    type Item = SearchResult;

    fn next(&mut self) -> Option<SearchResult> {
        loop {
            if self.is_cancelled() {
                tracing::debug!("Search cancelled");
                return None;
            }

            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    // Unreadable directory or entry: skip it, keep walking
                    tracing::debug!(error = %e, "Skipping unreadable entry");
                    continue;
                }
            };

            if let Some(hit) = self.evaluate(&entry) {
                return Some(hit);
            }
        }
    }
}

/// Walk depth a root-anchored path pattern can reach: one level per
/// component, or the cap when `**` may cross any number of directories
fn pattern_depth(glob: &str, cap: usize) -> usize {
    if glob.contains("**") {
        return cap;
    }
    glob.split('/')
        .filter(|part| !part.is_empty())
        .count()
        .clamp(1, cap)
}

/// First line matching `regex`, as (1-based line number, snippet)
///
/// Returns `None` for unreadable or non-UTF-8 files.
fn scan_file(path: &Path, regex: &Regex) -> Option<(usize, String)> {
    let bytes = fs::read(path).ok()?;
    let text = String::from_utf8(bytes).ok()?;

    text.lines().enumerate().find_map(|(idx, line)| {
        regex
            .find(line)
            .map(|m| (idx + 1, snippet(line, m.start(), m.end())))
    })
}

/// The matched line, trimmed, cut to a window of [`SNIPPET_MAX_CHARS`]
/// around the match; `...` marks each side that was cut
pub fn snippet(line: &str, match_start: usize, match_end: usize) -> String {
    let lead = line.len() - line.trim_start().len();
    let text = line.trim();

    let total = text.chars().count();
    if total <= SNIPPET_MAX_CHARS {
        return text.to_string();
    }

    // Byte offsets into `text`; trimming only removed whitespace so they
    // stay on char boundaries
    let start = match_start.saturating_sub(lead).min(text.len());
    let end = match_end.saturating_sub(lead).min(text.len()).max(start);

    let match_from = text[..start].chars().count();
    let match_len = text[start..end].chars().count();
    let slack = SNIPPET_MAX_CHARS.saturating_sub(match_len) / 2;

    let to = (match_from.saturating_sub(slack) + SNIPPET_MAX_CHARS).min(total);
    let from = to.saturating_sub(SNIPPET_MAX_CHARS);

    let body: String = text.chars().skip(from).take(to - from).collect();
    format!(
        "{}{}{}",
        if from > 0 { "..." } else { "" },
        body,
        if to < total { "..." } else { "" }
    )
}
