//! Location expansion at job setup
//!
//! A location is a path that may contain wildcards. The configured
//! [`FileSystem`] expands it with its own glob rules and every match is
//! registered as an input path of the job. A pattern matching nothing is
//! not an error; the job then simply reads no records.

use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{LoaderError, Result};

/// A single glob match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStatus {
    pub path: PathBuf,
    pub is_dir: bool,
    pub len: u64,
}

/// Host capability: filesystem glob expansion
pub trait FileSystem {
    /// Every existing path matching `pattern`, in filesystem order
    fn glob_status(&self, pattern: &str) -> io::Result<Vec<FileStatus>>;
}

/// Host capability: the job handle that collects input paths
pub trait InputPathRegistry {
    fn add_input_path(&mut self, path: PathBuf);
}

/// Expand `location` on `fs` and register each match with `job`
///
/// Returns the number of registered paths. Filesystem failures propagate
/// unchanged inside [`LoaderError::Location`].
pub fn register<J>(location: &str, fs: &dyn FileSystem, job: &mut J) -> Result<usize>
where
    J: InputPathRegistry + ?Sized,
{
    if location.trim().is_empty() {
        return Err(LoaderError::InvalidLocation(
            "location must not be empty".to_string(),
        ));
    }

    let matches = fs
        .glob_status(location)
        .map_err(|e| LoaderError::location(location, e))?;

    if matches.is_empty() {
        warn!(location = %location, "Location matched no paths");
        return Ok(0);
    }

    let count = matches.len();
    for status in matches {
        debug!(path = %status.path.display(), is_dir = status.is_dir, "Registering input path");
        job.add_input_path(status.path);
    }

    info!(location = %location, paths = count, "Registered input paths");
    Ok(count)
}

/// The local filesystem
///
/// Glob rules: `{a,b}` alternation (nesting allowed) is expanded first, then
/// each alternative is matched with `*`, `?`, `[abc]` and `[!abc]`. A
/// backslash makes the next character literal. Results are sorted and
/// de-duplicated.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

impl FileSystem for LocalFileSystem {
    fn glob_status(&self, pattern: &str) -> io::Result<Vec<FileStatus>> {
        let options = glob::MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        };

        let mut paths = Vec::new();
        for alternative in expand_braces(pattern)? {
            let alternative = unescape_for_glob(&alternative);
            let entries = glob::glob_with(&alternative, options).map_err(|e| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("invalid glob '{alternative}': {e}"),
                )
            })?;
            for entry in entries {
                paths.push(entry.map_err(glob::GlobError::into_error)?);
            }
        }

        paths.sort();
        paths.dedup();
        paths.into_iter().map(|p| stat(&p)).collect()
    }
}

fn stat(path: &Path) -> io::Result<FileStatus> {
    let meta = std::fs::metadata(path)?;
    Ok(FileStatus {
        path: path.to_path_buf(),
        is_dir: meta.is_dir(),
        len: if meta.is_dir() { 0 } else { meta.len() },
    })
}

/// Expand `{a,b}` alternation into plain glob patterns
///
/// `\{`, `\}` and `\,` are literal and stay escaped in the output.
/// Unbalanced braces are an error.
pub fn expand_braces(pattern: &str) -> io::Result<Vec<String>> {
    let Some((open, close)) = first_group(pattern)? else {
        return Ok(vec![pattern.to_string()]);
    };

    let prefix = &pattern[..open];
    let body = &pattern[open + 1..close];
    let suffix = &pattern[close + 1..];

    let mut out = Vec::new();
    for alternative in split_alternatives(body) {
        let candidate = format!("{prefix}{alternative}{suffix}");
        out.extend(expand_braces(&candidate)?);
    }
    Ok(out)
}

/// Turn `\x` escapes into the literal syntax the `glob` crate understands
///
/// Braces and commas are plain characters there, so their backslash is
/// dropped; `*`, `?`, `[` and `]` become one-character classes. A trailing
/// backslash stays as is.
fn unescape_for_glob(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(next) => out.push_str(&glob::Pattern::escape(next.encode_utf8(&mut [0; 4]))),
            None => out.push(c),
        }
    }
    out
}

/// Byte offsets of the first top-level `{` and its matching `}`
fn first_group(pattern: &str) -> io::Result<Option<(usize, usize)>> {
    let mut depth = 0usize;
    let mut open = None;
    let mut escaped = false;

    for (i, c) in pattern.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '{' => {
                if depth == 0 {
                    open = Some(i);
                }
                depth += 1;
            },
            '}' => {
                if depth == 0 {
                    return Err(unbalanced(pattern));
                }
                depth -= 1;
                if depth == 0 {
                    if let Some(start) = open {
                        return Ok(Some((start, i)));
                    }
                }
            },
            _ => {},
        }
    }

    if depth > 0 {
        return Err(unbalanced(pattern));
    }
    Ok(None)
}

/// Split a group body on commas that are not nested or escaped
fn split_alternatives(body: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut escaped = false;

    for (i, c) in body.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&body[start..i]);
                start = i + 1;
            },
            _ => {},
        }
    }
    parts.push(&body[start..]);
    parts
}

fn unbalanced(pattern: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("unbalanced braces in '{pattern}'"),
    )
}
