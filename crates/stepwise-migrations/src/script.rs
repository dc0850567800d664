//! Splitting a migration body into its UP and DOWN sections.
//!
//! Markers are SQL comment lines whose only word is `UP` or `DOWN`:
//!
//! ```sql
//! -- Header comments are ignored
//!
//! -- UP
//! CREATE TABLE users (id BIGINT PRIMARY KEY);
//!
//! -- DOWN
//! DROP TABLE users;
//! ```
//!
//! Matching is case-insensitive and tolerates surrounding whitespace, any
//! number of leading dashes, `/* ... */` wrapping and a trailing colon. A file
//! without markers is entirely UP.

use once_cell::sync::Lazy;
use regex::Regex;

static MARKER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:--+|/\*+)\s*(up|down)\s*:?\s*(?:\*+/)?\s*$")
        .expect("valid marker regex")
});

static BLOCK_COMMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("valid block comment regex"));

/// Section marker found in a migration body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    /// Start of the apply section.
    Up,
    /// Start of the revert section.
    Down,
}

/// The two halves of a migration body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sections {
    /// SQL executed on apply.
    pub up: String,
    /// SQL executed on rollback, `None` when absent or blank.
    pub down: Option<String>,
}

/// Recognize a marker line.
#[must_use]
pub fn parse_marker(line: &str) -> Option<Marker> {
    let caps = MARKER_RE.captures(line)?;
    if caps[1].eq_ignore_ascii_case("up") {
        Some(Marker::Up)
    } else {
        Some(Marker::Down)
    }
}

/// True when the text holds nothing but whitespace, `--` comments and
/// `/* ... */` comments.
#[must_use]
pub fn is_blank(sql: &str) -> bool {
    let sql = BLOCK_COMMENT_RE.replace_all(sql, "");
    sql.lines().all(|line| {
        let line = line.trim();
        line.is_empty() || line.starts_with("--")
    })
}

/// Split a migration body into UP and DOWN sections.
///
/// Fails with a description of the problem when markers are repeated or
/// DOWN comes before UP.
pub fn split_sections(body: &str) -> Result<Sections, String> {
    let body = body.strip_prefix('\u{feff}').unwrap_or(body);
    let mut up_at: Option<usize> = None;
    let mut down_at: Option<usize> = None;

    let lines: Vec<&str> = body.lines().collect();
    for (idx, line) in lines.iter().enumerate() {
        match parse_marker(line) {
            Some(Marker::Up) => {
                if up_at.is_some() {
                    return Err(format!("duplicate UP marker on line {}", idx + 1));
                }
                if down_at.is_some() {
                    return Err(format!("UP marker on line {} follows DOWN", idx + 1));
                }
                up_at = Some(idx);
            }
            Some(Marker::Down) => {
                if down_at.is_some() {
                    return Err(format!("duplicate DOWN marker on line {}", idx + 1));
                }
                down_at = Some(idx);
            }
            None => {}
        }
    }

    let join = |range: &[&str]| range.join("\n").trim().to_string();

    let (up, down) = match (up_at, down_at) {
        (None, None) => (body.trim().to_string(), None),
        (Some(u), None) => (join(&lines[u + 1..]), None),
        (None, Some(d)) => (join(&lines[..d]), Some(join(&lines[d + 1..]))),
        (Some(u), Some(d)) => (join(&lines[u + 1..d]), Some(join(&lines[d + 1..]))),
    };

    Ok(Sections {
        up,
        down: down.filter(|sql| !is_blank(sql)),
    })
}
