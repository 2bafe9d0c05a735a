//! File selection for repository listings
//!
//! [`FilterCriteria`] is the declarative description carried by a request,
//! [`FilterEngine`] is its compiled form used by the orchestrator. Both answer
//! the same question, `included(path, size)`, without side effects.
//!
//! # Rules
//!
//! A path is included when all of the following hold, checked in order:
//!
//! 1. `target_paths` is empty or the path starts with one of them
//! 2. `include_patterns` is empty or the path matches at least one
//! 3. the path matches none of `exclude_patterns`
//! 4. `include_hidden` is set or no path segment starts with `.`
//! 5. `allowed_extensions` is empty or contains the extension
//! 6. the extension is not in `denied_extensions`
//!
//! Size bounds and the binary-extension switch are applied afterwards.
//! Patterns are shell-style wildcards (`*`, `?`, `[abc]`, `[!abc]`, `[a-z]`),
//! case-sensitive, matched against the whole relative path. `*` also matches
//! `/`. A pattern that contains no `/` is additionally tried against the
//! basename, so `*.rs` selects Rust files at any depth.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::app::models::RemoteFile;
use crate::constants::filter::BINARY_EXTENSIONS;

/// Declarative file selection criteria
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterCriteria {
    /// Wildcard patterns a path must match (any of)
    pub include_patterns: Vec<String>,
    /// Wildcard patterns that reject a path
    pub exclude_patterns: Vec<String>,
    /// Smallest accepted size in bytes
    pub min_size: Option<u64>,
    /// Largest accepted size in bytes
    pub max_size: Option<u64>,
    /// Accepted extensions, lowercase without the dot
    pub allowed_extensions: BTreeSet<String>,
    /// Rejected extensions, lowercase without the dot
    pub denied_extensions: BTreeSet<String>,
    /// Include paths with a segment starting with `.`
    pub include_hidden: bool,
    /// Include files with a well-known binary extension
    pub include_binary: bool,
    /// Path prefixes a file must live under (any of)
    pub target_paths: Vec<String>,
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self {
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            min_size: None,
            max_size: None,
            allowed_extensions: BTreeSet::new(),
            denied_extensions: BTreeSet::new(),
            include_hidden: false,
            include_binary: true,
            target_paths: Vec::new(),
        }
    }
}

impl FilterCriteria {
    pub fn with_include_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_exclude_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Accept only these extensions (`"py"` and `".py"` are equivalent)
    pub fn with_allowed_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed_extensions = normalize_extensions(extensions);
        self
    }

    /// Reject these extensions (`"py"` and `".py"` are equivalent)
    pub fn with_denied_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.denied_extensions = normalize_extensions(extensions);
        self
    }

    pub fn with_size_range(mut self, min_size: Option<u64>, max_size: Option<u64>) -> Self {
        self.min_size = min_size;
        self.max_size = max_size;
        self
    }

    pub fn with_hidden(mut self, include_hidden: bool) -> Self {
        self.include_hidden = include_hidden;
        self
    }

    pub fn with_binary(mut self, include_binary: bool) -> Self {
        self.include_binary = include_binary;
        self
    }

    pub fn with_target_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Apply the path rules only
    pub fn matches_path(&self, path: &str) -> bool {
        FilterEngine::new(self.clone()).matches_path(path)
    }

    /// Apply all rules to a path of the given size
    pub fn included(&self, path: &str, size: u64) -> bool {
        FilterEngine::new(self.clone()).included(path, size)
    }
}

/// Outcome of filtering a listing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterResult {
    /// Regular files that passed every rule, in listing order
    pub included: Vec<RemoteFile>,
    /// Everything else, directories and symlinks included
    pub excluded: Vec<RemoteFile>,
    /// Number of entries examined
    pub total_files: usize,
    /// Number of entries included
    pub filtered_files: usize,
}

impl FilterResult {
    /// Sum of the sizes of the included files
    pub fn included_bytes(&self) -> u64 {
        self.included.iter().map(|f| f.size).sum()
    }
}

/// Compiled form of [`FilterCriteria`]
#[derive(Debug, Clone)]
pub struct FilterEngine {
    criteria: FilterCriteria,
    include: Vec<GlobPattern>,
    exclude: Vec<GlobPattern>,
    allowed: BTreeSet<String>,
    denied: BTreeSet<String>,
}

impl FilterEngine {
    /// Compile the patterns of `criteria`
    pub fn new(criteria: FilterCriteria) -> Self {
        let include = criteria
            .include_patterns
            .iter()
            .map(|p| GlobPattern::new(p))
            .collect();
        let exclude = criteria
            .exclude_patterns
            .iter()
            .map(|p| GlobPattern::new(p))
            .collect();
        let allowed = normalize_extensions(&criteria.allowed_extensions);
        let denied = normalize_extensions(&criteria.denied_extensions);

        Self {
            criteria,
            include,
            exclude,
            allowed,
            denied,
        }
    }

    pub fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    /// Apply the six path rules
    pub fn matches_path(&self, path: &str) -> bool {
        if !is_well_formed(path) {
            return false;
        }

        let criteria = &self.criteria;

        if !criteria.target_paths.is_empty()
            && !criteria
                .target_paths
                .iter()
                .any(|prefix| path.starts_with(prefix.as_str()))
        {
            return false;
        }

        if !self.include.is_empty() && !self.include.iter().any(|p| p.matches(path)) {
            return false;
        }

        if self.exclude.iter().any(|p| p.matches(path)) {
            return false;
        }

        if !criteria.include_hidden && path.split('/').any(|segment| segment.starts_with('.')) {
            return false;
        }

        let extension = extension_of(path);

        if !self.allowed.is_empty() {
            match &extension {
                Some(ext) if self.allowed.contains(ext) => {}
                _ => return false,
            }
        }

        if let Some(ext) = &extension {
            if self.denied.contains(ext) {
                return false;
            }
        }

        true
    }

    /// Apply the path rules, then size bounds and the binary switch
    pub fn included(&self, path: &str, size: u64) -> bool {
        if !self.matches_path(path) {
            return false;
        }

        if self.criteria.min_size.is_some_and(|min| size < min) {
            return false;
        }

        if self.criteria.max_size.is_some_and(|max| size > max) {
            return false;
        }

        if !self.criteria.include_binary {
            if let Some(ext) = extension_of(path) {
                if BINARY_EXTENSIONS.contains(&ext.as_str()) {
                    return false;
                }
            }
        }

        true
    }

    /// Whether a listing entry should be transferred
    pub fn accepts(&self, file: &RemoteFile) -> bool {
        file.is_regular() && self.included(&file.path, file.size)
    }

    /// Split a listing into included and excluded entries
    pub fn filter_files(&self, files: Vec<RemoteFile>) -> FilterResult {
        let total_files = files.len();
        let (included, excluded): (Vec<_>, Vec<_>) =
            files.into_iter().partition(|file| self.accepts(file));

        FilterResult {
            filtered_files: included.len(),
            included,
            excluded,
            total_files,
        }
    }
}

/// Lowercase extension of the final path segment, without the dot
///
/// Dotfiles such as `.gitignore` have no extension.
fn extension_of(path: &str) -> Option<String> {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < name.len() => Some(name[idx + 1..].to_lowercase()),
        _ => None,
    }
}

fn normalize_extensions<I, S>(extensions: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    extensions
        .into_iter()
        .map(|ext| ext.as_ref().trim().trim_start_matches('.').to_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect()
}

/// Relative, non-empty, no parent traversal, no NUL
fn is_well_formed(path: &str) -> bool {
    !path.is_empty()
        && !path.starts_with('/')
        && !path.contains('\0')
        && !path.split('/').any(|segment| segment == "..")
}

/// A compiled shell-style wildcard pattern
#[derive(Debug, Clone)]
struct GlobPattern {
    tokens: Vec<Token>,
    basename_fallback: bool,
}

#[derive(Debug, Clone)]
enum Token {
    Literal(char),
    AnyChar,
    AnySequence,
    Class { negated: bool, ranges: Vec<(char, char)> },
}

impl GlobPattern {
    fn new(pattern: &str) -> Self {
        Self {
            tokens: tokenize(pattern),
            basename_fallback: !pattern.contains('/'),
        }
    }

    fn matches(&self, path: &str) -> bool {
        if wildcard_match(&self.tokens, path) {
            return true;
        }
        if self.basename_fallback {
            if let Some((_, name)) = path.rsplit_once('/') {
                return wildcard_match(&self.tokens, name);
            }
        }
        false
    }
}

fn tokenize(pattern: &str) -> Vec<Token> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut tokens = Vec::with_capacity(chars.len());
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '*' => {
                // Consecutive stars behave like one
                if !matches!(tokens.last(), Some(Token::AnySequence)) {
                    tokens.push(Token::AnySequence);
                }
                i += 1;
            }
            '?' => {
                tokens.push(Token::AnyChar);
                i += 1;
            }
            '[' => match parse_class(&chars, i) {
                Some((token, next)) => {
                    tokens.push(token);
                    i = next;
                }
                None => {
                    tokens.push(Token::Literal('['));
                    i += 1;
                }
            },
            c => {
                tokens.push(Token::Literal(c));
                i += 1;
            }
        }
    }

    tokens
}

/// Parse a bracket expression starting at `start`; `None` if unterminated
fn parse_class(chars: &[char], start: usize) -> Option<(Token, usize)> {
    let mut i = start + 1;
    let negated = matches!(chars.get(i), Some('!'));
    if negated {
        i += 1;
    }

    let mut ranges = Vec::new();
    let mut first = true;

    loop {
        let c = *chars.get(i)?;
        // A leading ']' is a member, not the terminator
        if c == ']' && !first {
            return Some((Token::Class { negated, ranges }, i + 1));
        }
        first = false;

        match (chars.get(i + 1), chars.get(i + 2)) {
            (Some('-'), Some(&end)) if end != ']' => {
                ranges.push((c, end));
                i += 3;
            }
            _ => {
                ranges.push((c, c));
                i += 1;
            }
        }
    }
}

impl Token {
    fn matches_char(&self, c: char) -> bool {
        match self {
            Token::Literal(l) => *l == c,
            Token::AnyChar => true,
            Token::AnySequence => false,
            Token::Class { negated, ranges } => {
                let hit = ranges.iter().any(|&(lo, hi)| lo <= c && c <= hi);
                hit != *negated
            }
        }
    }
}

/// Greedy wildcard match with a single backtrack point
fn wildcard_match(tokens: &[Token], text: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let (mut t, mut p) = (0usize, 0usize);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match tokens.get(p) {
            Some(Token::AnySequence) => {
                backtrack = Some((p, t));
                p += 1;
            }
            Some(token) if token.matches_char(text[t]) => {
                p += 1;
                t += 1;
            }
            _ => match backtrack {
                Some((star, consumed)) => {
                    p = star + 1;
                    t = consumed + 1;
                    backtrack = Some((star, consumed + 1));
                }
                None => return false,
            },
        }
    }

    tokens[p..]
        .iter()
        .all(|token| matches!(token, Token::AnySequence))
}
