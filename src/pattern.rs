use regex::Regex;

use crate::error::FrontendError;

/// Case-insensitive glob over request hosts and paths.
///
/// `*` matches any run of characters, `?` matches exactly one; everything
/// else is literal. Patterns are lowercased at compile time and matched
/// against inputs the caller has already lowercased. An empty pattern is
/// equivalent to `*`.
#[derive(Debug, Clone)]
pub struct Pattern {
    raw: String,
    regex: Regex,
}

impl Pattern {
    pub fn compile(raw: &str) -> Result<Self, FrontendError> {
        let glob = if raw.is_empty() { "*" } else { raw };
        let escaped = regex::escape(&glob.to_lowercase());
        let anchored = format!("^{}$", escaped.replace("\\*", ".*").replace("\\?", "."));
        let regex = Regex::new(&anchored).map_err(|source| FrontendError::Pattern {
            pattern: raw.to_string(),
            source,
        })?;
        Ok(Self { raw: glob.to_string(), regex })
    }

    /// Recompile from the raw text, yielding a copy that shares no compiled
    /// state with this pattern.
    pub fn recompiled(&self) -> Result<Self, FrontendError> {
        Self::compile(&self.raw)
    }

    /// The glob text, as carried into metric labels.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Match an already-lowercased input.
    pub fn matches(&self, s: &str) -> bool {
        self.regex.is_match(s)
    }

    /// Match a request path, accepting it verbatim or with a trailing `/`
    /// appended. Canonicalizes `/foo` vs `/foo/` without a second pattern.
    pub fn matches_path(&self, path: &str) -> bool {
        if self.matches(path) {
            return true;
        }
        let mut with_slash = String::with_capacity(path.len() + 1);
        with_slash.push_str(path);
        with_slash.push('/');
        self.matches(&with_slash)
    }
}
