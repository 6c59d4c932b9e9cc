//! Name matching for artifact discovery and the exclusion filter.
//!
//! Discovery is recall-biased containment on base names. It has nothing to do
//! with deletion safety, which lives in [`crate::scanner::protection`].

#![allow(missing_docs)]

use std::path::Path;

use regex::Regex;

use crate::core::errors::{Result, SweepError};
use crate::scanner::locator::ApplicationIdentity;

/// Decides whether a directory entry belongs to an application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactMatcher {
    identifier: Option<String>,
    folded_name: String,
}

impl ArtifactMatcher {
    #[must_use]
    pub fn new(name: &str, identifier: Option<&str>) -> Self {
        Self {
            identifier: identifier.filter(|id| !id.is_empty()).map(String::from),
            folded_name: name.to_lowercase(),
        }
    }

    #[must_use]
    pub fn for_identity(identity: &ApplicationIdentity) -> Self {
        Self::new(&identity.name, identity.identifier.as_deref())
    }

    /// True when the base name contains the identifier (case-sensitive) or,
    /// case-folded, contains the application name.
    #[must_use]
    pub fn matches(&self, base_name: &str) -> bool {
        if let Some(id) = &self.identifier
            && base_name.contains(id.as_str())
        {
            return true;
        }
        !self.folded_name.is_empty() && base_name.to_lowercase().contains(&self.folded_name)
    }
}

/// User-supplied exclusions applied during the scan.
///
/// An entry is excluded when its lowercased full path contains a lowercased
/// pattern, or when its base name matches a pattern read as a shell glob.
#[derive(Debug, Clone, Default)]
pub struct ExclusionFilter {
    fragments: Vec<String>,
    globs: Vec<Regex>,
}

impl ExclusionFilter {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let mut fragments = Vec::with_capacity(patterns.len());
        let mut globs = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            let pattern = pattern.as_ref();
            validate_exclusion(pattern)?;
            fragments.push(pattern.to_lowercase());
            globs.push(glob_to_regex(pattern)?);
        }
        Ok(Self { fragments, globs })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    #[must_use]
    pub fn is_excluded(&self, path: &Path) -> bool {
        if self.fragments.is_empty() {
            return false;
        }
        let folded = path.to_string_lossy().to_lowercase();
        if self.fragments.iter().any(|f| folded.contains(f.as_str())) {
            return true;
        }
        path.file_name().is_some_and(|name| {
            let name = name.to_string_lossy();
            self.globs.iter().any(|re| re.is_match(&name))
        })
    }
}

/// Reject patterns that would exclude everything or cannot compile.
pub fn validate_exclusion(pattern: &str) -> Result<()> {
    if pattern.trim().is_empty() {
        return Err(SweepError::InvalidConfig {
            details: "exclusion patterns must not be empty".to_string(),
        });
    }
    glob_to_regex(pattern).map(|_| ())
}

fn glob_to_regex(pattern: &str) -> Result<Regex> {
    let normalized_pattern = pattern.replace('\\', "/");
    let mut regex_str = String::with_capacity(pattern.len() * 2);
    regex_str.push('^');

    let chars: Vec<char> = normalized_pattern.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '*' if i + 1 < chars.len() && chars[i + 1] == '*' => {
                if i + 2 < chars.len() && chars[i + 2] == '/' {
                    regex_str.push_str("(?:.*/)?");
                    i += 3;
                } else {
                    regex_str.push_str(".*");
                    i += 2;
                }
            }
            '*' => {
                regex_str.push_str("[^/]*");
                i += 1;
            }
            '?' => {
                regex_str.push_str("[^/]");
                i += 1;
            }
            c @ ('.' | '+' | '(' | ')' | '{' | '}' | '[' | ']' | '^' | '$' | '|' | '\\') => {
                regex_str.push('\\');
                regex_str.push(c);
                i += 1;
            }
            c => {
                regex_str.push(c);
                i += 1;
            }
        }
    }

    regex_str.push('$');

    Regex::new(&regex_str).map_err(|err| SweepError::InvalidConfig {
        details: format!("invalid exclusion pattern {pattern:?}: {err}"),
    })
}
