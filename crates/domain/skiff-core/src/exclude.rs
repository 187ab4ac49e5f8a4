//! Exclusion patterns deciding which paths participate in
//! synchronization. The same compiled matcher must back both manifest
//! building and the argument list handed to an external transfer tool;
//! two divergent implementations would make dry-run and real-run
//! disagree about what exists.

use crate::path_utils::SyncPath;
use globset::{Glob, GlobMatcher};

#[derive(Debug, thiserror::Error)]
#[error("invalid exclusion pattern `{pattern}`: {source}")]
pub struct ExcludeError {
    pub pattern: String,
    #[source]
    source: globset::Error,
}

/// A pattern has three independent, syntactically detected axes:
/// directory-only (trailing `/`), root-anchored (leading `/`), and glob vs
/// literal. Each pattern compiles to the candidate globs its axes imply,
/// evaluated against the path normalized to a leading `/`. Glob semantics
/// are shell `fnmatch` without a special path separator: `*` crosses `/`.
#[derive(Debug)]
struct CompiledRule {
    pattern: String,
    globs: Vec<GlobMatcher>,
}

impl CompiledRule {
    fn compile(pattern: &str) -> Result<Self, ExcludeError> {
        let candidates = if pattern.ends_with('/') {
            // Directory pattern: everything below it. A pattern not anchored
            // at the root may sit at any depth.
            let mut glob = format!("{pattern}*");
            if !pattern.starts_with('/') {
                glob.insert(0, '*');
            }
            vec![glob]
        } else if pattern.starts_with('/') {
            // Root-anchored: full-path match only.
            vec![pattern.to_string()]
        } else {
            // Floating: match the final segment at any depth, or an
            // intermediate segment together with its subtree.
            vec![format!("*/{pattern}"), format!("*/{pattern}/*")]
        };

        let globs = candidates
            .iter()
            .map(|candidate| Glob::new(candidate).map(|g| g.compile_matcher()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| ExcludeError {
                pattern: pattern.to_string(),
                source,
            })?;

        Ok(Self {
            pattern: pattern.to_string(),
            globs,
        })
    }

    fn matches(&self, rooted: &str) -> bool {
        self.globs.iter().any(|glob| glob.is_match(rooted))
    }
}

#[derive(Debug, Default)]
pub struct ExclusionMatcher {
    rules: Vec<CompiledRule>,
}

impl ExclusionMatcher {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, ExcludeError> {
        let rules = patterns
            .iter()
            .map(|p| CompiledRule::compile(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    /// Whether any pattern excludes the given root-relative path.
    pub fn is_excluded(&self, rel_path: &str) -> bool {
        let rooted = SyncPath::rooted(rel_path);
        self.rules.iter().any(|rule| rule.matches(&rooted))
    }

    /// The original pattern strings, for callers assembling the external
    /// tool's exclude arguments from the very same list.
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|rule| rule.pattern.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
