//! Glob rule compilation
//!
//! Rules are glob patterns over forward-slash relative paths. `*` matches
//! any run of characters (including `/`), `?` matches one character, and
//! everything else is literal. A trailing ` -r` makes the rule recursive:
//! it then matches the pattern at the root or after any `/`.

use crate::error::{Result, VdfsError};
use regex::Regex;

/// Suffix that marks a rule as recursive
pub const RECURSIVE_SUFFIX: &str = " -r";

/// A compiled glob rule
#[derive(Debug, Clone)]
pub struct CompiledMask {
    rule: String,
    pattern: Regex,
    recursive: bool,
}

impl CompiledMask {
    /// Compile a single raw rule
    pub fn compile(rule: &str) -> Result<Self> {
        let (body, recursive) = match rule.strip_suffix(RECURSIVE_SUFFIX) {
            Some(body) => (body, true),
            None => (rule, false),
        };

        let body = to_slash(body);
        let body = body.trim_start_matches('/');

        let expr = regex::escape(body)
            .replace(r"\*", ".*")
            .replace(r"\?", ".");

        let expr = if recursive {
            format!("(?i)(?:^|/){}$", expr)
        } else {
            format!("(?i)^{}$", expr)
        };

        let pattern = Regex::new(&expr).map_err(|source| VdfsError::InvalidMask {
            rule: rule.to_string(),
            source,
        })?;

        Ok(Self {
            rule: rule.to_string(),
            pattern,
            recursive,
        })
    }

    /// Test a forward-slash relative path against this mask
    pub fn matches(&self, relative_path: &str) -> bool {
        self.pattern.is_match(relative_path)
    }

    pub fn is_recursive(&self) -> bool {
        self.recursive
    }

    /// The rule text this mask was compiled from
    pub fn rule(&self) -> &str {
        &self.rule
    }
}

/// An ordered list of masks; a path matches if any mask matches
#[derive(Debug, Clone, Default)]
pub struct MaskSet {
    masks: Vec<CompiledMask>,
}

impl MaskSet {
    /// Compile rules in order
    pub fn compile<S: AsRef<str>>(rules: &[S]) -> Result<Self> {
        let masks = rules
            .iter()
            .map(|rule| CompiledMask::compile(rule.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { masks })
    }

    pub fn matches(&self, relative_path: &str) -> bool {
        self.masks.iter().any(|mask| mask.matches(relative_path))
    }

    pub fn masks(&self) -> &[CompiledMask] {
        &self.masks
    }

    pub fn len(&self) -> usize {
        self.masks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }
}

/// The three rule lists of a script, compiled
#[derive(Debug, Clone, Default)]
pub struct InclusionRules {
    pub files: MaskSet,
    pub exclude: MaskSet,
    pub include: MaskSet,
}

impl InclusionRules {
    pub fn compile<S: AsRef<str>>(files: &[S], exclude: &[S], include: &[S]) -> Result<Self> {
        Ok(Self {
            files: MaskSet::compile(files)?,
            exclude: MaskSet::compile(exclude)?,
            include: MaskSet::compile(include)?,
        })
    }

    /// Three-stage decision: `[FILES]`, then `[EXCLUDE]`, then `[INCLUDE]`
    /// for files the exclude stage removed
    pub fn is_included(&self, relative_path: &str) -> bool {
        if !self.files.matches(relative_path) {
            return false;
        }
        if !self.exclude.matches(relative_path) {
            return true;
        }
        self.include.matches(relative_path)
    }
}

/// Normalize both separator styles to `/`
pub(crate) fn to_slash(path: &str) -> String {
    path.replace(['\\', std::path::MAIN_SEPARATOR], "/")
}
