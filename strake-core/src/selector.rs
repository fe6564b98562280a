//! Pipeline selection criteria
//!
//! A selector decides whether a pipeline should run for a given source
//! control event, expressed as glob rules over branch and tag names.

use glob::Pattern;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Criteria deciding whether a pipeline runs for a given (branch, tag)
///
/// A pipeline with no selector at all never matches; within a selector,
/// each ref class (branches, tags) is opt-in as well.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selector {
    /// Rules applied to branch names from check-suite events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branches: Option<RefRules>,
    /// Rules applied to tag names from tag-push events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<RefRules>,
}

/// Glob rules over one class of ref names
///
/// `ignore` wins over `only`; an empty `only` list admits everything the
/// `ignore` list does not reject.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefRules {
    #[serde(default)]
    pub only: Vec<String>,
    #[serde(default)]
    pub ignore: Vec<String>,
}

impl RefRules {
    fn admits(&self, name: &str) -> Result<bool> {
        for pattern in &self.ignore {
            if compile(pattern)?.matches(name) {
                return Ok(false);
            }
        }
        if self.only.is_empty() {
            return Ok(true);
        }
        for pattern in &self.only {
            if compile(pattern)?.matches(name) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl Selector {
    /// Evaluates these criteria against a (branch, tag) pair.
    ///
    /// An empty string means the ref is absent. A tag-push event carries a
    /// tag and no branch; a check-suite event carries a branch (possibly
    /// empty, when the head branch could not be resolved) and no tag. An
    /// unresolved branch is eligible for any branch-selecting pipeline.
    pub fn matches(&self, branch: &str, tag: &str) -> Result<bool> {
        if !tag.is_empty() {
            return match &self.tags {
                Some(rules) => rules.admits(tag),
                None => Ok(false),
            };
        }
        match &self.branches {
            Some(rules) => {
                if branch.is_empty() {
                    return Ok(true);
                }
                rules.admits(branch)
            }
            None => Ok(false),
        }
    }
}

fn compile(pattern: &str) -> Result<Pattern> {
    Pattern::new(pattern).map_err(|source| Error::SelectorPattern {
        pattern: pattern.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(only: &[&str], ignore: &[&str]) -> RefRules {
        RefRules {
            only: only.iter().map(|s| s.to_string()).collect(),
            ignore: ignore.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_branch_only_globs() {
        let selector = Selector {
            branches: Some(rules(&["master", "release/*"], &[])),
            tags: None,
        };
        assert!(selector.matches("master", "").unwrap());
        assert!(selector.matches("release/v1", "").unwrap());
        assert!(!selector.matches("feature/foo", "").unwrap());
    }

    #[test]
    fn test_ignore_wins_over_only() {
        let selector = Selector {
            branches: Some(rules(&["*"], &["wip/*"])),
            tags: None,
        };
        assert!(selector.matches("master", "").unwrap());
        assert!(!selector.matches("wip/spike", "").unwrap());
    }

    #[test]
    fn test_empty_only_admits_everything() {
        let selector = Selector {
            branches: Some(RefRules::default()),
            tags: None,
        };
        assert!(selector.matches("anything", "").unwrap());
    }

    #[test]
    fn test_absent_branch_is_eligible() {
        // A check-suite event may carry no resolvable head branch; that is
        // still eligible for a branch-selecting pipeline.
        let selector = Selector {
            branches: Some(rules(&["master"], &[])),
            tags: None,
        };
        assert!(selector.matches("", "").unwrap());
    }

    #[test]
    fn test_tag_event_needs_tag_rules() {
        let branch_only = Selector {
            branches: Some(rules(&["*"], &[])),
            tags: None,
        };
        assert!(!branch_only.matches("", "v1.0.0").unwrap());

        let tagged = Selector {
            branches: None,
            tags: Some(rules(&["v*"], &[])),
        };
        assert!(tagged.matches("", "v1.0.0").unwrap());
        assert!(!tagged.matches("", "nightly").unwrap());
    }

    #[test]
    fn test_branch_event_needs_branch_rules() {
        let selector = Selector {
            branches: None,
            tags: Some(rules(&["*"], &[])),
        };
        assert!(!selector.matches("master", "").unwrap());
    }

    #[test]
    fn test_invalid_pattern_is_an_error() {
        let selector = Selector {
            branches: Some(rules(&["release/[oops"], &[])),
            tags: None,
        };
        let err = selector.matches("release/v1", "").unwrap_err();
        assert!(matches!(err, Error::SelectorPattern { .. }));
    }
}
