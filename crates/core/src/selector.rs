//! Selector resolution for pull/push targets.
//!
//! A selector names what to synchronize: a branch, a specific commit, or
//! whatever the remote considers its default head. Branch and commit are
//! mutually exclusive; modelling the selector as a single enum makes the
//! "both set" state unrepresentable once resolution has run.

use serde::{Deserialize, Serialize};

use crate::errors::SelectorError;

/// A resolved synchronization target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Selector {
    /// A named branch on the remote.
    Branch(String),
    /// A specific commit id.
    Commit(String),
    /// No explicit target; the remote's default head is used.
    Unspecified,
}

impl Selector {
    /// Resolve two optional command-line values into a [`Selector`].
    ///
    /// Fails with [`SelectorError::BranchAndCommit`] if both are non-empty.
    /// This runs before any network access.
    pub fn resolve(branch: Option<&str>, commit: Option<&str>) -> Result<Self, SelectorError> {
        let branch = branch.filter(|s| !s.is_empty());
        let commit = commit.filter(|s| !s.is_empty());
        match (branch, commit) {
            (Some(_), Some(_)) => Err(SelectorError::BranchAndCommit),
            (Some(b), None) => Ok(Self::Branch(b.to_string())),
            (None, Some(c)) => Ok(Self::Commit(c.to_string())),
            (None, None) => Ok(Self::Unspecified),
        }
    }

    /// The branch name, if this selector is a branch.
    pub fn branch(&self) -> Option<&str> {
        match self {
            Self::Branch(b) => Some(b),
            _ => None,
        }
    }

    /// The commit id, if this selector is a commit.
    pub fn commit(&self) -> Option<&str> {
        match self {
            Self::Commit(c) => Some(c),
            _ => None,
        }
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Branch(b) => write!(f, "branch '{}'", b),
            Self::Commit(c) => write!(f, "commit {}", c),
            Self::Unspecified => write!(f, "default head"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_branch() {
        let sel = Selector::resolve(Some("master"), None).unwrap();
        assert_eq!(sel, Selector::Branch("master".into()));
        assert_eq!(sel.branch(), Some("master"));
        assert_eq!(sel.commit(), None);
    }

    #[test]
    fn test_resolve_commit() {
        let sel = Selector::resolve(None, Some("abc123")).unwrap();
        assert_eq!(sel, Selector::Commit("abc123".into()));
        assert_eq!(sel.commit(), Some("abc123"));
    }

    #[test]
    fn test_resolve_unspecified() {
        assert_eq!(
            Selector::resolve(None, None).unwrap(),
            Selector::Unspecified
        );
        // Empty strings count as absent.
        assert_eq!(
            Selector::resolve(Some(""), Some("")).unwrap(),
            Selector::Unspecified
        );
    }

    #[test]
    fn test_resolve_both_fails() {
        let result = Selector::resolve(Some("master"), Some("abc123"));
        assert!(matches!(result, Err(SelectorError::BranchAndCommit)));
    }

    #[test]
    fn test_resolve_both_fails_for_any_nonempty_values() {
        for (b, c) in [("a", "b"), ("release/1.0", "f00d"), ("x", "x")] {
            assert!(matches!(
                Selector::resolve(Some(b), Some(c)),
                Err(SelectorError::BranchAndCommit)
            ));
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(
            Selector::Branch("dev".into()).to_string(),
            "branch 'dev'"
        );
        assert_eq!(Selector::Commit("abc".into()).to_string(), "commit abc");
        assert_eq!(Selector::Unspecified.to_string(), "default head");
    }
}
