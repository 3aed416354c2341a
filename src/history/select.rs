//! Resolving user commit references to snapshots.

use crate::error::{Error, Result};
use crate::history::Snapshot;
use regex::Regex;

/// Which commits a `log` invocation covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// The whole history
    All,
    /// Exactly the commit matching the expression
    Single(String),
    /// The commit matching the expression and everything older
    Since(String),
}

/// Find the single commit whose path contains a match for `expr`.
///
/// This is a regex search, not a full match: `12` finds `/.snapshots/12/snapshot`
/// (and also `/.snapshots/120/snapshot`, which makes the reference ambiguous).
pub fn select_exact<'s>(commits: &[&'s Snapshot], expr: &str) -> Result<&'s Snapshot> {
    let pattern = Regex::new(expr)?;
    let matches: Vec<&'s Snapshot> = commits
        .iter()
        .copied()
        .filter(|s| pattern.is_match(&s.path.to_string_lossy()))
        .collect();
    exactly_one(matches, expr)
}

/// Find the commit with commit id `id`.
pub fn select_by_id<'s>(commits: &[&'s Snapshot], id: u64) -> Result<&'s Snapshot> {
    let matches: Vec<&'s Snapshot> = commits
        .iter()
        .copied()
        .filter(|s| s.commit == Some(id))
        .collect();
    exactly_one(matches, &id.to_string())
}

/// Apply a selection to commits ordered newest first; the order is preserved.
pub fn select<'s>(commits: &[&'s Snapshot], selection: &Selection) -> Result<Vec<&'s Snapshot>> {
    match selection {
        Selection::All => Ok(commits.to_vec()),
        Selection::Single(expr) => Ok(vec![select_exact(commits, expr)?]),
        Selection::Since(expr) => {
            let start = select_exact(commits, expr)?;
            let at = commits
                .iter()
                .position(|s| std::ptr::eq(*s, start))
                .ok_or_else(|| Error::NoSuchCommit(expr.clone()))?;
            Ok(commits[at..].to_vec())
        }
    }
}

fn exactly_one<'s>(mut matches: Vec<&'s Snapshot>, reference: &str) -> Result<&'s Snapshot> {
    match matches.len() {
        0 => Err(Error::NoSuchCommit(reference.to_string())),
        1 => Ok(matches.remove(0)),
        count => Err(Error::AmbiguousCommit {
            reference: reference.to_string(),
            count,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn snapshot(commit: u64, transaction: u64) -> Snapshot {
        Snapshot::new(
            PathBuf::from(format!("/.snapshots/{}/snapshot", commit)),
            transaction,
            0,
        )
    }

    fn history() -> Vec<Snapshot> {
        vec![snapshot(12, 900), snapshot(9, 500), snapshot(5, 100)]
    }

    #[test]
    fn test_select_by_id() {
        let owned = history();
        let commits: Vec<&Snapshot> = owned.iter().collect();

        assert_eq!(select_by_id(&commits, 5).unwrap().transaction, 100);
        assert!(matches!(select_by_id(&commits, 99), Err(Error::NoSuchCommit(r)) if r == "99"));
    }

    #[test]
    fn test_select_by_id_duplicate_is_ambiguous() {
        let owned = vec![snapshot(12, 900), snapshot(12, 500), snapshot(5, 100)];
        let commits: Vec<&Snapshot> = owned.iter().collect();

        let err = select_by_id(&commits, 12).unwrap_err();
        assert!(matches!(err, Error::AmbiguousCommit { count: 2, .. }));
        assert_eq!(select_by_id(&commits, 5).unwrap().commit, Some(5));
    }

    #[test]
    fn test_select_exact_is_a_search() {
        let owned = history();
        let commits: Vec<&Snapshot> = owned.iter().collect();

        let found = select_exact(&commits, "/9/").unwrap();
        assert_eq!(found.commit, Some(9));

        // "1" appears only in "12"
        assert_eq!(select_exact(&commits, "1").unwrap().commit, Some(12));
    }

    #[test]
    fn test_select_exact_refuses_to_guess() {
        let owned = history();
        let commits: Vec<&Snapshot> = owned.iter().collect();

        let err = select_exact(&commits, "snapshot").unwrap_err();
        assert!(matches!(err, Error::AmbiguousCommit { count: 3, .. }));

        let err = select_exact(&commits, "/77/").unwrap_err();
        assert!(matches!(err, Error::NoSuchCommit(_)));
    }

    #[test]
    fn test_select_exact_bad_pattern() {
        let owned = history();
        let commits: Vec<&Snapshot> = owned.iter().collect();
        assert!(matches!(select_exact(&commits, "(["), Err(Error::InvalidPattern(_))));
    }

    #[test]
    fn test_select_modes() {
        let owned = history();
        let commits: Vec<&Snapshot> = owned.iter().collect();

        assert_eq!(select(&commits, &Selection::All).unwrap().len(), 3);

        let single = select(&commits, &Selection::Single("/9/".to_string())).unwrap();
        assert_eq!(single.len(), 1);
        assert_eq!(single[0].commit, Some(9));

        let since = select(&commits, &Selection::Since("/9/".to_string())).unwrap();
        let ids: Vec<Option<u64>> = since.iter().map(|s| s.commit).collect();
        assert_eq!(ids, vec![Some(9), Some(5)]);
    }
}
