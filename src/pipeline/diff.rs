//! Diff calculation for notification dispatch.
//!
//! Computes which fetched postings have never been notified, keeping the
//! order the source listed them in.

use std::collections::HashSet;

use crate::models::Posting;
use crate::storage::SeenState;

/// Postings whose id is not in `seen`, in fetched order.
///
/// Each id appears at most once; the first occurrence wins. Neither input
/// is modified, so repeated calls on the same inputs return the same list.
pub fn diff(fetched: &[Posting], seen: &SeenState) -> Vec<Posting> {
    let mut emitted: HashSet<&str> = HashSet::new();
    fetched
        .iter()
        .filter(|p| !seen.contains(&p.id) && emitted.insert(p.id.as_str()))
        .cloned()
        .collect()
}

/// Merge per-query results, keeping the first occurrence of each id.
pub fn merge_unique(batches: Vec<Vec<Posting>>) -> Vec<Posting> {
    let mut ids: HashSet<String> = HashSet::new();
    batches
        .into_iter()
        .flatten()
        .filter(|p| ids.insert(p.id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn posting(id: &str) -> Posting {
        Posting {
            id: id.to_string(),
            title: format!("Job {id}"),
            company: "Acme".to_string(),
            url: format!("https://www.seek.com.au/job/{id}"),
            location: None,
            salary: None,
            posted_at: None,
        }
    }

    fn ids(postings: &[Posting]) -> Vec<&str> {
        postings.iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn test_diff_returns_unseen_in_fetched_order() {
        let seen = SeenState::with_ids(10, ["id-1", "id-2"]);
        let fetched = vec![posting("id-3"), posting("id-1"), posting("id-4")];

        let new = diff(&fetched, &seen);
        assert_eq!(ids(&new), vec!["id-3", "id-4"]);
    }

    #[test]
    fn test_diff_is_idempotent() {
        let seen = SeenState::with_ids(10, ["b"]);
        let fetched = vec![posting("a"), posting("b"), posting("c")];

        let first = diff(&fetched, &seen);
        let second = diff(&fetched, &seen);
        assert_eq!(first, second);
        assert!(first.iter().all(|p| !seen.contains(&p.id)));
    }

    #[test]
    fn test_diff_dedups_repeated_ids() {
        let mut dup = posting("a");
        dup.title = "Duplicate".to_string();
        let fetched = vec![posting("a"), posting("b"), dup];

        let new = diff(&fetched, &SeenState::new(10));
        assert_eq!(ids(&new), vec!["a", "b"]);
        assert_eq!(new[0].title, "Job a");
    }

    #[test]
    fn test_diff_empty_inputs() {
        assert!(diff(&[], &SeenState::with_ids(10, ["a"])).is_empty());

        let fetched = vec![posting("a")];
        assert_eq!(diff(&fetched, &SeenState::new(10)).len(), 1);
    }

    #[test]
    fn test_merge_unique_first_occurrence_wins() {
        let merged = merge_unique(vec![
            vec![posting("a"), posting("b")],
            vec![posting("b"), posting("c")],
        ]);
        assert_eq!(ids(&merged), vec!["a", "b", "c"]);
    }
}
