//! Shared value-set reconciliation.
//!
//! A multi-value record (TXT rrset) may hold values declared by us next to
//! values added by other actors. Ownership is positional: a remote value is
//! ours iff it canonically matches something we declared last time.
//!
//! All sets are slices in first-seen order. Results are in the wrapped
//! canonical form so that what we write back compares stably against what
//! the remote returns on the next read.

use crate::codec::{canonical_eq, unwrap, wrap};

fn contains<S: AsRef<str>>(set: &[S], value: &str) -> bool {
    set.iter().any(|v| canonical_eq(v.as_ref(), value))
}

/// Deduplicate canonically, keeping the first occurrence.
pub fn dedupe<S: AsRef<str>>(values: &[S]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(values.len());
    for v in values {
        if !contains(&out, v.as_ref()) {
            out.push(v.as_ref().to_string());
        }
    }
    out
}

/// Remote values that were not part of our previous declaration.
pub fn externally_owned<P, R>(prior_declared: &[P], remote_observed: &[R]) -> Vec<String>
where
    P: AsRef<str>,
    R: AsRef<str>,
{
    remote_observed
        .iter()
        .map(AsRef::as_ref)
        .filter(|v| !contains(prior_declared, v))
        .map(str::to_string)
        .collect()
}

/// Compute the value set to write back.
///
/// `next = dedupe(wrap(new_declared) ++ wrap(remote_observed \ prior_declared))`
///
/// Values removed from the declaration since last apply are dropped; values
/// nobody here ever declared survive. On a first apply `prior_declared` is
/// empty, so every remote value is kept.
pub fn reconcile<P, R, D>(prior_declared: &[P], remote_observed: &[R], new_declared: &[D]) -> Vec<String>
where
    P: AsRef<str>,
    R: AsRef<str>,
    D: AsRef<str>,
{
    let external = externally_owned(prior_declared, remote_observed);

    let candidates: Vec<String> = new_declared
        .iter()
        .map(|v| wrap(v.as_ref()).into_owned())
        .chain(external.iter().map(|v| wrap(v).into_owned()))
        .collect();

    dedupe(&candidates)
}

/// Declared values that the remote still holds, in declared form.
///
/// Used on read-back of a shared record: we report neither values the remote
/// has lost nor values someone else owns.
pub fn intersect_declared_with_remote<D, R>(declared: &[D], remote_observed: &[R]) -> Vec<String>
where
    D: AsRef<str>,
    R: AsRef<str>,
{
    let visible: Vec<&str> = declared
        .iter()
        .map(AsRef::as_ref)
        .filter(|v| contains(remote_observed, v))
        .collect();
    dedupe(&visible)
}

/// Remote values minus the ones we own, wrapped. Payload of a partial delete.
pub fn remove_owned<R, O>(remote_observed: &[R], owned: &[O]) -> Vec<String>
where
    R: AsRef<str>,
    O: AsRef<str>,
{
    let remaining: Vec<String> = remote_observed
        .iter()
        .map(AsRef::as_ref)
        .filter(|v| !contains(owned, v))
        .map(|v| wrap(v).into_owned())
        .collect();
    dedupe(&remaining)
}

/// Canonical, order-insensitive multiset equality.
///
/// On delete of a shared record this decides between removing the whole
/// rrset (everything on the remote is ours) and a partial update.
pub fn sets_equal_unordered<A, B>(a: &[A], b: &[B]) -> bool
where
    A: AsRef<str>,
    B: AsRef<str>,
{
    if a.len() != b.len() {
        return false;
    }
    let mut a: Vec<&str> = a.iter().map(|v| unwrap(v.as_ref())).collect();
    let mut b: Vec<&str> = b.iter().map(|v| unwrap(v.as_ref())).collect();
    a.sort_unstable();
    b.sort_unstable();
    a == b
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const EMPTY: [&str; 0] = [];

    #[test]
    fn test_externally_added_survives() {
        let next = reconcile(&["a"], &["a", "manual-1"], &["a"]);
        assert_eq!(next, vec!["\"a\"", "\"manual-1\""]);
        assert!(sets_equal_unordered(&next, &["a", "manual-1"]));
    }

    #[test]
    fn test_declared_removal_respected() {
        let next = reconcile(&["a", "b"], &["a", "b"], &["a"]);
        assert!(sets_equal_unordered(&next, &["a"]));
    }

    #[test]
    fn test_reconcile_idempotent_with_unchanged_declaration() {
        let declared = ["a", "b"];
        let remote = ["\"a\"", "\"ext\""];
        let first = reconcile(&declared, &remote, &declared);
        let second = reconcile(&declared, &first, &declared);
        assert_eq!(first, second);
        assert!(sets_equal_unordered(&first, &["a", "b", "ext"]));
    }

    #[test]
    fn test_first_apply_keeps_everything_remote() {
        let next = reconcile(&EMPTY, &["\"pre-existing\""], &["mine"]);
        assert_eq!(next, vec!["\"mine\"", "\"pre-existing\""]);
    }

    #[test]
    fn test_reconcile_dedupes_across_quoting() {
        let next = reconcile(&EMPTY, &["\"a\"", "a"], &["a", "\"a\""]);
        assert_eq!(next, vec!["\"a\""]);
    }

    #[test]
    fn test_reconcile_may_be_empty() {
        let next = reconcile(&["a"], &["a"], &EMPTY);
        assert!(next.is_empty());
    }

    #[test]
    fn test_intersect_filters_to_remote() {
        assert_eq!(intersect_declared_with_remote(&["a", "b"], &["a"]), vec!["a"]);
        assert_eq!(
            intersect_declared_with_remote(&["a"], &["\"a\"", "\"manual\""]),
            vec!["a"]
        );
        assert!(intersect_declared_with_remote(&["a"], &EMPTY).is_empty());
    }

    #[test]
    fn test_remove_owned() {
        let left = remove_owned(&["\"a\"", "\"manual\""], &["a"]);
        assert_eq!(left, vec!["\"manual\""]);
    }

    #[test]
    fn test_sets_equal_unordered() {
        assert!(sets_equal_unordered(&["b", "\"a\""], &["\"a\"", "b"]));
        assert!(!sets_equal_unordered(&["a"], &["a", "b"]));
        assert!(!sets_equal_unordered(&["a", "a"], &["a", "b"]));
        assert!(sets_equal_unordered(&EMPTY, &EMPTY));
    }

    fn values() -> impl Strategy<Value = Vec<String>> {
        proptest::collection::vec("[a-e]{1,2}", 0..6)
    }

    proptest! {
        #[test]
        fn prop_reconcile_with_same_declaration_is_union(d in values(), r in values()) {
            let next = reconcile(&d, &r, &d);
            for v in &d {
                prop_assert!(contains(&next, v));
            }
            for v in &r {
                prop_assert!(contains(&next, v));
            }
            for v in &next {
                prop_assert!(contains(&d, v) || contains(&r, v));
            }
        }

        #[test]
        fn prop_reconcile_converges(p in values(), r in values(), d in values()) {
            let first = reconcile(&p, &r, &d);
            let second = reconcile(&d, &first, &d);
            prop_assert_eq!(first, second);
        }

        #[test]
        fn prop_user_removed_values_not_readded(p in values(), r in values(), d in values()) {
            let next = reconcile(&p, &r, &d);
            for v in &p {
                if !contains(&d, v) {
                    prop_assert!(!contains(&next, v));
                }
            }
        }
    }
}
