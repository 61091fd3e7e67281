//! Property-based tests for the path algebra.
//!
//! Uses proptest to generate path strings and verify the algebraic laws the
//! cache relies on.

use proptest::prelude::*;
use shadowfs::paths;

/// Strategies for generating path-like input
mod strategies {
    use proptest::prelude::*;

    /// A single path component (no slashes, no dots-only names).
    pub fn component() -> impl Strategy<Value = String> {
        prop::string::string_regex("[a-zA-Z0-9_][a-zA-Z0-9_.-]{0,8}")
            .unwrap()
            .prop_filter("no dot components", |c| c != "." && c != "..")
    }

    /// An absolute path built from clean components.
    pub fn absolute_path() -> impl Strategy<Value = String> {
        prop::collection::vec(component(), 0..6).prop_map(|comps| format!("/{}", comps.join("/")))
    }

    /// A relative, already-normalised path.
    pub fn relative_clean_path() -> impl Strategy<Value = String> {
        prop::collection::vec(component(), 1..6).prop_map(|comps| comps.join("/"))
    }

    /// Arbitrary messy paths: components, dots, empty runs, slashes.
    pub fn messy_path() -> impl Strategy<Value = String> {
        prop::collection::vec(
            prop_oneof![
                component(),
                Just(".".to_string()),
                Just("..".to_string()),
                Just(String::new()),
            ],
            0..8,
        )
        .prop_flat_map(|comps| {
            prop::bool::ANY.prop_map(move |absolute| {
                let body = comps.join("/");
                if absolute {
                    format!("/{body}")
                } else {
                    body
                }
            })
        })
    }
}

proptest! {
    #[test]
    fn normalize_is_idempotent(p in strategies::messy_path()) {
        let once = paths::normalize(&p);
        prop_assert_eq!(paths::normalize(&once), once);
    }

    #[test]
    fn normalize_preserves_absoluteness(p in strategies::messy_path()) {
        prop_assume!(paths::is_absolute(&p));
        prop_assert!(paths::is_absolute(&paths::normalize(&p)));
    }

    #[test]
    fn joining_clean_relative_onto_absolute_is_normalized(
        base in strategies::absolute_path(),
        rel in strategies::relative_clean_path(),
    ) {
        let joined = paths::join(&[&base, &rel]);
        prop_assert!(paths::is_normalized(&joined), "joined: {joined}");
    }

    #[test]
    fn relative_round_trips(
        from in strategies::absolute_path(),
        to in strategies::absolute_path(),
    ) {
        let rel = paths::relative(&from, &to);
        let back = paths::normalize(&paths::join(&[&from, &rel]));
        prop_assert_eq!(back, paths::normalize(&to));
    }

    #[test]
    fn basename_ends_with_extname(p in strategies::messy_path()) {
        let base = paths::basename(&p);
        let ext = paths::extname(&p);
        prop_assert!(base.ends_with(&ext));
    }

    #[test]
    fn split_first_element_marks_root(p in strategies::messy_path()) {
        let parts = paths::split(&p);
        prop_assert!(!parts.is_empty());
        if paths::is_absolute(&p) {
            prop_assert_eq!(&parts[0], "/");
        } else {
            prop_assert_eq!(&parts[0], ".");
        }
    }

    #[test]
    fn resolve_of_absolute_inputs_is_absolute(
        a in strategies::messy_path(),
        b in strategies::absolute_path(),
    ) {
        let resolved = paths::resolve(&[&a, &b]);
        prop_assert!(paths::is_absolute(&resolved));
    }
}
