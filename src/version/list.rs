//! Sorted, deduplicated release lists

use indexmap::IndexSet;

use crate::version::code::Version;

type VersionFilter<'a> = Box<dyn Fn(&Version) -> bool + Send + Sync + 'a>;

/// Direction in which releases are sorted by their associated key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

/// Builds a list of simplified versions from a `version -> release date` map.
///
/// ```
/// use std::collections::HashMap;
/// use product_details::version::ReleaseList;
///
/// let releases = HashMap::from([
///     ("4.0b2build8", "2010-12-06"),
///     ("3.0", "2010-12-01"),
///     ("4.0b1", "2010-11-24"),
///     ("4.0b2build7", "2010-12-05"),
/// ]);
/// let list = ReleaseList::new().hide_below("4.0b1").build(releases);
/// assert_eq!(list, vec!["4.0b2", "4.0b1"]);
/// ```
pub struct ReleaseList<'a> {
    hide_below: Version,
    order: SortOrder,
    filter: VersionFilter<'a>,
}

impl<'a> ReleaseList<'a> {
    pub fn new() -> Self {
        Self {
            hide_below: Version::parse("0.0"),
            order: SortOrder::Descending,
            filter: Box::new(|_: &Version| true),
        }
    }

    /// Versions lower than `version` are left out of the list
    pub fn hide_below(mut self, version: &str) -> Self {
        self.hide_below = Version::parse(version);
        self
    }

    pub fn order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    /// Only versions for which `filter` returns true are kept
    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&Version) -> bool + Send + Sync + 'a,
    {
        self.filter = Box::new(filter);
        self
    }

    pub fn build<I, V, K>(&self, releases: I) -> Vec<String>
    where
        I: IntoIterator<Item = (V, K)>,
        V: AsRef<str>,
        K: Ord,
    {
        let mut entries: Vec<(V, K)> = releases.into_iter().collect();
        // Ties on the sort key fall back to the version string so output does
        // not depend on map iteration order
        entries.sort_by(|(va, ka), (vb, kb)| {
            ka.cmp(kb).then_with(|| va.as_ref().cmp(vb.as_ref()))
        });
        if self.order == SortOrder::Descending {
            entries.reverse();
        }

        let unique: IndexSet<String> = entries
            .iter()
            .map(|(version, _)| Version::parse(version.as_ref()))
            .filter(|version| *version >= self.hide_below && (self.filter)(version))
            .map(|version| version.simplified())
            .collect();

        unique.into_iter().collect()
    }
}

impl Default for ReleaseList<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Shorthand for `ReleaseList::new().hide_below(hide_below).build(releases)`
pub fn version_list<I, V, K>(releases: I, hide_below: &str) -> Vec<String>
where
    I: IntoIterator<Item = (V, K)>,
    V: AsRef<str>,
    K: Ord,
{
    ReleaseList::new().hide_below(hide_below).build(releases)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    fn releases() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("4.0b2build8", "2010-12-06"),
            ("3.0", "2010-12-01"),
            ("4.0b1", "2010-11-24"),
            ("4.0b2build7", "2010-12-05"),
        ])
    }

    #[test]
    fn build_collapses_build_variants_and_hides_old_versions() {
        let list = ReleaseList::new().hide_below("4.0b1").build(releases());
        assert_eq!(list, vec!["4.0b2", "4.0b1"]);
    }

    #[test]
    fn build_sorts_by_release_date_descending_by_default() {
        let list = ReleaseList::new().build(releases());
        assert_eq!(list, vec!["4.0b2", "3.0", "4.0b1"]);
    }

    #[test]
    fn build_supports_ascending_order() {
        let list = ReleaseList::new()
            .order(SortOrder::Ascending)
            .build(releases());
        assert_eq!(list, vec!["4.0b1", "3.0", "4.0b2"]);
    }

    #[test]
    fn build_applies_filter() {
        let list = ReleaseList::new()
            .filter(|v| v.is_release())
            .build(releases());
        assert_eq!(list, vec!["3.0"]);
    }

    #[rstest]
    #[case("0.0")]
    #[case("not-a-version")]
    #[case("")]
    fn unparseable_or_zero_threshold_excludes_nothing(#[case] hide_below: &str) {
        let list = version_list(releases(), hide_below);
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn build_returns_empty_for_no_releases() {
        let empty: Vec<(String, String)> = Vec::new();
        assert!(ReleaseList::new().build(empty).is_empty());
    }

    #[test]
    fn duplicates_keep_first_seen_position() {
        let releases = vec![
            ("3.6.4build1", "2010-06-01"),
            ("3.6.3", "2010-04-01"),
            ("3.6.4build7", "2010-06-22"),
        ];
        let list = ReleaseList::new().build(releases);
        assert_eq!(list, vec!["3.6.4", "3.6.3"]);
    }
}
