use crate::Dependency;
use std::collections::BTreeSet;
use std::iter::FromIterator;

/// Set of instance coordinates an instance depends on.
///
/// `deps` only ever grows after PreAccept. The set is kept ordered so that
/// whenever it is exposed, in a message or to the execution graph, it comes
/// out as a sequence sorted by `(replica, instance)`; two replicas holding
/// equal sets emit identical sequences.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DepSet(BTreeSet<Dependency>);

impl DepSet {
    /// Creates an empty dependency set
    pub fn new() -> DepSet {
        DepSet::default()
    }

    /// Number of dependencies in the set
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Flag indicating whether the set is empty
    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Inserts a dependency, returning whether it was new
    pub fn insert(&mut self, dep: Dependency) -> bool {
        self.0.insert(dep)
    }

    /// Merges `other` into the set, returning whether anything new was
    /// added
    pub fn merge<I>(&mut self, other: I) -> bool
    where
        I: IntoIterator<Item = Dependency>,
    {
        let mut changed = false;
        for dep in other {
            changed |= self.0.insert(dep);
        }
        changed
    }

    /// Flag indicating whether every member is also contained in `other`
    pub fn is_subset(&self, other: &DepSet) -> bool {
        self.0.is_subset(&other.0)
    }

    /// The dependencies as a canonically ordered sequence
    pub fn to_vec(&self) -> Vec<Dependency> {
        self.0.iter().cloned().collect()
    }
}

impl FromIterator<Dependency> for DepSet {
    fn from_iter<I: IntoIterator<Item = Dependency>>(iter: I) -> DepSet {
        DepSet(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_reports_new_members() {
        let mut deps = DepSet::new();
        assert!(deps.insert(Dependency(0, 1)));
        assert!(!deps.insert(Dependency(0, 1)));

        assert!(deps.merge(vec![Dependency(0, 1), Dependency(1, 1)]));
        assert!(!deps.merge(vec![Dependency(1, 1)]));
        assert_eq!(2, deps.len());
    }

    #[test]
    fn emission_is_sorted_by_replica_then_instance() {
        let deps: DepSet = vec![Dependency(2, 1), Dependency(0, 7), Dependency(0, 3)]
            .into_iter()
            .collect();
        assert_eq!(
            vec![Dependency(0, 3), Dependency(0, 7), Dependency(2, 1)],
            deps.to_vec()
        );
    }

    #[test]
    fn subset() {
        let small: DepSet = vec![Dependency(0, 1)].into_iter().collect();
        let large: DepSet = vec![Dependency(0, 1), Dependency(1, 4)].into_iter().collect();

        assert!(small.is_subset(&large));
        assert!(small.is_subset(&small));
        assert!(!large.is_subset(&small));
        assert!(DepSet::new().is_subset(&small));
    }
}
