use crate::conflict::Conflicts;
use crate::deps::DepSet;
use crate::instance::Instance;
use crate::{Dependency, InstanceNum, ReplicaId, SeqNum};
use bytes::Bytes;
use std::cmp;
use std::collections::BTreeMap;

/// Per-replica rows of consensus instances, keyed by instance number.
///
/// Instances come into existence on demand: a local proposal allocates the
/// next slot on this replica's own row, and an inbound PreAccept, Accept
/// or Commit lazily creates the coordinates it names. Executed instances
/// stay in their row and keep taking part in conflict scans.
pub(crate) struct InstanceSpace {
    rows: BTreeMap<ReplicaId, BTreeMap<InstanceNum, Instance>>,
}

impl InstanceSpace {
    pub fn new() -> InstanceSpace {
        InstanceSpace { rows: BTreeMap::new() }
    }

    /// Point lookup of the instance at `id`
    pub fn get(&self, id: Dependency) -> Option<&Instance> {
        self.rows.get(&id.0).and_then(|row| row.get(&id.1))
    }

    /// Mutable point lookup of the instance at `id`
    pub fn get_mut(&mut self, id: Dependency) -> Option<&mut Instance> {
        self.rows.get_mut(&id.0).and_then(|row| row.get_mut(&id.1))
    }

    /// The instance at `id`, created in its initial state when absent
    pub fn get_or_insert(&mut self, id: Dependency) -> &mut Instance {
        self.rows
            .entry(id.0)
            .or_insert_with(BTreeMap::new)
            .entry(id.1)
            .or_insert_with(|| Instance::new(id.0, id.1))
    }

    /// Next free instance number on `replica`'s row. Numbering starts
    /// at 1.
    pub fn next_num(&self, replica: ReplicaId) -> InstanceNum {
        self.rows
            .get(&replica)
            .and_then(|row| row.keys().next_back())
            .map(|num| num + 1)
            .unwrap_or(1)
    }

    /// Scans every known instance for commands interfering with
    /// `command`, returning the highest interfering sequence number and
    /// the set of interfering coordinates. Instances that have not
    /// recorded a command yet cannot interfere.
    pub fn seq_and_deps<C: Conflicts>(&self, conflicts: &C, command: &Bytes) -> (SeqNum, DepSet) {
        let mut max_seq = 0;
        let mut deps = DepSet::new();
        for inst in self.instances() {
            let other = match inst.command {
                Some(ref other) => other,
                None => continue,
            };
            if conflicts.conflicts(command, other) {
                max_seq = cmp::max(max_seq, inst.seq);
                deps.insert(inst.id());
            }
        }
        (max_seq, deps)
    }

    /// Iterator over every instance, by row and then by instance number
    pub fn instances<'a>(&'a self) -> impl Iterator<Item = &'a Instance> {
        self.rows.values().flat_map(|row| row.values())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::Status;

    fn interferes(a: &Bytes, b: &Bytes) -> bool {
        a.first() == b.first()
    }

    #[test]
    fn rows_allocate_from_one() {
        let mut space = InstanceSpace::new();
        assert_eq!(1, space.next_num(0));

        space.get_or_insert(Dependency(0, 1));
        space.get_or_insert(Dependency(0, 4));
        assert_eq!(5, space.next_num(0));
        assert_eq!(1, space.next_num(1));
    }

    #[test]
    fn lazy_creation_and_lookup() {
        let mut space = InstanceSpace::new();
        assert!(space.get(Dependency(1, 1)).is_none());

        space.get_or_insert(Dependency(1, 1)).seq = 9;
        assert_eq!(9, space.get(Dependency(1, 1)).unwrap().seq);
        // a second lookup finds the same instance
        assert_eq!(9, space.get_or_insert(Dependency(1, 1)).seq);
        assert_eq!(1, space.instances().count());
    }

    #[test]
    fn seq_and_deps_collects_interfering_instances() {
        let mut space = InstanceSpace::new();

        let inst = space.get_or_insert(Dependency(0, 1));
        inst.command = Some("a0".into());
        inst.seq = 3;
        inst.status = Status::PreAccepted;

        let inst = space.get_or_insert(Dependency(1, 1));
        inst.command = Some("a1".into());
        inst.seq = 7;
        inst.status = Status::Executed;

        let inst = space.get_or_insert(Dependency(2, 1));
        inst.command = Some("b0".into());
        inst.seq = 11;
        inst.status = Status::Committed;

        // placeholder without a command is skipped
        space.get_or_insert(Dependency(2, 2));

        let (max_seq, deps) = space.seq_and_deps(&(interferes as fn(&Bytes, &Bytes) -> bool), &"a9".into());
        assert_eq!(7, max_seq);
        assert_eq!(vec![Dependency(0, 1), Dependency(1, 1)], deps.to_vec());

        let (max_seq, deps) = space.seq_and_deps(&(interferes as fn(&Bytes, &Bytes) -> bool), &"c0".into());
        assert_eq!(0, max_seq);
        assert!(deps.is_empty());
    }
}
