use crate::deps::DepSet;
use crate::messages::InstanceState;
use crate::{Ballot, Dependency, InstanceNum, ReplicaId, SeqNum};
use bytes::Bytes;
use either::Either;
use std::cmp;

/// Number of logical ticks a command leader holds the slow path open at
/// slow-quorum size, waiting for the remaining replies to complete the
/// fast quorum.
pub(crate) const SLOW_PATH_TIMEOUT: u32 = 2;

/// Lifecycle of a consensus instance. An instance only ever moves forward
/// through these states.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub(crate) enum Status {
    None,
    PreAccepted,
    Accepted,
    Committed,
    Executed,
}

/// A single consensus instance: one slot on one replica's row.
///
/// The replica named by the row is the instance's command leader; the
/// reply tallies at the bottom are only touched on the leader.
#[derive(Debug)]
pub(crate) struct Instance {
    pub(crate) replica: ReplicaId,
    pub(crate) num: InstanceNum,
    pub(crate) command: Option<Bytes>,
    pub(crate) seq: SeqNum,
    pub(crate) deps: DepSet,
    pub(crate) ballot: Ballot,
    pub(crate) status: Status,

    // command-leader state
    pub(crate) pre_accept_replies: usize,
    pub(crate) different_replies: bool,
    pub(crate) accept_replies: usize,
}

impl Instance {
    pub fn new(replica: ReplicaId, num: InstanceNum) -> Instance {
        Instance {
            replica,
            num,
            command: None,
            seq: 0,
            deps: DepSet::new(),
            ballot: Ballot::initial_for(replica),
            status: Status::None,
            pre_accept_replies: 0,
            different_replies: false,
            accept_replies: 0,
        }
    }

    /// Canonical coordinates of this instance
    pub fn id(&self) -> Dependency {
        Dependency(self.replica, self.num)
    }

    /// Flag indicating whether the instance is in one of `valid` states
    pub fn is_status(&self, valid: &[Status]) -> bool {
        valid.contains(&self.status)
    }

    /// Asserts the instance is in one of `valid` states. A violation is a
    /// defect in the state machine, not protocol noise, and terminates.
    pub fn assert_status(&self, valid: &[Status]) {
        assert!(
            self.is_status(valid),
            "instance {:?} in unexpected status {:?}; expected one of {:?}",
            self.id(),
            self.status,
            valid
        );
    }

    /// Folds a PreAccept into a fresh instance together with the locally
    /// computed conflicts of its command.
    ///
    /// Returns `Left(())` when the leader's `(seq, deps)` already covered
    /// everything known locally, so an empty acknowledgement suffices;
    /// otherwise `Right((seq, deps))` with the merged values to reply
    /// with. The caller has already verified the instance is new.
    pub fn apply_pre_accept(
        &mut self,
        command: Bytes,
        msg_seq: SeqNum,
        msg_deps: Vec<Dependency>,
        max_local_seq: SeqNum,
        local_deps: DepSet,
    ) -> Either<(), (SeqNum, Vec<Dependency>)> {
        self.status = Status::PreAccepted;

        // nothing new locally iff the message's seq already dominates the
        // local conflicts and the local deps are contained in its deps
        let msg_dep_set: DepSet = msg_deps.iter().cloned().collect();
        let unchanged = msg_seq >= max_local_seq + 1 && local_deps.is_subset(&msg_dep_set);

        self.command = Some(command);
        self.seq = cmp::max(msg_seq, max_local_seq + 1);
        self.deps = local_deps;
        self.deps.merge(msg_deps);

        if unchanged {
            Either::Left(())
        } else {
            Either::Right((self.seq, self.deps.to_vec()))
        }
    }

    /// Merges a peer's `(seq, deps)` into the instance, returning whether
    /// anything changed. On the reply-tally path the incoming seq only
    /// ever grows; on Accept and Commit it is the decided value either
    /// way. Dependencies never shrink.
    pub fn update_state(&mut self, seq: SeqNum, deps: &[Dependency]) -> bool {
        let seq_changed = seq != self.seq;
        if seq_changed {
            self.seq = seq;
        }
        let deps_changed = self.deps.merge(deps.iter().cloned());
        seq_changed || deps_changed
    }

    /// Wire payload carrying the instance's `(seq, deps)` and command
    pub fn wire_state(&self) -> InstanceState {
        let mut state = self.wire_state_without_command();
        state.command = self.command.clone();
        state
    }

    /// Wire payload without the command; Accept does not resend it
    pub fn wire_state_without_command(&self) -> InstanceState {
        InstanceState { seq: self.seq, deps: self.deps.to_vec(), command: None }
    }

    /// Which of two instances executes first within one strongly connected
    /// component. Ordering is by sequence number, then by replica id for
    /// equal sequence numbers.
    pub fn executes_before(&self, other: &Instance) -> bool {
        if self.seq != other.seq {
            return self.seq < other.seq;
        }
        self.replica < other.replica
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_instances_are_blank() {
        let inst = Instance::new(2, 7);
        assert_eq!(Dependency(2, 7), inst.id());
        assert_eq!(Status::None, inst.status);
        assert_eq!(Ballot::initial_for(2), inst.ballot);
        assert!(inst.command.is_none());
        assert!(inst.deps.is_empty());
    }

    #[test]
    fn apply_pre_accept_acks_when_leader_knew_everything() {
        let mut inst = Instance::new(1, 1);
        let result = inst.apply_pre_accept(
            "a0".into(),
            2,
            vec![Dependency(0, 1)],
            1,
            vec![Dependency(0, 1)].into_iter().collect(),
        );

        assert_eq!(Either::Left(()), result);
        assert_eq!(Status::PreAccepted, inst.status);
        assert_eq!(2, inst.seq);
        assert_eq!(vec![Dependency(0, 1)], inst.deps.to_vec());
        assert_eq!(Some("a0".into()), inst.command);
    }

    #[test]
    fn apply_pre_accept_replies_with_merged_state() {
        // local conflicts the leader did not know about
        let mut inst = Instance::new(1, 1);
        let result = inst.apply_pre_accept(
            "a0".into(),
            1,
            vec![],
            3,
            vec![Dependency(2, 2)].into_iter().collect(),
        );

        assert_eq!(Either::Right((4, vec![Dependency(2, 2)])), result);
        assert_eq!(4, inst.seq);

        // local seq behind, but a local dep missing from the message
        let mut inst = Instance::new(1, 2);
        let result = inst.apply_pre_accept(
            "a1".into(),
            5,
            vec![Dependency(0, 1)],
            1,
            vec![Dependency(2, 2)].into_iter().collect(),
        );

        assert_eq!(
            Either::Right((5, vec![Dependency(0, 1), Dependency(2, 2)])),
            result
        );
        assert_eq!(5, inst.seq);
        assert_eq!(vec![Dependency(0, 1), Dependency(2, 2)], inst.deps.to_vec());
    }

    #[test]
    fn update_state_reports_changes() {
        let mut inst = Instance::new(0, 1);
        inst.seq = 2;
        inst.deps.insert(Dependency(1, 1));

        assert!(!inst.update_state(2, &[Dependency(1, 1)]));
        assert!(inst.update_state(3, &[Dependency(1, 1)]));
        assert_eq!(3, inst.seq);
        assert!(inst.update_state(3, &[Dependency(2, 1)]));
        assert_eq!(vec![Dependency(1, 1), Dependency(2, 1)], inst.deps.to_vec());
    }

    #[test]
    fn wire_state_with_and_without_command() {
        let mut inst = Instance::new(0, 1);
        inst.command = Some("a0".into());
        inst.seq = 4;
        inst.deps.insert(Dependency(1, 2));

        let state = inst.wire_state();
        assert_eq!(4, state.seq);
        assert_eq!(vec![Dependency(1, 2)], state.deps);
        assert_eq!(Some("a0".into()), state.command);

        assert_eq!(None, inst.wire_state_without_command().command);
    }

    #[test]
    fn executes_before_orders_by_seq_then_replica() {
        let mut a = Instance::new(0, 1);
        let mut b = Instance::new(1, 1);

        a.seq = 5;
        b.seq = 5;
        assert!(a.executes_before(&b));
        assert!(!b.executes_before(&a));

        b.seq = 4;
        assert!(b.executes_before(&a));
        assert!(!a.executes_before(&b));
    }

    #[test]
    #[should_panic(expected = "unexpected status")]
    fn assert_status_panics_on_violation() {
        let inst = Instance::new(0, 1);
        inst.assert_status(&[Status::Committed]);
    }
}
