use crate::conflict::Conflicts;
use crate::graph::ExecGraph;
use crate::instance::{Status, SLOW_PATH_TIMEOUT};
use crate::messages::{Commander, InstanceState, Message, Outbox, Transport};
use crate::space::InstanceSpace;
use crate::timer::TickingTimers;
use crate::{Configuration, Dependency, ReplicaId, SeqNum};
use bytes::Bytes;
use either::Either;
use std::mem;

/// State manager for one member of an Egalitarian Paxos group.
///
/// The replica owns the instance space, routes every inbound message to
/// the instance it names, acts as command leader for locally proposed
/// commands, and retires committed instances through the execution graph.
/// It is driven entirely by [`propose`](Replica::propose),
/// [`receive`](crate::Receiver::receive) and [`tick`](Replica::tick);
/// each event runs to completion and leaves its output in the transport
/// and the executed-command buffer.
pub struct Replica<T, C> {
    transport: T,
    config: Configuration,
    conflicts: C,
    space: InstanceSpace,
    timers: TickingTimers<Dependency>,
    graph: ExecGraph,
    executed: Vec<Bytes>,
}

impl<T: Transport, C: Conflicts> Replica<T, C> {
    /// Replica creation from a transport, group configuration and the
    /// host's command interference relation
    pub fn new(transport: T, config: Configuration, conflicts: C) -> Replica<T, C> {
        Replica {
            transport,
            config,
            conflicts,
            space: InstanceSpace::new(),
            timers: TickingTimers::new(),
            graph: ExecGraph::new(),
            executed: Vec::new(),
        }
    }

    /// Proposes a command with this replica as its command leader.
    ///
    /// Allocates the next instance on this replica's own row, records the
    /// command's interference with everything known locally, and starts
    /// the PreAccept round.
    pub fn propose(&mut self, command: Bytes) {
        let current = self.config.current();
        let id = Dependency(current, self.space.next_num(current));
        let (max_seq, deps) = self.space.seq_and_deps(&self.conflicts, &command);

        let inst = self.space.get_or_insert(id);
        inst.assert_status(&[Status::None]);
        inst.command = Some(command);
        inst.seq = max_seq + 1;
        inst.deps = deps;
        inst.status = Status::PreAccepted;
        trace!("proposing {:?} with seq {} and {} deps", id, inst.seq, inst.deps.len());

        let state = inst.wire_state();
        self.broadcast(Message::PreAccept(id, state));
    }

    /// Advances logical time by one tick. A slow-path timer whose
    /// countdown ends moves its instance to the Accept round, unless the
    /// instance progressed past PreAccepted in the meantime.
    pub fn tick(&mut self) {
        for id in self.timers.tick() {
            let status = match self.space.get(id) {
                Some(inst) => inst.status,
                None => continue,
            };
            if status == Status::PreAccepted {
                debug!("slow-path timer lapsed for {:?}, starting the Accept round", id);
                self.transition_to_accept(id);
            } else {
                debug!("slow-path timer for {:?} ignored in status {:?}", id, status);
            }
        }
    }

    /// Commands whose execution order has been decided since the last
    /// drain, in execution order
    pub fn drain_executed(&mut self) -> Vec<Bytes> {
        mem::take(&mut self.executed)
    }

    /// Group configuration of this replica
    pub fn config(&self) -> &Configuration {
        &self.config
    }

    #[inline(always)]
    fn send(&mut self, replica: ReplicaId, message: Message) {
        self.transport.send(replica, &self.config[replica], message);
    }

    #[inline(always)]
    fn broadcast(&mut self, message: Message) {
        for replica in self.config.peers() {
            self.transport.send(replica, &self.config[replica], message.clone());
        }
    }

    /// Tallies one more PreAccept reply on the command leader and decides
    /// between committing fast, falling back to the Accept round, and
    /// waiting.
    fn tally_pre_accept_replies(&mut self, id: Dependency, replies: usize, different: bool) {
        let (slow_quorum, fast_quorum) = self.config.quorum_size();
        if !different && replies >= fast_quorum {
            self.timers.cancel(&id);
            self.transition_to_commit(id);
        } else if replies >= slow_quorum {
            if different {
                // a changed reply rules the fast path out for good
                self.timers.cancel(&id);
                self.transition_to_accept(id);
            } else if !self.timers.is_armed(&id) {
                // hold the slow path open; stragglers may still complete
                // the fast quorum
                self.timers.arm(id, SLOW_PATH_TIMEOUT);
            } else {
                trace!("slow-path timer for {:?} already running", id);
            }
        }
    }

    fn transition_to_accept(&mut self, id: Dependency) {
        let inst = self.space.get_mut(id).expect("transition for unknown instance");
        inst.assert_status(&[Status::PreAccepted]);
        inst.status = Status::Accepted;
        let state = inst.wire_state_without_command();
        debug!("taking the slow path for {:?}", id);
        self.broadcast(Message::Accept(id, state));
    }

    fn transition_to_commit(&mut self, id: Dependency) {
        let inst = self.space.get_mut(id).expect("transition for unknown instance");
        inst.assert_status(&[Status::PreAccepted, Status::Accepted]);
        inst.status = Status::Committed;
        debug!("committing {:?} with seq {} at ballot {:?}", id, inst.seq, inst.ballot);
        let state = inst.wire_state();
        self.broadcast(Message::Commit(id, state));
        self.enqueue_execution(id);
    }

    fn enqueue_execution(&mut self, id: Dependency) {
        self.graph.offer(id);
        let executed = self.graph.drain(&mut self.space);
        self.executed.extend(executed);
    }
}

impl<C: Conflicts> Replica<Outbox, C> {
    /// Messages produced since the last drain, as `(destination, message)`
    /// pairs in send order
    pub fn drain_outbox(&mut self) -> Vec<(ReplicaId, Message)> {
        self.transport.drain()
    }
}

impl<T: Transport, C: Conflicts> Commander for Replica<T, C> {
    fn pre_accept(&mut self, from: ReplicaId, id: Dependency, state: InstanceState) {
        let command = match state.command {
            Some(command) => command,
            None => {
                warn!("PreAccept from {} for {:?} without a command", from, id);
                return;
            }
        };

        {
            let inst = self.space.get_or_insert(id);
            if !inst.is_status(&[Status::None]) {
                debug!("ignoring PreAccept from {} for {:?} in status {:?}", from, id, inst.status);
                return;
            }
        }

        // the command's interference as seen from here; the instance
        // itself has no command recorded yet and cannot contribute
        let (max_local_seq, local_deps) = self.space.seq_and_deps(&self.conflicts, &command);

        let inst = self.space.get_mut(id).expect("instance created above");
        let reply = match inst.apply_pre_accept(command, state.seq, state.deps, max_local_seq, local_deps)
        {
            Either::Left(()) => Message::PreAcceptOk(id),
            Either::Right((seq, deps)) => Message::PreAcceptReply(id, seq, deps),
        };
        self.send(id.0, reply);
    }

    fn pre_accept_ok(&mut self, from: ReplicaId, id: Dependency) {
        if id.0 != self.config.current() {
            debug!("PreAcceptOk from {} for {:?} at a replica that is not its leader", from, id);
            return;
        }
        let inst = match self.space.get_mut(id) {
            Some(inst) => inst,
            None => {
                debug!("PreAcceptOk from {} for unknown instance {:?}", from, id);
                return;
            }
        };
        if !inst.is_status(&[Status::PreAccepted]) {
            debug!("ignoring PreAcceptOk from {} for {:?} in status {:?}", from, id, inst.status);
            return;
        }

        inst.pre_accept_replies += 1;
        let replies = inst.pre_accept_replies + 1; // the leader counts itself
        let different = inst.different_replies;
        self.tally_pre_accept_replies(id, replies, different);
    }

    fn pre_accept_reply(&mut self, from: ReplicaId, id: Dependency, seq: SeqNum, deps: Vec<Dependency>) {
        if id.0 != self.config.current() {
            debug!("PreAcceptReply from {} for {:?} at a replica that is not its leader", from, id);
            return;
        }
        let inst = match self.space.get_mut(id) {
            Some(inst) => inst,
            None => {
                debug!("PreAcceptReply from {} for unknown instance {:?}", from, id);
                return;
            }
        };
        if !inst.is_status(&[Status::PreAccepted]) {
            debug!("ignoring PreAcceptReply from {} for {:?} in status {:?}", from, id, inst.status);
            return;
        }

        // remember once and for all whether any peer knew something new
        let changed = inst.update_state(seq, &deps);
        inst.different_replies = inst.different_replies || changed;

        inst.pre_accept_replies += 1;
        let replies = inst.pre_accept_replies + 1; // the leader counts itself
        let different = inst.different_replies;
        self.tally_pre_accept_replies(id, replies, different);
    }

    fn accept(&mut self, from: ReplicaId, id: Dependency, state: InstanceState) {
        let inst = self.space.get_or_insert(id);
        if !inst.is_status(&[Status::None, Status::PreAccepted]) {
            debug!("ignoring Accept from {} for {:?} in status {:?}", from, id, inst.status);
            return;
        }

        inst.status = Status::Accepted;
        inst.update_state(state.seq, &state.deps);
        self.send(id.0, Message::AcceptOk(id));
    }

    fn accept_ok(&mut self, from: ReplicaId, id: Dependency) {
        if id.0 != self.config.current() {
            debug!("AcceptOk from {} for {:?} at a replica that is not its leader", from, id);
            return;
        }
        let inst = match self.space.get_mut(id) {
            Some(inst) => inst,
            None => {
                debug!("AcceptOk from {} for unknown instance {:?}", from, id);
                return;
            }
        };
        if !inst.is_status(&[Status::Accepted]) {
            debug!("ignoring AcceptOk from {} for {:?} in status {:?}", from, id, inst.status);
            return;
        }

        inst.accept_replies += 1;
        let (slow_quorum, _) = self.config.quorum_size();
        if inst.accept_replies + 1 >= slow_quorum {
            self.transition_to_commit(id);
        }
    }

    fn commit(&mut self, from: ReplicaId, id: Dependency, state: InstanceState) {
        let command = match state.command {
            Some(command) => command,
            None => {
                warn!("Commit from {} for {:?} without a command", from, id);
                return;
            }
        };

        let inst = self.space.get_or_insert(id);
        if !inst.is_status(&[Status::None, Status::PreAccepted, Status::Accepted]) {
            debug!("ignoring Commit from {} for {:?} in status {:?}", from, id, inst.status);
            return;
        }

        inst.status = Status::Committed;
        inst.command = Some(command);
        inst.update_state(state.seq, &state.deps);
        debug!("committed {:?} with seq {}", id, inst.seq);
        self.enqueue_execution(id);
    }
}
