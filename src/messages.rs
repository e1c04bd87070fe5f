use crate::{Dependency, NodeMetadata, ReplicaId, SeqNum};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Sends protocol messages to the other replicas of the group.
pub trait Transport {
    /// Send a message to a single replica
    fn send(&mut self, replica: ReplicaId, metadata: &NodeMetadata, message: Message);
}

/// Receiver of protocol messages.
pub trait Receiver {
    /// Receives a decoded message from `from` and reacts accordingly
    fn receive(&mut self, from: ReplicaId, message: Message);
}

/// Receiver of protocol messages.
///
/// This is a convenience trait that breaks out reactors for each message.
pub trait Commander {
    /// Receive a PreAccept carrying the command leader's initial estimate
    /// of the command's `(seq, deps)`
    fn pre_accept(&mut self, from: ReplicaId, id: Dependency, state: InstanceState);

    /// Receive the empty PreAccept acknowledgement meaning the peer had
    /// nothing to add to the leader's `(seq, deps)`
    fn pre_accept_ok(&mut self, from: ReplicaId, id: Dependency);

    /// Receive a PreAccept reply carrying the peer's merged `(seq, deps)`
    fn pre_accept_reply(
        &mut self,
        from: ReplicaId,
        id: Dependency,
        seq: SeqNum,
        deps: Vec<Dependency>,
    );

    /// Receive a slow-path Accept fixing the instance's `(seq, deps)`. The
    /// command is not resent; it arrived with PreAccept or arrives with
    /// Commit.
    fn accept(&mut self, from: ReplicaId, id: Dependency, state: InstanceState);

    /// Receive an empty Accept acknowledgement
    fn accept_ok(&mut self, from: ReplicaId, id: Dependency);

    /// Receive the final commit of an instance. No reply is produced.
    fn commit(&mut self, from: ReplicaId, id: Dependency, state: InstanceState);
}

impl<T: Commander> Receiver for T {
    fn receive(&mut self, from: ReplicaId, message: Message) {
        match message {
            Message::PreAccept(id, state) => {
                self.pre_accept(from, id, state);
            }
            Message::PreAcceptOk(id) => {
                self.pre_accept_ok(from, id);
            }
            Message::PreAcceptReply(id, seq, deps) => {
                self.pre_accept_reply(from, id, seq, deps);
            }
            Message::Accept(id, state) => {
                self.accept(from, id, state);
            }
            Message::AcceptOk(id) => {
                self.accept_ok(from, id);
            }
            Message::Commit(id, state) => {
                self.commit(from, id, state);
            }
        }
    }
}

/// Shared `(seq, deps, command)` payload of PreAccept, Accept and Commit.
/// Dependencies are emitted in canonical `(replica, instance)` order so
/// that equal-content messages encode identically.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct InstanceState {
    /// Lamport sequence number
    pub seq: SeqNum,
    /// Interfering instances, canonically ordered
    pub deps: Vec<Dependency>,
    /// Command payload; `None` on Accept
    pub command: Option<Bytes>,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
/// RPC messages sent between replicas
pub enum Message {
    /// Phase 1 PreAccept for an instance, carrying the command and the
    /// leader's initial `(seq, deps)`
    PreAccept(Dependency, InstanceState),

    /// Empty acknowledgement of a PreAccept: the peer's local conflicts
    /// added nothing to the leader's estimate
    PreAcceptOk(Dependency),

    /// PreAccept reply carrying the peer's merged sequence number and
    /// dependencies
    PreAcceptReply(Dependency, SeqNum, Vec<Dependency>),

    /// Phase 2 Accept fixing `(seq, deps)` after the fast path was lost;
    /// carries no command
    Accept(Dependency, InstanceState),

    /// Empty acknowledgement of an Accept
    AcceptOk(Dependency),

    /// Final commit of an instance's `(command, seq, deps)`
    Commit(Dependency, InstanceState),
}

/// Transport that queues messages for the host to drain after each event,
/// keyed by destination replica.
#[derive(Default, Debug)]
pub struct Outbox {
    messages: Vec<(ReplicaId, Message)>,
}

impl Outbox {
    /// Creates an empty outbox
    pub fn new() -> Outbox {
        Outbox::default()
    }

    /// Removes and returns every queued `(destination, message)` pair in
    /// send order
    pub fn drain(&mut self) -> Vec<(ReplicaId, Message)> {
        std::mem::take(&mut self.messages)
    }

    /// Flag indicating whether any messages are queued
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl Transport for Outbox {
    fn send(&mut self, replica: ReplicaId, _: &NodeMetadata, message: Message) {
        self.messages.push((replica, message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outbox_drains_in_send_order() {
        let mut outbox = Outbox::new();
        assert!(outbox.is_empty());

        outbox.send(2, &NodeMetadata::default(), Message::PreAcceptOk(Dependency(0, 1)));
        outbox.send(1, &NodeMetadata::default(), Message::AcceptOk(Dependency(0, 1)));
        assert!(!outbox.is_empty());

        let drained = outbox.drain();
        assert_eq!(
            vec![
                (2, Message::PreAcceptOk(Dependency(0, 1))),
                (1, Message::AcceptOk(Dependency(0, 1))),
            ],
            drained
        );
        assert!(outbox.is_empty());
        assert!(outbox.drain().is_empty());
    }

    #[test]
    fn receive_dispatches_by_message_kind() {
        #[derive(Default)]
        struct Tally {
            seen: Vec<&'static str>,
        }

        impl Commander for Tally {
            fn pre_accept(&mut self, _: ReplicaId, _: Dependency, _: InstanceState) {
                self.seen.push("pre_accept");
            }
            fn pre_accept_ok(&mut self, _: ReplicaId, _: Dependency) {
                self.seen.push("pre_accept_ok");
            }
            fn pre_accept_reply(&mut self, _: ReplicaId, _: Dependency, _: SeqNum, _: Vec<Dependency>) {
                self.seen.push("pre_accept_reply");
            }
            fn accept(&mut self, _: ReplicaId, _: Dependency, _: InstanceState) {
                self.seen.push("accept");
            }
            fn accept_ok(&mut self, _: ReplicaId, _: Dependency) {
                self.seen.push("accept_ok");
            }
            fn commit(&mut self, _: ReplicaId, _: Dependency, _: InstanceState) {
                self.seen.push("commit");
            }
        }

        let id = Dependency(1, 1);
        let state = InstanceState { seq: 1, deps: vec![], command: None };

        let mut tally = Tally::default();
        tally.receive(0, Message::PreAccept(id, state.clone()));
        tally.receive(0, Message::PreAcceptOk(id));
        tally.receive(0, Message::PreAcceptReply(id, 2, vec![]));
        tally.receive(0, Message::Accept(id, state.clone()));
        tally.receive(0, Message::AcceptOk(id));
        tally.receive(0, Message::Commit(id, state));

        assert_eq!(
            vec!["pre_accept", "pre_accept_ok", "pre_accept_reply", "accept", "accept_ok", "commit"],
            tally.seen
        );
    }
}
