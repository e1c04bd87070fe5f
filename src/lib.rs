//! Rust implementation of the Egalitarian Paxos replica core.
//!
//! Egalitarian Paxos is leaderless: any replica acts as command leader for
//! the commands it receives, committing in a single round trip on the fast
//! path when its peers agree on the command's `(seq, deps)`, and falling
//! back to a classic two-phase Accept round otherwise. Committed commands
//! are executed by walking the dependency graph: strongly connected
//! components retire in reverse topological order, ordered internally by
//! Lamport sequence number.
//!
//! The core is deterministic and free of I/O. It is driven by three kinds
//! of events (`propose`, `receive` and `tick`) and emits outbound
//! messages through a [`Transport`] plus executed commands through a drain.
//! Networking, persistence and wall-clock timers belong to the host.
//!
//! # Examples
//!
//! ```rust
//! use epaxos::{Configuration, Outbox, Replica};
//!
//! // a group of three replicas; commands interfere when equal
//! let config = Configuration::of_group(0, 3);
//! let mut replica = Replica::new(
//!     Outbox::new(),
//!     config,
//!     |a: &bytes::Bytes, b: &bytes::Bytes| a == b,
//! );
//!
//! replica.propose("set x=1".into());
//! for (to, message) in replica.drain_outbox() {
//!     // hand each message to the transport layer
//!     let _ = (to, message);
//! }
//! ```

#[macro_use]
extern crate log;

mod config;
mod conflict;
mod deps;
mod graph;
mod instance;
mod messages;
mod replica;
mod space;
mod timer;

use serde::{Deserialize, Serialize};
use std::cmp;

pub use config::{Configuration, NodeMetadata};
pub use conflict::Conflicts;
pub use messages::{Commander, InstanceState, Message, Outbox, Receiver, Transport};
pub use replica::Replica;

/// A `ReplicaId` is a unique value that identifies a replica
/// within the fixed group.
pub type ReplicaId = u32;

/// Per-replica consensus slot number, increasing from 1.
pub type InstanceNum = u64;

/// Lamport sequence number attached to each instance; monotone over
/// interfering commands and used to order members of a strongly connected
/// component of the dependency graph.
pub type SeqNum = u64;

/// Canonical coordinates `(replica, instance)` of a consensus instance.
///
/// A `Dependency` identifies the instance it points at, both as an edge of
/// the execution graph and as a member of an instance's dependency set.
/// The derived ordering, replica first and instance number second, is the
/// canonical order in which dependency sequences appear on the wire.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct Dependency(pub ReplicaId, pub InstanceNum);

/// Ballot numbering orders competing command leaders for a single
/// instance as a `(epoch, counter, owner)` triple compared
/// lexicographically. The core never advances ballots (recovery via
/// Explicit Prepare is the host's concern) but every instance carries its
/// owner's initial ballot.
#[derive(PartialEq, Hash, Eq, Clone, Copy, Debug)]
pub struct Ballot(pub u32, pub u32, pub ReplicaId);

impl Ballot {
    /// Initial ballot owned by `replica`.
    pub fn initial_for(replica: ReplicaId) -> Ballot {
        Ballot(0, 0, replica)
    }
}

impl PartialOrd for Ballot {
    fn partial_cmp(&self, other: &Ballot) -> Option<cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ballot {
    fn cmp(&self, other: &Ballot) -> cmp::Ordering {
        match self.0.cmp(&other.0) {
            cmp::Ordering::Equal => match self.1.cmp(&other.1) {
                cmp::Ordering::Equal => self.2.cmp(&other.2),
                o => o,
            },
            o => o,
        }
    }
}
