use crate::ReplicaId;
use bytes::Bytes;
use std::{collections::BTreeMap, fmt, ops::Index};

/// Opaque, host-supplied addressing metadata for a peer. The core never
/// inspects it; it is handed back to the [`Transport`](crate::Transport)
/// with every outbound message.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeMetadata(pub Bytes);

/// Configuration holds the state of the membership of the group.
#[derive(Clone)]
pub struct Configuration {
    current: ReplicaId,
    peers: BTreeMap<ReplicaId, NodeMetadata>,
}

impl Configuration {
    /// Creates a new configuration from the current replica and its peers.
    /// The peer map excludes the current replica.
    pub fn new<I>(current: ReplicaId, peers: I) -> Configuration
    where
        I: Iterator<Item = (ReplicaId, NodeMetadata)>,
    {
        let peers: BTreeMap<ReplicaId, NodeMetadata> = peers.collect();
        assert!(
            !peers.contains_key(&current),
            "peer map must not contain the current replica {}",
            current
        );
        Configuration { current, peers }
    }

    /// Configuration for the fixed group `0..group_size` with default
    /// metadata, seen from `current`.
    pub fn of_group(current: ReplicaId, group_size: usize) -> Configuration {
        assert!((current as usize) < group_size, "current replica outside the group");
        Configuration::new(
            current,
            (0..group_size as ReplicaId)
                .filter(|r| *r != current)
                .map(|r| (r, NodeMetadata::default())),
        )
    }

    /// Size of the slow-path and fast-path quorums, both counting the
    /// current replica.
    ///
    /// With a group of `n = 2f + 1` replicas the slow path needs a simple
    /// majority of `f + 1`. The fast path skips the Accept round and is
    /// only safe here when every replica in the group returned an
    /// unchanged PreAccept reply.
    pub fn quorum_size(&self) -> (usize, usize) {
        let group = self.group_size();
        let f = (group - 1) / 2;
        (f + 1, group)
    }

    /// Number of replicas in the group, including the current one.
    pub fn group_size(&self) -> usize {
        self.peers.len() + 1
    }

    /// Current replica identifier.
    pub fn current(&self) -> ReplicaId {
        self.current
    }

    /// Iterator over peer replica identifiers in ascending order, so that
    /// fan-out order is the same on every run.
    pub fn peers<'a>(&'a self) -> impl Iterator<Item = ReplicaId> + 'a {
        self.peers.keys().cloned()
    }
}

impl Index<ReplicaId> for Configuration {
    type Output = NodeMetadata;

    fn index(&self, replica: ReplicaId) -> &NodeMetadata {
        &self.peers[&replica]
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        let quorum_size = self.quorum_size();
        fmt.debug_struct("Configuration")
            .field("current_replica_id", &self.current)
            .field("peers", &self.peers)
            .field("quorum", &quorum_size)
            .finish()
    }
}
