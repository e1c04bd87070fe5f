use bytes::Bytes;

/// Interference relation over commands, supplied by the host.
///
/// Two commands interfere when executing them in different orders is
/// observable; interfering commands become dependencies of one another and
/// are ordered by the execution graph. The relation must be symmetric.
/// Commands themselves stay opaque to the consensus core.
pub trait Conflicts {
    /// Whether `a` and `b` interfere
    fn conflicts(&self, a: &Bytes, b: &Bytes) -> bool;
}

impl<F> Conflicts for F
where
    F: Fn(&Bytes, &Bytes) -> bool,
{
    fn conflicts(&self, a: &Bytes, b: &Bytes) -> bool {
        self(a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_are_conflict_relations() {
        let same_first_byte = |a: &Bytes, b: &Bytes| a.first() == b.first();
        assert!(same_first_byte.conflicts(&"a1".into(), &"a2".into()));
        assert!(!same_first_byte.conflicts(&"a1".into(), &"b1".into()));
    }
}
