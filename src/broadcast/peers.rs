/// Index into the static replica list; also the replica's vector-clock slot.
pub type ReplicaId = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaSet {
    pub members: Vec<String>,
}

impl ReplicaSet {
    pub fn new(members: Vec<String>) -> Self {
        ReplicaSet { members }
    }

    /// A set of `n` placeholder members, for wiring replicas in-process.
    pub fn local(n: usize) -> Self {
        ReplicaSet {
            members: (0..n).map(|i| format!("replica-{i}")).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, id: ReplicaId) -> bool {
        id < self.members.len()
    }

    pub fn address(&self, id: ReplicaId) -> Option<&str> {
        self.members.get(id).map(String::as_str)
    }

    pub fn ids(&self) -> impl Iterator<Item = ReplicaId> {
        0..self.members.len()
    }

    /// Every member except `me`.
    pub fn others(&self, me: ReplicaId) -> impl Iterator<Item = ReplicaId> {
        self.ids().filter(move |id| *id != me)
    }

    /// Short prefix used in message ids: `a`, `b`, `c`, ...
    pub fn code(id: ReplicaId) -> String {
        if id < 26 {
            char::from(b'a' + id as u8).to_string()
        } else {
            format!("r{id}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_others_skips_self() {
        let peers = ReplicaSet::local(3);
        assert_eq!(peers.others(1).collect::<Vec<_>>(), vec![0, 2]);
        assert!(peers.contains(2));
        assert!(!peers.contains(3));
    }

    #[test]
    fn test_code() {
        assert_eq!(ReplicaSet::code(0), "a");
        assert_eq!(ReplicaSet::code(2), "c");
        assert_eq!(ReplicaSet::code(30), "r30");
    }
}
