use std::fmt;

/// Durable handle for one person across a whole tracking session.
///
/// Values are minted by the resolver in ascending order starting at 0 and
/// are never reused within a session. Unlike a short-term track id, a
/// `GlobalIdentity` survives occlusion and re-entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GlobalIdentity(u64);

impl GlobalIdentity {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for GlobalIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
