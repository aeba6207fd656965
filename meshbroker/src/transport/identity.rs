//! Peer routing identities.

use bytes::Bytes;
use std::fmt;

/// Opaque byte string identifying a peer connection.
///
/// Assigned by the router endpoint when a peer connects and stable for the
/// duration of that peer's session. A reconnecting peer gets a fresh
/// identity; the broker treats it as a new peer.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SocketIdentity(Bytes);

impl SocketIdentity {
    pub(crate) fn from_sequence(sequence: u64) -> Self {
        Self(Bytes::from(sequence.to_be_bytes().to_vec()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SocketIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SocketIdentity({self})")
    }
}

impl fmt::Display for SocketIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0.iter() {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identities_are_distinct_and_stable() {
        let a = SocketIdentity::from_sequence(1);
        let b = SocketIdentity::from_sequence(2);
        assert_ne!(a, b);
        assert_eq!(a, SocketIdentity::from_sequence(1));
    }

    #[test]
    fn test_display_is_hex() {
        let id = SocketIdentity::from_sequence(0xff);
        assert_eq!(id.to_string(), "00000000000000ff");
    }
}
