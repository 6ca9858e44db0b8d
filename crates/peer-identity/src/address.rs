//! `peer/destination` addresses and their validation against the registry.

use crate::{IdentityError, IdentityResult};
use exchange_config_and_utils::{Peer, PeerSnapshot};
use std::fmt;

/// Separates the peer id from an optional destination.
pub const ADDRESS_SEPARATOR: char = '/';

/// A peer id with an optional destination behind it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub peer_id: String,
    pub destination: Option<String>,
}

impl Address {
    pub fn new(peer_id: impl Into<String>, destination: Option<&str>) -> Self {
        Self {
            peer_id: peer_id.into(),
            destination: destination.map(str::to_string),
        }
    }

    /// Split on the first separator. Anything after it, including further
    /// separators, is the destination.
    pub fn parse(value: &str) -> IdentityResult<Self> {
        let (peer_id, destination) = match value.split_once(ADDRESS_SEPARATOR) {
            Some((peer_id, destination)) => (peer_id, Some(destination)),
            None => (value, None),
        };
        if peer_id.is_empty() {
            return Err(IdentityError::InvalidAddress(value.to_string()));
        }
        if destination.is_some_and(str::is_empty) {
            return Err(IdentityError::InvalidAddress(value.to_string()));
        }
        Ok(Self::new(peer_id, destination))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.destination {
            Some(destination) => write!(f, "{}{}{}", self.peer_id, ADDRESS_SEPARATOR, destination),
            None => f.write_str(&self.peer_id),
        }
    }
}

/// Validates addresses against this node's id and a registry snapshot.
///
/// Unknown peers and undeclared destinations are always rejected.
pub struct AddressBook<'a> {
    local_id: &'a str,
    snapshot: &'a PeerSnapshot,
}

impl<'a> AddressBook<'a> {
    pub fn new(local_id: &'a str, snapshot: &'a PeerSnapshot) -> Self {
        Self { local_id, snapshot }
    }

    /// Outbound sender: must be this node, with a declared local destination.
    pub fn resolve_sender(&self, value: &str) -> IdentityResult<Address> {
        let address = Address::parse(value)?;
        if address.peer_id != self.local_id {
            return Err(IdentityError::UnknownSender(address.peer_id));
        }
        self.check_local_destination(&address)?;
        Ok(address)
    }

    /// Outbound recipient: must be a registered remote peer. Returns the
    /// peer so the caller has its endpoint.
    pub fn resolve_recipient(&self, value: &str) -> IdentityResult<(Address, &'a Peer)> {
        let address = Address::parse(value)?;
        let peer = self
            .snapshot
            .peer(&address.peer_id)
            .ok_or_else(|| IdentityError::UnknownRecipient(address.peer_id.clone()))?;
        if let Some(destination) = &address.destination {
            if !peer.has_destination(destination) {
                return Err(unknown_destination(&address.peer_id, destination));
            }
        }
        Ok((address, peer))
    }

    /// Inbound sender as identified by its certificate. The peer must be
    /// this node or a registered peer, and any destination it claims must
    /// be declared for it.
    pub fn resolve_remote_sender(
        &self,
        peer_id: &str,
        destination: Option<&str>,
    ) -> IdentityResult<Address> {
        let address = Address::new(peer_id, destination);
        if peer_id == self.local_id {
            self.check_local_destination(&address)?;
            return Ok(address);
        }
        let peer = self
            .snapshot
            .peer(peer_id)
            .ok_or_else(|| IdentityError::UnknownSender(peer_id.to_string()))?;
        if let Some(destination) = destination {
            if !peer.has_destination(destination) {
                return Err(unknown_destination(peer_id, destination));
            }
        }
        Ok(address)
    }

    /// Inbound recipient: always this node, destination must be local.
    pub fn resolve_local_recipient(&self, destination: Option<&str>) -> IdentityResult<Address> {
        let address = Address::new(self.local_id, destination);
        self.check_local_destination(&address)?;
        Ok(address)
    }

    fn check_local_destination(&self, address: &Address) -> IdentityResult<()> {
        match &address.destination {
            Some(destination)
                if !self.snapshot.local_destinations.iter().any(|d| d == destination) =>
            {
                Err(unknown_destination(&address.peer_id, destination))
            }
            _ => Ok(()),
        }
    }
}

fn unknown_destination(peer_id: &str, destination: &str) -> IdentityError {
    IdentityError::UnknownDestination {
        peer_id: peer_id.to_string(),
        destination: destination.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> PeerSnapshot {
        let mut peer = Peer::new("globex", "https://globex:3001");
        peer.destinations = Some(vec!["billing".to_string()]);
        PeerSnapshot {
            peers: vec![peer, Peer::new("initech", "https://initech:3001/")],
            local_destinations: vec!["app".to_string()],
        }
    }

    #[test]
    fn test_parse_plain_and_with_destination() {
        assert_eq!(Address::parse("acme-node1").unwrap(), Address::new("acme-node1", None));
        assert_eq!(
            Address::parse("acme-node1/app/v2").unwrap(),
            Address::new("acme-node1", Some("app/v2"))
        );
    }

    #[test]
    fn test_parse_rejects_empty_parts() {
        assert!(Address::parse("").is_err());
        assert!(Address::parse("/app").is_err());
        assert!(Address::parse("acme/").is_err());
    }

    #[test]
    fn test_display_round_trips_separator() {
        let address = Address::new("acme", Some("app"));
        assert_eq!(address.to_string(), "acme/app");
        assert_eq!(Address::new("acme", None).to_string(), "acme");
    }

    #[test]
    fn test_resolve_sender_must_be_local() {
        let snapshot = snapshot();
        let book = AddressBook::new("acme-node1", &snapshot);

        assert!(book.resolve_sender("acme-node1").is_ok());
        assert!(book.resolve_sender("acme-node1/app").is_ok());
        assert!(matches!(
            book.resolve_sender("globex"),
            Err(IdentityError::UnknownSender(_))
        ));
        assert!(matches!(
            book.resolve_sender("acme-node1/other"),
            Err(IdentityError::UnknownDestination { .. })
        ));
    }

    #[test]
    fn test_resolve_recipient_requires_known_peer_and_destination() {
        let snapshot = snapshot();
        let book = AddressBook::new("acme-node1", &snapshot);

        let (address, peer) = book.resolve_recipient("globex/billing").unwrap();
        assert_eq!(address.destination.as_deref(), Some("billing"));
        assert_eq!(peer.endpoint, "https://globex:3001");

        assert!(matches!(
            book.resolve_recipient("globex/shipping"),
            Err(IdentityError::UnknownDestination { .. })
        ));
        assert!(matches!(
            book.resolve_recipient("initech/billing"),
            Err(IdentityError::UnknownDestination { .. })
        ));
        assert!(matches!(
            book.resolve_recipient("umbrella"),
            Err(IdentityError::UnknownRecipient(_))
        ));
    }

    #[test]
    fn test_resolve_remote_sender() {
        let snapshot = snapshot();
        let book = AddressBook::new("acme-node1", &snapshot);

        assert!(book.resolve_remote_sender("globex", Some("billing")).is_ok());
        assert!(book.resolve_remote_sender("acme-node1", Some("app")).is_ok());
        assert!(book.resolve_remote_sender("umbrella", None).is_err());
        assert!(book.resolve_remote_sender("globex", Some("nope")).is_err());
    }

    #[test]
    fn test_resolve_local_recipient() {
        let snapshot = snapshot();
        let book = AddressBook::new("acme-node1", &snapshot);

        assert_eq!(
            book.resolve_local_recipient(Some("app")).unwrap().to_string(),
            "acme-node1/app"
        );
        assert!(book.resolve_local_recipient(None).is_ok());
        assert!(book.resolve_local_recipient(Some("nope")).is_err());
    }
}
