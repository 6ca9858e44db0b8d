//! Peer identity and destination resolution.
//!
//! - [`derive_peer_id`] turns the organization / organizational-unit fields
//!   of a certificate subject into a stable peer id
//! - [`Address`] splits `peer/destination` values
//! - [`AddressBook`] enforces that senders are local and recipients are
//!   known peers, and that destinations are declared
//! - [`TlsContext`] holds the PEM materials used on both sides of a
//!   mutually authenticated connection

mod address;
mod error;
mod peer_id;
mod tls;

pub use address::{Address, AddressBook, ADDRESS_SEPARATOR};
pub use error::{IdentityError, IdentityResult};
pub use peer_id::{derive_peer_id, CertSubject, PEER_ID_SEPARATOR};
pub use tls::{PeerCertificate, TlsContext, TlsMaterials};
