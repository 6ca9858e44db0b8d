//! Peer id derivation from certificate subjects.

use crate::{IdentityError, IdentityResult};
use x509_parser::certificate::X509Certificate;

/// Joins organization and organizational unit in a peer id.
pub const PEER_ID_SEPARATOR: char = '-';

/// The subject attributes a peer id is built from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CertSubject {
    pub organization: Option<String>,
    pub organizational_unit: Option<String>,
}

impl CertSubject {
    pub fn new(organization: Option<&str>, organizational_unit: Option<&str>) -> Self {
        Self {
            organization: organization.map(str::to_string),
            organizational_unit: organizational_unit.map(str::to_string),
        }
    }

    /// Read the subject of the first certificate in a PEM document.
    pub fn from_pem(pem: &[u8]) -> IdentityResult<Self> {
        let (_, pem) = x509_parser::pem::parse_x509_pem(pem)
            .map_err(|e| IdentityError::InvalidCertificate(e.to_string()))?;
        let cert = pem
            .parse_x509()
            .map_err(|e| IdentityError::InvalidCertificate(e.to_string()))?;
        Ok(Self::from_certificate(&cert))
    }

    /// Read the subject of a DER certificate (as presented in a TLS handshake).
    pub fn from_der(der: &[u8]) -> IdentityResult<Self> {
        let (_, cert) = x509_parser::parse_x509_certificate(der)
            .map_err(|e| IdentityError::InvalidCertificate(e.to_string()))?;
        Ok(Self::from_certificate(&cert))
    }

    fn from_certificate(cert: &X509Certificate<'_>) -> Self {
        let subject = cert.subject();
        let organization = subject
            .iter_organization()
            .next()
            .and_then(|attr| attr.as_str().ok())
            .map(str::to_string);
        let organizational_unit = subject
            .iter_organizational_unit()
            .next()
            .and_then(|attr| attr.as_str().ok())
            .map(str::to_string);
        Self {
            organization,
            organizational_unit,
        }
    }
}

/// Derive the stable peer id for a certificate subject.
///
/// `O-OU` when both are present, otherwise whichever one is. A subject with
/// neither cannot be identified and the connection must be rejected.
pub fn derive_peer_id(subject: &CertSubject) -> IdentityResult<String> {
    match (
        non_empty(&subject.organization),
        non_empty(&subject.organizational_unit),
    ) {
        (Some(o), Some(ou)) => Ok(format!("{o}{PEER_ID_SEPARATOR}{ou}")),
        (Some(o), None) => Ok(o.to_string()),
        (None, Some(ou)) => Ok(ou.to_string()),
        (None, None) => Err(IdentityError::UnidentifiablePeer),
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
