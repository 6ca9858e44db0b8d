//! PEM materials for the mutually authenticated peer connections.
//!
//! The local certificate and key identify this node in both directions.
//! Trust is limited to the certificates under `peer-certs/` plus our own
//! certificate, so a node can always reach itself.

use crate::{derive_peer_id, CertSubject, IdentityError, IdentityResult};
use exchange_config_and_utils::Paths;
use parking_lot::RwLock;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::{RootCertStore, ServerConfig};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A trusted peer certificate read from `peer-certs/<id>.pem`.
#[derive(Debug, Clone)]
pub struct PeerCertificate {
    pub id: String,
    pub pem: String,
}

/// Raw PEM materials as read from the data directory.
#[derive(Debug, Clone)]
pub struct TlsMaterials {
    pub cert_pem: String,
    pub key_pem: String,
    pub peer_certs: Vec<PeerCertificate>,
}

impl TlsMaterials {
    /// Read `cert.pem`, `key.pem` and every `*.pem` under `peer-certs/`.
    pub fn load(paths: &Paths) -> IdentityResult<Self> {
        let cert_pem = std::fs::read_to_string(paths.cert_file())?;
        let key_pem = std::fs::read_to_string(paths.key_file())?;
        let peer_certs = read_peer_certs(&paths.peer_certs_dir())?;
        Ok(Self {
            cert_pem,
            key_pem,
            peer_certs,
        })
    }

    pub fn subject(&self) -> IdentityResult<CertSubject> {
        CertSubject::from_pem(self.cert_pem.as_bytes())
    }

    fn trusted_pems(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.cert_pem.as_str()).chain(self.peer_certs.iter().map(|c| c.pem.as_str()))
    }

    /// Outbound client presenting our identity and trusting only peers.
    pub fn http_client(&self, timeout: Duration) -> IdentityResult<reqwest::Client> {
        let identity_pem = format!("{}\n{}", self.key_pem, self.cert_pem);
        let identity = reqwest::Identity::from_pem(identity_pem.as_bytes()).map_err(tls_error)?;

        let mut builder = reqwest::Client::builder()
            .use_rustls_tls()
            .tls_built_in_root_certs(false)
            .identity(identity)
            .timeout(timeout);
        for pem in self.trusted_pems() {
            let cert = reqwest::Certificate::from_pem(pem.as_bytes()).map_err(tls_error)?;
            builder = builder.add_root_certificate(cert);
        }
        builder.build().map_err(tls_error)
    }

    /// Listener config that demands a client certificate chaining to a
    /// trusted peer certificate.
    pub fn server_config(&self) -> IdentityResult<Arc<ServerConfig>> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());

        let mut roots = RootCertStore::empty();
        for pem in self.trusted_pems() {
            for cert in parse_certs(pem)? {
                roots.add(cert).map_err(tls_error)?;
            }
        }

        let verifier = WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider.clone())
            .build()
            .map_err(tls_error)?;

        let certs = parse_certs(&self.cert_pem)?;
        let key = parse_key(&self.key_pem)?;

        let mut config = ServerConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(tls_error)?
            .with_client_cert_verifier(verifier)
            .with_single_cert(certs, key)
            .map_err(tls_error)?;
        config.alpn_protocols = vec![b"http/1.1".to_vec()];
        Ok(Arc::new(config))
    }
}

/// Loaded TLS state shared by the peer listener and outbound deliveries.
///
/// Peer certificate changes swap the client and server config in place;
/// connections already established keep the config they started with.
pub struct TlsContext {
    paths: Paths,
    timeout: Duration,
    peer_id: String,
    cert_pem: String,
    state: RwLock<TlsState>,
}

struct TlsState {
    client: reqwest::Client,
    server: Arc<ServerConfig>,
}

impl TlsContext {
    pub fn load(paths: Paths, timeout: Duration) -> IdentityResult<Self> {
        let materials = TlsMaterials::load(&paths)?;
        let peer_id = derive_peer_id(&materials.subject()?)?;
        let state = TlsState {
            client: materials.http_client(timeout)?,
            server: materials.server_config()?,
        };
        info!(
            peer_id = %peer_id,
            trusted_peers = materials.peer_certs.len(),
            "Loaded TLS materials"
        );
        Ok(Self {
            paths,
            timeout,
            peer_id,
            cert_pem: materials.cert_pem,
            state: RwLock::new(state),
        })
    }

    /// This node's id, derived from its own certificate.
    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    pub fn cert_pem(&self) -> &str {
        &self.cert_pem
    }

    pub fn client(&self) -> reqwest::Client {
        self.state.read().client.clone()
    }

    pub fn server_config(&self) -> Arc<ServerConfig> {
        self.state.read().server.clone()
    }

    /// Re-read `peer-certs/` and swap in fresh client and server configs.
    /// On error the previous configs stay in use.
    pub fn reload_peer_certs(&self) -> IdentityResult<usize> {
        let materials = TlsMaterials::load(&self.paths)?;
        let client = materials.http_client(self.timeout)?;
        let server = materials.server_config()?;
        let count = materials.peer_certs.len();

        let mut state = self.state.write();
        state.client = client;
        state.server = server;
        info!(trusted_peers = count, "Reloaded peer certificates");
        Ok(count)
    }
}

fn read_peer_certs(dir: &Path) -> IdentityResult<Vec<PeerCertificate>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut certs = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let id = match (path.extension().and_then(|e| e.to_str()), path.file_stem()) {
            (Some("pem"), Some(stem)) => stem.to_string_lossy().into_owned(),
            _ => {
                warn!(path = %path.display(), "Ignoring non-PEM file in peer-certs");
                continue;
            }
        };
        let pem = std::fs::read_to_string(&path)?;
        if parse_certs(&pem)?.is_empty() {
            warn!(path = %path.display(), "Ignoring peer certificate file with no certificates");
            continue;
        }
        debug!(peer_id = %id, "Trusting peer certificate");
        certs.push(PeerCertificate { id, pem });
    }
    certs.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(certs)
}

fn parse_certs(pem: &str) -> IdentityResult<Vec<CertificateDer<'static>>> {
    let certs = rustls_pemfile::certs(&mut pem.as_bytes()).collect::<Result<Vec<_>, _>>()?;
    Ok(certs)
}

fn parse_key(pem: &str) -> IdentityResult<PrivateKeyDer<'static>> {
    rustls_pemfile::private_key(&mut pem.as_bytes())?
        .ok_or_else(|| IdentityError::Tls("no private key found in key.pem".to_string()))
}

fn tls_error(err: impl std::fmt::Display) -> IdentityError {
    IdentityError::Tls(err.to_string())
}
