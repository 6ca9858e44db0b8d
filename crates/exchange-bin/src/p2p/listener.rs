//! TLS accept loop for the peer listener.

use super::{router, PeerIdentity};
use crate::app::AppState;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::TokioIo;
use peer_identity::{derive_peer_id, CertSubject, IdentityError, IdentityResult};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::server::TlsStream;
use tokio_rustls::TlsAcceptor;
use tower::ServiceExt;
use tracing::{debug, warn};

/// Accept peer connections until the listener fails.
///
/// The server config is fetched per connection so certificates added at
/// runtime are trusted by the next handshake.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    let app = router(state.clone());
    loop {
        let (stream, remote) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(error = %e, "Failed to accept peer connection");
                tokio::time::sleep(Duration::from_millis(100)).await;
                continue;
            }
        };

        let acceptor = TlsAcceptor::from(state.tls.server_config());
        let app = app.clone();
        tokio::spawn(async move {
            let stream = match acceptor.accept(stream).await {
                Ok(stream) => stream,
                Err(e) => {
                    debug!(remote = %remote, error = %e, "Peer TLS handshake failed");
                    return;
                }
            };
            let peer = match identify(&stream) {
                Ok(peer) => peer,
                Err(e) => {
                    warn!(remote = %remote, error = %e, "Rejected peer connection");
                    return;
                }
            };
            serve_connection(stream, remote, peer, app).await;
        });
    }
}

async fn serve_connection(
    stream: TlsStream<TcpStream>,
    remote: SocketAddr,
    peer: PeerIdentity,
    app: axum::Router,
) {
    debug!(peer_id = %peer.id, remote = %remote, "Peer connected");
    let service = service_fn(move |mut request: Request<Incoming>| {
        request.extensions_mut().insert(peer.clone());
        app.clone().oneshot(request)
    });

    if let Err(e) = hyper::server::conn::http1::Builder::new()
        .serve_connection(TokioIo::new(stream), service)
        .await
    {
        debug!(remote = %remote, error = %e, "Peer connection closed with error");
    }
}

/// Peer id from the verified client certificate.
fn identify(stream: &TlsStream<TcpStream>) -> IdentityResult<PeerIdentity> {
    let (_, connection) = stream.get_ref();
    let certificate = connection
        .peer_certificates()
        .and_then(|chain| chain.first())
        .ok_or(IdentityError::UnidentifiablePeer)?;
    let subject = CertSubject::from_der(certificate.as_ref())?;
    Ok(PeerIdentity {
        id: derive_peer_id(&subject)?,
    })
}
