//! TLS over dialed connections
//!
//! Mail servers are reached on their implicit-TLS ports (993, 995),
//! possibly through a proxy tunnel, so TLS is layered over whatever
//! stream the [`Dialer`](crate::Dialer) returned.
//!
//! Certificate verification is off by default: the readers talk to a
//! fixed set of known hosts through arbitrary proxies, and the
//! operator has chosen to trust the route. Set
//! [`ReaderConfig::verify_certificates`](crate::ReaderConfig) to check
//! certificates against the bundled web PKI roots instead.

use crate::error::{Error, Result};
use rustls::pki_types::ServerName;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tracing::debug;

/// Build a TLS connector, verifying certificates only when asked to.
fn tls_connector(verify: bool) -> Result<TlsConnector> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = rustls::ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| Error::TlsHandshake(format!("Unsupported protocol versions: {e}")))?;

    let config = if verify {
        let mut roots = rustls::RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        builder.with_root_certificates(roots).with_no_client_auth()
    } else {
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate))
            .with_no_client_auth()
    };

    Ok(TlsConnector::from(Arc::new(config)))
}

/// Run the TLS handshake for `host` over an established stream.
///
/// # Errors
///
/// Returns [`Error::TlsHandshake`] if `host` is not a valid server
/// name or the handshake fails. Handshake failures are never retried.
pub async fn wrap(stream: TcpStream, host: &str, verify: bool) -> Result<TlsStream<TcpStream>> {
    let connector = tls_connector(verify)?;
    let server_name = ServerName::try_from(host.to_string())
        .map_err(|e| Error::TlsHandshake(format!("Invalid server name {host}: {e}")))?;

    debug!("Starting TLS handshake with {} (verify: {})", host, verify);
    connector
        .connect(server_name, stream)
        .await
        .map_err(|e| Error::TlsHandshake(format!("{host}: {e}")))
}

/// Certificate verifier that accepts all certificates.
#[derive(Debug)]
struct AcceptAnyCertificate;

impl rustls::client::danger::ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> std::result::Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}
