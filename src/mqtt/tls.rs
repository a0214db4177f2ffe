//! TLS transport for broker connections
//!
//! Trust anchors come from a PEM CA bundle when one is configured, otherwise
//! from the Mozilla root set. A client certificate is presented when both a
//! certificate chain and a private key are configured (AWS IoT style).

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use tokio_rustls::rustls::{crypto, ClientConfig, RootCertStore};

use super::error::MqttError;

/// PEM files used to build the TLS client configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsFiles {
    /// CA bundle; the Mozilla roots are used when unset
    pub ca: Option<PathBuf>,

    /// Client certificate chain
    pub cert: Option<PathBuf>,

    /// Client private key (PKCS#1, PKCS#8 or SEC1)
    pub key: Option<PathBuf>,
}

impl TlsFiles {
    pub fn ca(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca = Some(path.into());
        self
    }

    pub fn client_auth(mut self, cert: impl Into<PathBuf>, key: impl Into<PathBuf>) -> Self {
        self.cert = Some(cert.into());
        self.key = Some(key.into());
        self
    }
}

/// Wraps TCP streams in TLS
#[derive(Clone)]
pub struct TlsConnector {
    inner: tokio_rustls::TlsConnector,
}

impl TlsConnector {
    /// Load certificates and build a connector
    pub fn from_files(files: &TlsFiles) -> Result<Self, MqttError> {
        let config = client_config(files)?;
        Ok(Self {
            inner: tokio_rustls::TlsConnector::from(config),
        })
    }

    /// Run the TLS handshake, verifying the certificate against `host`
    pub async fn connect(
        &self,
        host: &str,
        stream: TcpStream,
        handshake_timeout: Duration,
    ) -> Result<TlsStream<TcpStream>, MqttError> {
        let server_name = ServerName::try_from(host)
            .map_err(|e| MqttError::TlsConfig(format!("invalid server name {host}: {e}")))?
            .to_owned();

        let stream = timeout(handshake_timeout, self.inner.connect(server_name, stream))
            .await
            .map_err(|_| MqttError::Timeout("TLS handshake"))??;

        tracing::debug!(host, "TLS session established");
        Ok(stream)
    }
}

fn client_config(files: &TlsFiles) -> Result<Arc<ClientConfig>, MqttError> {
    let mut roots = RootCertStore::empty();
    match &files.ca {
        Some(path) => {
            for cert in load_certs(path)? {
                roots
                    .add(cert)
                    .map_err(|e| MqttError::TlsConfig(format!("{}: {e}", path.display())))?;
            }
        }
        None => roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned()),
    }

    let builder = ClientConfig::builder_with_provider(Arc::new(crypto::ring::default_provider()))
        .with_safe_default_protocol_versions()
        .map_err(|e| MqttError::TlsConfig(e.to_string()))?
        .with_root_certificates(roots);

    let config = match (&files.cert, &files.key) {
        (Some(cert), Some(key)) => builder
            .with_client_auth_cert(load_certs(cert)?, load_key(key)?)
            .map_err(|e| MqttError::TlsConfig(e.to_string()))?,
        (None, None) => builder.with_no_client_auth(),
        _ => {
            return Err(MqttError::TlsConfig(
                "client certificate and key must be configured together".into(),
            ))
        }
    };

    Ok(Arc::new(config))
}

fn open(path: &Path) -> Result<BufReader<File>, MqttError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| MqttError::TlsConfig(format!("{}: {e}", path.display())))
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, MqttError> {
    let certs = rustls_pemfile::certs(&mut open(path)?)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| MqttError::TlsConfig(format!("{}: {e}", path.display())))?;

    if certs.is_empty() {
        return Err(MqttError::TlsConfig(format!(
            "{}: no certificates found",
            path.display()
        )));
    }
    Ok(certs)
}

fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>, MqttError> {
    rustls_pemfile::private_key(&mut open(path)?)
        .map_err(|e| MqttError::TlsConfig(format!("{}: {e}", path.display())))?
        .ok_or_else(|| MqttError::TlsConfig(format!("{}: no private key found", path.display())))
}
