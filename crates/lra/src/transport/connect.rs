//! CONNECT requests in origin-form.
//!
//! reqwest rewrites a CONNECT request target to `host:port` and treats a 2xx
//! reply as a tunnel, dropping its body. This path writes the request line
//! with the path and query intact over a hyper HTTP/1.1 connection and
//! reads a 2xx body back from the upgraded stream.

use std::net::IpAddr;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::{HeaderValue, CONTENT_LENGTH, HOST};
use hyper::Method;
use hyper_util::rt::TokioIo;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{ring, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use url::{Host, Url};

use super::{TransportOptions, TransportRequest, TransportResponse};
use crate::error::{ConfigError, TransportError};
use crate::proxy::{ProxyConfig, ProxyKind};

const SOCKS_DEFAULT_PORT: u16 = 1080;
const MAX_TUNNEL_HEAD: usize = 8 * 1024;

/// Sends CONNECT requests honouring the same proxy and TLS settings as the
/// reqwest client
#[derive(Clone)]
pub(crate) struct ConnectClient {
    proxy: Option<ProxyConfig>,
    tls: TlsConnector,
}

impl std::fmt::Debug for ConnectClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectClient")
            .field("proxy", &self.proxy)
            .finish_non_exhaustive()
    }
}

impl ConnectClient {
    pub(crate) fn new(options: &TransportOptions) -> Result<Self, ConfigError> {
        let provider = Arc::new(ring::default_provider());
        let builder = ClientConfig::builder_with_provider(provider.clone())
            .with_safe_default_protocol_versions()
            .map_err(|e| ConfigError::Client(e.to_string()))?;

        let config = if options.validate_ssl {
            let mut roots = RootCertStore::empty();
            let native = rustls_native_certs::load_native_certs();
            for err in &native.errors {
                tracing::debug!("Skipping native root certificate: {}", err);
            }
            let (added, ignored) = roots.add_parsable_certificates(native.certs);
            tracing::trace!(added, ignored, "Loaded native root certificates");
            builder
                .with_root_certificates(roots)
                .with_no_client_auth()
        } else {
            builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate { provider }))
                .with_no_client_auth()
        };

        Ok(Self {
            proxy: options.proxy.clone(),
            tls: TlsConnector::from(Arc::new(config)),
        })
    }

    pub(crate) async fn execute(
        &self,
        request: TransportRequest,
    ) -> Result<TransportResponse, TransportError> {
        let deadline = request.timeout;
        tokio::time::timeout(deadline, self.round_trip(request))
            .await
            .map_err(|elapsed| TransportError::Timeout(Box::new(elapsed)))?
    }

    async fn round_trip(
        &self,
        request: TransportRequest,
    ) -> Result<TransportResponse, TransportError> {
        let url = Url::parse(&request.url).map_err(|e| TransportError::Request(Box::new(e)))?;
        let host = target_host(&url)?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| request_error(format!("{}: missing port", url.scheme())))?;

        let stream = self.open(&host, port).await?;

        if url.scheme() == "https" {
            let server_name = ServerName::try_from(host)
                .map_err(|e| TransportError::Connect(Box::new(e)))?;
            let tls = self
                .tls
                .connect(server_name, stream)
                .await
                .map_err(|e| TransportError::Connect(Box::new(e)))?;
            send(tls, &url, request).await
        } else {
            send(stream, &url, request).await
        }
    }

    async fn open(&self, host: &str, port: u16) -> Result<TcpStream, TransportError> {
        let Some(proxy) = &self.proxy else {
            return TcpStream::connect((host, port)).await.map_err(connect_error);
        };

        let proxy_url = proxy.url();
        if proxy_url.scheme() == "https" {
            return Err(TransportError::Connect(
                "CONNECT requests through an https proxy are not supported".into(),
            ));
        }
        let proxy_host = target_host(proxy_url)?;
        let proxy_port = proxy_url.port_or_known_default().unwrap_or(SOCKS_DEFAULT_PORT);

        tracing::trace!(proxy = %proxy_host, proxy_port, "Opening CONNECT route through proxy");
        let stream = TcpStream::connect((proxy_host.as_str(), proxy_port))
            .await
            .map_err(connect_error)?;

        match proxy.kind() {
            ProxyKind::Socks5 => socks5_handshake(stream, host, port).await,
            ProxyKind::Http => http_tunnel(stream, host, port, proxy_url).await,
        }
    }
}

async fn send<S>(
    io: S,
    url: &Url,
    request: TransportRequest,
) -> Result<TransportResponse, TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut sender, connection) = hyper::client::conn::http1::handshake(TokioIo::new(io))
        .await
        .map_err(|e| TransportError::Connect(Box::new(e)))?;
    tokio::spawn(async move {
        if let Err(err) = connection.with_upgrades().await {
            tracing::debug!("CONNECT connection ended: {}", err);
        }
    });

    let target = match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    };
    let authority = &url[url::Position::BeforeHost..url::Position::AfterPort];

    let mut outgoing = hyper::Request::builder()
        .method(Method::CONNECT)
        .uri(target)
        .body(Full::new(Bytes::from(request.body.unwrap_or_default())))
        .map_err(|e| TransportError::Request(Box::new(e)))?;
    *outgoing.headers_mut() = request.headers;
    outgoing.headers_mut().insert(
        HOST,
        HeaderValue::from_str(authority).map_err(|e| TransportError::Request(Box::new(e)))?,
    );

    let mut response = sender
        .send_request(outgoing)
        .await
        .map_err(|e| TransportError::Request(Box::new(e)))?;
    let status = response.status();
    let headers = response.headers().clone();

    let body = if status.is_success() {
        let upgraded = hyper::upgrade::on(&mut response)
            .await
            .map_err(|e| TransportError::Request(Box::new(e)))?;
        read_body(TokioIo::new(upgraded), content_length(&headers)).await?
    } else {
        response
            .into_body()
            .collect()
            .await
            .map_err(|e| TransportError::Request(Box::new(e)))?
            .to_bytes()
            .to_vec()
    };

    Ok(TransportResponse {
        status,
        headers,
        body,
    })
}

/// Body of a 2xx CONNECT reply: `Content-Length` bytes, or up to EOF.
async fn read_body<R>(mut io: R, length: Option<u64>) -> Result<Vec<u8>, TransportError>
where
    R: AsyncRead + Unpin,
{
    let mut body = Vec::new();
    match length {
        Some(length) => {
            (&mut io)
                .take(length)
                .read_to_end(&mut body)
                .await
                .map_err(request_io_error)?;
            if (body.len() as u64) < length {
                return Err(request_error(format!(
                    "response body ended after {} of {} bytes",
                    body.len(),
                    length
                )));
            }
        }
        None => {
            io.read_to_end(&mut body).await.map_err(request_io_error)?;
        }
    }
    Ok(body)
}

fn content_length(headers: &hyper::HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
}

fn target_host(url: &Url) -> Result<String, TransportError> {
    match url.host() {
        Some(Host::Domain(domain)) => Ok(domain.to_string()),
        Some(Host::Ipv4(ip)) => Ok(ip.to_string()),
        Some(Host::Ipv6(ip)) => Ok(ip.to_string()),
        None => Err(request_error(format!("{url}: missing host"))),
    }
}

async fn socks5_handshake(
    mut stream: TcpStream,
    host: &str,
    port: u16,
) -> Result<TcpStream, TransportError> {
    // version 5, one method, no authentication
    stream.write_all(&[0x05, 0x01, 0x00]).await.map_err(connect_error)?;

    let mut method = [0u8; 2];
    stream.read_exact(&mut method).await.map_err(connect_error)?;
    if method != [0x05, 0x00] {
        return Err(proxy_error("SOCKS5 proxy refused unauthenticated access"));
    }

    let mut connect = vec![0x05, 0x01, 0x00];
    match host.parse::<IpAddr>() {
        Ok(IpAddr::V4(ip)) => {
            connect.push(0x01);
            connect.extend_from_slice(&ip.octets());
        }
        Ok(IpAddr::V6(ip)) => {
            connect.push(0x04);
            connect.extend_from_slice(&ip.octets());
        }
        Err(_) => {
            let length = u8::try_from(host.len())
                .map_err(|_| proxy_error("SOCKS5 host name longer than 255 bytes"))?;
            connect.push(0x03);
            connect.push(length);
            connect.extend_from_slice(host.as_bytes());
        }
    }
    connect.extend_from_slice(&port.to_be_bytes());
    stream.write_all(&connect).await.map_err(connect_error)?;

    let mut reply = [0u8; 4];
    stream.read_exact(&mut reply).await.map_err(connect_error)?;
    if reply[1] != 0x00 {
        return Err(proxy_error(format!(
            "SOCKS5 proxy rejected the connection with code {}",
            reply[1]
        )));
    }

    // bound address and port, discarded
    let bound = match reply[3] {
        0x01 => 4 + 2,
        0x04 => 16 + 2,
        0x03 => {
            let mut length = [0u8; 1];
            stream.read_exact(&mut length).await.map_err(connect_error)?;
            usize::from(length[0]) + 2
        }
        other => {
            return Err(proxy_error(format!(
                "SOCKS5 reply has unknown address type {other}"
            )))
        }
    };
    let mut discard = vec![0u8; bound];
    stream.read_exact(&mut discard).await.map_err(connect_error)?;

    Ok(stream)
}

async fn http_tunnel(
    mut stream: TcpStream,
    host: &str,
    port: u16,
    proxy_url: &Url,
) -> Result<TcpStream, TransportError> {
    let authority = if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    };

    let mut head = format!("CONNECT {authority} HTTP/1.1\r\nHost: {authority}\r\n");
    if !proxy_url.username().is_empty() {
        let credentials = format!(
            "{}:{}",
            proxy_url.username(),
            proxy_url.password().unwrap_or_default()
        );
        head.push_str(&format!(
            "Proxy-Authorization: Basic {}\r\n",
            BASE64_STANDARD.encode(credentials)
        ));
    }
    head.push_str("\r\n");
    stream.write_all(head.as_bytes()).await.map_err(connect_error)?;

    // Read byte by byte so nothing past the proxy's reply is consumed.
    let mut reply = Vec::new();
    while !reply.ends_with(b"\r\n\r\n") {
        if reply.len() >= MAX_TUNNEL_HEAD {
            return Err(proxy_error("proxy reply head too large"));
        }
        reply.push(stream.read_u8().await.map_err(connect_error)?);
    }

    let reply = String::from_utf8_lossy(&reply);
    let status_line = reply.lines().next().unwrap_or_default();
    let accepted = status_line
        .split_whitespace()
        .nth(1)
        .is_some_and(|code| code.starts_with('2'));
    if !accepted {
        return Err(proxy_error(format!(
            "proxy refused tunnel: {}",
            status_line.trim()
        )));
    }

    Ok(stream)
}

fn connect_error(err: std::io::Error) -> TransportError {
    TransportError::Connect(Box::new(err))
}

fn proxy_error(message: impl Into<String>) -> TransportError {
    let message: String = message.into();
    TransportError::Connect(message.into())
}

fn request_error(message: impl Into<String>) -> TransportError {
    let message: String = message.into();
    TransportError::Request(message.into())
}

fn request_io_error(err: std::io::Error) -> TransportError {
    TransportError::Request(Box::new(err))
}

/// Verifier used when certificate validation is turned off. Handshake
/// signatures are still checked.
#[derive(Debug)]
struct AcceptAnyCertificate {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
