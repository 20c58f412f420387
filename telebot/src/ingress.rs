//! Webhook ingress: a TLS-terminating HTTP/1.1 endpoint that does nothing
//! but accept update payloads and enqueue their raw bytes. Hand-rolled
//! rather than built on `hyper`/`axum` to keep exact control over
//! `Content-Length`-bounded body accumulation, including closing the
//! connection outright on a body that overruns it (no pipelining support,
//! matching the original).

use std::io::Cursor;
use std::sync::Arc;

use rustls_pemfile::{certs, pkcs8_private_keys};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::rustls::version::TLS13;
use tokio_rustls::rustls::ServerConfig;
use tokio_rustls::{server::TlsStream, TlsAcceptor};

use crate::error::{BotError, TransportError};
use crate::state::ModerationState;
use crate::unicode_escape::decode_unicode_escapes;

fn load_tls_config(cert_path: &str, key_path: &str) -> Result<ServerConfig, BotError> {
    let cert_data = std::fs::read(cert_path)
        .map_err(|e| BotError::TlsSetup(format!("reading '{cert_path}': {e}")))?;
    let cert_chain: Vec<CertificateDer<'static>> = certs(&mut Cursor::new(&cert_data))
        .collect::<Result<_, _>>()
        .map_err(|e| BotError::TlsSetup(format!("parsing certificate chain: {e}")))?;
    if cert_chain.is_empty() {
        return Err(BotError::TlsSetup(format!("no certificates found in '{cert_path}'")));
    }

    let key_data = std::fs::read(key_path)
        .map_err(|e| BotError::TlsSetup(format!("reading '{key_path}': {e}")))?;
    let key: PrivateKeyDer<'static> = pkcs8_private_keys(&mut Cursor::new(&key_data))
        .next()
        .ok_or_else(|| BotError::TlsSetup(format!("no PKCS8 private key found in '{key_path}'")))?
        .map_err(|e| BotError::TlsSetup(format!("parsing private key: {e}")))?
        .into();

    ServerConfig::builder_with_protocol_versions(&[&TLS13])
        .with_no_client_auth()
        .with_single_cert(cert_chain, key)
        .map_err(|e| BotError::TlsSetup(format!("building TLS server config: {e}")))
}

/// Load the TLS identity and bind the webhook port. Both are fatal-at-startup
/// failures, so this is awaited synchronously by the caller before any
/// worker or timer is spawned, rather than surfacing its error from inside a
/// background task.
pub async fn bind(state: &ModerationState) -> Result<(TcpListener, TlsAcceptor), BotError> {
    let tls_config = load_tls_config(&state.settings.tls_cert_path, &state.settings.tls_key_path)?;
    let acceptor = TlsAcceptor::from(Arc::new(tls_config));

    let addr = (std::net::Ipv4Addr::UNSPECIFIED, state.settings.webhook_port);
    let listener = TcpListener::bind(addr)
        .await
        .map_err(BotError::BindFailed)?;
    log::info!("webhook listening on {}", state.settings.webhook_port);

    Ok((listener, acceptor))
}

/// Run the accept loop against an already-bound listener until `state.stop`
/// fires. Per-connection errors are only ever logged; nothing here is fatal.
pub async fn serve(listener: TcpListener, acceptor: TlsAcceptor, state: Arc<ModerationState>) {
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (socket, peer) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        log::warn!("accept failed: {e}");
                        continue;
                    }
                };
                let acceptor = acceptor.clone();
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    match acceptor.accept(socket).await {
                        Ok(tls) => handle_connection(tls, state).await,
                        Err(e) => log::warn!("TLS handshake with {peer} failed: {e}"),
                    }
                });
            }
            () = state.stop.notified() => {
                log::info!("webhook ingress stopping");
                return;
            }
        }
    }
}

/// One parsed request line's worth of framing information: whether the peer
/// wants the connection kept alive, and how many body bytes to expect.
struct RequestHead {
    content_length: usize,
    keep_alive: bool,
}

fn parse_head(raw: &[u8]) -> Option<RequestHead> {
    let text = std::str::from_utf8(raw).ok()?;
    let mut content_length = None;
    let mut keep_alive = false;

    for line in text.split("\r\n").skip(1) {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim().to_ascii_lowercase();
        let value = value.trim();
        match name.as_str() {
            "content-length" => content_length = value.parse::<usize>().ok(),
            "connection" => keep_alive = value.eq_ignore_ascii_case("keep-alive"),
            _ => {}
        }
    }

    Some(RequestHead {
        content_length: content_length?,
        keep_alive,
    })
}

/// Serve requests on one TLS connection until the peer closes it, a
/// transport error occurs, or a request doesn't ask to be kept alive.
async fn handle_connection(mut stream: TlsStream<TcpStream>, state: Arc<ModerationState>) {
    let mut leftover: Vec<u8> = Vec::new();

    loop {
        let head = match read_head(&mut stream, &mut leftover).await {
            Ok(Some(head)) => head,
            Ok(None) => return, // peer closed cleanly between requests
            Err(e) => {
                log::debug!("webhook connection closed: {e}");
                return;
            }
        };

        let body = match read_body(&mut stream, &mut leftover, head.content_length).await {
            Ok(body) => body,
            Err(e) => {
                log::debug!("webhook connection closed: {e}");
                return;
            }
        };

        let decoded = decode_unicode_escapes(&body);
        state.queue.push(decoded);

        let response = if head.keep_alive {
            b"HTTP/1.1 200 OK\r\n\r\n".as_slice()
        } else {
            b"HTTP/1.1 200 OK\r\nConnection: close\r\n\r\n".as_slice()
        };
        if let Err(e) = stream.write_all(response).await {
            log::debug!("webhook response write failed: {e}");
            return;
        }
        if let Err(e) = stream.flush().await {
            log::debug!("webhook response flush failed: {e}");
            return;
        }

        if !head.keep_alive {
            return;
        }
    }
}

/// Read until the `\r\n\r\n` header terminator, starting from whatever
/// bytes `leftover` already holds from the previous read (the chunked read
/// below can legitimately pull part of the body in past the terminator in
/// the same `read()` call). Returns `Ok(None)` only if the peer closed
/// before sending any bytes at all (a clean idle-connection close, not an
/// error worth logging).
async fn read_head(
    stream: &mut TlsStream<TcpStream>,
    leftover: &mut Vec<u8>,
) -> Result<Option<RequestHead>, TransportError> {
    let mut buf = std::mem::take(leftover);
    let mut read_any = !buf.is_empty();

    loop {
        if let Some(pos) = find_header_end(&buf) {
            let body_start = pos + 4;
            *leftover = buf.split_off(body_start);
            let head = parse_head(&buf[..pos]).ok_or(TransportError::MissingContentLength)?;
            return Ok(Some(head));
        }

        let mut chunk = [0u8; 4096];
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            if read_any {
                return Err(TransportError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed mid-request",
                )));
            }
            return Ok(None);
        }
        read_any = true;
        buf.extend_from_slice(&chunk[..n]);
    }
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

/// Read exactly `content_length` bytes, starting with whatever the header
/// read already pulled in past the `\r\n\r\n` terminator. Per §4.D step 2,
/// this server never supports pipelining: if `leftover` alone already
/// exceeds `content_length`, the body is larger than declared and the
/// connection is closed rather than treating the excess as the start of a
/// next request.
async fn read_body(
    stream: &mut TlsStream<TcpStream>,
    leftover: &mut Vec<u8>,
    content_length: usize,
) -> Result<Vec<u8>, TransportError> {
    if leftover.len() > content_length {
        return Err(TransportError::BodyOverrun);
    }
    if leftover.len() == content_length {
        return Ok(std::mem::take(leftover));
    }

    let mut body = std::mem::take(leftover);
    body.reserve(content_length - body.len());
    while body.len() < content_length {
        let mut chunk = vec![0u8; content_length - body.len()];
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed mid-body",
            )));
        }
        body.extend_from_slice(&chunk[..n]);
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_head_reads_content_length_and_keep_alive() {
        let raw = b"POST /webhook HTTP/1.1\r\nHost: x\r\nContent-Length: 42\r\nConnection: keep-alive\r\n";
        let head = parse_head(raw).unwrap();
        assert_eq!(head.content_length, 42);
        assert!(head.keep_alive);
    }

    #[test]
    fn parse_head_without_content_length_is_none() {
        let raw = b"POST /webhook HTTP/1.1\r\nHost: x\r\n";
        assert!(parse_head(raw).is_none());
    }

    #[test]
    fn parse_head_without_connection_header_is_not_keep_alive() {
        let raw = b"POST /webhook HTTP/1.1\r\nContent-Length: 3\r\n";
        let head = parse_head(raw).unwrap();
        assert!(!head.keep_alive);
    }

    #[test]
    fn finds_header_terminator() {
        let raw = b"GET / HTTP/1.1\r\nHost: x\r\n\r\nbody-bytes";
        let pos = find_header_end(raw).unwrap();
        assert_eq!(&raw[pos..pos + 4], b"\r\n\r\n");
        assert_eq!(&raw[pos + 4..], b"body-bytes");
    }
}
