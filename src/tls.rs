//! secure connection over TLS
use crate::error::Error as HttpError;
use std::io;

#[cfg(all(feature = "rust-tls", not(feature = "native-tls")))]
use rustls::{ClientConnection, StreamOwned};
#[cfg(all(feature = "rust-tls", not(feature = "native-tls")))]
use rustls_pki_types::ServerName;

#[cfg(not(any(feature = "native-tls", feature = "rust-tls")))]
compile_error!("one of the `native-tls` or `rust-tls` features must be enabled");

/// Wrapper around TLS Stream, depends on selected TLS library:
/// - native_tls: `TlsStream<S>`
/// - rustls: `StreamOwned<ClientConnection, S>`
#[derive(Debug)]
pub struct Conn<S: io::Read + io::Write> {
    #[cfg(feature = "native-tls")]
    stream: native_tls::TlsStream<S>,

    #[cfg(all(feature = "rust-tls", not(feature = "native-tls")))]
    stream: StreamOwned<ClientConnection, S>,
}

impl<S> Conn<S>
where
    S: io::Read + io::Write,
{
    /// Returns a reference to the underlying socket.
    pub fn get_ref(&self) -> &S {
        self.stream.get_ref()
    }
}

impl<S> io::Read for Conn<S>
where
    S: io::Read + io::Write,
{
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, io::Error> {
        let len = self.stream.read(buf);

        // rustls reports a peer that closes without close_notify as an aborted connection,
        // which for a `Connection: close` exchange is just the end of the body.
        #[cfg(all(feature = "rust-tls", not(feature = "native-tls")))]
        {
            if let Err(ref e) = len {
                if e.kind() == io::ErrorKind::UnexpectedEof
                    || e.kind() == io::ErrorKind::ConnectionAborted
                {
                    return Ok(0);
                }
            }
        }

        len
    }
}

impl<S> io::Write for Conn<S>
where
    S: io::Read + io::Write,
{
    fn write(&mut self, buf: &[u8]) -> Result<usize, io::Error> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> Result<(), io::Error> {
        self.stream.flush()
    }
}

/// Establishes a secure connection to `hostname` over `stream`, verifying the server
/// against the platform (native-tls) or bundled webpki (rustls) roots.
#[cfg(feature = "native-tls")]
pub fn connect<H, S>(hostname: H, stream: S) -> Result<Conn<S>, HttpError>
where
    H: AsRef<str>,
    S: io::Read + io::Write,
{
    let connector = native_tls::TlsConnector::new()?;
    let stream = connector.connect(hostname.as_ref(), stream)?;

    Ok(Conn { stream })
}

/// Establishes a secure connection to `hostname` over `stream`, verifying the server
/// against the platform (native-tls) or bundled webpki (rustls) roots.
#[cfg(all(feature = "rust-tls", not(feature = "native-tls")))]
pub fn connect<H, S>(hostname: H, stream: S) -> Result<Conn<S>, HttpError>
where
    H: AsRef<str>,
    S: io::Read + io::Write,
{
    use std::sync::Arc;

    let root_store = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.iter().cloned().collect(),
    };

    let client_config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    let server_name = ServerName::try_from(hostname.as_ref().to_string())
        .map_err(|e| HttpError::Tls(e.to_string()))?;
    let session = ClientConnection::new(Arc::new(client_config), server_name)?;

    let mut stream = StreamOwned::new(session, stream);

    // Drive the handshake now so certificate errors surface as TLS errors
    // instead of appearing on the first read.
    while stream.conn.is_handshaking() {
        stream
            .conn
            .complete_io(&mut stream.sock)
            .map_err(handshake_err)?;
    }

    Ok(Conn { stream })
}

//A handshake read or write that ran out of time is a timeout, anything else a TLS failure.
#[cfg(all(feature = "rust-tls", not(feature = "native-tls")))]
fn handshake_err(e: io::Error) -> HttpError {
    match e.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => HttpError::Timeout,
        _ => HttpError::Tls(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        net::{TcpListener, TcpStream},
        thread,
        time::Duration,
    };

    #[test]
    fn handshake_with_plain_http_server() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (mut conn, _) = listener.accept().unwrap();
            let _ = io::Write::write_all(
                &mut conn,
                b"HTTP/1.1 400 Bad Request\r\nContent-Length: 0\r\n\r\n",
            );
            thread::sleep(Duration::from_millis(100));
        });

        let stream = TcpStream::connect(addr).unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();

        match connect("localhost", stream) {
            Err(HttpError::Tls(msg)) => assert!(!msg.is_empty()),
            Err(HttpError::IO(_)) => (),
            other => panic!("expected a TLS failure, got {:?}", other.map(|_| ())),
        }

        server.join().unwrap();
    }

    #[test]
    fn handshake_silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (conn, _) = listener.accept().unwrap();
            thread::sleep(Duration::from_millis(500));
            drop(conn);
        });

        let stream = TcpStream::connect(addr).unwrap();
        stream.set_read_timeout(Some(Duration::from_millis(100))).unwrap();

        let err = connect("localhost", stream).map(|_| ()).unwrap_err();
        assert!(matches!(err, HttpError::Timeout), "got {:?}", err);

        server.join().unwrap();
    }

    #[cfg(all(feature = "rust-tls", not(feature = "native-tls")))]
    #[test]
    fn handshake_io_errors() {
        let err = handshake_err(io::Error::new(io::ErrorKind::WouldBlock, "slow"));
        assert!(matches!(err, HttpError::Timeout));

        let err = handshake_err(io::Error::new(io::ErrorKind::InvalidData, "bad certificate"));
        assert!(matches!(err, HttpError::Tls(msg) if msg == "bad certificate"));
    }
}
