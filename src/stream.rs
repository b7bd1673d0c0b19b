//! TCP stream
use crate::{
    chunked::ChunkedReader,
    error::{Error, ParseErr},
    response::Response,
    tls::{self, Conn},
    uri::Uri,
};
use std::{
    io::{self, BufRead, BufReader, Read, Take, Write},
    net::{TcpStream, ToSocketAddrs},
    time::{Duration, Instant},
};

const LF: u8 = b'\n';
const BUF_SIZE: usize = 16 * 1024;
const MAX_HEAD_LEN: usize = 1024 * 1024;

/// Wrapper around TCP stream for HTTP and HTTPS protocols.
/// Allows to perform common operations on underlying stream.
#[derive(Debug)]
pub enum Stream {
    Http(TcpStream),
    Https(Box<Conn<TcpStream>>),
}

impl Stream {
    /// Opens a TCP connection to a remote host with a connection timeout (if specified).
    pub fn connect(uri: &Uri, connect_timeout: Option<Duration>) -> Result<Stream, Error> {
        let host = uri.host().ok_or(Error::Parse(ParseErr::UriErr))?;
        let port = uri.corr_port();

        log::debug!("connecting to {}:{}", host, port);

        let stream = match connect_timeout {
            Some(timeout) => connect_with_timeout(host, port, timeout)?,
            None => TcpStream::connect((host, port))?,
        };

        Ok(Stream::Http(stream))
    }

    /// Tries to establish a secure connection over TLS.
    ///
    /// Checks if `uri` scheme denotes a HTTPS protocol:
    /// - If yes, attemps to establish a secure connection
    /// - Otherwise, returns the `stream` without any modification
    pub fn try_to_https(stream: Stream, uri: &Uri) -> Result<Stream, Error> {
        match stream {
            Stream::Http(http_stream) if uri.scheme() == "https" => {
                let host = uri.host().unwrap_or("");
                let conn = tls::connect(host, http_stream)?;

                Ok(Stream::Https(Box::new(conn)))
            }
            stream => Ok(stream),
        }
    }

    fn tcp(&self) -> &TcpStream {
        match self {
            Stream::Http(stream) => stream,
            Stream::Https(conn) => conn.get_ref(),
        }
    }

    /// Sets the read timeout on the underlying TCP stream.
    pub fn set_read_timeout(&self, dur: Option<Duration>) -> Result<(), Error> {
        Ok(self.tcp().set_read_timeout(dur)?)
    }

    /// Sets the write timeout on the underlying TCP stream.
    pub fn set_write_timeout(&self, dur: Option<Duration>) -> Result<(), Error> {
        Ok(self.tcp().set_write_timeout(dur)?)
    }
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, io::Error> {
        match self {
            Stream::Http(stream) => stream.read(buf),
            Stream::Https(stream) => stream.read(buf),
        }
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> Result<usize, io::Error> {
        match self {
            Stream::Http(stream) => stream.write(buf),
            Stream::Https(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> Result<(), io::Error> {
        match self {
            Stream::Http(stream) => stream.flush(),
            Stream::Https(stream) => stream.flush(),
        }
    }
}

/// Body of a response, already stripped of any transfer coding framing.
///
/// Owns the connection; dropping the `Body` closes it.
#[derive(Debug)]
pub enum Body {
    Empty,
    Chunked(ChunkedReader<BufReader<Stream>>),
    Sized(Take<BufReader<Stream>>),
    Eof(BufReader<Stream>),
}

impl Body {
    /// Picks the framing of the body that follows the head of `res`.
    ///
    /// `head_only` marks responses to HEAD requests, which never carry a body.
    pub fn new(reader: BufReader<Stream>, res: &Response, head_only: bool) -> Result<Body, Error> {
        if head_only || !res.may_have_body() {
            return Ok(Body::Empty);
        }

        if res.is_chunked() {
            return Ok(Body::Chunked(ChunkedReader::new(reader)));
        }

        Ok(match res.content_len()? {
            Some(0) => Body::Empty,
            Some(len) => Body::Sized(reader.take(len as u64)),
            None => Body::Eof(reader),
        })
    }

    /// Sets the read timeout applied to each read of the body.
    pub fn set_read_timeout(&self, dur: Option<Duration>) -> Result<(), Error> {
        match self {
            Body::Empty => Ok(()),
            Body::Chunked(r) => r.get_ref().get_ref().set_read_timeout(dur),
            Body::Sized(r) => r.get_ref().get_ref().set_read_timeout(dur),
            Body::Eof(r) => r.get_ref().set_read_timeout(dur),
        }
    }
}

impl Read for Body {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let read = match self {
            Body::Empty => return Ok(0),
            Body::Chunked(r) => r.read(buf)?,
            Body::Sized(r) => r.read(buf)?,
            Body::Eof(r) => r.read(buf)?,
        };

        if read == 0 && !buf.is_empty() {
            if let Body::Sized(r) = self {
                if r.limit() > 0 {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "connection closed before the full body was received",
                    ));
                }
            }
        }

        Ok(read)
    }
}

/// Wraps `stream` in a buffered reader sized for reading responses.
pub fn buffered(stream: Stream) -> BufReader<Stream> {
    BufReader::with_capacity(BUF_SIZE, stream)
}

/// Connects to the target host with a specified timeout.
///
/// Every resolved address is tried in turn; a timeout on any of them ends the attempt.
pub fn connect_with_timeout<T, U>(host: T, port: u16, timeout: U) -> Result<TcpStream, Error>
where
    Duration: From<U>,
    T: AsRef<str>,
{
    let host = host.as_ref();
    let timeout = Duration::from(timeout);
    let addrs: Vec<_> = (host, port).to_socket_addrs()?.collect();
    let mut last_err = None;

    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(err) if err.kind() == io::ErrorKind::TimedOut => return Err(Error::Timeout),
            Err(err) => last_err = Some(err),
        }
    }

    Err(Error::IO(last_err.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("could not resolve address for {:?}", host),
        )
    })))
}

/// Returns time left until `deadline`, or `Error::Timeout` when it has passed.
pub fn remaining(deadline: Instant) -> Result<Duration, Error> {
    deadline
        .checked_duration_since(Instant::now())
        .filter(|left| !left.is_zero())
        .ok_or(Error::Timeout)
}

/// Executes a function in a loop until operation is completed or deadline is exceeded.
///
/// It checks if a timeout was exceeded every iteration, therefore it limits
/// how many time a specific function can be called before deadline.
/// For the `execute_with_deadline` to meet the deadline, each call
/// to `func` needs finish before the deadline.
///
/// Key information about function `func`:
/// - is provided with information about remaining time (`None` without a deadline)
/// - must ensure that its execution will not take more time than specified in `remaining_time`
/// - needs to return `Ok(true)` when the operation is complete, and `Ok(false)` - when operation is in progress
pub fn execute_with_deadline<F>(deadline: Option<Instant>, mut func: F) -> Result<(), Error>
where
    F: FnMut(Option<Duration>) -> Result<bool, Error>,
{
    loop {
        let remaining_time = match deadline {
            Some(deadline) => Some(remaining(deadline)?),
            None => None,
        };

        if func(remaining_time)? {
            return Ok(());
        }
    }
}

/// Reads the head of HTTP response from `reader`.
///
/// Reads from `reader` until a blank line is identified, which indicates that all
/// meta-information has been read. Bytes past the head stay buffered in `reader`.
/// Every socket read is bounded by the time left until `deadline`, so a server trickling
/// the head cannot outlast it.
pub fn read_head(reader: &mut BufReader<Stream>, deadline: Option<Instant>) -> Result<Vec<u8>, Error> {
    let mut head = Vec::with_capacity(1024);
    let mut line_start = 0;

    execute_with_deadline(deadline, |remaining_time| {
        if remaining_time.is_some() {
            reader.get_ref().set_read_timeout(remaining_time)?;
        }

        let available = reader.fill_buf()?;

        if available.is_empty() {
            return Err(Error::IO(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "server closed the connection before sending a complete response head",
            )));
        }

        let (len, line_end) = match available.iter().position(|&b| b == LF) {
            Some(pos) => (pos + 1, true),
            None => (available.len(), false),
        };

        head.extend_from_slice(&available[..len]);
        reader.consume(len);

        if head.len() > MAX_HEAD_LEN {
            return Err(Error::Parse(ParseErr::HeadersErr));
        }

        if !line_end {
            return Ok(false);
        }

        let line = &head[line_start..];
        let blank = line == b"\r\n" || line == b"\n";
        line_start = head.len();

        Ok(blank)
    })?;

    Ok(head)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{net::TcpListener, thread};

    fn pair(response: &'static [u8]) -> BufReader<Stream> {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        thread::spawn(move || {
            let (mut conn, _) = listener.accept().unwrap();
            conn.write_all(response).unwrap();
        });

        buffered(Stream::Http(TcpStream::connect(addr).unwrap()))
    }

    #[test]
    fn read_head_stops_at_blank_line() {
        let mut reader = pair(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nhi");
        let head = read_head(&mut reader, None).unwrap();

        assert_eq!(head, b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\n");

        let res = Response::from_head(&head).unwrap();
        let mut body = Body::new(reader, &res, false).unwrap();
        let mut buf = String::new();
        body.read_to_string(&mut buf).unwrap();

        assert_eq!(buf, "hi");
    }

    #[test]
    fn read_head_incomplete() {
        let mut reader = pair(b"HTTP/1.1 200 OK\r\n");
        let err = read_head(&mut reader, None).unwrap_err();

        assert!(matches!(err, Error::IO(_)));
    }

    #[test]
    fn body_chunked() {
        let mut reader = pair(b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n2\r\nhi\r\n0\r\n\r\n");
        let head = read_head(&mut reader, None).unwrap();
        let res = Response::from_head(&head).unwrap();

        let mut body = Body::new(reader, &res, false).unwrap();
        let mut buf = String::new();
        body.read_to_string(&mut buf).unwrap();

        assert!(matches!(body, Body::Chunked(_)));
        assert_eq!(buf, "hi");
    }

    #[test]
    fn body_sized_truncated() {
        let mut reader = pair(b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nhi");
        let head = read_head(&mut reader, None).unwrap();
        let res = Response::from_head(&head).unwrap();

        let mut body = Body::new(reader, &res, false).unwrap();
        let mut buf = Vec::new();
        let err = body.read_to_end(&mut buf).unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn body_for_head_request() {
        let mut reader = pair(b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\n");
        let head = read_head(&mut reader, None).unwrap();
        let res = Response::from_head(&head).unwrap();

        assert!(matches!(Body::new(reader, &res, true).unwrap(), Body::Empty));
    }

    #[test]
    fn deadline_passed() {
        let deadline = Instant::now();
        let mut calls = 0;

        thread::sleep(Duration::from_millis(5));
        let res = execute_with_deadline(Some(deadline), |_| {
            calls += 1;
            Ok(true)
        });

        assert!(matches!(res, Err(Error::Timeout)));
        assert_eq!(calls, 0);
    }

    #[test]
    fn deadline_loops_until_done() {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut calls = 0;

        execute_with_deadline(Some(deadline), |remaining_time| {
            assert!(remaining_time.unwrap() <= Duration::from_secs(5));
            calls += 1;
            Ok(calls == 3)
        })
        .unwrap();

        assert_eq!(calls, 3);
    }

    #[test]
    fn read_head_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (conn, _) = listener.accept().unwrap();
            thread::sleep(Duration::from_millis(500));
            drop(conn);
        });

        let mut reader = buffered(Stream::Http(TcpStream::connect(addr).unwrap()));
        let deadline = Instant::now() + Duration::from_millis(100);
        let err = read_head(&mut reader, Some(deadline)).unwrap_err();

        assert!(matches!(err, Error::Timeout));
        server.join().unwrap();
    }

    #[test]
    fn read_head_trickle_hits_deadline() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (mut conn, _) = listener.accept().unwrap();

            for byte in b"HTTP/1.1 200 OK\r\nX-Slow: ".iter().cycle().take(60) {
                if conn.write_all(&[*byte]).is_err() {
                    break;
                }
                thread::sleep(Duration::from_millis(50));
            }
        });

        let mut reader = buffered(Stream::Http(TcpStream::connect(addr).unwrap()));
        let start = Instant::now();
        let deadline = start + Duration::from_millis(300);
        let err = read_head(&mut reader, Some(deadline)).unwrap_err();

        assert!(matches!(err, Error::Timeout));
        assert!(start.elapsed() < Duration::from_millis(600));

        drop(reader);
        server.join().unwrap();
    }

    #[test]
    fn read_head_leaves_body_buffered() {
        let mut reader = pair(b"HTTP/1.1 200 OK\r\n\r\nbody");
        let head = read_head(&mut reader, Some(Instant::now() + Duration::from_secs(5))).unwrap();

        let mut rest = String::new();
        reader.read_to_string(&mut rest).unwrap();

        assert_eq!(head, b"HTTP/1.1 200 OK\r\n\r\n");
        assert_eq!(rest, "body");
    }
}
