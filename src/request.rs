//! creating and sending HTTP requests
use crate::{
    error::{Error, ParseErr},
    response::{Headers, Response},
    stream::{self, Body, Stream},
    uri::Uri,
};
use std::{
    fmt,
    io::{self, Write},
    time::{Duration, Instant},
};

#[cfg(feature = "auth")]
use base64::prelude::*;
#[cfg(feature = "auth")]
use zeroize::{Zeroize, ZeroizeOnDrop};

const CR_LF: &str = "\r\n";
const HTTP_V: &str = "HTTP/1.1";

/// Number of redirects followed before giving up.
pub const MAX_REDIRECTS: usize = 10;

/// HTTP request methods
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Method {
    GET,
    HEAD,
    POST,
}

impl Method {
    /// Returns a string representation of an HTTP request method.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::HEAD => "HEAD",
            Method::POST => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Basic HTTP authentication, zeroized when dropped.
///
/// # Example
/// ```
/// use kite_http::request::Authentication;
///
/// let auth = Authentication::basic("foo", "bar");
/// assert_eq!(auth.header(), "Basic Zm9vOmJhcg==");
/// ```
#[cfg(feature = "auth")]
#[derive(Clone, Debug, PartialEq, Zeroize, ZeroizeOnDrop)]
pub struct Authentication {
    username: String,
    password: String,
}

#[cfg(feature = "auth")]
impl Authentication {
    /// Creates basic authentication from a username and a password.
    pub fn basic<T, U>(username: &T, password: &U) -> Authentication
    where
        T: ToString + ?Sized,
        U: ToString + ?Sized,
    {
        Authentication {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    /// Takes credentials from the user info part of `uri`, if there is any.
    pub fn from_uri(uri: &Uri) -> Option<Authentication> {
        let auth = uri.authority()?;
        let username = auth.username()?;

        Some(Authentication::basic(username, auth.password().unwrap_or("")))
    }

    /// Value of the `Authorization` header for these credentials.
    pub fn header(&self) -> String {
        let mut credentials = format!("{}:{}", self.username, self.password);
        let header = format!("Basic {}", BASE64_STANDARD.encode(credentials.as_bytes()));
        credentials.zeroize();

        header
    }
}

/// Raw HTTP request message that can be written to any stream.
///
/// # Example
/// ```
/// use kite_http::{request::{Method, RequestMessage}, uri::Uri};
///
/// let uri: Uri = "http://example.test/echo".parse().unwrap();
/// let msg = RequestMessage::new(&uri)
///     .method(Method::POST)
///     .body(b"x=1")
///     .parse();
///
/// assert!(msg.starts_with(b"POST /echo HTTP/1.1\r\n"));
/// assert!(msg.ends_with(b"\r\n\r\nx=1"));
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct RequestMessage<'a> {
    uri: &'a Uri,
    method: Method,
    version: &'a str,
    headers: Headers,
    body: Option<&'a [u8]>,
}

impl<'a> RequestMessage<'a> {
    /// Creates a new `RequestMessage` with default parameters
    pub fn new(uri: &'a Uri) -> RequestMessage<'a> {
        RequestMessage {
            headers: Headers::default_http(uri),
            uri,
            method: Method::GET,
            version: HTTP_V,
            body: None,
        }
    }

    /// Sets the request method
    pub fn method(&mut self, method: Method) -> &mut Self {
        self.method = method;
        self
    }

    /// Adds a new header to existing/default headers
    pub fn header<T, U>(&mut self, key: &T, val: &U) -> &mut Self
    where
        T: ToString + ?Sized,
        U: ToString + ?Sized,
    {
        self.headers.insert(key, val);
        self
    }

    /// Sets the body for request
    pub fn body(&mut self, body: &'a [u8]) -> &mut Self {
        self.body = Some(body);
        self
    }

    /// Parses the request message for this `RequestMessage`
    pub fn parse(&self) -> Vec<u8> {
        let mut request_msg = format!(
            "{} {} {}{}",
            self.method,
            self.uri.resource(),
            self.version,
            CR_LF
        );

        for (key, val) in self.headers.iter() {
            request_msg.push_str(&format!("{}: {}{}", key.as_str(), val, CR_LF));
        }

        request_msg.push_str(CR_LF);

        let mut request_msg = request_msg.into_bytes();

        if let Some(b) = self.body {
            request_msg.extend(b);
        }

        request_msg
    }
}

/// Relatively higher-level struct for making HTTP requests.
///
/// Opens a connection per hop (TLS for `https`), sends the message, follows redirects
/// and hands out the head of the final response together with its body.
///
/// # Example
/// ```no_run
/// use kite_http::{request::Request, uri::Uri};
/// use std::{io, time::Duration};
///
/// let uri: Uri = "http://example.test/echo".parse().unwrap();
/// let (res, mut body) = Request::new(&uri)
///     .timeout(Some(Duration::from_secs(1)))
///     .send_head()
///     .unwrap();
///
/// println!("{} {}", res.version(), res.status());
/// io::copy(&mut body, &mut io::stdout()).unwrap();
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Request<'a> {
    uri: &'a Uri,
    method: Method,
    headers: Headers,
    body: Option<&'a [u8]>,
    timeout: Option<Duration>,
}

impl<'a> Request<'a> {
    /// Creates a new `Request` with default parameters
    pub fn new(uri: &'a Uri) -> Request<'a> {
        Request {
            uri,
            method: Method::GET,
            headers: Headers::new(),
            body: None,
            timeout: None,
        }
    }

    /// Sets the request method
    pub fn method(&mut self, method: Method) -> &mut Self {
        self.method = method;
        self
    }

    /// Adds headers that override the defaults of every message sent.
    pub fn headers(&mut self, headers: &Headers) -> &mut Self {
        self.headers.extend(headers);
        self
    }

    /// Adds a header that overrides the default of every message sent.
    pub fn header<T, U>(&mut self, key: &T, val: &U) -> &mut Self
    where
        T: ToString + ?Sized,
        U: ToString + ?Sized,
    {
        self.headers.insert(key, val);
        self
    }

    /// Sets the body for request
    pub fn body(&mut self, body: &'a [u8]) -> &mut Self {
        self.body = Some(body);
        self
    }

    /// Sets the overall timeout: connecting, sending the request and receiving
    /// the complete head of the final response must fit into it.
    /// Afterwards it bounds each read of the body. `None` disables it.
    pub fn timeout(&mut self, timeout: Option<Duration>) -> &mut Self {
        self.timeout = timeout;
        self
    }


    /// Sends the request and returns the head of the final response with its body,
    /// which still has to be read from the connection.
    pub fn send_head(&self) -> Result<(Response, Body), Error> {
        let deadline = self.timeout.map(|timeout| Instant::now() + timeout);

        let mut uri = self.uri.clone();
        let mut method = self.method;
        let mut body = self.body;
        let mut headers = self.headers.clone();
        let mut redirects = 0;

        loop {
            let (res, reader) = send_message(&uri, method, &headers, body, deadline)?;

            let location = match res.status_code().is_redirect() {
                true => res.headers().get("Location").cloned(),
                false => None,
            };

            let location = match location {
                Some(location) => location,
                None => {
                    let body = Body::new(reader, &res, method == Method::HEAD)?;
                    body.set_read_timeout(self.timeout)?;

                    return Ok((res, body));
                }
            };

            if redirects == MAX_REDIRECTS {
                return Err(Error::Redirect(format!(
                    "stopped after {} redirects",
                    MAX_REDIRECTS
                )));
            }
            redirects += 1;

            let next = uri.join(&location)?;
            log::debug!("{} redirect to {}", res.status_code(), next);

            if !res.status_code().preserves_method() {
                if method != Method::HEAD {
                    method = Method::GET;
                }
                body = None;
                headers.remove("Content-Type");
                headers.remove("Content-Length");
            }

            if next.host() != uri.host() {
                headers.remove("Authorization");
            }

            uri = next;
        }
    }
}

//Performs one exchange: connects, writes the message, reads the head of the response.
//Interim 1xx responses are skipped.
fn send_message(
    uri: &Uri,
    method: Method,
    headers: &Headers,
    body: Option<&[u8]>,
    deadline: Option<Instant>,
) -> Result<(Response, io::BufReader<Stream>), Error> {
    match uri.scheme() {
        "http" | "https" => (),
        other => return Err(Error::Scheme(other.to_string())),
    }

    if uri.host().is_none() {
        return Err(Error::Parse(ParseErr::UriErr));
    }

    let connect_timeout = deadline.map(stream::remaining).transpose()?;
    let stream = Stream::connect(uri, connect_timeout)?;

    if let Some(deadline) = deadline {
        let left = stream::remaining(deadline)?;
        stream.set_read_timeout(Some(left))?;
        stream.set_write_timeout(Some(left))?;
    }

    let mut stream = Stream::try_to_https(stream, uri)?;

    let mut msg = RequestMessage::new(uri);
    msg.method(method);

    if body.is_some() || method == Method::POST {
        msg.header("Content-Length", &body.map_or(0, |b| b.len()));
    }

    apply_auth(&mut msg, uri);

    for (key, val) in headers.iter() {
        msg.header(key.as_str(), val);
    }

    if let Some(b) = body {
        msg.body(b);
    }

    let msg = msg.parse();
    let head_len = msg.len() - body.map_or(0, |b| b.len());
    log::trace!("request head:\n{}", String::from_utf8_lossy(&msg[..head_len]));

    if let Some(deadline) = deadline {
        stream.set_write_timeout(Some(stream::remaining(deadline)?))?;
    }
    stream.write_all(&msg)?;
    stream.flush()?;

    let mut reader = stream::buffered(stream);

    loop {
        let head = stream::read_head(&mut reader, deadline)?;
        let res = Response::from_head(&head)?;
        let code = u16::from(res.status_code());

        if res.status_code().is_info() && code != 101 {
            log::debug!("skipping interim response {}", code);
            continue;
        }

        return Ok((res, reader));
    }
}

//Adds basic authentication taken from the user info of `uri`.
#[cfg(feature = "auth")]
fn apply_auth(msg: &mut RequestMessage, uri: &Uri) {
    if let Some(auth) = Authentication::from_uri(uri) {
        msg.header("Authorization", &auth.header());
    }
}

#[cfg(not(feature = "auth"))]
fn apply_auth(_msg: &mut RequestMessage, _uri: &Uri) {}
