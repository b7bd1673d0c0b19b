//! parsing server response
use crate::{
    error::{Error, ParseErr},
    uri::Uri,
};
use std::{
    collections::{hash_map, HashMap},
    fmt,
    str::FromStr,
};
use unicase::Ascii;

///Head of a server's response: status line and headers.
///The body is handed out separately as a `stream::Body`.
#[derive(Clone, Debug, PartialEq)]
pub struct Response {
    status: Status,
    headers: Headers,
}

impl Response {
    ///Creates new `Response` with head - status and headers - parsed from a slice of bytes
    ///
    ///# Examples
    ///```
    ///use kite_http::response::Response;
    ///
    ///const HEAD: &[u8] = b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\n";
    ///
    ///let response = Response::from_head(HEAD).unwrap();
    ///assert_eq!(response.reason(), "OK");
    ///```
    pub fn from_head(head: &[u8]) -> Result<Response, Error> {
        let (headers, status) = Self::parse_head(head)?;

        Ok(Response { status, headers })
    }

    ///Parses head of a `Response` - status and headers - from slice of bytes.
    ///
    ///Lines are decoded one by one; bytes outside of UTF-8 (obs-text) are replaced
    ///with `U+FFFD` instead of failing the whole head.
    pub fn parse_head(head: &[u8]) -> Result<(Headers, Status), ParseErr> {
        let mut lines = head
            .split(|&b| b == b'\n')
            .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
            .map(String::from_utf8_lossy);

        let status = lines.next().ok_or(ParseErr::Empty)?.parse()?;
        let headers = lines
            .take_while(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\r\n")
            .parse()?;

        Ok((headers, status))
    }

    ///Returns status code of this `Response`.
    pub fn status_code(&self) -> StatusCode {
        self.status.code
    }

    ///Returns HTTP version of this `Response`.
    pub fn version(&self) -> &str {
        &self.status.version
    }

    ///Returns reason of this `Response`.
    pub fn reason(&self) -> &str {
        &self.status.reason
    }

    ///Returns the status part of the status line: the code followed by the reason phrase,
    ///if the server sent one.
    pub fn status(&self) -> String {
        if self.status.reason.is_empty() {
            self.status.code.to_string()
        } else {
            format!("{} {}", self.status.code, self.status.reason)
        }
    }

    ///Returns headers of this `Response`.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    ///Returns length of the content of this `Response` as a `Result`, according to information
    ///included in headers. If there is no such an information, returns `Ok(None)`.
    pub fn content_len(&self) -> Result<Option<usize>, ParseErr> {
        match self.headers.get("Content-Length") {
            Some(p) => Ok(Some(p.trim().parse()?)),
            None => Ok(None),
        }
    }

    ///Checks if the body of this `Response` is sent with chunked transfer coding.
    pub fn is_chunked(&self) -> bool {
        self.headers
            .get("Transfer-Encoding")
            .map(|te| {
                te.rsplit(',')
                    .next()
                    .map(|last| last.trim().eq_ignore_ascii_case("chunked"))
                    .unwrap_or(false)
            })
            .unwrap_or(false)
    }

    ///Checks if this `Response` may carry a body, regardless of the request method.
    pub fn may_have_body(&self) -> bool {
        let code = u16::from(self.status.code);
        !(self.status.code.is_info() || code == 204 || code == 304)
    }
}

///Code sent by a server in response to a client's request.
///# Example
///```
///use kite_http::response::StatusCode;
///
///let code = StatusCode::from(307u16);
///assert!(code.is_redirect() && code.preserves_method())
///```
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct StatusCode(u16);

impl StatusCode {
    ///Checks if this `StatusCode` is within 100-199, which indicates that it's Informational.
    pub fn is_info(&self) -> bool {
        self.0 >= 100 && self.0 < 200
    }

    ///Checks if this `StatusCode` is one of the redirection codes the client follows.
    pub fn is_redirect(&self) -> bool {
        matches!(self.0, 301 | 302 | 303 | 307 | 308)
    }

    ///Checks if a redirect with this `StatusCode` keeps the original method and body.
    pub fn preserves_method(&self) -> bool {
        matches!(self.0, 307 | 308)
    }
}

impl From<StatusCode> for u16 {
    fn from(code: StatusCode) -> Self {
        code.0
    }
}

impl From<u16> for StatusCode {
    fn from(code: u16) -> Self {
        StatusCode(code)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

///Status line of a response: version, code and an optional reason phrase.
#[derive(Clone, Debug, PartialEq)]
pub struct Status {
    version: String,
    code: StatusCode,
    reason: String,
}

impl<T, U, V> From<(T, U, V)> for Status
where
    T: ToString,
    V: ToString,
    StatusCode: From<U>,
{
    fn from(status: (T, U, V)) -> Status {
        Status {
            version: status.0.to_string(),
            code: StatusCode::from(status.1),
            reason: status.2.to_string(),
        }
    }
}

impl FromStr for Status {
    type Err = ParseErr;

    fn from_str(status_line: &str) -> Result<Status, Self::Err> {
        let mut parts = status_line.trim_end().splitn(3, ' ');

        let version = parts.next().filter(|v| v.starts_with("HTTP/"));
        let code = parts.next().filter(|c| c.len() == 3);

        match (version, code) {
            (Some(version), Some(code)) => {
                let code: u16 = code.parse()?;
                let reason = parts.next().unwrap_or("").trim();

                Ok(Status::from((version, code, reason)))
            }
            _ => Err(ParseErr::StatusErr),
        }
    }
}

///Wrapper around HashMap<Ascii<String>, String> with additional functionality for parsing HTTP headers
///
///# Example
///```
///use kite_http::response::Headers;
///
///let mut headers = Headers::new();
///headers.insert("Connection", "Close");
///
///assert_eq!(headers.get("connection"), Some(&"Close".to_string()))
///```
#[derive(Debug, PartialEq, Clone, Default)]
pub struct Headers(HashMap<Ascii<String>, String>);

impl Headers {
    ///Creates an empty `Headers`.
    pub fn new() -> Headers {
        Headers(HashMap::new())
    }

    ///Creates an empty `Headers` with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Headers {
        Headers(HashMap::with_capacity(capacity))
    }

    ///An iterator visiting all key-value pairs in arbitrary order.
    pub fn iter(&self) -> hash_map::Iter<'_, Ascii<String>, String> {
        self.0.iter()
    }

    ///Returns a reference to the value corresponding to the key. Keys are case-insensitive.
    pub fn get<T: ToString + ?Sized>(&self, k: &T) -> Option<&String> {
        self.0.get(&Ascii::new(k.to_string()))
    }

    ///Checks if a header with the given name is present.
    pub fn contains_key<T: ToString + ?Sized>(&self, k: &T) -> bool {
        self.0.contains_key(&Ascii::new(k.to_string()))
    }

    ///Inserts a key-value pair. A header with the same name, in any case, is replaced
    ///together with the spelling of its name.
    pub fn insert<T, U>(&mut self, key: &T, val: &U) -> Option<String>
    where
        T: ToString + ?Sized,
        U: ToString + ?Sized,
    {
        let key = Ascii::new(key.to_string());
        let old = self.0.remove(&key);
        self.0.insert(key, val.to_string());

        old
    }

    ///Removes a key from the map, returning the value at the key if the key was previously in the map.
    pub fn remove<T: ToString + ?Sized>(&mut self, key: &T) -> Option<String> {
        self.0.remove(&Ascii::new(key.to_string()))
    }

    ///Overwrites entries of this `Headers` with all entries of `other`.
    pub fn extend(&mut self, other: &Headers) {
        for (k, v) in other.iter() {
            self.insert(k.as_str(), v);
        }
    }

    ///Creates default headers for a HTTP request to `uri`.
    pub fn default_http(uri: &Uri) -> Headers {
        let mut headers = Headers::with_capacity(4);

        if let Some(host) = uri.host_header() {
            headers.insert("Host", &host);
        }
        headers.insert("User-Agent", concat!("kite-http/", env!("CARGO_PKG_VERSION")));
        headers.insert("Connection", "close");

        headers
    }
}

impl FromStr for Headers {
    type Err = ParseErr;

    fn from_str(s: &str) -> Result<Headers, ParseErr> {
        let mut headers = Headers::new();

        for line in s.lines().filter(|l| !l.is_empty()) {
            let (key, value) = line.split_once(':').ok_or(ParseErr::HeadersErr)?;
            let key = key.trim();

            if key.is_empty() {
                return Err(ParseErr::HeadersErr);
            }

            headers.insert(key, value.trim());
        }

        Ok(headers)
    }
}
