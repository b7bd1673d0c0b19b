//! the single command: one request, status line and body to the output
use crate::{
    config::{BodySource, Config},
    error::Error,
    request::{Method, Request},
    uri::Uri,
};
use std::io::{self, Read, Write};

/// `Content-Type` sent with a body when none was given on the command line.
pub const DEFAULT_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

const CR_LF: &str = "\r\n";

/// Performs the exchange described by `config`.
///
/// The body is read from `stdin` when asked for, echoed to `stderr` in debug mode, and
/// the response is rendered to `stdout` as `"<protocol> <status>\r\n\r\n"` followed by
/// the dechunked body. Nothing is written to `stdout` unless the response head arrived.
pub fn run<I, O, E>(config: &Config, stdin: &mut I, stdout: &mut O, stderr: &mut E) -> Result<(), Error>
where
    I: Read + ?Sized,
    O: Write + ?Sized,
    E: Write + ?Sized,
{
    let body = acquire_body(&config.body, stdin)?;

    if config.debug {
        stderr.write_all(body.as_deref().unwrap_or_default())?;
        stderr.write_all(b"\n")?;
        stderr.flush()?;
    }

    let uri: Uri = config.url.parse()?;
    let request = build_request(config, &uri, body.as_deref());

    let (res, mut body) = request.send_head()?;
    log::debug!("{} {} from {}", res.version(), res.status(), uri);

    write!(stdout, "{} {}{}", res.version(), res.status(), CR_LF)?;
    stdout.write_all(CR_LF.as_bytes())?;
    io::copy(&mut body, stdout)?;
    stdout.flush()?;

    Ok(())
}

/// Reads the request body from its source. An empty body counts as no body.
pub fn acquire_body<R: Read + ?Sized>(source: &BodySource, stdin: &mut R) -> Result<Option<Vec<u8>>, Error> {
    let body = match source {
        BodySource::None => return Ok(None),
        BodySource::Data(data) => data.as_bytes().to_vec(),
        BodySource::Stdin => {
            let mut data = Vec::new();
            stdin.read_to_end(&mut data).map_err(Error::IO)?;
            data
        }
    };

    Ok(Some(body).filter(|b| !b.is_empty()))
}

/// POST when there is a body or it was asked for, GET otherwise.
pub fn select_method(body: Option<&[u8]>, post: bool) -> Method {
    if post || body.is_some() {
        Method::POST
    } else {
        Method::GET
    }
}

/// Assembles the request for `uri`: method, headers from the command line and the body
/// with its default `Content-Type`.
pub fn build_request<'a>(config: &Config, uri: &'a Uri, body: Option<&'a [u8]>) -> Request<'a> {
    let mut request = Request::new(uri);
    request
        .method(select_method(body, config.post))
        .headers(&config.headers)
        .timeout(config.timeout);

    if let Some(body) = body {
        request.body(body);

        if !config.headers.contains_key("Content-Type") {
            request.header("Content-Type", DEFAULT_CONTENT_TYPE);
        }
    }

    request
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::ErrorKind;

    struct BrokenStdin;

    impl Read for BrokenStdin {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(ErrorKind::BrokenPipe, "stdin is gone"))
        }
    }

    #[test]
    fn body_from_data() {
        let body = acquire_body(&BodySource::Data("a=1".to_string()), &mut io::empty()).unwrap();
        assert_eq!(body, Some(b"a=1".to_vec()));
    }

    #[test]
    fn body_from_stdin() {
        let mut stdin: &[u8] = b"from stdin";
        let body = acquire_body(&BodySource::Stdin, &mut stdin).unwrap();

        assert_eq!(body, Some(b"from stdin".to_vec()));
    }

    #[test]
    fn body_empty_is_none() {
        assert_eq!(acquire_body(&BodySource::Stdin, &mut io::empty()).unwrap(), None);
        assert_eq!(
            acquire_body(&BodySource::Data(String::new()), &mut io::empty()).unwrap(),
            None
        );
        assert_eq!(acquire_body(&BodySource::None, &mut BrokenStdin).unwrap(), None);
    }

    #[test]
    fn body_stdin_failure() {
        let err = acquire_body(&BodySource::Stdin, &mut BrokenStdin).unwrap_err();
        assert!(matches!(err, Error::IO(e) if e.kind() == ErrorKind::BrokenPipe));
    }

    #[test]
    fn method_selection() {
        assert_eq!(select_method(None, false), Method::GET);
        assert_eq!(select_method(None, true), Method::POST);
        assert_eq!(select_method(Some(b"a=1"), false), Method::POST);
    }

    #[test]
    fn invalid_url_writes_nothing() {
        let config = Config::new("http://exa mple.test/");
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();

        let err = run(&config, &mut io::empty(), &mut stdout, &mut stderr).unwrap_err();

        assert!(matches!(err, Error::Parse(_)));
        assert!(stdout.is_empty());
        assert!(stderr.is_empty());
    }

    #[test]
    fn debug_echo_before_dispatch() {
        let mut config = Config::new("gopher://example.test/");
        config.body = BodySource::Data("x=1".to_string());
        config.debug = true;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let err = run(&config, &mut io::empty(), &mut stdout, &mut stderr).unwrap_err();

        assert!(matches!(err, Error::Scheme(_)));
        assert_eq!(stderr, b"x=1\n");
        assert!(stdout.is_empty());
    }
}
