//! command line options
use crate::{error::Error, response::Headers};
use clap::Parser;
use std::time::Duration;

/// Positional argument asking for the request body to be read from stdin.
pub const STDIN_SENTINEL: &str = "-";

/// Timeout used when `--timeout` is not given.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Sends one HTTP request and writes the response status line and body to stdout.
///
/// Use a hyphen before the url to read data from stdin and POST it.
/// POSTs get a default content-type of "application/x-www-form-urlencoded".
#[derive(Debug, Parser)]
#[command(name = "kite-http", version)]
pub struct Cli {
    /// HTTP header as name=value, may be repeated
    #[arg(long = "header", value_name = "NAME=VALUE")]
    pub headers: Vec<String>,

    /// Write the request body to stderr before sending it
    #[arg(long)]
    pub debug: bool,

    /// Use POST even without a body
    #[arg(long)]
    pub post: bool,

    /// Literal request body
    #[arg(long, value_name = "STRING")]
    pub data: Option<String>,

    /// Timeout for receiving a response from the HTTP server, e.g. 500ms, 2s, 1m30s; 0 disables it
    #[arg(long, value_name = "DURATION", default_value = "1s", value_parser = parse_duration)]
    pub timeout: Duration,

    /// [-] <url>
    #[arg(value_name = "ARGS")]
    pub args: Vec<String>,
}

/// Where the request body comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum BodySource {
    None,
    Stdin,
    Data(String),
}

/// Everything needed to perform one exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub url: String,
    pub headers: Headers,
    pub body: BodySource,
    pub post: bool,
    pub timeout: Option<Duration>,
    pub debug: bool,
}

impl Config {
    /// Creates a `Config` for a plain GET of `url` with default settings.
    pub fn new<T: ToString + ?Sized>(url: &T) -> Config {
        Config {
            url: url.to_string(),
            headers: Headers::new(),
            body: BodySource::None,
            post: false,
            timeout: Some(DEFAULT_TIMEOUT),
            debug: false,
        }
    }

    /// Parses command line arguments, the first one being the program name.
    ///
    /// Errors of `clap` itself (unknown flags, `--help`) are returned as `clap::Error`
    /// so that they can be rendered by `clap`.
    pub fn try_parse_from<I, T>(args: I) -> Result<Result<Config, Error>, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Ok(Config::try_from(Cli::try_parse_from(args)?))
    }
}

impl TryFrom<Cli> for Config {
    type Error = Error;

    fn try_from(cli: Cli) -> Result<Config, Error> {
        let (stdin, url) = resolve_args(&cli.args)?;
        let headers = collect_headers(Headers::new(), &cli.headers)?;

        let body = match (stdin, cli.data) {
            (true, Some(_)) => {
                return Err(Error::Usage(
                    "conflicting body sources: --data and -".to_string(),
                ))
            }
            (true, None) => BodySource::Stdin,
            (false, Some(data)) => BodySource::Data(data),
            (false, None) => BodySource::None,
        };

        Ok(Config {
            url,
            headers,
            body,
            post: cli.post,
            timeout: Some(cli.timeout).filter(|t| !t.is_zero()),
            debug: cli.debug,
        })
    }
}

/// Splits positional arguments into the stdin flag and the url.
pub fn resolve_args(args: &[String]) -> Result<(bool, String), Error> {
    match args {
        [] => Err(Error::Usage("missing url".to_string())),
        [url] => Ok((false, url.to_string())),
        [first, url] if first == STDIN_SENTINEL => Ok((true, url.to_string())),
        [first, ..] if first != STDIN_SENTINEL => Err(unrecognised(first)),
        [_, _, extra, ..] => Err(unrecognised(extra)),
        _ => Err(Error::Usage("missing url".to_string())),
    }
}

fn unrecognised(arg: &str) -> Error {
    Error::Usage(format!("unrecognised argument: {}", arg))
}

/// Adds every `name=value` flag to `headers` and returns the result.
/// A later flag replaces an earlier one with the same name.
pub fn collect_headers<I, T>(headers: Headers, flags: I) -> Result<Headers, Error>
where
    I: IntoIterator<Item = T>,
    T: AsRef<str>,
{
    flags.into_iter().try_fold(headers, |mut headers, flag| {
        let (name, value) = parse_header(flag.as_ref())?;
        headers.insert(name, value);

        Ok(headers)
    })
}

/// Parses one `name=value` header flag. The value may itself contain `=`.
pub fn parse_header(flag: &str) -> Result<(&str, &str), Error> {
    let invalid = || Error::Usage(format!("invalid header {:?}, expected name=value", flag));

    let (name, value) = flag.split_once('=').ok_or_else(invalid)?;

    let valid_name = !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_graphic() && b != b':');
    let valid_value = !value.bytes().any(|b| b == b'\r' || b == b'\n' || b == 0);

    if valid_name && valid_value {
        Ok((name, value))
    } else {
        Err(invalid())
    }
}

/// Parses a duration such as `300ms`, `1.5s` or `1h2m3s`. Bare `0` is accepted.
///
/// # Example
/// ```
/// use kite_http::config::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("1m30s"), Ok(Duration::from_secs(90)));
/// ```
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let invalid = || format!("invalid duration {:?}", s);

    if s == "0" {
        return Ok(Duration::ZERO);
    }

    let mut rest = s;
    let mut nanos: u128 = 0;

    if rest.is_empty() {
        return Err(invalid());
    }

    while !rest.is_empty() {
        let num_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(|| format!("missing unit in duration {:?}", s))?;
        let (number, tail) = rest.split_at(num_len);

        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_len);

        let scale: u128 = match unit {
            "ns" => 1,
            "us" | "µs" | "μs" => 1_000,
            "ms" => 1_000_000,
            "s" => 1_000_000_000,
            "m" => 60 * 1_000_000_000,
            "h" => 3_600 * 1_000_000_000,
            "" => return Err(format!("missing unit in duration {:?}", s)),
            _ => return Err(format!("unknown unit {:?} in duration {:?}", unit, s)),
        };

        let (int, frac) = match number.split_once('.') {
            Some((int, frac)) => (int, frac),
            None => (number, ""),
        };

        if (int.is_empty() && frac.is_empty()) || frac.contains('.') {
            return Err(invalid());
        }

        let int: u128 = if int.is_empty() {
            0
        } else {
            int.parse().map_err(|_| invalid())?
        };

        let mut frac_nanos: u128 = 0;
        let mut divisor: u128 = 1;
        for digit in frac.bytes().take(18) {
            frac_nanos = frac_nanos * 10 + u128::from(digit - b'0');
            divisor *= 10;
        }

        nanos = int
            .checked_mul(scale)
            .and_then(|n| n.checked_add(frac_nanos * scale / divisor))
            .and_then(|n| nanos.checked_add(n))
            .ok_or_else(invalid)?;

        rest = tail;
    }

    let nanos = u64::try_from(nanos).map_err(|_| invalid())?;
    Ok(Duration::from_nanos(nanos))
}
