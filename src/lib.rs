//!Single-shot command line HTTP client.
//!
//!Sends one GET or POST request and writes the status line of the response followed by its
//!dechunked body. The HTTP/1.1 client underneath (`request`, `response`, `stream`, `tls`)
//!is blocking and opens one connection per request.
//!
//!## Example
//!```no_run
//!use kite_http::{config::Config, runner};
//!use std::io;
//!
//!let config = Config::new("http://example.test/echo");
//!runner::run(&config, &mut io::stdin(), &mut io::stdout(), &mut io::stderr()).unwrap();
//!```
pub mod chunked;
pub mod config;
pub mod error;
pub mod request;
pub mod response;
pub mod runner;
pub mod stream;
pub mod tls;
pub mod uri;
