//! decoding of HTTP's "chunked" Transfer-Encoding
use std::{
    cmp,
    io::{self, BufRead, Error, ErrorKind, Read},
};

const MAX_LINE_LENGTH: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    Size,
    Data(usize),
    DataEnd,
    Trailer,
    Done,
}

///Reader that strips chunked framing from the wrapped `reader` and yields only the payload.
///
///Chunk extensions are ignored and trailer fields are discarded.
///
///# Example
///```
///use kite_http::chunked::ChunkedReader;
///use std::io::Read;
///
///let data: &[u8] = b"3\r\nfoo\r\n3\r\nbar\r\n0\r\n\r\n";
///let mut body = String::new();
///ChunkedReader::new(data).read_to_string(&mut body).unwrap();
///
///assert_eq!(body, "foobar");
///```
#[derive(Debug)]
pub struct ChunkedReader<R> {
    reader: R,
    state: State,
}

impl<R: BufRead> ChunkedReader<R> {
    pub fn new(reader: R) -> Self {
        ChunkedReader {
            reader,
            state: State::Size,
        }
    }

    ///Returns a reference to the wrapped reader.
    pub fn get_ref(&self) -> &R {
        &self.reader
    }

    //Reads one CRLF (or bare LF) terminated line, without the terminator.
    //Returns `None` on a clean EOF.
    fn read_line(&mut self) -> io::Result<Option<Vec<u8>>> {
        let mut line = Vec::new();
        let read = (&mut self.reader)
            .take(MAX_LINE_LENGTH as u64 + 1)
            .read_until(b'\n', &mut line)?;

        if read == 0 {
            return Ok(None);
        }

        if line.last() != Some(&b'\n') {
            return Err(if line.len() > MAX_LINE_LENGTH {
                malformed("chunk line too long")
            } else {
                unexpected_eof()
            });
        }

        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }

        Ok(Some(line))
    }
}

impl<R: BufRead> Read for ChunkedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            match self.state {
                State::Size => {
                    let line = self.read_line()?.ok_or_else(unexpected_eof)?;
                    let size = parse_chunk_size(&line)?;

                    self.state = if size == 0 {
                        State::Trailer
                    } else {
                        State::Data(size)
                    };
                }
                State::Data(remaining) => {
                    if buf.is_empty() {
                        return Ok(0);
                    }

                    let max = cmp::min(remaining, buf.len());
                    let read = self.reader.read(&mut buf[..max])?;

                    if read == 0 {
                        return Err(unexpected_eof());
                    }

                    self.state = match remaining - read {
                        0 => State::DataEnd,
                        left => State::Data(left),
                    };

                    return Ok(read);
                }
                State::DataEnd => match self.read_line()? {
                    Some(line) if line.is_empty() => self.state = State::Size,
                    Some(_) => return Err(malformed("missing CRLF after chunk data")),
                    None => return Err(unexpected_eof()),
                },
                State::Trailer => match self.read_line()? {
                    Some(line) if !line.is_empty() => continue,
                    _ => self.state = State::Done,
                },
                State::Done => return Ok(0),
            }
        }
    }
}

//Parses the hexadecimal size of a chunk, ignoring chunk extensions after `;`.
fn parse_chunk_size(line: &[u8]) -> io::Result<usize> {
    let size = match line.iter().position(|&b| b == b';') {
        Some(i) => &line[..i],
        None => line,
    };
    let size = size.trim_ascii();

    if size.is_empty() {
        return Err(malformed("empty chunk size"));
    }

    if size.len() > 16 {
        return Err(malformed("chunk length too large"));
    }

    size.iter().try_fold(0usize, |n, &b| {
        let digit = (b as char)
            .to_digit(16)
            .ok_or_else(|| malformed("invalid byte in chunk length"))?;

        n.checked_mul(16)
            .and_then(|n| n.checked_add(digit as usize))
            .ok_or_else(|| malformed("chunk length too large"))
    })
}

fn malformed(msg: &str) -> Error {
    Error::new(
        ErrorKind::InvalidData,
        format!("malformed chunked encoding: {}", msg),
    )
}

fn unexpected_eof() -> Error {
    Error::new(ErrorKind::UnexpectedEof, "unexpected EOF in chunked body")
}
