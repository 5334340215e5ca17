// RESP2 frame encoding and decoding for the TCP command capability.
use bstr::BString;
use std::io::{BufRead, Read};

use crate::core::error::{Error, ErrorKind};

pub const MAX_BULK_LEN: i64 = 512 * 1024 * 1024;
pub const MAX_ARRAY_LEN: i64 = 64 * 1024 * 1024;
pub const MAX_LINE_LEN: usize = 64 * 1024;

#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Option<BString>),
    Array(Option<Vec<Frame>>),
}

impl Frame {
    pub fn kind(&self) -> &'static str {
        match self {
            Frame::Simple(_) => "simple string",
            Frame::Error(_) => "error",
            Frame::Integer(_) => "integer",
            Frame::Bulk(_) => "bulk string",
            Frame::Array(_) => "array",
        }
    }

    pub fn encode(&self, buf: &mut Vec<u8>) {
        match self {
            Frame::Simple(text) => write_line(buf, b'+', text),
            Frame::Error(text) => write_line(buf, b'-', text),
            Frame::Integer(value) => write_line(buf, b':', &value.to_string()),
            Frame::Bulk(None) => buf.extend_from_slice(b"$-1\r\n"),
            Frame::Bulk(Some(data)) => {
                write_line(buf, b'$', &data.len().to_string());
                buf.extend_from_slice(data);
                buf.extend_from_slice(b"\r\n");
            }
            Frame::Array(None) => buf.extend_from_slice(b"*-1\r\n"),
            Frame::Array(Some(items)) => {
                write_line(buf, b'*', &items.len().to_string());
                for item in items {
                    item.encode(buf);
                }
            }
        }
    }
}

fn write_line(buf: &mut Vec<u8>, marker: u8, text: &str) {
    buf.push(marker);
    buf.extend_from_slice(text.as_bytes());
    buf.extend_from_slice(b"\r\n");
}

/// Encodes a command as an array of bulk strings.
pub fn encode_command(args: &[&[u8]]) -> Vec<u8> {
    let payload: usize = args.iter().map(|arg| arg.len() + 16).sum();
    let mut buf = Vec::with_capacity(payload + 16);
    write_line(&mut buf, b'*', &args.len().to_string());
    for arg in args {
        write_line(&mut buf, b'$', &arg.len().to_string());
        buf.extend_from_slice(arg);
        buf.extend_from_slice(b"\r\n");
    }
    buf
}

/// Reads one complete frame.
pub fn read_frame<R: BufRead>(reader: &mut R) -> Result<Frame, Error> {
    let line = read_line(reader)?;
    let (&marker, rest) = line
        .split_first()
        .ok_or_else(|| protocol_error("empty reply line"))?;
    let text = std::str::from_utf8(rest).map_err(|err| {
        Error::new(ErrorKind::Protocol)
            .with_message("reply header is not utf-8")
            .with_source(err)
    })?;
    match marker {
        b'+' => Ok(Frame::Simple(text.to_string())),
        b'-' => Ok(Frame::Error(text.to_string())),
        b':' => Ok(Frame::Integer(parse_len(text)?)),
        b'$' => {
            let len = parse_len(text)?;
            if len < 0 {
                return Ok(Frame::Bulk(None));
            }
            if len > MAX_BULK_LEN {
                return Err(protocol_error(format!("bulk string of {len} bytes exceeds limit")));
            }
            let mut data = vec![0u8; len as usize + 2];
            reader.read_exact(&mut data).map_err(io_error)?;
            if !data.ends_with(b"\r\n") {
                return Err(protocol_error("bulk string is not CRLF terminated"));
            }
            data.truncate(len as usize);
            Ok(Frame::Bulk(Some(BString::from(data))))
        }
        b'*' => {
            let len = parse_len(text)?;
            if len < 0 {
                return Ok(Frame::Array(None));
            }
            if len > MAX_ARRAY_LEN {
                return Err(protocol_error(format!("array of {len} elements exceeds limit")));
            }
            let mut items = Vec::with_capacity((len as usize).min(1024));
            for _ in 0..len {
                items.push(read_frame(reader)?);
            }
            Ok(Frame::Array(Some(items)))
        }
        other => Err(protocol_error(format!(
            "unexpected reply marker {:?}",
            other as char
        ))),
    }
}

fn read_line<R: BufRead>(reader: &mut R) -> Result<Vec<u8>, Error> {
    let mut line = Vec::new();
    let read = reader
        .by_ref()
        .take(MAX_LINE_LEN as u64)
        .read_until(b'\n', &mut line)
        .map_err(io_error)?;
    if read == 0 {
        return Err(Error::new(ErrorKind::Connection).with_message("server closed the connection"));
    }
    if !line.ends_with(b"\r\n") {
        return Err(protocol_error("reply line is not CRLF terminated"));
    }
    line.truncate(line.len() - 2);
    Ok(line)
}

fn parse_len(text: &str) -> Result<i64, Error> {
    text.parse::<i64>().map_err(|err| {
        Error::new(ErrorKind::Protocol)
            .with_message(format!("invalid integer `{text}` in reply"))
            .with_source(err)
    })
}

fn protocol_error(message: impl Into<String>) -> Error {
    Error::new(ErrorKind::Protocol).with_message(message)
}

fn io_error(err: std::io::Error) -> Error {
    let message = match err.kind() {
        std::io::ErrorKind::UnexpectedEof => "server closed the connection mid-reply",
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut => "timed out reading reply",
        _ => "failed to read reply",
    };
    Error::new(ErrorKind::Connection)
        .with_message(message)
        .with_source(err)
}
