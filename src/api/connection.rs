//! Purpose: TCP command capability speaking RESP2 to a Redis-compatible server.
//! Exports: `RespConnection`, `RespConnector`, `ConnectOptions`.
//! Role: Production `Commands` implementation; one socket per engine call.
//! Invariants: Server error replies map to `StoreOperation`; socket faults map to `Connection`.
//! Invariants: Key and value bytes are sent exactly as given.
//! Invariants: Authentication and cluster redirection are not handled.
#![allow(clippy::result_large_err)]

use bstr::BString;
use std::io::{BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::core::commands::Commands;
use crate::core::config::{Database, Endpoint, ServerConfiguration};
use crate::core::engine::Connector;
use crate::core::error::{Error, ErrorKind};
use crate::core::resp::{Frame, encode_command, read_frame};

type ApiResult<T> = Result<T, Error>;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ConnectOptions {
    pub connect_timeout: Duration,
    pub io_timeout: Option<Duration>,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            io_timeout: Some(DEFAULT_IO_TIMEOUT),
        }
    }
}

#[derive(Debug)]
pub struct RespConnection {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    endpoint: Endpoint,
}

impl RespConnection {
    pub fn connect(endpoint: &Endpoint, options: &ConnectOptions) -> ApiResult<Self> {
        let addrs = (endpoint.host.as_str(), endpoint.port)
            .to_socket_addrs()
            .map_err(|err| {
                Error::new(ErrorKind::Connection)
                    .with_message(format!("failed to resolve {endpoint}"))
                    .with_source(err)
            })?;

        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, options.connect_timeout) {
                Ok(stream) => {
                    tracing::debug!(%addr, "connected");
                    return Self::from_stream(stream, endpoint.clone(), options);
                }
                Err(err) => last_err = Some(err),
            }
        }

        let err = Error::new(ErrorKind::Connection)
            .with_message(format!("failed to connect to {endpoint}"))
            .with_hint("Check that the server is running and --url is correct.");
        Err(match last_err {
            Some(source) => err.with_source(source),
            None => err,
        })
    }

    fn from_stream(stream: TcpStream, endpoint: Endpoint, options: &ConnectOptions) -> ApiResult<Self> {
        let configure = |stream: &TcpStream| -> std::io::Result<()> {
            stream.set_nodelay(true)?;
            stream.set_read_timeout(options.io_timeout)?;
            stream.set_write_timeout(options.io_timeout)
        };
        configure(&stream).map_err(|err| connection_error(&endpoint, "failed to configure socket", err))?;
        let writer = stream
            .try_clone()
            .map_err(|err| connection_error(&endpoint, "failed to clone socket", err))?;
        Ok(Self {
            reader: BufReader::new(stream),
            writer,
            endpoint,
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn ping(&mut self) -> ApiResult<()> {
        match self.call(&[b"PING"])? {
            Frame::Simple(reply) if reply == "PONG" => Ok(()),
            other => Err(unexpected("PING", &other)),
        }
    }

    pub fn select(&mut self, index: u32) -> ApiResult<()> {
        let index = index.to_string();
        expect_ok("SELECT", self.call(&[b"SELECT", index.as_bytes()])?)
    }

    /// Number of databases the server is configured with (`CONFIG GET databases`).
    pub fn database_count(&mut self) -> ApiResult<u32> {
        let reply = self.call(&[b"CONFIG", b"GET", b"databases"])?;
        let values = expect_bulk_array("CONFIG GET", reply)?;
        let count = values
            .get(1)
            .and_then(|value| std::str::from_utf8(value).ok())
            .and_then(|value| value.parse::<u32>().ok())
            .ok_or_else(|| {
                Error::new(ErrorKind::Protocol)
                    .with_message("server did not report its database count")
            })?;
        Ok(count)
    }

    fn call(&mut self, args: &[&[u8]]) -> ApiResult<Frame> {
        let request = encode_command(args);
        self.writer
            .write_all(&request)
            .and_then(|()| self.writer.flush())
            .map_err(|err| connection_error(&self.endpoint, "failed to send command", err))?;
        match read_frame(&mut self.reader)? {
            Frame::Error(message) => {
                let command = String::from_utf8_lossy(args.first().copied().unwrap_or_default());
                Err(Error::new(ErrorKind::StoreOperation)
                    .with_message(message)
                    .with_hint(format!("{command} was rejected by {}", self.endpoint)))
            }
            frame => Ok(frame),
        }
    }

    fn call_keyed(&mut self, args: &[&[u8]], key: &[u8]) -> ApiResult<Frame> {
        self.call(args).map_err(|err| match err.kind() {
            ErrorKind::StoreOperation => err.with_key(key),
            _ => err,
        })
    }
}

fn with_values<'a>(command: &'a [u8], key: &'a [u8], values: &[&'a [u8]]) -> Vec<&'a [u8]> {
    let mut args = Vec::with_capacity(values.len() + 2);
    args.push(command);
    args.push(key);
    args.extend_from_slice(values);
    args
}

impl Commands for RespConnection {
    fn keys(&mut self, pattern: &[u8]) -> Result<Vec<BString>, Error> {
        expect_bulk_array("KEYS", self.call(&[b"KEYS", pattern])?)
    }

    fn type_of(&mut self, key: &[u8]) -> Result<String, Error> {
        match self.call_keyed(&[b"TYPE", key], key)? {
            Frame::Simple(tag) => Ok(tag),
            other => Err(unexpected("TYPE", &other)),
        }
    }

    fn get(&mut self, key: &[u8]) -> Result<Option<BString>, Error> {
        match self.call_keyed(&[b"GET", key], key)? {
            Frame::Bulk(value) => Ok(value),
            other => Err(unexpected("GET", &other)),
        }
    }

    fn lrange(&mut self, key: &[u8]) -> Result<Vec<BString>, Error> {
        let reply = self.call_keyed(&[b"LRANGE", key, b"0", b"-1"], key)?;
        expect_bulk_array("LRANGE", reply)
    }

    fn smembers(&mut self, key: &[u8]) -> Result<Vec<BString>, Error> {
        expect_bulk_array("SMEMBERS", self.call_keyed(&[b"SMEMBERS", key], key)?)
    }

    fn hgetall(&mut self, key: &[u8]) -> Result<Vec<(BString, BString)>, Error> {
        let values = expect_bulk_array("HGETALL", self.call_keyed(&[b"HGETALL", key], key)?)?;
        pairs("HGETALL", values)
    }

    fn zrange_with_scores(&mut self, key: &[u8]) -> Result<Vec<(BString, f64)>, Error> {
        let reply = self.call_keyed(&[b"ZRANGE", key, b"0", b"-1", b"WITHSCORES"], key)?;
        let values = expect_bulk_array("ZRANGE", reply)?;
        pairs("ZRANGE", values)?
            .into_iter()
            .map(|(member, score)| -> ApiResult<(BString, f64)> {
                Ok((member, parse_score(&score)?))
            })
            .collect()
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<(), Error> {
        expect_ok("SET", self.call_keyed(&[b"SET", key, value], key)?)
    }

    fn lpush(&mut self, key: &[u8], values: &[&[u8]]) -> Result<u64, Error> {
        let args = with_values(b"LPUSH", key, values);
        expect_count("LPUSH", self.call_keyed(&args, key)?)
    }

    fn sadd(&mut self, key: &[u8], values: &[&[u8]]) -> Result<u64, Error> {
        let args = with_values(b"SADD", key, values);
        expect_count("SADD", self.call_keyed(&args, key)?)
    }

    fn del(&mut self, keys: &[&[u8]]) -> Result<u64, Error> {
        let mut args: Vec<&[u8]> = Vec::with_capacity(keys.len() + 1);
        args.push(b"DEL");
        args.extend_from_slice(keys);
        expect_count("DEL", self.call(&args)?)
    }
}

/// Opens a `RespConnection` per engine call and selects the database.
#[derive(Clone, Debug, Default)]
pub struct RespConnector {
    options: ConnectOptions,
}

impl RespConnector {
    pub fn new(options: ConnectOptions) -> Self {
        Self { options }
    }
}

impl Connector for RespConnector {
    type Connection = RespConnection;

    fn connect(
        &self,
        server: &ServerConfiguration,
        database: &Database,
    ) -> Result<Self::Connection, Error> {
        let endpoint = server.endpoint()?;
        let index = database.index()?;
        let mut connection = RespConnection::connect(&endpoint, &self.options)?;
        if index != 0 {
            connection.select(index)?;
        }
        Ok(connection)
    }

    fn list_databases(&self, server: &ServerConfiguration) -> Result<Vec<Database>, Error> {
        let endpoint = server.endpoint()?;
        let mut connection = RespConnection::connect(&endpoint, &self.options)?;
        let count = connection.database_count()?;
        Ok((0..count)
            .map(|index| Database::new(index.to_string()))
            .collect())
    }
}

fn connection_error(endpoint: &Endpoint, message: &str, err: std::io::Error) -> Error {
    Error::new(ErrorKind::Connection)
        .with_message(format!("{message} ({endpoint})"))
        .with_source(err)
}

fn unexpected(command: &str, frame: &Frame) -> Error {
    Error::new(ErrorKind::Protocol).with_message(format!(
        "unexpected {} reply to {command}",
        frame.kind()
    ))
}

fn expect_ok(command: &str, frame: Frame) -> ApiResult<()> {
    match frame {
        Frame::Simple(reply) if reply == "OK" => Ok(()),
        other => Err(unexpected(command, &other)),
    }
}

fn expect_count(command: &str, frame: Frame) -> ApiResult<u64> {
    match frame {
        Frame::Integer(value) if value >= 0 => Ok(value as u64),
        other => Err(unexpected(command, &other)),
    }
}

fn expect_bulk_array(command: &str, frame: Frame) -> ApiResult<Vec<BString>> {
    let items = match frame {
        Frame::Array(Some(items)) => items,
        Frame::Array(None) => return Ok(Vec::new()),
        other => return Err(unexpected(command, &other)),
    };
    items
        .into_iter()
        .map(|item| match item {
            Frame::Bulk(Some(value)) => Ok(value),
            other => Err(unexpected(command, &other)),
        })
        .collect()
}

fn pairs(command: &str, values: Vec<BString>) -> ApiResult<Vec<(BString, BString)>> {
    if values.len() % 2 != 0 {
        return Err(Error::new(ErrorKind::Protocol)
            .with_message(format!("{command} reply has an odd number of elements")));
    }
    let mut out = Vec::with_capacity(values.len() / 2);
    let mut iter = values.into_iter();
    while let (Some(first), Some(second)) = (iter.next(), iter.next()) {
        out.push((first, second));
    }
    Ok(out)
}

fn parse_score(raw: &[u8]) -> ApiResult<f64> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|text| text.parse::<f64>().ok())
        .ok_or_else(|| {
            Error::new(ErrorKind::Protocol).with_message(format!(
                "invalid score `{}` in ZRANGE reply",
                String::from_utf8_lossy(raw)
            ))
        })
}
