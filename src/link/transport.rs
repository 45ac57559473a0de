// src/link/transport.rs
//! How the link opens a connection and pulls lines off it

use async_trait::async_trait;
use std::io;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    net::TcpStream,
};

/// Opens a line-oriented connection to a receiver
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, host: &str, port: u16) -> io::Result<Box<dyn LineSource>>;
}

/// One open connection. Dropping it closes the underlying socket.
#[async_trait]
pub trait LineSource: Send {
    /// Next line without its terminator, `None` once the peer has closed
    async fn read_line(&mut self) -> io::Result<Option<String>>;
}

/// Plain TCP, the way NMEA-over-IP bridges and receivers expose their output
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, host: &str, port: u16) -> io::Result<Box<dyn LineSource>> {
        let stream = TcpStream::connect((host, port)).await?;
        Ok(Box::new(TcpLines::new(stream)))
    }
}

/// Buffered line reader over a TCP stream
pub struct TcpLines {
    reader: BufReader<TcpStream>,
    buf: Vec<u8>,
}

impl TcpLines {
    pub fn new(stream: TcpStream) -> Self {
        Self {
            reader: BufReader::new(stream),
            buf: Vec::with_capacity(128),
        }
    }
}

#[async_trait]
impl LineSource for TcpLines {
    async fn read_line(&mut self) -> io::Result<Option<String>> {
        self.buf.clear();
        if self.reader.read_until(b'\n', &mut self.buf).await? == 0 {
            return Ok(None); // EOF
        }

        // NMEA is ASCII; anything else will fail the checksum downstream
        let line = String::from_utf8_lossy(&self.buf);
        Ok(Some(line.trim_end_matches(&['\r', '\n'][..]).to_string()))
    }
}
