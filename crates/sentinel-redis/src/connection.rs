//! TCP connection with RESP framing.

use std::time::Duration;

use bytes::BytesMut;
use sentinel_monitor::{ConnectOptions, TransportError};
use socket2::{SockRef, TcpKeepalive};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use crate::resp::{self, RespValue};

/// Connection timeout.
pub const CONNECT_TIMEOUT: Duration = Duration::from_millis(500);

/// Timeout for a single request/response round trip.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(2);

/// Limit on buffered, not yet decodable reply bytes.
const MAX_BUFFER_SIZE: usize = 1 << 20;

/// Dial `location` and apply keep-alive settings.
pub async fn dial(location: &str, options: ConnectOptions) -> Result<TcpStream, TransportError> {
    let stream = timeout(CONNECT_TIMEOUT, TcpStream::connect(location))
        .await
        .map_err(|_| TransportError::Timeout("connect"))??;
    stream.set_nodelay(true)?;
    apply_tcp_keepalive(&stream, options.tcp_keepalive_secs)?;
    debug!(%location, keepalive = options.tcp_keepalive_secs, "connected");
    Ok(stream)
}

fn apply_tcp_keepalive(stream: &TcpStream, keepalive_secs: u32) -> std::io::Result<()> {
    if keepalive_secs == 0 {
        return Ok(());
    }
    let secs = u64::from(keepalive_secs);
    let keepalive = TcpKeepalive::new().with_time(Duration::from_secs(secs));

    #[cfg(any(target_os = "linux", target_os = "macos", target_os = "ios"))]
    let keepalive = keepalive
        .with_interval(Duration::from_secs((secs / 3).max(1)))
        .with_retries(3);

    SockRef::from(stream).set_tcp_keepalive(&keepalive)
}

/// Read from `reader` until `buf` decodes into one value.
pub async fn read_value<R>(reader: &mut R, buf: &mut BytesMut) -> Result<RespValue, TransportError>
where
    R: AsyncRead + Unpin,
{
    loop {
        if let Some(value) =
            resp::decode(buf).map_err(|e| TransportError::Protocol(e.to_string()))?
        {
            return Ok(value);
        }
        if buf.len() > MAX_BUFFER_SIZE {
            return Err(TransportError::Protocol("reply exceeds buffer limit".to_string()));
        }
        if reader.read_buf(buf).await? == 0 {
            return Err(TransportError::Closed);
        }
    }
}

/// A request/response RESP connection.
pub struct RespConnection {
    stream: TcpStream,
    buf: BytesMut,
}

impl RespConnection {
    /// Dial `location` and wrap the stream.
    pub async fn open(location: &str, options: ConnectOptions) -> Result<Self, TransportError> {
        Ok(Self::from_stream(dial(location, options).await?))
    }

    /// Wrap an already connected stream.
    pub fn from_stream(stream: TcpStream) -> Self {
        Self {
            stream,
            buf: BytesMut::with_capacity(4096),
        }
    }

    /// Send a command and wait for its reply.
    ///
    /// Server error replies are returned as `TransportError::Server`.
    pub async fn request(&mut self, args: &[&str]) -> Result<RespValue, TransportError> {
        let command = resp::encode_command(args);
        let round_trip = async {
            self.stream.write_all(&command).await?;
            read_value(&mut self.stream, &mut self.buf).await
        };
        let reply = timeout(COMMAND_TIMEOUT, round_trip)
            .await
            .map_err(|_| TransportError::Timeout("command"))??;

        match reply {
            RespValue::Error(message) => Err(TransportError::Server(message)),
            other => Ok(other),
        }
    }

    /// Shut down the write side; errors are ignored.
    pub async fn shutdown(&mut self) {
        let _ = self.stream.shutdown().await;
    }
}
