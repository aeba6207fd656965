//! Dialer-side framed connection used by the client and worker SDKs.

use crate::transport::frames::{MultipartCodec, TransportError};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::net::ToSocketAddrs;
use tokio_util::codec::{FramedRead, FramedWrite};

/// A single framed TCP connection to a broker endpoint.
pub struct Connection {
    reader: FramedRead<OwnedReadHalf, MultipartCodec>,
    writer: FramedWrite<OwnedWriteHalf, MultipartCodec>,
}

impl Connection {
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            reader: FramedRead::new(read_half, MultipartCodec::new()),
            writer: FramedWrite::new(write_half, MultipartCodec::new()),
        })
    }

    pub async fn send(&mut self, frames: Vec<Bytes>) -> Result<(), TransportError> {
        self.writer.send(frames).await
    }

    pub async fn recv(&mut self) -> Result<Vec<Bytes>, TransportError> {
        match self.reader.next().await {
            Some(result) => result,
            None => Err(TransportError::ConnectionClosed),
        }
    }

    /// Sends a request and waits for the single reply, bounded by `timeout`.
    pub async fn request(
        &mut self,
        frames: Vec<Bytes>,
        timeout: Duration,
    ) -> Result<Vec<Bytes>, TransportError> {
        self.send(frames).await?;
        tokio::time::timeout(timeout, self.recv())
            .await
            .map_err(|_| TransportError::Timeout)?
    }
}
