//! Newline-delimited TCP transport using `tokio-util`'s
//! `AnyDelimiterCodec`.
//!
//! Each record is one line of raw bytes with any trailing `\r` removed.
//! Lines are not checked for UTF-8 here: a bad record is the protocol
//! layer's to reject, and only an over-long line ends the connection. The
//! stream is split into owned halves so the reader task and the writer
//! task never contend for the same lock.

use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;
use tokio_util::codec::{
    AnyDelimiterCodec, AnyDelimiterCodecError, FramedRead, FramedWrite,
};

use crate::{Connection, ConnectionId, Transport, TransportError};

/// Default upper bound on a single line, in bytes.
pub const DEFAULT_MAX_LINE_BYTES: usize = 64 * 1024;

/// A TCP [`Transport`] that frames records as newline-terminated lines.
pub struct TcpLineTransport {
    listener: TcpListener,
    max_line_bytes: usize,
}

impl TcpLineTransport {
    /// Binds a new line transport to the given address.
    pub async fn bind(
        addr: &str,
        max_line_bytes: usize,
    ) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, max_line_bytes, "TCP line transport listening");
        Ok(Self {
            listener,
            max_line_bytes,
        })
    }
}

impl Transport for TcpLineTransport {
    type Connection = TcpLineConnection;

    async fn accept(&mut self) -> Result<Self::Connection, TransportError> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        let id = ConnectionId::next();
        tracing::debug!(%id, %addr, "accepted TCP connection");

        let (read_half, write_half) = stream.into_split();
        Ok(TcpLineConnection {
            id,
            max_line_bytes: self.max_line_bytes,
            reader: Mutex::new(FramedRead::new(
                read_half,
                line_codec(self.max_line_bytes),
            )),
            writer: Mutex::new(FramedWrite::new(
                write_half,
                line_codec(self.max_line_bytes),
            )),
        })
    }

    fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

/// A single line-framed TCP connection.
pub struct TcpLineConnection {
    id: ConnectionId,
    max_line_bytes: usize,
    reader: Mutex<FramedRead<OwnedReadHalf, AnyDelimiterCodec>>,
    writer: Mutex<FramedWrite<OwnedWriteHalf, AnyDelimiterCodec>>,
}

impl Connection for TcpLineConnection {
    async fn send(&self, record: &[u8]) -> Result<(), TransportError> {
        let line = std::str::from_utf8(record).map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                e,
            ))
        })?;
        self.writer
            .lock()
            .await
            .send(line)
            .await
            .map_err(|e| write_error(e, self.max_line_bytes))
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError> {
        match self.reader.lock().await.next().await {
            Some(Ok(line)) => Ok(Some(strip_cr(&line).to_vec())),
            None => Ok(None),
            Some(Err(AnyDelimiterCodecError::MaxChunkLengthExceeded)) => {
                Err(TransportError::RecordTooLarge(self.max_line_bytes))
            }
            Some(Err(AnyDelimiterCodecError::Io(e))) => {
                Err(TransportError::ReceiveFailed(e))
            }
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        SinkExt::<&str>::close(&mut *self.writer.lock().await)
            .await
            .map_err(|e| write_error(e, self.max_line_bytes))
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

fn line_codec(max_line_bytes: usize) -> AnyDelimiterCodec {
    AnyDelimiterCodec::new_with_max_length(
        b"\n".to_vec(),
        b"\n".to_vec(),
        max_line_bytes,
    )
}

fn strip_cr(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn write_error(e: AnyDelimiterCodecError, max_line_bytes: usize) -> TransportError {
    match e {
        AnyDelimiterCodecError::Io(io) => TransportError::SendFailed(io),
        AnyDelimiterCodecError::MaxChunkLengthExceeded => {
            TransportError::RecordTooLarge(max_line_bytes)
        }
    }
}
