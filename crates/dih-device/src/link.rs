//! TCP line transport for the device.
//!
//! [`dih_core::Device`] polls its transport synchronously and must never
//! block, so the socket is owned by two tokio tasks and the device only sees
//! channel ends:
//!
//! ```text
//!   TcpStream ──read──► LineFramer ──mpsc──► ChannelTransport::read_line
//!   TcpStream ◄─write── "line\n"   ◄──mpsc── ChannelTransport::write_line
//! ```
//!
//! Framing (and the record length bound) happens in the reader task, so the
//! inbound channel carries whole records or the framing error that replaced
//! one.

use std::io;

use bytes::BytesMut;
use dih_core::{Transport, TransportError};
use dih_proto::{LineFramer, ProtocolError};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::mpsc::{self, error::TryRecvError, error::TrySendError},
    task::JoinHandle,
};
use tracing::{debug, warn};

use crate::error::DeviceError;

/// Inbound record, or the framing error that replaced it.
type Record = Result<String, ProtocolError>;

/// Non-blocking [`Transport`] over a pair of bounded channels.
#[derive(Debug)]
pub struct ChannelTransport {
    inbound: mpsc::Receiver<Record>,
    outbound: mpsc::Sender<String>,
}

impl ChannelTransport {
    /// True once the inbound side has hung up and everything it sent has
    /// been read.
    pub fn is_closed(&self) -> bool {
        self.inbound.is_closed() && self.inbound.is_empty()
    }
}

impl Transport for ChannelTransport {
    fn available(&self) -> bool {
        !self.inbound.is_empty()
    }

    fn read_line(&mut self) -> Result<Option<String>, TransportError> {
        match self.inbound.try_recv() {
            Ok(Ok(line)) => Ok(Some(line)),
            Ok(Err(err)) => Err(TransportError::Framing(err)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(TransportError::Closed),
        }
    }

    fn write_line(&mut self, line: &str) -> Result<(), TransportError> {
        self.outbound.try_send(line.to_owned()).map_err(|err| match err {
            TrySendError::Full(_) => TransportError::Full,
            TrySendError::Closed(_) => TransportError::Closed,
        })
    }
}

/// The far side of a [`ChannelTransport`].
#[derive(Debug)]
pub struct PeerEnd {
    /// Records delivered to the device
    pub to_device: mpsc::Sender<Record>,
    /// Records written by the device, without terminators
    pub from_device: mpsc::Receiver<String>,
}

/// Create a transport and its far side, each direction buffering up to
/// `capacity` records.
pub fn channel_pair(capacity: usize) -> (ChannelTransport, PeerEnd) {
    let (to_device, inbound) = mpsc::channel(capacity);
    let (outbound, from_device) = mpsc::channel(capacity);
    (ChannelTransport { inbound, outbound }, PeerEnd { to_device, from_device })
}

/// Handle to the socket tasks behind a connected [`ChannelTransport`].
#[derive(Debug)]
pub struct Link {
    reader: JoinHandle<()>,
    writer: JoinHandle<io::Result<()>>,
}

impl Link {
    /// Stop reading and wait for queued outbound records to be flushed.
    ///
    /// The writer drains until every [`ChannelTransport`] sender is gone, so
    /// drop the transport (or the device owning it) first.
    pub async fn shutdown(self) -> Result<(), DeviceError> {
        self.reader.abort();
        match self.writer.await {
            Ok(result) => Ok(result?),
            Err(err) if err.is_cancelled() => Ok(()),
            Err(err) => Err(DeviceError::Io(io::Error::other(err))),
        }
    }
}

/// Connect to a hub and spawn the socket tasks.
///
/// Inbound records longer than `max_record_len` are discarded by the framer
/// and surface as framing errors.
pub async fn connect(
    addr: &str,
    max_record_len: usize,
    capacity: usize,
) -> Result<(ChannelTransport, Link), DeviceError> {
    let stream = TcpStream::connect(addr)
        .await
        .map_err(|e| DeviceError::Connect(format!("{addr}: {e}")))?;
    stream.set_nodelay(true)?;

    let (read_half, write_half) = stream.into_split();
    let (transport, peer) = channel_pair(capacity);

    let framer = LineFramer::new(max_record_len);
    let reader = tokio::spawn(read_records(read_half, framer, peer.to_device));
    let writer = tokio::spawn(write_records(write_half, peer.from_device));

    Ok((transport, Link { reader, writer }))
}

async fn read_records(mut reader: OwnedReadHalf, mut framer: LineFramer, tx: mpsc::Sender<Record>) {
    let mut buf = BytesMut::with_capacity(4096);

    loop {
        buf.clear();
        match reader.read_buf(&mut buf).await {
            Ok(0) => {
                debug!("hub closed the stream");
                break;
            },
            Ok(_) => {
                for record in framer.push(&buf) {
                    if tx.send(record).await.is_err() {
                        return;
                    }
                }
            },
            Err(err) => {
                warn!(%err, "read from hub failed");
                break;
            },
        }
    }
}

async fn write_records(mut writer: OwnedWriteHalf, mut rx: mpsc::Receiver<String>) -> io::Result<()> {
    while let Some(line) = rx.recv().await {
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
    }

    writer.shutdown().await
}
