use super::{read_framed, FramingError};
use common::sync::JoinOnDrop;
use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, warn};
use std::{
    fmt::{self, Display, Formatter},
    io::Write,
    net::{Shutdown, TcpStream},
    ops::ControlFlow,
    sync::Arc,
    thread,
};

pub enum TransportResponse {
    Message(Vec<u8>),
    Shutdown(Source),
}

#[derive(Debug)]
pub struct TransportError {
    pub source: Source,
    pub error: FramingError,
}

impl Display for TransportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "fatal error in {:?}: {}", self.source, self.error)
    }
}

impl std::error::Error for TransportError {}

pub type TransportResult = Result<TransportResponse, TransportError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Read,
    Write,
}

#[derive(Debug)]
pub struct SendError(pub Source);

impl Display for SendError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "send error in {:?}", self.0)
    }
}

impl std::error::Error for SendError {}

/// Owns one connected stream with a dedicated reader thread and a dedicated writer thread.
///
/// Every buffer passed to [`send`](TcpHandle::send) is written whole by the writer thread, so
/// concurrent senders never interleave partial frames. The reader thread hands each frame to the
/// callback given at construction, and reports the end of the stream to it exactly once, either
/// as [`TransportResponse::Shutdown`] or as an error.
///
/// Dropping the handle stops the reader, lets the writer finish what is already queued and then
/// shuts the stream down. [`close`](TcpHandle::close) stops both sides immediately.
pub struct TcpHandle {
    stream: Arc<TcpStream>,
    // Must be dropped before the handles so the writer thread sees the channel close
    write: Sender<Vec<u8>>,
    _handles: Box<(JoinOnDrop<()>, JoinOnDrop<()>)>,
}

impl TcpHandle {
    pub fn new_from<F>(stream: TcpStream, max_frame_len: usize, on_read: F) -> Self
    where F: FnMut(TransportResult) -> ControlFlow<()> + Send + 'static {
        let stream = Arc::new(stream);
        let (write_tx, write_rx) = unbounded();

        let read_handle = thread::spawn({
            let stream = Arc::clone(&stream);
            move || read_reliable(stream, max_frame_len, on_read)
        });

        let write_handle = thread::spawn({
            let stream = Arc::clone(&stream);
            move || write_reliable(stream, write_rx)
        });

        Self {
            stream,
            write: write_tx,
            _handles: Box::new((JoinOnDrop::new(read_handle), JoinOnDrop::new(write_handle))),
        }
    }

    /// Queues an already framed message for the writer thread.
    pub fn send(&self, message: Vec<u8>) -> Result<(), SendError> {
        self.write
            .send(message)
            .map_err(|_| SendError(Source::Write))
    }

    /// Shuts the stream down in both directions, which unblocks the reader thread.
    pub fn close(&self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

impl Drop for TcpHandle {
    fn drop(&mut self) {
        // Unblocks the reader. The writer exits once `write` is dropped and the queue is drained
        let _ = self.stream.shutdown(Shutdown::Read);
    }
}

fn read_reliable<F>(stream: Arc<TcpStream>, max_frame_len: usize, mut on_read: F)
where F: FnMut(TransportResult) -> ControlFlow<()> {
    loop {
        let result = match read_framed(&mut &*stream, max_frame_len) {
            Ok(message) => Ok(TransportResponse::Message(message)),
            // Either the peer closed or the handle is being dropped, in which case the writer
            // still has to drain its queue
            Err(FramingError::ConnectionClosed) => {
                let _ = on_read(Ok(TransportResponse::Shutdown(Source::Read)));
                return;
            }
            Err(error) => Err(TransportError {
                source: Source::Read,
                error,
            }),
        };

        let is_err = result.is_err();
        if on_read(result).is_break() || is_err {
            break;
        }
    }

    let _ = stream.shutdown(Shutdown::Both);
}

fn write_reliable(stream: Arc<TcpStream>, receiver: Receiver<Vec<u8>>) {
    while let Ok(message) = receiver.recv() {
        if let Err(error) = (&*stream).write_all(&message) {
            warn!("Write to {:?} failed: {}", stream.peer_addr().ok(), error);
            // The reader notices the shutdown and reports the disconnect
            let _ = stream.shutdown(Shutdown::Both);
            return;
        }
    }

    debug!("Writer for {:?} finished", stream.peer_addr().ok());
    let _ = stream.shutdown(Shutdown::Both);
}
