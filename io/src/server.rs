use common::sync::JoinOnDrop;
use log::warn;
use std::{
    io::{self, ErrorKind},
    net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Accepts connections on a background thread until dropped.
///
/// The listener is polled rather than blocked on, so dropping the server stops the accept loop
/// within one poll interval without needing another thread to close the socket.
pub struct DirectServer {
    running: Arc<AtomicBool>,
    local_addr: SocketAddr,
    _handle: JoinOnDrop<()>,
}

impl DirectServer {
    /// Binds to `addr` and calls `on_incoming` on the accept thread for every connection. The
    /// accept loop does not continue until `on_incoming` returns.
    pub fn new<A, F>(addr: A, on_incoming: F) -> Result<Self, io::Error>
    where
        A: ToSocketAddrs,
        F: FnMut(TcpStream, SocketAddr) + Send + 'static,
    {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        let running = Arc::new(AtomicBool::new(true));
        let handle = thread::spawn({
            let running = Arc::clone(&running);
            move || listen(listener, running, on_incoming)
        });

        Ok(Self {
            running,
            local_addr,
            _handle: JoinOnDrop::new(handle),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }
}

impl Drop for DirectServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn listen<F>(listener: TcpListener, running: Arc<AtomicBool>, mut on_incoming: F)
where F: FnMut(TcpStream, SocketAddr) {
    while running.load(Ordering::Relaxed) {
        match listener.accept() {
            Ok((stream, addr)) => {
                // On some platforms a stream accepted from a non-blocking listener is itself
                // non-blocking, and the rest of the stack expects blocking reads
                if let Err(error) = stream.set_nonblocking(false) {
                    warn!("Dropping connection from {}: {}", addr, error);
                    continue;
                }

                on_incoming(stream, addr);
            }
            Err(error) if error.kind() == ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_POLL_INTERVAL);
            }
            Err(error) => {
                warn!("Failed to accept connection: {}", error);
                thread::sleep(ACCEPT_POLL_INTERVAL);
            }
        }
    }
}
