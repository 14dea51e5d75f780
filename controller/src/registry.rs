use crate::{
    handler::Handler,
    lock,
    negotiation::{self, evaluate_claim, NegotiationError},
    session::{Session, SessionError},
};
use common::{
    constants::{DEFAULT_MAX_FRAME_LEN, DEFAULT_PORT},
    messages::{RequestCode, ResponseCode, Role},
};
use io::DirectServer;
use log::{debug, info, warn};
use std::{
    collections::HashMap,
    io::Result as IoResult,
    net::{Ipv4Addr, Shutdown, SocketAddr, TcpStream},
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
        Mutex,
        Weak,
    },
    thread,
    time::Duration,
};

#[derive(Clone, Debug)]
pub struct ControllerConfig {
    pub addr: SocketAddr,
    /// How long a new connection may take to send its role claim. `None` waits forever.
    pub negotiation_timeout: Option<Duration>,
    pub max_frame_len: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            negotiation_timeout: Some(Duration::from_secs(5)),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("no {0} is connected")]
    NoPeer(Role),
    #[error("{0:?} is not addressed to a single role")]
    NotRoutable(RequestCode),
    #[error(transparent)]
    Session(#[from] SessionError),
}

#[derive(Default)]
struct Slots {
    camera: Option<Arc<Session>>,
    display: Option<Arc<Session>>,
}

impl Slots {
    fn get(&self, role: Role) -> &Option<Arc<Session>> {
        match role {
            Role::Camera => &self.camera,
            Role::Display => &self.display,
        }
    }

    fn get_mut(&mut self, role: Role) -> &mut Option<Arc<Session>> {
        match role {
            Role::Camera => &mut self.camera,
            Role::Display => &mut self.display,
        }
    }
}

/// Connections which have not sent their role claim yet, kept so shutdown can interrupt them.
#[derive(Default)]
struct Pending {
    next_id: u64,
    streams: HashMap<u64, TcpStream>,
}

struct Shared {
    config: ControllerConfig,
    handler: Arc<dyn Handler>,
    slots: Mutex<Slots>,
    pending: Mutex<Pending>,
    // Set before pending claims are interrupted and before the slots are emptied. Both are
    // checked under their lock, so nothing is added to either after shutdown has drained it
    closed: AtomicBool,
    next_session_id: AtomicU64,
}

impl Shared {
    fn track(&self, stream: &TcpStream) -> Option<u64> {
        let stream = match stream.try_clone() {
            Ok(stream) => stream,
            Err(error) => {
                warn!("Failed to track pending connection: {}", error);
                return None;
            }
        };

        let mut pending = lock(&self.pending);
        if self.closed.load(Ordering::SeqCst) {
            return None;
        }

        let id = pending.next_id;
        pending.next_id += 1;
        pending.streams.insert(id, stream);
        Some(id)
    }

    fn untrack(&self, id: u64) {
        lock(&self.pending).streams.remove(&id);
    }
}

/// Listens for peers, negotiates their roles and keeps at most one session per role.
///
/// Connections are accepted on a background thread and each one is negotiated on a thread of its
/// own, so a peer which never claims a role holds up nobody else. A connection must first claim a
/// role with a peer request carrying `Camera` or `Display`. The claim is answered `Ok` if that
/// slot is free and `Error` otherwise, after which a rejected connection is closed. An accepted connection
/// becomes a [`Session`] which occupies its slot until the connection ends.
pub struct Controller {
    shared: Arc<Shared>,
    server: Mutex<Option<DirectServer>>,
}

impl Controller {
    pub fn start<H>(config: ControllerConfig, handler: H) -> IoResult<Self>
    where H: Handler + 'static {
        Self::start_shared(config, Arc::new(handler))
    }

    pub fn start_shared(config: ControllerConfig, handler: Arc<dyn Handler>) -> IoResult<Self> {
        let shared = Arc::new(Shared {
            config,
            handler,
            slots: Mutex::new(Slots::default()),
            pending: Mutex::new(Pending::default()),
            closed: AtomicBool::new(false),
            next_session_id: AtomicU64::new(0),
        });

        let server = DirectServer::new(shared.config.addr, {
            let shared = Arc::clone(&shared);
            move |stream, addr| {
                let shared = Arc::clone(&shared);
                thread::spawn(move || negotiate(&shared, stream, addr));
            }
        })?;
        info!("Listening for peers on {}", server.local_addr());

        Ok(Self {
            shared,
            server: Mutex::new(Some(server)),
        })
    }

    /// The address actually bound, or `None` once shut down.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        lock(&self.server).as_ref().map(DirectServer::local_addr)
    }

    pub fn is_connected(&self, role: Role) -> bool {
        lock(&self.shared.slots).get(role).is_some()
    }

    pub fn session(&self, role: Role) -> Option<Arc<Session>> {
        lock(&self.shared.slots).get(role).clone()
    }

    /// Sends a request to the session holding `role` and returns the request id used.
    pub fn send_request(
        &self,
        role: Role,
        request: RequestCode,
        payload: Vec<u8>,
    ) -> Result<u8, ControllerError> {
        let session = self.session(role).ok_or(ControllerError::NoPeer(role))?;
        session.send_request(request, payload).map_err(Into::into)
    }

    /// Sends an action code to whichever role it targets.
    pub fn request(
        &self,
        request: RequestCode,
        payload: Vec<u8>,
    ) -> Result<(Role, u8), ControllerError> {
        let role = request
            .target()
            .ok_or(ControllerError::NotRoutable(request))?;
        let request_id = self.send_request(role, request, payload)?;
        Ok((role, request_id))
    }

    /// Sends `request` to every connected peer and returns the roles it reached.
    pub fn broadcast(&self, request: RequestCode) -> Vec<Role> {
        Role::ALL
            .into_iter()
            .filter(|&role| match self.send_request(role, request, Vec::new()) {
                Ok(_) => true,
                Err(ControllerError::NoPeer(_)) => false,
                Err(error) => {
                    warn!("Failed to send {:?} to {}: {}", request, role, error);
                    false
                }
            })
            .collect()
    }

    /// Stops accepting, drops connections still negotiating, tells every peer to quit and closes
    /// their connections. Calling this more than once has no further effect.
    pub fn shutdown(&self) {
        let server = lock(&self.server).take();
        if server.is_none() {
            return;
        }
        drop(server);

        self.shared.closed.store(true, Ordering::SeqCst);
        let pending = std::mem::take(&mut lock(&self.shared.pending).streams);
        if !pending.is_empty() {
            info!("Dropping {} connection(s) still negotiating", pending.len());
        }
        for stream in pending.into_values() {
            // Unblocks the negotiation thread reading the claim
            let _ = stream.shutdown(Shutdown::Both);
        }

        let reached = self.broadcast(RequestCode::Quit);
        if !reached.is_empty() {
            info!("Sent quit to {:?}", reached);
        }

        let sessions = {
            let mut slots = lock(&self.shared.slots);
            [slots.camera.take(), slots.display.take()]
        };
        for session in sessions.into_iter().flatten() {
            session.close();
        }
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn negotiate(shared: &Arc<Shared>, mut stream: TcpStream, addr: SocketAddr) {
    let pending_id = match shared.track(&stream) {
        Some(id) => id,
        None => {
            debug!("Dropping connection from {}", addr);
            return;
        }
    };
    let claim = negotiation::read_claim(&mut stream, shared.config.negotiation_timeout);
    shared.untrack(pending_id);

    let claim = match claim {
        Ok(claim) => claim,
        Err(NegotiationError::Message(error)) => {
            info!("Rejected {}: {}", addr, error);
            refuse(&mut stream, addr);
            return;
        }
        Err(error) => {
            warn!("Dropping connection from {} before negotiation: {}", addr, error);
            return;
        }
    };

    // The slot is checked and filled under one lock since several claims may race for it
    let decision = {
        let mut slots = lock(&shared.slots);
        if shared.closed.load(Ordering::SeqCst) {
            debug!("Dropping claim from {} during shutdown", addr);
            return;
        }

        evaluate_claim(&claim, |role| slots.get(role).is_some()).map(|role| {
            let id = shared.next_session_id.fetch_add(1, Ordering::Relaxed);
            let session = Session::new(id, role, addr, Arc::clone(&shared.handler), {
                let shared = Arc::downgrade(shared);
                move |role| release(&shared, role, id)
            });
            *slots.get_mut(role) = Some(Arc::clone(&session));
            session
        })
    };

    let session = match decision {
        Ok(session) => session,
        Err(rejection) => {
            info!("Rejected {}: {}", addr, rejection);
            refuse(&mut stream, addr);
            return;
        }
    };

    // The reply goes out before the session's reader exists
    if let Err(error) = negotiation::reply(&mut stream, ResponseCode::Ok) {
        warn!("Failed to accept {} as {}: {}", addr, session.role(), error);
        session.close();
        return;
    }

    info!("{} connected as {}", addr, session.role());
    session.start(stream, shared.config.max_frame_len);
}

fn refuse(stream: &mut TcpStream, addr: SocketAddr) {
    if let Err(error) = negotiation::reply(stream, ResponseCode::Error) {
        warn!("Failed to answer {}: {}", addr, error);
    }
}

// Frees the slot unless a newer session already took it over
fn release(shared: &Weak<Shared>, role: Role, id: u64) {
    let shared = match shared.upgrade() {
        Some(shared) => shared,
        None => return,
    };

    {
        let mut slots = lock(&shared.slots);
        let slot = slots.get_mut(role);
        if matches!(slot, Some(session) if session.id() == id) {
            *slot = None;
        }
    }
}
