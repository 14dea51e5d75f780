use crate::{
    correlation::{CorrelationTable, RequestContext},
    handler::{Handler, Request, Response},
    lock,
};
use common::{
    constants::PEER_REQUEST_ID,
    messages::{self, Inbound, Message, MessageComponent, RequestCode, ResponseCode, Role},
};
use crossbeam_channel::bounded;
use io::{SendError, TcpHandle, TransportResponse, TransportResult};
use log::{debug, info, warn};
use std::{
    net::{SocketAddr, TcpStream},
    ops::ControlFlow,
    sync::{Arc, Mutex},
};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum State {
    Negotiating,
    Active,
    Closed,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("all 255 request ids are outstanding")]
    IdSpaceExhausted,
    #[error("session is {0:?}")]
    NotActive(State),
    #[error("response for request {0}, which is not outstanding")]
    UnexpectedResponse(u8),
    #[error(transparent)]
    Message(#[from] messages::Error),
    #[error(transparent)]
    Send(#[from] SendError),
}

type CloseCallback = Box<dyn FnOnce(Role) + Send>;

/// One accepted connection which has claimed a role.
///
/// The session moves `Negotiating -> Active -> Closed`. It is `Active` from the moment its reader
/// thread starts until the connection ends. Closing abandons every outstanding request, frees the
/// role slot and reports the disconnect to the handler, each exactly once.
pub struct Session {
    id: u64,
    role: Role,
    addr: SocketAddr,
    handler: Arc<dyn Handler>,
    state: Mutex<State>,
    table: Mutex<CorrelationTable>,
    handle: Mutex<Option<TcpHandle>>,
    on_close: Mutex<Option<CloseCallback>>,
}

impl Session {
    pub(crate) fn new<F>(
        id: u64,
        role: Role,
        addr: SocketAddr,
        handler: Arc<dyn Handler>,
        on_close: F,
    ) -> Arc<Self>
    where
        F: FnOnce(Role) + Send + 'static,
    {
        Arc::new(Self {
            id,
            role,
            addr,
            handler,
            state: Mutex::new(State::Negotiating),
            table: Mutex::new(CorrelationTable::new()),
            handle: Mutex::new(None),
            on_close: Mutex::new(Some(Box::new(on_close))),
        })
    }

    /// Starts the reader and writer threads over `stream` and reports the role as connected.
    ///
    /// The handler hears about the connection before the first frame is dispatched, and may
    /// already send requests to this session from [`Handler::handle_connection`].
    pub(crate) fn start(self: &Arc<Self>, stream: TcpStream, max_frame_len: usize) {
        // Holds the reader back until the connect notification has been delivered
        let (gate_tx, gate_rx) = bounded::<()>(0);

        {
            let mut handle = lock(&self.handle);
            {
                let mut state = lock(&self.state);
                if *state != State::Negotiating {
                    return;
                }
                *state = State::Active;
            }

            let session = Arc::clone(self);
            let mut gate = Some(gate_rx);
            *handle = Some(TcpHandle::new_from(stream, max_frame_len, move |result| {
                if let Some(gate) = gate.take() {
                    // Disconnects once `start` is done
                    let _ = gate.recv();
                }
                session.on_transport(result)
            }));
        }

        self.handler.handle_connection(self.role, true);
        drop(gate_tx);
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> State {
        *lock(&self.state)
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Number of requests sent that have not been answered yet.
    pub fn outstanding(&self) -> usize {
        lock(&self.table).len()
    }

    /// Sends a request to the peer and returns the id it was sent under. The peer's answer is
    /// delivered to [`Handler::handle_response`].
    pub fn send_request(&self, request: RequestCode, payload: Vec<u8>) -> Result<u8, SessionError> {
        let state = self.state();
        if state != State::Active {
            return Err(SessionError::NotActive(state));
        }

        let request_id = lock(&self.table)
            .put(RequestContext {
                request,
                payload: payload.clone(),
            })
            .ok_or(SessionError::IdSpaceExhausted)?;

        let message = Message::request(request_id, request, payload);
        if let Err(error) = self.write(&message) {
            lock(&self.table).take(request_id);
            return Err(error);
        }

        debug!("Sent {:?} to {} as request {}", request, self.role, request_id);
        Ok(request_id)
    }

    /// Closes the connection. Only the first call has any effect.
    pub fn close(&self) {
        let previous = {
            let mut state = lock(&self.state);
            if *state == State::Closed {
                return;
            }
            std::mem::replace(&mut *state, State::Closed)
        };

        let abandoned = lock(&self.table).clear();
        // Dropped outside the lock since dropping waits for the reader thread, which may itself
        // be waiting on the lock to send a reply
        let handle = lock(&self.handle).take();
        drop(handle);

        info!(
            "{} session with {} closed, {} outstanding request(s) abandoned",
            self.role, self.addr, abandoned
        );

        let on_close = lock(&self.on_close).take();
        if let Some(on_close) = on_close {
            on_close(self.role);
        }

        if previous == State::Active {
            self.handler.handle_connection(self.role, false);
        }
    }

    fn write(&self, message: &Message) -> Result<(), SessionError> {
        let bytes = message.to_bytes(true)?;
        match &*lock(&self.handle) {
            Some(handle) => handle.send(bytes).map_err(Into::into),
            None => Err(SessionError::NotActive(self.state())),
        }
    }

    fn on_transport(&self, result: TransportResult) -> ControlFlow<()> {
        match result {
            Ok(TransportResponse::Message(frame)) => match self.dispatch(&frame) {
                Ok(()) => ControlFlow::Continue(()),
                Err(SessionError::UnexpectedResponse(request_id)) => {
                    warn!(
                        "Dropping response from {} for unknown request {}",
                        self.role, request_id
                    );
                    ControlFlow::Continue(())
                }
                Err(error) => {
                    warn!("Closing {} session: {}", self.role, error);
                    self.close();
                    ControlFlow::Break(())
                }
            },
            Ok(TransportResponse::Shutdown(_)) => {
                info!("{} disconnected", self.role);
                self.close();
                ControlFlow::Break(())
            }
            Err(error) => {
                warn!("Closing {} session: {}", self.role, error);
                self.close();
                ControlFlow::Break(())
            }
        }
    }

    /// Decodes one frame and routes it to the request or response side of the handler.
    fn dispatch(&self, frame: &[u8]) -> Result<(), SessionError> {
        match Message::from_bytes(frame)?.into_inbound() {
            Inbound::Request { request, payload } => {
                let request = Request { request, payload };
                let response = if request.request.is_known() && request.request != RequestCode::None
                {
                    self.handler.handle_request(self.role, &request)
                } else {
                    ResponseCode::Reject
                };

                debug!(
                    "Answering {:?} from {} with {:?}",
                    request.request, self.role, response
                );
                self.write(&Message::reply(PEER_REQUEST_ID, response))
            }
            Inbound::Response {
                request_id,
                response,
                payload,
            } => {
                let context = lock(&self.table)
                    .take(request_id)
                    .ok_or(SessionError::UnexpectedResponse(request_id))?;

                debug!(
                    "{} answered request {} ({:?}) with {:?}",
                    self.role, request_id, context.request, response
                );
                self.handler.handle_response(self.role, Response {
                    request_id,
                    request: context.request,
                    response,
                    payload,
                });
                Ok(())
            }
        }
    }
}
