use common::messages::{RequestCode, ResponseCode, Role};
use crossbeam_channel::Sender;
use log::debug;

/// A request the peer originated.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Request {
    pub request: RequestCode,
    pub payload: Vec<u8>,
}

/// The peer's answer to one of our requests, with the code we originally sent attached.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Response {
    pub request_id: u8,
    pub request: RequestCode,
    pub response: ResponseCode,
    pub payload: Vec<u8>,
}

/// The injection point between the protocol threads and whatever owns application state.
///
/// Both methods are called on a session's reader thread, in the order messages arrive on that
/// session. `handle_request` must return promptly since the peer is waiting on the reply and no
/// further frames are read until it returns.
pub trait Handler: Send + Sync {
    fn handle_request(&self, role: Role, request: &Request) -> ResponseCode;

    fn handle_response(&self, role: Role, response: Response);

    /// Called once when a session becomes active and once when it closes. Frames from the peer
    /// are only dispatched after the connect notification returns.
    fn handle_connection(&self, _role: Role, _connected: bool) {}
}

/// Answers a peer's `Quit` with `Ack` and rejects everything else.
pub fn default_request_policy(_role: Role, request: &Request) -> ResponseCode {
    match request.request {
        RequestCode::Quit => ResponseCode::Ack,
        _ => ResponseCode::Reject,
    }
}

pub type RequestPolicy = fn(Role, &Request) -> ResponseCode;

#[derive(Debug)]
pub enum InformEvent {
    Connected(Role),
    Disconnected(Role),
    RequestHandled {
        role: Role,
        request: Request,
        response: ResponseCode,
    },
    Response {
        role: Role,
        response: Response,
    },
}

/// Answers requests with a pure policy and forwards everything that happened to a channel, so
/// that the owner of UI state consumes events on its own thread.
pub struct QueueHandler {
    policy: RequestPolicy,
    sender: Sender<InformEvent>,
}

impl QueueHandler {
    pub fn new(sender: Sender<InformEvent>) -> Self {
        Self::with_policy(default_request_policy, sender)
    }

    pub fn with_policy(policy: RequestPolicy, sender: Sender<InformEvent>) -> Self {
        Self { policy, sender }
    }

    fn inform(&self, event: InformEvent) {
        if self.sender.send(event).is_err() {
            debug!("Inform receiver is gone, dropping event");
        }
    }
}

impl Handler for QueueHandler {
    fn handle_request(&self, role: Role, request: &Request) -> ResponseCode {
        let response = (self.policy)(role, request);
        self.inform(InformEvent::RequestHandled {
            role,
            request: request.clone(),
            response,
        });
        response
    }

    fn handle_response(&self, role: Role, response: Response) {
        self.inform(InformEvent::Response { role, response });
    }

    fn handle_connection(&self, role: Role, connected: bool) {
        self.inform(if connected {
            InformEvent::Connected(role)
        } else {
            InformEvent::Disconnected(role)
        });
    }
}
