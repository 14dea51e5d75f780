#![allow(dead_code)]

use common::messages::{Message, MessageComponent, RequestCode, ResponseCode, Role};
use controller::{Controller, ControllerConfig, InformEvent, QueueHandler, RequestPolicy};
use crossbeam_channel::{unbounded, Receiver};
use io::{read_framed, FramingError};
use std::{
    io::{ErrorKind, Write},
    net::{SocketAddr, TcpStream},
    time::Duration,
};

pub const TIMEOUT: Duration = Duration::from_secs(5);
pub const QUIET: Duration = Duration::from_millis(200);
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

pub fn config() -> ControllerConfig {
    ControllerConfig {
        addr: "127.0.0.1:0".parse().unwrap(),
        negotiation_timeout: Some(Duration::from_secs(2)),
        max_frame_len: MAX_FRAME_LEN,
    }
}

pub struct Harness {
    pub controller: Controller,
    pub events: Receiver<InformEvent>,
    pub addr: SocketAddr,
}

impl Harness {
    pub fn start() -> Self {
        Self::start_with(config(), None)
    }

    pub fn start_with(config: ControllerConfig, policy: Option<RequestPolicy>) -> Self {
        let (tx, rx) = unbounded();
        let handler = match policy {
            Some(policy) => QueueHandler::with_policy(policy, tx),
            None => QueueHandler::new(tx),
        };
        let controller = Controller::start(config, handler).expect("failed to start controller");
        let addr = controller.local_addr().expect("controller is not listening");

        Self {
            controller,
            events: rx,
            addr,
        }
    }

    pub fn next_event(&self) -> InformEvent {
        self.events
            .recv_timeout(TIMEOUT)
            .expect("no event from the controller")
    }

    pub fn assert_quiet(&self) {
        if let Ok(event) = self.events.recv_timeout(QUIET) {
            panic!("unexpected event {:?}", event);
        }
    }

    /// Connects a peer, claims `role` and waits until the controller reports it connected.
    pub fn connect(&self, role: Role) -> Peer {
        let (peer, response) = Peer::claim(self.addr, role.claim_code());
        assert_eq!(response, ResponseCode::Ok);
        match self.next_event() {
            InformEvent::Connected(connected) => assert_eq!(connected, role),
            other => panic!("expected {} to connect, got {:?}", role, other),
        }
        peer
    }

    pub fn expect_disconnect(&self, role: Role) {
        match self.next_event() {
            InformEvent::Disconnected(disconnected) => assert_eq!(disconnected, role),
            other => panic!("expected {} to disconnect, got {:?}", role, other),
        }
    }
}

pub struct Peer {
    pub stream: TcpStream,
}

impl Peer {
    pub fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).expect("failed to connect");
        stream.set_read_timeout(Some(TIMEOUT)).unwrap();
        Self { stream }
    }

    /// Sends a role claim and returns the controller's answer.
    pub fn claim(addr: SocketAddr, request: RequestCode) -> (Self, ResponseCode) {
        let mut peer = Self::connect(addr);
        peer.send(&Message::peer_request(request, Vec::new()));

        let reply = peer.recv();
        assert_eq!(reply.request_id, 255);
        assert_eq!(reply.request, RequestCode::None);
        assert!(reply.payload.is_empty());
        (peer, reply.response)
    }

    pub fn send(&mut self, message: &Message) {
        self.send_raw(&message.to_bytes(true).unwrap());
    }

    pub fn send_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).expect("failed to write");
    }

    pub fn recv(&mut self) -> Message {
        let frame = read_framed(&mut self.stream, MAX_FRAME_LEN).expect("no frame from the controller");
        Message::from_bytes(&frame).unwrap()
    }

    pub fn expect_closed(&mut self) {
        match read_framed(&mut self.stream, MAX_FRAME_LEN) {
            Err(FramingError::ConnectionClosed) => {}
            Err(FramingError::Io(error)) if error.kind() == ErrorKind::ConnectionReset => {}
            other => panic!("expected the connection to close, got {:?}", other),
        }
    }
}
