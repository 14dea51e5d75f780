use super::{Error, MessageComponent, RequestCode, ResponseCode};
use crate::constants::{HEADER_LEN, PEER_REQUEST_ID};
use std::io::Cursor;

/// The unit sent over the wire:
///
/// ```text
/// [u8 request id][u8 request code][u8 response code][payload ...]
/// ```
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Message {
    pub request_id: u8,
    pub request: RequestCode,
    pub response: ResponseCode,
    pub payload: Vec<u8>,
}

impl Message {
    /// A request sent by the side that expects the other to answer it, correlated by `request_id`.
    pub fn request(request_id: u8, request: RequestCode, payload: Vec<u8>) -> Self {
        Self {
            request_id,
            request,
            response: ResponseCode::None,
            payload,
        }
    }

    /// A request carrying the reserved id, as a peer sends it.
    pub fn peer_request(request: RequestCode, payload: Vec<u8>) -> Self {
        Self::request(PEER_REQUEST_ID, request, payload)
    }

    /// A response-only message answering the request with the given id.
    pub fn reply(request_id: u8, response: ResponseCode) -> Self {
        Self {
            request_id,
            request: RequestCode::None,
            response,
            payload: Vec::new(),
        }
    }

    pub fn is_peer_request(&self) -> bool {
        self.request_id == PEER_REQUEST_ID
    }

    pub fn into_inbound(self) -> Inbound {
        if self.is_peer_request() {
            Inbound::Request {
                request: self.request,
                payload: self.payload,
            }
        } else {
            Inbound::Response {
                request_id: self.request_id,
                response: self.response,
                payload: self.payload,
            }
        }
    }
}

impl MessageComponent for Message {
    fn read(cursor: &mut Cursor<&[u8]>) -> Result<Self, Error> {
        let len = cursor.get_ref().len().saturating_sub(cursor.position() as usize);
        if len < HEADER_LEN {
            return Err(Error::MalformedMessage { len });
        }

        Ok(Self {
            request_id: u8::read(cursor)?,
            request: RequestCode::read(cursor)?,
            response: ResponseCode::read(cursor)?,
            payload: Vec::<u8>::read(cursor)?,
        })
    }

    fn write(&self, cursor: &mut Cursor<Vec<u8>>) -> Result<(), Error> {
        self.request_id.write(cursor)?;
        self.request.write(cursor)?;
        self.response.write(cursor)?;
        self.payload.write(cursor)
    }
}

/// A decoded message from the peer's point of view: either something it wants from us, or its
/// answer to something we asked.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Inbound {
    Request {
        request: RequestCode,
        payload: Vec<u8>,
    },
    Response {
        request_id: u8,
        response: ResponseCode,
        payload: Vec<u8>,
    },
}
