use common::{
    constants::{HEADER_LEN, PEER_REQUEST_ID},
    messages::{self, Message, MessageComponent, RequestCode, ResponseCode, Role},
};
use io::{read_framed, FramingError};
use std::{
    io::Write,
    net::TcpStream,
    time::Duration,
};

/// Largest frame accepted from a connection which has not claimed a role yet.
pub const MAX_CLAIM_LEN: usize = HEADER_LEN + 61;

/// Why a role claim was answered with `Error`.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ClaimRejection {
    #[error("the {0} slot is already occupied")]
    SlotOccupied(Role),
    #[error("{0:?} does not claim a role")]
    UnknownRole(RequestCode),
    #[error("role claim carried request id {0} instead of 255")]
    NotAPeerRequest(u8),
}

#[derive(Debug, thiserror::Error)]
pub enum NegotiationError {
    #[error(transparent)]
    Framing(#[from] FramingError),
    #[error(transparent)]
    Message(#[from] messages::Error),
    #[error("failed to write negotiation reply: {0}")]
    Reply(#[from] std::io::Error),
}

/// Decides whether `claim` may take a role, given which slots are currently occupied.
pub fn evaluate_claim<F>(claim: &Message, is_occupied: F) -> Result<Role, ClaimRejection>
where F: Fn(Role) -> bool {
    if !claim.is_peer_request() {
        return Err(ClaimRejection::NotAPeerRequest(claim.request_id));
    }

    let role = claim
        .request
        .claimed_role()
        .ok_or(ClaimRejection::UnknownRole(claim.request))?;

    if is_occupied(role) {
        Err(ClaimRejection::SlotOccupied(role))
    } else {
        Ok(role)
    }
}

/// Reads the first frame on a fresh connection, which may be at most [`MAX_CLAIM_LEN`] long. With
/// a timeout set, a peer which stays silent ends up as a framing error. A frame that was read but
/// does not decode is a [`NegotiationError::Message`].
pub fn read_claim(
    stream: &mut TcpStream,
    timeout: Option<Duration>,
) -> Result<Message, NegotiationError> {
    stream.set_read_timeout(timeout).map_err(FramingError::from)?;
    let frame = read_framed(stream, MAX_CLAIM_LEN)?;
    Ok(Message::from_bytes(&frame)?)
}

/// Answers a role claim. The connection goes back to blocking reads without a timeout.
pub fn reply(stream: &mut TcpStream, response: ResponseCode) -> Result<(), NegotiationError> {
    let bytes = Message::reply(PEER_REQUEST_ID, response).to_bytes(true)?;
    stream.write_all(&bytes)?;
    stream.set_read_timeout(None)?;
    Ok(())
}
