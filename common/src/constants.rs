/// Request id carried by a message the peer originated and expects us to answer.
pub const PEER_REQUEST_ID: u8 = 255;
/// Highest request id we hand out for our own requests.
pub const MAX_REQUEST_ID: u8 = 254;
/// Number of ids available to outbound requests, `0 ..= MAX_REQUEST_ID`.
pub const REQUEST_ID_SPACE: usize = MAX_REQUEST_ID as usize + 1;

/// request id + request code + response code
pub const HEADER_LEN: usize = 3;
pub const LENGTH_FIELD_WIDTH: usize = 4;

pub const DEFAULT_PORT: u16 = 58431;
pub const DEFAULT_MAX_FRAME_LEN: usize = 64 * 1024 * 1024;
