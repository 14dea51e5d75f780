use common::{
    constants::{MAX_REQUEST_ID, REQUEST_ID_SPACE},
    messages::RequestCode,
};
use std::collections::HashMap;

/// What we asked for, kept until the peer answers.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct RequestContext {
    pub request: RequestCode,
    pub payload: Vec<u8>,
}

/// Outstanding outbound requests of one session, keyed by request id.
///
/// Ids are handed out in increasing order starting at 0 and wrap from `MAX_REQUEST_ID` back to 0,
/// skipping any id still outstanding. At most one entry exists per id.
#[derive(Debug)]
pub struct CorrelationTable {
    next_id: u8,
    outstanding: HashMap<u8, RequestContext>,
}

impl Default for CorrelationTable {
    fn default() -> Self {
        Self::new()
    }
}

impl CorrelationTable {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            outstanding: HashMap::new(),
        }
    }

    /// Records `context` under a free id and returns that id, or `None` if every id is
    /// outstanding.
    pub fn put(&mut self, context: RequestContext) -> Option<u8> {
        if self.outstanding.len() >= REQUEST_ID_SPACE {
            return None;
        }

        loop {
            let id = self.next_id;
            self.next_id = if id == MAX_REQUEST_ID { 0 } else { id + 1 };

            if !self.outstanding.contains_key(&id) {
                self.outstanding.insert(id, context);
                return Some(id);
            }
        }
    }

    pub fn take(&mut self, id: u8) -> Option<RequestContext> {
        self.outstanding.remove(&id)
    }

    pub fn is_outstanding(&self, id: u8) -> bool {
        self.outstanding.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.outstanding.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outstanding.is_empty()
    }

    /// Abandons every outstanding request, returning how many there were.
    pub fn clear(&mut self) -> usize {
        let abandoned = self.outstanding.len();
        self.outstanding.clear();
        abandoned
    }
}
