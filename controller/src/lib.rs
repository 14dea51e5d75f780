#![deny(rust_2018_idioms)]

pub mod correlation;
pub mod handler;
pub mod negotiation;
pub mod registry;
pub mod session;

pub use common::messages::{RequestCode, ResponseCode, Role};
pub use handler::{
    default_request_policy,
    Handler,
    InformEvent,
    QueueHandler,
    Request,
    RequestPolicy,
    Response,
};
pub use negotiation::ClaimRejection;
pub use registry::{Controller, ControllerConfig, ControllerError};
pub use session::{Session, SessionError, State};

use std::sync::{Mutex, MutexGuard, PoisonError};

// Every critical section in this crate leaves its data consistent, so a panic elsewhere while
// holding a lock doesn't invalidate what's behind it
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
