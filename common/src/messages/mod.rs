mod codes;
mod message;
mod message_component;

pub use codes::*;
pub use message::*;
pub use message_component::*;
