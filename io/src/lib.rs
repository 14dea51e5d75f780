mod framing;
mod server;
mod tcp;

pub use framing::*;
pub use server::*;
pub use tcp::*;
