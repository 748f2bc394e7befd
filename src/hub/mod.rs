pub mod engine;
pub mod message;

pub use engine::{Hub, HubHandle, Registration, SessionId};
pub use message::Payload;

#[cfg(test)]
mod tests;
