//! Live viewers and the messages pushed to them.

pub mod messages;
mod registry;

pub use messages::{msg_types, ClientMessage, ServerMessage};
pub use registry::{ClientRegistry, Delivery, SendError, WebsocketClient};
