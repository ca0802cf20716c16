// Messaging operations layered on the authenticated HTTP client

mod receiver;
mod sender;

pub use receiver::MessageReceiver;
pub use sender::MessageSender;
