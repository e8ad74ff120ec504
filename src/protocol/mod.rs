//! Wire protocol of the topology service
//!
//! Every frame carries an [`Envelope`]: a message name plus an opaque body.
//! Names made only of digits are system messages (see [`MessageName`]);
//! any other name addresses a user registered handler.

pub mod message;
pub mod pb;

pub use message::{is_system_message, Message, MessageName};
pub use pb::{
    Envelope, HeartbeatMessage, MetadataMessage, RegistrationMessage, RegistrationRespMessage,
    UnregistrationMessage,
};
