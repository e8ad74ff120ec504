use std::fmt;

use bytes::Bytes;

use super::pb::Envelope;

/// Reserved numeric names. Codes 0..=4 are requests served by the meta-server,
/// the rest are response statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum MessageName {
    Registration = 0,
    Unregistration = 1,
    Heartbeat = 2,
    WriteMetadata = 3,
    ReadMetadata = 4,
    Success = 5,
    InvalidNode = 6,
    UninitTopo = 7,
    ValidMetadata = 8,
    InvalidMetadata = 9,
}

impl MessageName {
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Decimal form used as the message name on the wire.
    pub fn wire_name(self) -> String {
        self.code().to_string()
    }

    pub fn from_wire_name(name: &str) -> Option<Self> {
        if !is_system_message(name) {
            return None;
        }
        name.parse::<i32>().ok().and_then(|code| Self::try_from(code).ok())
    }
}

impl TryFrom<i32> for MessageName {
    type Error = i32;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        let name = match code {
            0 => MessageName::Registration,
            1 => MessageName::Unregistration,
            2 => MessageName::Heartbeat,
            3 => MessageName::WriteMetadata,
            4 => MessageName::ReadMetadata,
            5 => MessageName::Success,
            6 => MessageName::InvalidNode,
            7 => MessageName::UninitTopo,
            8 => MessageName::ValidMetadata,
            9 => MessageName::InvalidMetadata,
            other => return Err(other),
        };
        Ok(name)
    }
}

impl fmt::Display for MessageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.code())
    }
}

/// True when `name` addresses a system message, i.e. it is a non-empty run of ASCII digits.
pub fn is_system_message(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub name: String,
    pub body: Bytes,
    /// URL of the sender, informational only.
    pub from: String,
}

impl Message {
    pub fn new<N: Into<String>, B: Into<Bytes>>(name: N, body: B) -> Self {
        Self {
            name: name.into(),
            body: body.into(),
            from: String::new(),
        }
    }

    pub fn system<B: Into<Bytes>>(name: MessageName, body: B) -> Self {
        Self::new(name.wire_name(), body)
    }

    pub fn with_from<S: Into<String>>(mut self, from: S) -> Self {
        self.from = from.into();
        self
    }

    pub fn system_name(&self) -> Option<MessageName> {
        MessageName::from_wire_name(&self.name)
    }

    /// Converts an optional reply into a frame; `None` becomes the empty "no reply" envelope.
    pub fn into_envelope(reply: Option<Message>) -> Envelope {
        match reply {
            Some(message) => Envelope {
                name: message.name,
                body: message.body,
                from: message.from,
            },
            None => Envelope::default(),
        }
    }

    pub fn from_envelope(envelope: Envelope) -> Option<Message> {
        if envelope.name.is_empty() {
            return None;
        }
        Some(Message {
            name: envelope.name,
            body: envelope.body,
            from: envelope.from,
        })
    }
}
