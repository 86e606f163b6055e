use super::{
    bundle::{OscBundle, BUNDLE_PREFIX},
    error::OscError,
    message::OscMessage,
};

/// One datagram: either a message or a bundle
#[derive(Debug, Clone, PartialEq)]
pub enum OscPacket {
    Message(OscMessage),
    Bundle(OscBundle),
}

impl OscPacket {
    pub fn encode(&self) -> Vec<u8> {
        match self {
            OscPacket::Message(message) => message.encode(),
            OscPacket::Bundle(bundle) => bundle.encode(),
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, OscError> {
        if bytes.is_empty() {
            return Err(OscError::EmptyPacket);
        }
        if bytes.starts_with(BUNDLE_PREFIX) {
            Ok(OscPacket::Bundle(OscBundle::decode(bytes)?))
        } else {
            Ok(OscPacket::Message(OscMessage::decode(bytes)?))
        }
    }

    /// Flattens the packet into its messages, in order.
    pub fn into_messages(self) -> Vec<OscMessage> {
        match self {
            OscPacket::Message(message) => vec![message],
            OscPacket::Bundle(bundle) => bundle
                .contents
                .into_iter()
                .flat_map(OscPacket::into_messages)
                .collect(),
        }
    }
}

impl From<OscMessage> for OscPacket {
    fn from(message: OscMessage) -> Self {
        OscPacket::Message(message)
    }
}

impl From<OscBundle> for OscPacket {
    fn from(bundle: OscBundle) -> Self {
        OscPacket::Bundle(bundle)
    }
}
