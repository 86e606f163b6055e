use super::{
    error::OscError, message::OscMessage, packet::OscPacket, reader::OscReader,
    time_tag::TimeTag, writer::OscWriter,
};

pub const BUNDLE_PREFIX: &[u8; 8] = b"#bundle\0";

/// Prefix plus time tag
pub const BUNDLE_HEADER_SIZE: usize = 16;

/// A time-tagged collection of messages and nested bundles
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OscBundle {
    pub time_tag: TimeTag,
    pub contents: Vec<OscPacket>,
}

impl OscBundle {
    pub fn new(time_tag: TimeTag, contents: Vec<OscPacket>) -> Self {
        Self { time_tag, contents }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut writer = OscWriter::new();
        self.write(&mut writer);
        writer.to_bytes()
    }

    pub(crate) fn write(&self, writer: &mut OscWriter) {
        writer.write_bytes(BUNDLE_PREFIX);
        writer.write_u64(self.time_tag.to_ntp());
        for element in &self.contents {
            let encoded = element.encode();
            writer.write_i32(encoded.len() as i32);
            writer.write_bytes(&encoded);
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, OscError> {
        let mut reader = OscReader::new(bytes);
        let prefix = reader.read_bytes(BUNDLE_PREFIX.len())?;
        if prefix != BUNDLE_PREFIX {
            return Err(OscError::InvalidAddress {
                address: String::from_utf8_lossy(prefix).into_owned(),
            });
        }
        let time_tag = TimeTag::from_ntp(reader.read_u64()?);
        let mut contents = Vec::new();
        while !reader.is_empty() {
            let offset = reader.position();
            let length = reader.read_i32()?;
            if length <= 0 || length % 4 != 0 {
                return Err(OscError::InvalidElementLength { offset, length });
            }
            let element = reader.read_bytes(length as usize)?;
            contents.push(OscPacket::decode(element)?);
        }
        Ok(Self { time_tag, contents })
    }

    /// All messages in depth-first order, nested bundles flattened.
    pub fn messages(&self) -> Vec<&OscMessage> {
        let mut messages = Vec::new();
        for element in &self.contents {
            match element {
                OscPacket::Message(message) => messages.push(message),
                OscPacket::Bundle(bundle) => messages.extend(bundle.messages()),
            }
        }
        messages
    }
}
