use std::fmt;

use super::{
    argument::OscArgument, error::OscError, reader::OscReader, writer::OscWriter,
};

/// An OSC message: an address pattern plus an ordered list of arguments
#[derive(Debug, Clone, PartialEq)]
pub struct OscMessage {
    pub address: String,
    pub arguments: Vec<OscArgument>,
}

impl OscMessage {
    pub fn new(address: impl Into<String>, arguments: Vec<OscArgument>) -> Self {
        Self {
            address: address.into(),
            arguments,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn arguments(&self) -> &[OscArgument] {
        &self.arguments
    }

    pub fn type_tags(&self) -> String {
        let mut tags = String::from(",");
        for argument in &self.arguments {
            argument.push_type_tags(&mut tags);
        }
        tags
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut writer = OscWriter::new();
        self.write(&mut writer);
        writer.to_bytes()
    }

    pub(crate) fn write(&self, writer: &mut OscWriter) {
        writer.write_str(&self.address);
        writer.write_str(&self.type_tags());
        for argument in &self.arguments {
            write_argument(writer, argument);
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, OscError> {
        if bytes.is_empty() {
            return Err(OscError::EmptyPacket);
        }
        let mut reader = OscReader::new(bytes);
        let address = reader.read_str()?;
        if !address.starts_with('/') {
            return Err(OscError::InvalidAddress { address });
        }
        if reader.is_empty() {
            // Type tag string omitted entirely
            return Ok(Self::new(address, Vec::new()));
        }
        let tags = reader.read_str()?;
        let Some(tag_chars) = tags.strip_prefix(',') else {
            return Err(OscError::InvalidTypeTags { tags });
        };
        let tag_chars: Vec<char> = tag_chars.chars().collect();
        let mut index = 0;
        let arguments = read_arguments(&mut reader, &tag_chars, &mut index, &tags, false)?;
        Ok(Self::new(address, arguments))
    }
}

fn write_argument(writer: &mut OscWriter, argument: &OscArgument) {
    match argument {
        OscArgument::Int(value) => writer.write_i32(*value),
        OscArgument::Float(value) => writer.write_f32(*value),
        OscArgument::Double(value) => writer.write_f64(*value),
        OscArgument::String(value) => writer.write_str(value),
        OscArgument::Blob(value) => writer.write_blob(value),
        OscArgument::True | OscArgument::False | OscArgument::Nil => {}
        OscArgument::Array(items) => {
            for item in items {
                write_argument(writer, item);
            }
        }
    }
}

fn read_arguments(
    reader: &mut OscReader,
    tag_chars: &[char],
    index: &mut usize,
    tags: &str,
    in_array: bool,
) -> Result<Vec<OscArgument>, OscError> {
    let mut arguments = Vec::new();
    while *index < tag_chars.len() {
        let tag = tag_chars[*index];
        *index += 1;
        let argument = match tag {
            'i' => OscArgument::Int(reader.read_i32()?),
            'f' => OscArgument::Float(reader.read_f32()?),
            'd' => OscArgument::Double(reader.read_f64()?),
            's' | 'S' => OscArgument::String(reader.read_str()?),
            'b' => OscArgument::Blob(reader.read_blob()?),
            'T' => OscArgument::True,
            'F' => OscArgument::False,
            'N' => OscArgument::Nil,
            '[' => OscArgument::Array(read_arguments(reader, tag_chars, index, tags, true)?),
            ']' => {
                if in_array {
                    return Ok(arguments);
                }
                return Err(OscError::UnbalancedArray {
                    tags: tags.to_string(),
                });
            }
            other => return Err(OscError::UnsupportedTypeTag { tag: other }),
        };
        arguments.push(argument);
    }
    if in_array {
        return Err(OscError::UnbalancedArray {
            tags: tags.to_string(),
        });
    }
    Ok(arguments)
}

impl fmt::Display for OscMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OscMessage('{}'", self.address)?;
        for argument in &self.arguments {
            write!(f, ", {}", argument)?;
        }
        write!(f, ")")
    }
}
