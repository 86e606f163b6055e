use super::error::OscError;
use super::writer::padded_len;

/// Cursor over a borrowed OSC datagram
pub struct OscReader<'a> {
    bytes: &'a [u8],
    cursor: usize,
}

impl<'a> OscReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, cursor: 0 }
    }

    pub fn position(&self) -> usize {
        self.cursor
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn read_i32(&mut self) -> Result<i32, OscError> {
        let bytes = self.take(4)?;
        Ok(i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_u64(&mut self) -> Result<u64, OscError> {
        let bytes = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(u64::from_be_bytes(raw))
    }

    pub fn read_f32(&mut self) -> Result<f32, OscError> {
        let bytes = self.take(4)?;
        Ok(f32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_f64(&mut self) -> Result<f64, OscError> {
        let bytes = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(f64::from_be_bytes(raw))
    }

    pub fn read_str(&mut self) -> Result<String, OscError> {
        let start = self.cursor;
        let rest = &self.bytes[start..];
        let Some(terminator) = rest.iter().position(|byte| *byte == 0) else {
            return Err(OscError::UnterminatedString { offset: start });
        };
        let value = std::str::from_utf8(&rest[..terminator])
            .map_err(|_| OscError::InvalidUtf8 { offset: start })?
            .to_string();
        let consumed = padded_len(terminator + 1).min(rest.len());
        self.cursor += consumed;
        Ok(value)
    }

    pub fn read_blob(&mut self) -> Result<Vec<u8>, OscError> {
        let offset = self.cursor;
        let length = self.read_i32()?;
        if length < 0 {
            return Err(OscError::InvalidElementLength { offset, length });
        }
        let length = length as usize;
        let data = self.take(length)?.to_vec();
        let padding = padded_len(length) - length;
        self.cursor = (self.cursor + padding).min(self.bytes.len());
        Ok(data)
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], OscError> {
        self.take(len)
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], OscError> {
        if self.remaining() < len {
            return Err(OscError::Truncated {
                offset: self.cursor,
                needed: len,
                available: self.remaining(),
            });
        }
        let slice = &self.bytes[self.cursor..self.cursor + len];
        self.cursor += len;
        Ok(slice)
    }
}
