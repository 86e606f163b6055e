/// Big-endian, 4-byte aligned writer for OSC datagrams
pub struct OscWriter {
    buffer: Vec<u8>,
}

impl OscWriter {
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    pub fn write_i32(&mut self, value: i32) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_f32(&mut self, value: f32) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_f64(&mut self, value: f64) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    /// Writes a null terminated string padded to a multiple of 4 bytes.
    pub fn write_str(&mut self, value: &str) {
        self.buffer.extend_from_slice(value.as_bytes());
        self.buffer.push(0);
        self.pad();
    }

    /// Writes a length-prefixed blob padded to a multiple of 4 bytes.
    pub fn write_blob(&mut self, value: &[u8]) {
        self.write_i32(value.len() as i32);
        self.buffer.extend_from_slice(value);
        self.pad();
    }

    pub fn write_bytes(&mut self, value: &[u8]) {
        self.buffer.extend_from_slice(value);
    }

    pub fn to_bytes(self) -> Vec<u8> {
        self.buffer
    }

    fn pad(&mut self) {
        while self.buffer.len() % 4 != 0 {
            self.buffer.push(0);
        }
    }
}

impl Default for OscWriter {
    fn default() -> Self {
        Self::new()
    }
}

pub fn padded_len(len: usize) -> usize {
    (len + 3) & !3
}
