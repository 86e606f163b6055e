use std::fmt::Write;

/// Renders a datagram as offset / hex / ascii rows of 16 bytes.
pub fn format_datagram(bytes: &[u8]) -> String {
    let mut output = String::new();
    for (row, chunk) in bytes.chunks(16).enumerate() {
        let _ = write!(output, "{:>4}   ", row * 16);
        for column in 0..16 {
            match chunk.get(column) {
                Some(byte) => {
                    let _ = write!(output, "{:02x} ", byte);
                }
                None => output.push_str("   "),
            }
        }
        output.push_str("  |");
        for byte in chunk {
            if byte.is_ascii_graphic() || *byte == b' ' {
                output.push(char::from(*byte));
            } else {
                output.push('.');
            }
        }
        output.push_str("|\n");
    }
    output
}
