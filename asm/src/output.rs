use arch::image::{EXPORT_TABLE_OFFSET, MAGIC};

/// Image under construction. Starts as an empty header with a zero export
/// count.
#[derive(Debug, Clone)]
pub struct Output {
    bytes: Vec<u8>,
}

impl Default for Output {
    fn default() -> Self {
        Output {
            bytes: vec![0; EXPORT_TABLE_OFFSET],
        }
    }
}

/// Whether `value` is representable in `width` bytes, signed or unsigned.
pub fn fits(value: i64, width: usize) -> bool {
    let bits = width as u32 * 8;
    let min = -(1i64 << (bits - 1));
    let max = (1i64 << bits) - 1;
    (min..=max).contains(&value)
}

impl Output {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current write position.
    pub fn here(&self) -> usize {
        self.bytes.len()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn push(&mut self, byte: u8) {
        self.bytes.push(byte);
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    /// Low `width` bytes of `value`, little-endian.
    pub fn write(&mut self, value: i64, width: usize) {
        self.bytes.extend_from_slice(&value.to_le_bytes()[..width]);
    }

    pub fn patch(&mut self, at: usize, value: i64, width: usize) {
        self.bytes[at..at + width].copy_from_slice(&value.to_le_bytes()[..width]);
    }

    pub fn put(&mut self, at: usize, bytes: &[u8]) {
        self.bytes[at..at + bytes.len()].copy_from_slice(bytes);
    }

    /// Open `len` zero bytes at `at`, moving everything after it.
    pub fn insert(&mut self, at: usize, len: usize) {
        self.bytes.splice(at..at, std::iter::repeat(0).take(len));
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.bytes[..MAGIC.len()].copy_from_slice(&MAGIC);
        self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges() {
        assert!(fits(255, 1));
        assert!(fits(-128, 1));
        assert!(!fits(256, 1));
        assert!(!fits(-129, 1));
        assert!(fits(65535, 2));
        assert!(fits(-32768, 2));
        assert!(fits(0xFFFF_FFFF, 4));
        assert!(fits(i32::MIN as i64, 4));
        assert!(!fits(0x1_0000_0000, 4));
    }

    #[test]
    fn little_endian_writes() {
        let mut out = Output::new();
        let base = out.here();
        out.write(0x1234, 2);
        out.write(-1, 1);
        out.write(0x0102_0304, 4);
        assert_eq!(&out.bytes()[base..], &[0x34, 0x12, 0xFF, 4, 3, 2, 1]);
        out.patch(base, 7, 2);
        assert_eq!(&out.bytes()[base..base + 2], &[7, 0]);
    }

    #[test]
    fn insert_moves_tail() {
        let mut out = Output::new();
        out.extend(&[1, 2, 3]);
        out.insert(EXPORT_TABLE_OFFSET + 1, 2);
        assert_eq!(&out.bytes()[EXPORT_TABLE_OFFSET..], &[1, 0, 0, 2, 3]);
        let image = out.finish();
        assert_eq!(&image[..4], b"TVM\0");
    }
}
