//! The reflected CRC-32 used by Zip (polynomial 0x04C11DB7, processed LSB first).

const REFLECTED_POLYNOMIAL: u32 = 0x04C11DB7u32.reverse_bits();

/// Lookup table for one byte at a time, built at compile time.
pub static CRC32_TABLE: [u32; 256] = build_table();

const fn build_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut n = 0;
    while n < 256 {
        let mut c = n as u32;
        let mut k = 0;
        while k < 8 {
            c = if c & 1 != 0 {
                REFLECTED_POLYNOMIAL ^ (c >> 1)
            } else {
                c >> 1
            };
            k += 1;
        }
        table[n] = c;
        n += 1;
    }
    table
}

/// Incremental CRC-32.
///
/// The running state is kept complemented so that `update` can be called any number of
/// times; [`value`](Self::value) applies the final one's-complement.
#[derive(Debug, Clone)]
pub struct Crc32 {
    state: u32,
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}

impl Crc32 {
    pub fn new() -> Self {
        Self { state: u32::MAX }
    }

    pub fn reset(&mut self) {
        self.state = u32::MAX;
    }

    pub fn update(&mut self, buf: &[u8]) {
        let mut crc = self.state;
        for byte in buf {
            crc = CRC32_TABLE[((crc ^ *byte as u32) & 0xFF) as usize] ^ (crc >> 8);
        }
        self.state = crc;
    }

    pub fn value(&self) -> u32 {
        !self.state
    }
}

/// One-shot CRC-32 of `buf`.
pub fn crc32(buf: &[u8]) -> u32 {
    let mut crc = Crc32::new();
    crc.update(buf);
    crc.value()
}
