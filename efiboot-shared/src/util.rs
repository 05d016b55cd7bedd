use alloc::string::String;

/// Reads a little-endian `u16` at `lo`. The caller guarantees the bytes are in range.
pub(crate) fn le16(buf: &[u8], lo: usize) -> u16 {
    (0..2).map(|i| (buf[lo + i] as u16) << (8 * i)).sum()
}

pub(crate) fn le32(buf: &[u8], lo: usize) -> u32 {
    (0..4).map(|i| (buf[lo + i] as u32) << (8 * i)).sum()
}

pub(crate) fn le64(buf: &[u8], lo: usize) -> u64 {
    (0..8).map(|i| (buf[lo + i] as u64) << (8 * i)).sum()
}

/// Decodes UTF-16LE bytes up to the first NUL code unit, replacing invalid sequences.
pub fn utf16_lossy(bytes: &[u8]) -> String {
    let units = bytes
        .chunks_exact(2)
        .map(|x| u16::from_le_bytes([x[0], x[1]]))
        .take_while(|&x| x != 0);
    char::decode_utf16(units)
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn little_endian_reads() {
        let buf = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09];
        assert_eq!(le16(&buf, 1), 0x0302);
        assert_eq!(le32(&buf, 0), 0x04030201);
        assert_eq!(le64(&buf, 1), 0x0908070605040302);
    }

    #[test]
    fn utf16_stops_at_nul() {
        let bytes = [b'O', 0, b'S', 0, 0, 0, b'X', 0];
        assert_eq!(utf16_lossy(&bytes), "OS");
    }

    #[test]
    fn utf16_replaces_lone_surrogates() {
        let bytes = [0x00, 0xd8, b'a', 0];
        assert_eq!(utf16_lossy(&bytes), "\u{fffd}a");
    }
}
