//! Bit-level I/O primitives shared by every bit-packed codec
//!
//! Bits are stored MSB-first (most significant bit first) within each byte:
//! ```text
//! Byte: [bit0 bit1 bit2 bit3 bit4 bit5 bit6 bit7]
//!        MSB                                    LSB
//! ```
//!
//! Writer and reader must agree on the sequence and width of every field; the
//! stream carries no synchronization markers. The final partial byte is padded
//! with zero bits.
//!
//! # Example
//! ```
//! use sac_encoding::compression::bit_stream::{BitReader, BitWriter};
//!
//! let mut buffer = Vec::new();
//! let mut writer = BitWriter::new(&mut buffer);
//! writer.write_bit(true);
//! writer.write_bits(0b1010, 4);
//! writer.finish();
//!
//! let mut reader = BitReader::new(&buffer);
//! assert!(reader.read_bit().unwrap());
//! assert_eq!(reader.read_bits(4).unwrap(), 0b1010);
//! ```

use crate::error::CompressionError;

/// Writer for bit-level operations
///
/// `BitWriter` appends to a caller-owned byte buffer, so codecs can encode
/// straight into the destination without an intermediate copy. Bytes already
/// present in the buffer are left untouched.
///
/// # Internal State
///
/// - `buffer`: Destination; completed bytes are pushed here
/// - `current_byte`: The byte currently being assembled (0-7 bits written)
/// - `bit_position`: Number of bits used in `current_byte`
pub struct BitWriter<'a> {
    /// Destination buffer (borrowed)
    buffer: &'a mut Vec<u8>,
    /// Current byte being assembled
    current_byte: u8,
    /// Number of bits written to current_byte (0-7)
    bit_position: u8,
    /// Bytes in the buffer before this writer started
    start_len: usize,
}

impl<'a> BitWriter<'a> {
    /// Create a writer that appends to `buffer`
    pub fn new(buffer: &'a mut Vec<u8>) -> Self {
        let start_len = buffer.len();
        Self {
            buffer,
            current_byte: 0,
            bit_position: 0,
            start_len,
        }
    }

    /// Write a single bit to the stream
    pub fn write_bit(&mut self, bit: bool) {
        if bit {
            self.current_byte |= 1 << (7 - self.bit_position);
        }
        self.bit_position += 1;

        if self.bit_position == 8 {
            self.buffer.push(self.current_byte);
            self.current_byte = 0;
            self.bit_position = 0;
        }
    }

    /// Write the low `num_bits` bits of `value`, MSB first
    ///
    /// `num_bits` may be 0 (no-op) through 64. Bits above `num_bits` are ignored.
    ///
    /// # Example
    /// ```
    /// use sac_encoding::compression::bit_stream::BitWriter;
    ///
    /// let mut buffer = Vec::new();
    /// let mut writer = BitWriter::new(&mut buffer);
    /// writer.write_bits(0b1010, 4);  // Writes bits: 1, 0, 1, 0
    /// writer.write_bits(0xFF, 8);    // Writes 8 bits: all 1s
    /// writer.finish();
    /// assert_eq!(buffer, vec![0b1010_1111, 0b1111_0000]);
    /// ```
    pub fn write_bits(&mut self, value: u64, num_bits: u8) {
        debug_assert!(num_bits <= 64, "cannot write {} bits", num_bits);
        let mut remaining = num_bits.min(64);

        // Fill the current byte chunk by chunk instead of bit by bit
        while remaining > 0 {
            let free = 8 - self.bit_position;
            let take = remaining.min(free);
            let shift = remaining - take;
            let chunk = ((value >> shift) & ((1u64 << take) - 1)) as u8;

            self.current_byte |= chunk << (free - take);
            self.bit_position += take;
            remaining -= take;

            if self.bit_position == 8 {
                self.buffer.push(self.current_byte);
                self.current_byte = 0;
                self.bit_position = 0;
            }
        }
    }

    /// Number of bits written so far by this writer
    pub fn bits_written(&self) -> usize {
        (self.buffer.len() - self.start_len) * 8 + self.bit_position as usize
    }

    /// Flush the partial byte, zero padded
    ///
    /// Returns the number of bytes this writer appended.
    pub fn finish(self) -> usize {
        if self.bit_position > 0 {
            self.buffer.push(self.current_byte);
        }
        self.buffer.len() - self.start_len
    }
}

/// Reader for bit-level operations
///
/// `BitReader` reads bits sequentially from a byte slice, MSB-first within each
/// byte. Reading past the end yields `CompressionError::EndOfStream`.
///
/// # Example
/// ```
/// use sac_encoding::compression::bit_stream::BitReader;
///
/// let data = vec![0b10101100];
/// let mut reader = BitReader::new(&data);
/// assert!(reader.read_bit().unwrap());   // Reads 1
/// assert!(!reader.read_bit().unwrap());  // Reads 0
/// ```
pub struct BitReader<'a> {
    /// Source byte buffer to read from (borrowed)
    buffer: &'a [u8],
    /// Current byte index in buffer
    byte_position: usize,
    /// Current bit position within the current byte (0-7)
    bit_position: u8,
}

impl<'a> BitReader<'a> {
    /// Create a new bit reader from a byte slice
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            byte_position: 0,
            bit_position: 0,
        }
    }

    /// Read a single bit from the stream
    pub fn read_bit(&mut self) -> Result<bool, CompressionError> {
        if self.byte_position >= self.buffer.len() {
            return Err(CompressionError::EndOfStream {
                requested: 1,
                remaining: 0,
            });
        }

        let byte = self.buffer[self.byte_position];
        let bit = (byte >> (7 - self.bit_position)) & 1 == 1;

        self.bit_position += 1;
        if self.bit_position == 8 {
            self.byte_position += 1;
            self.bit_position = 0;
        }

        Ok(bit)
    }

    /// Read `num_bits` bits (0-64) into the low bits of a u64
    ///
    /// # Edge Cases
    /// - `num_bits = 0`: Returns `Ok(0)` without advancing the read position.
    ///
    /// # Errors
    /// - `InvalidData` if num_bits > 64
    /// - `EndOfStream` if fewer than `num_bits` bits remain; nothing is consumed
    pub fn read_bits(&mut self, num_bits: u8) -> Result<u64, CompressionError> {
        if num_bits == 0 {
            return Ok(0);
        }
        if num_bits > 64 {
            return Err(CompressionError::InvalidData(format!(
                "Cannot read more than 64 bits (requested: {})",
                num_bits
            )));
        }

        let remaining_bits = self.remaining_bits();
        if remaining_bits < num_bits as usize {
            return Err(CompressionError::EndOfStream {
                requested: num_bits as usize,
                remaining: remaining_bits,
            });
        }

        let mut value: u64 = 0;
        let mut remaining = num_bits;
        while remaining > 0 {
            let byte = self.buffer[self.byte_position];
            let available = 8 - self.bit_position;
            let take = remaining.min(available);
            let chunk = (byte >> (available - take)) & (((1u16 << take) - 1) as u8);

            value = (value << take) | chunk as u64;
            self.bit_position += take;
            remaining -= take;

            if self.bit_position == 8 {
                self.byte_position += 1;
                self.bit_position = 0;
            }
        }

        Ok(value)
    }

    /// Bits not yet consumed, including zero padding of the last byte
    pub fn remaining_bits(&self) -> usize {
        if self.byte_position >= self.buffer.len() {
            return 0;
        }
        (self.buffer.len() - self.byte_position) * 8 - self.bit_position as usize
    }

    /// Check that only zero padding (< 8 bits) is left
    ///
    /// Decoders call this after the last item to reject trailing data.
    pub fn expect_padding_only(&self) -> Result<(), CompressionError> {
        let remaining = self.remaining_bits();
        if remaining >= 8 {
            return Err(CompressionError::corrupt(format!(
                "unexpected tail of {} bits after the last item",
                remaining
            )));
        }
        if remaining > 0 {
            let byte = self.buffer[self.byte_position];
            let mask = ((1u16 << remaining) - 1) as u8;
            if byte & mask != 0 {
                return Err(CompressionError::corrupt("non-zero padding bits"));
            }
        }
        Ok(())
    }

    /// Check if we've reached the end of the buffer
    pub fn is_at_end(&self) -> bool {
        self.byte_position >= self.buffer.len()
    }

    /// Get current read position as (byte_index, bit_index_within_byte)
    pub fn position(&self) -> (usize, u8) {
        (self.byte_position, self.bit_position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_with(f: impl FnOnce(&mut BitWriter<'_>)) -> Vec<u8> {
        let mut buffer = Vec::new();
        let mut writer = BitWriter::new(&mut buffer);
        f(&mut writer);
        writer.finish();
        buffer
    }

    #[test]
    fn test_write_read_single_bit() {
        let buffer = write_with(|w| {
            w.write_bit(true);
            w.write_bit(false);
            w.write_bit(true);
            w.write_bit(true);
        });
        let mut reader = BitReader::new(&buffer);

        assert!(reader.read_bit().unwrap());
        assert!(!reader.read_bit().unwrap());
        assert!(reader.read_bit().unwrap());
        assert!(reader.read_bit().unwrap());
    }

    #[test]
    fn test_write_read_multiple_bits() {
        let buffer = write_with(|w| {
            w.write_bits(0b1010, 4);
            w.write_bits(0b110011, 6);
        });
        let mut reader = BitReader::new(&buffer);

        assert_eq!(reader.read_bits(4).unwrap(), 0b1010);
        assert_eq!(reader.read_bits(6).unwrap(), 0b110011);
    }

    #[test]
    fn test_write_appends_after_existing_bytes() {
        let mut buffer = vec![0xAA, 0xBB];
        let mut writer = BitWriter::new(&mut buffer);
        writer.write_bits(0b1, 1);
        assert_eq!(writer.bits_written(), 1);
        assert_eq!(writer.finish(), 1);
        assert_eq!(buffer, vec![0xAA, 0xBB, 0x80]);
    }

    #[test]
    fn test_write_64_bits_boundary_patterns() {
        let patterns = [
            0xFFFFFFFFFFFFFFFFu64,
            0x0000000000000000u64,
            0xAAAAAAAAAAAAAAAAu64,
            0x5555555555555555u64,
            0x8000000000000001u64,
        ];

        for &value in &patterns {
            // Offset by 3 bits so the 64-bit field straddles nine bytes
            let buffer = write_with(|w| {
                w.write_bits(0b101, 3);
                w.write_bits(value, 64);
            });
            let mut reader = BitReader::new(&buffer);

            assert_eq!(reader.read_bits(3).unwrap(), 0b101);
            assert_eq!(reader.read_bits(64).unwrap(), value);
        }
    }

    #[test]
    fn test_high_bits_above_width_are_ignored() {
        let buffer = write_with(|w| w.write_bits(0xFFFF_FFFF_FFFF_FFF5, 4));
        assert_eq!(buffer, vec![0b0101_0000]);
    }

    #[test]
    fn test_zero_width_is_noop() {
        let buffer = write_with(|w| {
            w.write_bits(0xFF, 0);
            w.write_bit(true);
        });
        assert_eq!(buffer, vec![0x80]);

        let mut reader = BitReader::new(&buffer);
        assert_eq!(reader.read_bits(0).unwrap(), 0);
        assert_eq!(reader.position(), (0, 0));
    }

    #[test]
    fn test_partial_byte_padding_accuracy() {
        let buffer = write_with(|w| w.write_bits(0b1011, 4));
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer[0] >> 4, 0b1011);
        assert_eq!(buffer[0] & 0b1111, 0);
    }

    #[test]
    fn test_read_past_end() {
        let buffer = vec![0b10101010];
        let mut reader = BitReader::new(&buffer);
        reader.read_bits(8).unwrap();

        let err = reader.read_bit().unwrap_err();
        assert!(err.is_end_of_stream());
    }

    #[test]
    fn test_short_read_consumes_nothing() {
        let buffer = vec![0xFF];
        let mut reader = BitReader::new(&buffer);
        reader.read_bits(3).unwrap();

        let err = reader.read_bits(6).unwrap_err();
        match err {
            CompressionError::EndOfStream {
                requested,
                remaining,
            } => {
                assert_eq!(requested, 6);
                assert_eq!(remaining, 5);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(reader.remaining_bits(), 5);
    }

    #[test]
    fn test_read_more_than_64_bits_rejected() {
        let buffer = vec![0u8; 16];
        let mut reader = BitReader::new(&buffer);
        assert!(matches!(
            reader.read_bits(65),
            Err(CompressionError::InvalidData(_))
        ));
    }

    #[test]
    fn test_is_at_end_bit_precision() {
        let buffer = write_with(|w| w.write_bits(0b10110000, 8));
        let mut reader = BitReader::new(&buffer);
        assert!(!reader.is_at_end());

        reader.read_bits(4).unwrap();
        assert!(!reader.is_at_end());

        reader.read_bits(4).unwrap();
        assert!(reader.is_at_end());
    }

    #[test]
    fn test_expect_padding_only() {
        let buffer = write_with(|w| w.write_bits(0b111, 3));
        let mut reader = BitReader::new(&buffer);
        reader.read_bits(3).unwrap();
        assert!(reader.expect_padding_only().is_ok());

        let buffer = vec![0b1110_0001];
        let mut reader = BitReader::new(&buffer);
        reader.read_bits(3).unwrap();
        assert!(reader.expect_padding_only().is_err());

        let buffer = vec![0b1110_0000, 0x00];
        let mut reader = BitReader::new(&buffer);
        reader.read_bits(3).unwrap();
        assert!(reader.expect_padding_only().is_err());
    }

    #[test]
    fn fuzzy_random_bit_sequences() {
        use rand::Rng;

        let mut rng = rand::rng();

        for _ in 0..2_000 {
            let fields: Vec<(u64, u8)> = (0..rng.random_range(1..20))
                .map(|_| (rng.random::<u64>(), rng.random_range(1..=64u8)))
                .collect();

            let buffer = write_with(|w| {
                for &(value, width) in &fields {
                    w.write_bits(value, width);
                }
            });

            let mut reader = BitReader::new(&buffer);
            for &(value, width) in &fields {
                let mask = if width == 64 {
                    u64::MAX
                } else {
                    (1u64 << width) - 1
                };
                assert_eq!(reader.read_bits(width).unwrap(), value & mask);
            }
            assert!(reader.expect_padding_only().is_ok());
        }
    }
}
