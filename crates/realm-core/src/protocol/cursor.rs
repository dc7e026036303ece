//! Binary cursor: sequential, bounds-checked field access over a frame body.
//!
//! Every packet codec in the catalog is written against these two types, so
//! they are the only place that knows the primitive encodings:
//!
//! - Integers are fixed-width and **little-endian** (1, 2, 4 or 8 bytes).
//! - Floats are IEEE-754 `f32` / `f64`, little-endian.
//! - Booleans are one byte, `0` or `1`.
//! - Strings are **counted**: a `u16` number of UTF-16 code units followed by
//!   the units themselves, with no terminator.  The count is in characters
//!   (code units), never bytes.
//!
//! The reader only moves forward.  There is no seek API: a codec reads its
//! fields in declaration order and cannot jump around the buffer, which keeps
//! every decoder linear and easy to audit against its encoder.

use crate::protocol::codec::ProtocolError;

/// Maximum number of UTF-16 code units a counted string can carry.
pub const MAX_STRING_UNITS: usize = u16::MAX as usize;

// ── Reader ────────────────────────────────────────────────────────────────────

/// Forward-only reader over a borrowed byte slice.
///
/// Reading past the end never panics; it returns
/// [`ProtocolError::TruncatedFrame`] and leaves the position unchanged.
///
/// # Examples
///
/// ```rust
/// use realm_core::protocol::PacketReader;
///
/// let mut reader = PacketReader::new(&[0x2A, 0x00, 0x00, 0x00, 0x01]);
/// assert_eq!(reader.read_i32().unwrap(), 42);
/// assert!(reader.read_bool().unwrap());
/// assert!(reader.read_u8().is_err());
/// ```
#[derive(Debug, Clone)]
pub struct PacketReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> PacketReader<'a> {
    /// Creates a reader positioned at the start of `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Number of bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Number of bytes left to read.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Returns `true` once every byte has been consumed.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Reads `len` raw bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], ProtocolError> {
        if self.remaining() < len {
            return Err(ProtocolError::TruncatedFrame {
                needed: self.pos + len,
                available: self.buf.len(),
            });
        }
        let start = self.pos;
        self.pos += len;
        Ok(&self.buf[start..self.pos])
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], ProtocolError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8, ProtocolError> {
        Ok(i8::from_le_bytes(self.read_array()?))
    }

    pub fn read_u16(&mut self) -> Result<u16, ProtocolError> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_i16(&mut self) -> Result<i16, ProtocolError> {
        Ok(i16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, ProtocolError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32, ProtocolError> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, ProtocolError> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    pub fn read_i64(&mut self) -> Result<i64, ProtocolError> {
        Ok(i64::from_le_bytes(self.read_array()?))
    }

    pub fn read_f32(&mut self) -> Result<f32, ProtocolError> {
        Ok(f32::from_le_bytes(self.read_array()?))
    }

    pub fn read_f64(&mut self) -> Result<f64, ProtocolError> {
        Ok(f64::from_le_bytes(self.read_array()?))
    }

    /// Reads a one-byte boolean.  Any value other than `0` or `1` is a
    /// [`ProtocolError::FieldOutOfRange`].
    pub fn read_bool(&mut self) -> Result<bool, ProtocolError> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(ProtocolError::FieldOutOfRange {
                field: "bool",
                value: i64::from(other),
            }),
        }
    }

    /// Reads a counted UTF-16 string.
    ///
    /// The byte length is checked against the remaining buffer before any
    /// allocation, so a hostile count cannot trigger a large allocation.
    pub fn read_string(&mut self) -> Result<String, ProtocolError> {
        let start = self.pos;
        let units = self.read_u16()? as usize;
        let raw = match self.read_bytes(units * 2) {
            Ok(raw) => raw,
            Err(e) => {
                self.pos = start;
                return Err(e);
            }
        };

        let code_units = raw
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]));
        char::decode_utf16(code_units)
            .collect::<Result<String, _>>()
            .map_err(|e| {
                self.pos = start;
                ProtocolError::MalformedPayload(format!("invalid UTF-16 string: {e}"))
            })
    }
}

// ── Writer ────────────────────────────────────────────────────────────────────

/// Append-only writer backed by a growable buffer.  Writes never fail.
#[derive(Debug, Default, Clone)]
pub struct PacketWriter {
    buf: Vec<u8>,
}

impl PacketWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn write_u8(&mut self, value: u8) -> &mut Self {
        self.buf.push(value);
        self
    }

    pub fn write_i8(&mut self, value: i8) -> &mut Self {
        self.write_bytes(&value.to_le_bytes())
    }

    pub fn write_u16(&mut self, value: u16) -> &mut Self {
        self.write_bytes(&value.to_le_bytes())
    }

    pub fn write_i16(&mut self, value: i16) -> &mut Self {
        self.write_bytes(&value.to_le_bytes())
    }

    pub fn write_u32(&mut self, value: u32) -> &mut Self {
        self.write_bytes(&value.to_le_bytes())
    }

    pub fn write_i32(&mut self, value: i32) -> &mut Self {
        self.write_bytes(&value.to_le_bytes())
    }

    pub fn write_u64(&mut self, value: u64) -> &mut Self {
        self.write_bytes(&value.to_le_bytes())
    }

    pub fn write_i64(&mut self, value: i64) -> &mut Self {
        self.write_bytes(&value.to_le_bytes())
    }

    pub fn write_f32(&mut self, value: f32) -> &mut Self {
        self.write_bytes(&value.to_le_bytes())
    }

    pub fn write_f64(&mut self, value: f64) -> &mut Self {
        self.write_bytes(&value.to_le_bytes())
    }

    pub fn write_bool(&mut self, value: bool) -> &mut Self {
        self.write_u8(u8::from(value))
    }

    /// Writes a counted UTF-16 string.
    ///
    /// Strings longer than [`MAX_STRING_UNITS`] code units are truncated at the
    /// last whole character that fits, so a surrogate pair is never split and
    /// the emitted count always matches the emitted body.
    pub fn write_string(&mut self, value: &str) -> &mut Self {
        let mut units: Vec<u16> = Vec::with_capacity(value.len());
        let mut scratch = [0u16; 2];
        for ch in value.chars() {
            let encoded = ch.encode_utf16(&mut scratch);
            if units.len() + encoded.len() > MAX_STRING_UNITS {
                break;
            }
            units.extend_from_slice(encoded);
        }

        self.write_u16(units.len() as u16);
        self.buf.reserve(units.len() * 2);
        for unit in units {
            self.buf.extend_from_slice(&unit.to_le_bytes());
        }
        self
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn reader_for(writer: &PacketWriter) -> PacketReader<'_> {
        PacketReader::new(writer.as_slice())
    }

    #[test]
    fn test_integers_are_little_endian() {
        // Arrange
        let mut w = PacketWriter::new();

        // Act
        w.write_u16(0x0102).write_i32(-2).write_u64(0x0102_0304_0506_0708);

        // Assert
        assert_eq!(
            w.as_slice(),
            &[
                0x02, 0x01, // u16
                0xFE, 0xFF, 0xFF, 0xFF, // i32 -2
                0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01, // u64
            ]
        );
    }

    #[test]
    fn test_integer_boundaries_survive_round_trip() {
        let mut w = PacketWriter::new();
        w.write_u8(u8::MAX)
            .write_i8(i8::MIN)
            .write_u16(u16::MAX)
            .write_i16(i16::MIN)
            .write_u32(0)
            .write_i32(i32::MAX)
            .write_u64(u64::MAX)
            .write_i64(i64::MIN);

        let mut r = reader_for(&w);
        assert_eq!(r.read_u8().unwrap(), u8::MAX);
        assert_eq!(r.read_i8().unwrap(), i8::MIN);
        assert_eq!(r.read_u16().unwrap(), u16::MAX);
        assert_eq!(r.read_i16().unwrap(), i16::MIN);
        assert_eq!(r.read_u32().unwrap(), 0);
        assert_eq!(r.read_i32().unwrap(), i32::MAX);
        assert_eq!(r.read_u64().unwrap(), u64::MAX);
        assert_eq!(r.read_i64().unwrap(), i64::MIN);
        assert!(r.is_empty());
    }

    #[test]
    fn test_floats_round_trip_bit_exact() {
        let mut w = PacketWriter::new();
        w.write_f32(f32::MIN_POSITIVE).write_f64(-0.0).write_f64(f64::MAX);

        let mut r = reader_for(&w);
        assert_eq!(r.read_f32().unwrap().to_bits(), f32::MIN_POSITIVE.to_bits());
        assert_eq!(r.read_f64().unwrap().to_bits(), (-0.0f64).to_bits());
        assert_eq!(r.read_f64().unwrap(), f64::MAX);
    }

    #[test]
    fn test_read_past_end_returns_truncated_frame() {
        // Arrange – 3 bytes cannot hold an i32
        let mut r = PacketReader::new(&[1, 2, 3]);

        // Act
        let result = r.read_i32();

        // Assert
        assert_eq!(
            result,
            Err(ProtocolError::TruncatedFrame { needed: 4, available: 3 })
        );
        assert_eq!(r.position(), 0, "a failed read must not advance the cursor");
    }

    #[test]
    fn test_read_bool_rejects_values_other_than_zero_and_one() {
        let mut r = PacketReader::new(&[0, 1, 2]);
        assert!(!r.read_bool().unwrap());
        assert!(r.read_bool().unwrap());
        assert_eq!(
            r.read_bool(),
            Err(ProtocolError::FieldOutOfRange { field: "bool", value: 2 })
        );
    }

    #[test]
    fn test_string_count_is_in_code_units_not_bytes() {
        // Arrange – "é" is 2 UTF-8 bytes but 1 UTF-16 unit; "😀" is 2 units
        let mut w = PacketWriter::new();

        // Act
        w.write_string("é😀");

        // Assert
        assert_eq!(&w.as_slice()[..2], &[3, 0], "count must be 3 code units");
        assert_eq!(w.len(), 2 + 3 * 2);
        assert_eq!(reader_for(&w).read_string().unwrap(), "é😀");
    }

    #[test]
    fn test_empty_string_round_trip() {
        let mut w = PacketWriter::new();
        w.write_string("");
        assert_eq!(w.as_slice(), &[0, 0]);
        assert_eq!(reader_for(&w).read_string().unwrap(), "");
    }

    #[test]
    fn test_max_length_string_round_trip() {
        let long = "a".repeat(MAX_STRING_UNITS);
        let mut w = PacketWriter::new();
        w.write_string(&long);
        assert_eq!(reader_for(&w).read_string().unwrap(), long);
    }

    #[test]
    fn test_overlong_string_is_truncated_without_splitting_surrogates() {
        // Arrange – one unit short of the limit, then a 2-unit character
        let mut value = "a".repeat(MAX_STRING_UNITS - 1);
        value.push('😀');

        // Act
        let mut w = PacketWriter::new();
        w.write_string(&value);
        let decoded = reader_for(&w).read_string().unwrap();

        // Assert
        assert_eq!(decoded.len(), MAX_STRING_UNITS - 1);
        assert!(decoded.chars().all(|c| c == 'a'));
        assert_eq!(w.len(), 2 + (MAX_STRING_UNITS - 1) * 2);
    }

    #[test]
    fn test_string_with_count_beyond_buffer_is_truncated_and_rewinds() {
        // Count says 4 units but only 1 unit follows
        let mut r = PacketReader::new(&[4, 0, b'a', 0]);
        assert!(matches!(
            r.read_string(),
            Err(ProtocolError::TruncatedFrame { .. })
        ));
        assert_eq!(r.position(), 0);
    }

    #[test]
    fn test_lone_surrogate_is_malformed() {
        let mut r = PacketReader::new(&[1, 0, 0x00, 0xD8]);
        assert!(matches!(
            r.read_string(),
            Err(ProtocolError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_remaining_and_position_track_consumption() {
        let mut r = PacketReader::new(&[0; 10]);
        r.read_u32().unwrap();
        assert_eq!(r.position(), 4);
        assert_eq!(r.remaining(), 6);
        r.read_bytes(6).unwrap();
        assert!(r.is_empty());
    }
}
