//! Binary segment layouts and their bit-level semantics.
//!
//! A [`BinaryShape`] is the attribute of `BinaryMatch`: the ordered segment
//! layout a pattern like `<<Len:8, Payload:Len/binary, Rest/binary>>` reduces
//! to. The decoding and encoding functions here define what the runtime does
//! with a shape; the interpreter and the reference matcher both call them so
//! they cannot drift apart.

use ember_ir::ast::{Endianness, SegmentSpec, SegmentType};
use ember_term::{BigInt, Heap, Term};
use std::fmt;

/// Where a segment's size comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShapeSize {
    /// Known at compile time, in bits.
    Bits(u64),
    /// The `n`th size operand of the `BinaryMatch`, in units.
    Operand(u32),
    /// The integer value of an earlier segment of the same binary, in units.
    Segment(u32),
    /// Everything that is left.
    Rest,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SegmentLayout {
    pub spec: SegmentSpec,
    pub size: ShapeSize,
}

impl SegmentLayout {
    /// Layout with the type's default size.
    pub fn with_default_size(spec: SegmentSpec) -> Self {
        let size = match spec.ty {
            SegmentType::Integer => ShapeSize::Bits(8),
            SegmentType::Float => ShapeSize::Bits(64),
            SegmentType::Binary => ShapeSize::Rest,
        };
        SegmentLayout { spec, size }
    }
}

/// Ordered segment layout tested by one `BinaryMatch`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct BinaryShape {
    pub segments: Vec<SegmentLayout>,
}

/// A segment value could not be encoded (wrong type, bad size).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BadSegment;

impl BinaryShape {
    pub fn new(segments: Vec<SegmentLayout>) -> Self {
        BinaryShape { segments }
    }

    /// Number of size operands the shape refers to.
    pub fn operand_count(&self) -> usize {
        self.segments
            .iter()
            .filter_map(|s| match s.size {
                ShapeSize::Operand(i) => Some(i as usize + 1),
                _ => None,
            })
            .max()
            .unwrap_or(0)
    }

    /// Split `binary` into one term per segment.
    ///
    /// `None` when `binary` is not a bitstring, a size is not a non-negative
    /// integer, the data runs out, or bits are left over.
    pub fn decode(&self, heap: &mut Heap, binary: Term, sizes: &[Term]) -> Option<Vec<Term>> {
        let (bit_len, bytes) = heap.binary_data(binary)?;
        let mut pos = 0u64;
        let mut values: Vec<Term> = Vec::with_capacity(self.segments.len());
        let mut raw_ints: Vec<Option<i128>> = Vec::with_capacity(self.segments.len());

        for layout in &self.segments {
            let unit = u64::from(layout.spec.unit.max(1));
            let remaining = bit_len - pos;
            let size = match layout.size {
                ShapeSize::Bits(bits) => bits,
                ShapeSize::Operand(i) => {
                    let units = heap.i64_value(*sizes.get(i as usize)?)?;
                    u64::try_from(units).ok()?.checked_mul(unit)?
                }
                ShapeSize::Segment(j) => {
                    let units = (*raw_ints.get(j as usize)?)?;
                    u64::try_from(units).ok()?.checked_mul(unit)?
                }
                ShapeSize::Rest => {
                    if remaining % unit != 0 {
                        return None;
                    }
                    remaining
                }
            };
            if size > remaining {
                return None;
            }
            let (value, raw) = decode_segment(heap, &bytes, pos, size, layout.spec)?;
            values.push(value);
            raw_ints.push(raw);
            pos += size;
        }

        (pos == bit_len).then_some(values)
    }
}

fn decode_segment(
    heap: &mut Heap,
    bytes: &[u8],
    start: u64,
    size: u64,
    spec: SegmentSpec,
) -> Option<(Term, Option<i128>)> {
    match spec.ty {
        SegmentType::Integer => {
            if size > 127 {
                return None;
            }
            let mut raw = read_bits(bytes, start, size);
            if spec.endian == Endianness::Little {
                if size % 8 != 0 {
                    return None;
                }
                raw = swap_bytes(raw, size / 8);
            }
            let value = if spec.signed && size > 0 && (raw >> (size - 1)) & 1 == 1 {
                i128::try_from(raw).ok()? - (1i128 << size)
            } else {
                i128::try_from(raw).ok()?
            };
            Some((heap.integer(value), Some(value)))
        }
        SegmentType::Float => {
            let mut raw = read_bits(bytes, start, size);
            if spec.endian == Endianness::Little {
                raw = swap_bytes(raw, size / 8);
            }
            let value = match size {
                32 => f64::from(f32::from_bits(u32::try_from(raw).ok()?)),
                64 => f64::from_bits(u64::try_from(raw).ok()?),
                _ => return None,
            };
            Some((heap.float(value), None))
        }
        SegmentType::Binary => {
            let mut out = BitBuffer::new();
            out.push_slice(bytes, start, size);
            let (data, bits) = out.into_parts();
            Some((heap.bitstring(&data, bits), None))
        }
    }
}

/// Low 128 bits of the two's complement form of `value`.
fn low_bits(value: &BigInt) -> u128 {
    let bytes = value.to_signed_bytes_le();
    let fill = if bytes.last().is_some_and(|b| b & 0x80 != 0) { 0xFF } else { 0 };
    let mut word = [fill; 16];
    for (slot, byte) in word.iter_mut().zip(&bytes) {
        *slot = *byte;
    }
    u128::from_le_bytes(word)
}

/// Append one segment to `buf`.
///
/// `size` is in units of `spec.unit`; `None` picks the type default (8 bits,
/// 64 bits, or the whole binary).
pub fn encode_segment(
    heap: &Heap,
    buf: &mut BitBuffer,
    value: Term,
    size: Option<Term>,
    spec: SegmentSpec,
) -> Result<(), BadSegment> {
    let unit = u64::from(spec.unit.max(1));
    let explicit = match size {
        Some(term) => {
            let units = heap.i64_value(term).ok_or(BadSegment)?;
            let units = u64::try_from(units).map_err(|_| BadSegment)?;
            Some(units.checked_mul(unit).ok_or(BadSegment)?)
        }
        None => None,
    };

    match spec.ty {
        SegmentType::Integer => {
            let int = heap.integer_value(value).ok_or(BadSegment)?;
            let bits = explicit.unwrap_or(8);
            if bits > 128 {
                return Err(BadSegment);
            }
            let mask = if bits == 128 { u128::MAX } else { (1u128 << bits) - 1 };
            let mut raw = low_bits(&int) & mask;
            if spec.endian == Endianness::Little {
                if bits % 8 != 0 {
                    return Err(BadSegment);
                }
                raw = swap_bytes(raw, bits / 8);
            }
            buf.push_bits(raw, bits);
            Ok(())
        }
        SegmentType::Float => {
            let number = heap.number(value).ok_or(BadSegment)?.as_f64();
            let bits = explicit.unwrap_or(64);
            #[expect(
                clippy::cast_possible_truncation,
                reason = "32-bit float segments round by definition"
            )]
            let mut raw = match bits {
                32 => u128::from((number as f32).to_bits()),
                64 => u128::from(number.to_bits()),
                _ => return Err(BadSegment),
            };
            if spec.endian == Endianness::Little {
                raw = swap_bytes(raw, bits / 8);
            }
            buf.push_bits(raw, bits);
            Ok(())
        }
        SegmentType::Binary => {
            let (bit_len, bytes) = heap.binary_data(value).ok_or(BadSegment)?;
            let bits = explicit.unwrap_or(bit_len);
            if bits > bit_len {
                return Err(BadSegment);
            }
            buf.push_slice(&bytes, 0, bits);
            Ok(())
        }
    }
}

/// Growable bitstring, most significant bit first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BitBuffer {
    bytes: Vec<u8>,
    bits: u64,
}

impl BitBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bit_len(&self) -> u64 {
        self.bits
    }

    pub fn into_parts(self) -> (Vec<u8>, u64) {
        (self.bytes, self.bits)
    }

    pub fn push_bit(&mut self, bit: bool) {
        let byte = byte_index(self.bits);
        if byte == self.bytes.len() {
            self.bytes.push(0);
        }
        if bit {
            self.bytes[byte] |= 0x80 >> (self.bits % 8);
        }
        self.bits += 1;
    }

    /// Push the low `count` bits of `value`, high bit first.
    pub fn push_bits(&mut self, value: u128, count: u64) {
        for i in (0..count).rev() {
            self.push_bit((value >> i) & 1 == 1);
        }
    }

    /// Push `count` bits of `bytes` starting at bit `start`.
    pub fn push_slice(&mut self, bytes: &[u8], start: u64, count: u64) {
        for i in start..start + count {
            self.push_bit(bit_at(bytes, i));
        }
    }
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "bit offsets address in-memory buffers"
)]
fn byte_index(bit: u64) -> usize {
    (bit / 8) as usize
}

fn bit_at(bytes: &[u8], index: u64) -> bool {
    bytes
        .get(byte_index(index))
        .is_some_and(|b| (b >> (7 - index % 8)) & 1 == 1)
}

fn read_bits(bytes: &[u8], start: u64, count: u64) -> u128 {
    let mut value = 0u128;
    for i in start..start + count.min(128) {
        value = (value << 1) | u128::from(bit_at(bytes, i));
    }
    value
}

fn swap_bytes(value: u128, byte_count: u64) -> u128 {
    let mut out = 0u128;
    for i in 0..byte_count {
        let byte = (value >> (8 * i)) & 0xFF;
        out = (out << 8) | byte;
    }
    out
}

impl fmt::Display for BinaryShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<<")?;
        for (i, seg) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            let ty = match seg.spec.ty {
                SegmentType::Integer => "integer",
                SegmentType::Float => "float",
                SegmentType::Binary => "binary",
            };
            match seg.size {
                ShapeSize::Bits(bits) => write!(f, "{ty}:{bits}")?,
                ShapeSize::Operand(n) => write!(f, "{ty}:arg{n}*{}", seg.spec.unit)?,
                ShapeSize::Segment(n) => write!(f, "{ty}:seg{n}*{}", seg.spec.unit)?,
                ShapeSize::Rest => write!(f, "{ty}:rest")?,
            }
            if seg.spec.signed {
                f.write_str("-signed")?;
            }
            if seg.spec.endian == Endianness::Little {
                f.write_str("-little")?;
            }
        }
        f.write_str(">>")
    }
}
