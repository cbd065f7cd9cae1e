//! Typed compact-form primitives layered over the VLC codec.
//!
//! Every decoder range-checks against the declared wire type, so an
//! out-of-range value is reported distinctly from the null symbol.

use crate::stream::{self, MAX_IO_LEN, Stream};
use crate::vlc;
use log::debug;
use num_enum::TryFromPrimitive;
use std::{error, fmt};

/// Presence indicator preceding optional fixed-width values. Any byte
/// other than these two is a decode error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum Presence {
    Present = 0x01,
    Null = 0xc0,
}

/// A decimal number as carried on the wire: a signed 64-bit mantissa
/// scaled by ten to the power of a signed 8-bit exponent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decimal {
    pub mantissa: i64,
    pub exponent: i8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    Stream(stream::Error),
    BadVlc(u8),
    /// Decoded value exceeds the declared type.
    OutOfRange,
    /// Boolean wire value other than 0 or 1.
    BadBool,
    /// Presence flag other than 0x01 or 0xc0.
    BadPresence(u8),
    /// Decimal mantissa may not be null when the exponent is present.
    NullMantissa,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stream(err) => err.fmt(f),
            Self::BadVlc(byte) => write!(f, "invalid vlc header byte 0x{byte:02x}"),
            Self::OutOfRange => f.write_str("value out of range for declared type"),
            Self::BadBool => f.write_str("boolean must be 0x00 or 0x01"),
            Self::BadPresence(byte) => {
                write!(f, "presence flag must be 0xc0 or 0x01, got 0x{byte:02x}")
            }
            Self::NullMantissa => f.write_str("decimal mantissa cannot be null"),
        }
    }
}

impl error::Error for Error {}

impl From<stream::Error> for Error {
    fn from(err: stream::Error) -> Self {
        Self::Stream(err)
    }
}

impl From<vlc::Error> for Error {
    fn from(err: vlc::Error) -> Self {
        match err {
            vlc::Error::Stream(err) => Self::Stream(err),
            vlc::Error::BadHeader(byte) => Self::BadVlc(byte),
        }
    }
}

pub fn encode_null(out: &mut dyn Stream) -> Result<(), stream::Error> {
    vlc::encode_null(out)
}

pub fn encode_present(out: &mut dyn Stream) -> Result<(), stream::Error> {
    out.write(&[Presence::Present as u8])
}

pub fn encode_bool(value: bool, out: &mut dyn Stream) -> Result<(), stream::Error> {
    vlc::encode_unsigned(u64::from(value), out)
}

pub fn encode_u8(value: u8, out: &mut dyn Stream) -> Result<(), stream::Error> {
    vlc::encode_unsigned(u64::from(value), out)
}

pub fn encode_u16(value: u16, out: &mut dyn Stream) -> Result<(), stream::Error> {
    vlc::encode_unsigned(u64::from(value), out)
}

pub fn encode_u32(value: u32, out: &mut dyn Stream) -> Result<(), stream::Error> {
    vlc::encode_unsigned(u64::from(value), out)
}

pub fn encode_u64(value: u64, out: &mut dyn Stream) -> Result<(), stream::Error> {
    vlc::encode_unsigned(value, out)
}

pub fn encode_i8(value: i8, out: &mut dyn Stream) -> Result<(), stream::Error> {
    vlc::encode_signed(i64::from(value), out)
}

pub fn encode_i16(value: i16, out: &mut dyn Stream) -> Result<(), stream::Error> {
    vlc::encode_signed(i64::from(value), out)
}

pub fn encode_i32(value: i32, out: &mut dyn Stream) -> Result<(), stream::Error> {
    vlc::encode_signed(i64::from(value), out)
}

pub fn encode_i64(value: i64, out: &mut dyn Stream) -> Result<(), stream::Error> {
    vlc::encode_signed(value, out)
}

/// The raw IEEE-754 bit pattern through the unsigned codec, so `0.0`
/// costs a single byte.
pub fn encode_f64(value: f64, out: &mut dyn Stream) -> Result<(), stream::Error> {
    vlc::encode_unsigned(value.to_bits(), out)
}

/// Exponent first, then mantissa, both signed.
pub fn encode_decimal(value: Decimal, out: &mut dyn Stream) -> Result<(), stream::Error> {
    encode_i8(value.exponent, out)?;
    encode_i64(value.mantissa, out)
}

pub fn encode_binary(value: &[u8], out: &mut dyn Stream) -> Result<(), stream::Error> {
    vlc::encode_unsigned(value.len() as u64, out)?;
    out.write(value)
}

pub fn encode_string(value: &[u8], out: &mut dyn Stream) -> Result<(), stream::Error> {
    encode_binary(value, out)
}

pub fn encode_fixed(value: &[u8], out: &mut dyn Stream) -> Result<(), stream::Error> {
    out.write(value)
}

pub fn encode_optional_fixed(value: &[u8], out: &mut dyn Stream) -> Result<(), stream::Error> {
    encode_present(out)?;
    out.write(value)
}

pub fn decode_bool(input: &mut dyn Stream) -> Result<Option<bool>, Error> {
    match vlc::decode_unsigned(input)? {
        None => Ok(None),
        Some(0) => Ok(Some(false)),
        Some(1) => Ok(Some(true)),
        Some(value) => {
            debug!("W11: boolean must be 0x00 or 0x01, got {value}");
            Err(Error::BadBool)
        }
    }
}

fn out_of_range(value: u64) -> Error {
    debug!("W3: value {value} out of range for declared type");
    Error::OutOfRange
}

fn out_of_range_signed(value: i64) -> Error {
    debug!("W3: value {value} out of range for declared type");
    Error::OutOfRange
}

pub fn decode_u8(input: &mut dyn Stream) -> Result<Option<u8>, Error> {
    match vlc::decode_unsigned(input)? {
        None => Ok(None),
        Some(value) => u8::try_from(value).map(Some).map_err(|_| out_of_range(value)),
    }
}

pub fn decode_u16(input: &mut dyn Stream) -> Result<Option<u16>, Error> {
    match vlc::decode_unsigned(input)? {
        None => Ok(None),
        Some(value) => u16::try_from(value).map(Some).map_err(|_| out_of_range(value)),
    }
}

pub fn decode_u32(input: &mut dyn Stream) -> Result<Option<u32>, Error> {
    match vlc::decode_unsigned(input)? {
        None => Ok(None),
        Some(value) => u32::try_from(value).map(Some).map_err(|_| out_of_range(value)),
    }
}

pub fn decode_u64(input: &mut dyn Stream) -> Result<Option<u64>, Error> {
    Ok(vlc::decode_unsigned(input)?)
}

pub fn decode_i8(input: &mut dyn Stream) -> Result<Option<i8>, Error> {
    match vlc::decode_signed(input)? {
        None => Ok(None),
        Some(value) => i8::try_from(value)
            .map(Some)
            .map_err(|_| out_of_range_signed(value)),
    }
}

pub fn decode_i16(input: &mut dyn Stream) -> Result<Option<i16>, Error> {
    match vlc::decode_signed(input)? {
        None => Ok(None),
        Some(value) => i16::try_from(value)
            .map(Some)
            .map_err(|_| out_of_range_signed(value)),
    }
}

pub fn decode_i32(input: &mut dyn Stream) -> Result<Option<i32>, Error> {
    match vlc::decode_signed(input)? {
        None => Ok(None),
        Some(value) => i32::try_from(value)
            .map(Some)
            .map_err(|_| out_of_range_signed(value)),
    }
}

pub fn decode_i64(input: &mut dyn Stream) -> Result<Option<i64>, Error> {
    Ok(vlc::decode_signed(input)?)
}

pub fn decode_f64(input: &mut dyn Stream) -> Result<Option<f64>, Error> {
    Ok(vlc::decode_unsigned(input)?.map(f64::from_bits))
}

pub fn decode_decimal(input: &mut dyn Stream) -> Result<Option<Decimal>, Error> {
    let Some(exponent) = decode_i8(input)? else {
        return Ok(None);
    };
    match decode_i64(input)? {
        Some(mantissa) => Ok(Some(Decimal { mantissa, exponent })),
        None => {
            debug!("decimal mantissa cannot be null");
            Err(Error::NullMantissa)
        }
    }
}

pub fn decode_binary(input: &mut dyn Stream) -> Result<Option<Vec<u8>>, Error> {
    let Some(len) = vlc::decode_unsigned(input)? else {
        return Ok(None);
    };
    if len > MAX_IO_LEN as u64 {
        return Err(out_of_range(len));
    }
    let mut data = vec![0u8; len as usize];
    input.read(&mut data)?;
    Ok(Some(data))
}

pub fn decode_string(input: &mut dyn Stream) -> Result<Option<Vec<u8>>, Error> {
    decode_binary(input)
}

pub fn decode_fixed(input: &mut dyn Stream, size: u32) -> Result<Vec<u8>, Error> {
    let mut data = vec![0u8; size as usize];
    input.read(&mut data)?;
    Ok(data)
}

pub fn decode_optional_fixed(input: &mut dyn Stream, size: u32) -> Result<Option<Vec<u8>>, Error> {
    if decode_present(input)? {
        Ok(Some(decode_fixed(input, size)?))
    } else {
        Ok(None)
    }
}

/// Reads a presence flag; null means absent.
pub fn decode_present(input: &mut dyn Stream) -> Result<bool, Error> {
    let byte = input.read_u8()?;
    match Presence::try_from(byte) {
        Ok(Presence::Present) => Ok(true),
        Ok(Presence::Null) => Ok(false),
        Err(_) => {
            debug!("W9: presence flag must be 0xc0 or 0x01, got 0x{byte:02x}");
            Err(Error::BadPresence(byte))
        }
    }
}

#[cfg(test)]
use crate::stream::{InputBuffer, VecStream};

#[test]
fn test_bool_round_trip() {
    let mut out = VecStream::new();
    encode_bool(true, &mut out).unwrap();
    encode_bool(false, &mut out).unwrap();
    assert_eq!(&[0x01, 0x00], out.as_slice());

    let mut input = InputBuffer::new(out.as_slice());
    assert_eq!(Some(true), decode_bool(&mut input).unwrap());
    assert_eq!(Some(false), decode_bool(&mut input).unwrap());
}

#[test]
fn test_bool_rejects_other_values() {
    let mut input = InputBuffer::new(&[0x02]);
    assert_eq!(Err(Error::BadBool), decode_bool(&mut input));
    let mut input = InputBuffer::new(&[0x80, 0x02]);
    assert_eq!(Err(Error::OutOfRange), decode_bool(&mut input));
}

#[test]
fn test_unsigned_range_checks() {
    let mut input = InputBuffer::new(&[0xc2, 0x00, 0x01]);
    assert_eq!(Err(Error::OutOfRange), decode_u8(&mut input));
    let mut input = InputBuffer::new(&[0xc3, 0x00, 0x00, 0x01]);
    assert_eq!(Err(Error::OutOfRange), decode_u16(&mut input));
    let mut input = InputBuffer::new(&[0xc5, 0x00, 0x00, 0x00, 0x00, 0x01]);
    assert_eq!(Err(Error::OutOfRange), decode_u32(&mut input));

    let mut input = InputBuffer::new(&[0xc2, 0xff, 0xff]);
    assert_eq!(Some(u16::MAX), decode_u16(&mut input).unwrap());
    let mut input = InputBuffer::new(&[0xc4, 0xff, 0xff, 0xff, 0xff]);
    assert_eq!(Some(u32::MAX), decode_u32(&mut input).unwrap());
    let mut input = InputBuffer::new(&[0xc8, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]);
    assert_eq!(Some(u64::MAX), decode_u64(&mut input).unwrap());
}

#[test]
fn test_signed_range_checks() {
    let mut input = InputBuffer::new(&[0xc2, 0x80, 0xff]);
    assert_eq!(Some(-128i16), decode_i16(&mut input).unwrap());
    let mut input = InputBuffer::new(&[0xc2, 0x80, 0xff]);
    assert_eq!(Err(Error::OutOfRange), decode_i8(&mut input));

    let mut input = InputBuffer::new(&[0xc2, 0x00, 0x80]);
    assert_eq!(Some(i16::MIN), decode_i16(&mut input).unwrap());
    let mut input = InputBuffer::new(&[0xc2, 0xff, 0x7f]);
    assert_eq!(Some(i16::MAX), decode_i16(&mut input).unwrap());
}

#[test]
fn test_null_decodes() {
    let null = [0xc0u8];
    assert_eq!(None, decode_u8(&mut InputBuffer::new(&null)).unwrap());
    assert_eq!(None, decode_i64(&mut InputBuffer::new(&null)).unwrap());
    assert_eq!(None, decode_bool(&mut InputBuffer::new(&null)).unwrap());
    assert_eq!(None, decode_f64(&mut InputBuffer::new(&null)).unwrap());
    assert_eq!(None, decode_decimal(&mut InputBuffer::new(&null)).unwrap());
    assert_eq!(None, decode_binary(&mut InputBuffer::new(&null)).unwrap());
}

#[test]
fn test_f64_round_trip() {
    let mut out = VecStream::new();
    encode_f64(0.0, &mut out).unwrap();
    assert_eq!(&[0x00], out.as_slice());

    for value in [0.0, 1.0, -1.5, f64::MAX, f64::MIN_POSITIVE] {
        let mut out = VecStream::new();
        encode_f64(value, &mut out).unwrap();
        let mut input = InputBuffer::new(out.as_slice());
        assert_eq!(Some(value), decode_f64(&mut input).unwrap());
    }
}

#[test]
fn test_decimal_round_trip() {
    let mut out = VecStream::new();
    encode_decimal(
        Decimal {
            mantissa: 0,
            exponent: 0,
        },
        &mut out,
    )
    .unwrap();
    assert_eq!(&[0x00, 0x00], out.as_slice());

    let value = Decimal {
        mantissa: -12_345,
        exponent: -2,
    };
    let mut out = VecStream::new();
    encode_decimal(value, &mut out).unwrap();
    let mut input = InputBuffer::new(out.as_slice());
    assert_eq!(Some(value), decode_decimal(&mut input).unwrap());
}

#[test]
fn test_decimal_null_mantissa_fails() {
    let mut input = InputBuffer::new(&[0x00, 0xc0]);
    assert_eq!(Err(Error::NullMantissa), decode_decimal(&mut input));
}

#[test]
fn test_string_round_trip() {
    let mut out = VecStream::new();
    encode_string(b"IBM", &mut out).unwrap();
    assert_eq!(&[0x03, 0x49, 0x42, 0x4d], out.as_slice());

    let mut input = InputBuffer::new(out.as_slice());
    assert_eq!(Some(b"IBM".to_vec()), decode_string(&mut input).unwrap());
}

#[test]
fn test_binary_short_data_fails() {
    let mut input = InputBuffer::new(&[0x03, 0x49, 0x42]);
    assert_eq!(
        Err(Error::Stream(stream::Error::Eof)),
        decode_binary(&mut input)
    );
}

#[test]
fn test_fixed() {
    let mut out = VecStream::new();
    encode_fixed(b"abcd", &mut out).unwrap();
    assert_eq!(b"abcd", out.as_slice());

    let mut input = InputBuffer::new(out.as_slice());
    assert_eq!(b"abcd".to_vec(), decode_fixed(&mut input, 4).unwrap());
}

#[test]
fn test_optional_fixed() {
    let mut out = VecStream::new();
    encode_optional_fixed(b"ab", &mut out).unwrap();
    assert_eq!(&[0x01, b'a', b'b'], out.as_slice());

    let mut input = InputBuffer::new(out.as_slice());
    assert_eq!(
        Some(b"ab".to_vec()),
        decode_optional_fixed(&mut input, 2).unwrap()
    );

    let mut input = InputBuffer::new(&[0xc0]);
    assert_eq!(None, decode_optional_fixed(&mut input, 2).unwrap());
}

#[test]
fn test_presence_flag_rejects_other_values() {
    let mut input = InputBuffer::new(&[0x02, 0x00, 0x00]);
    assert_eq!(
        Err(Error::BadPresence(0x02)),
        decode_optional_fixed(&mut input, 2)
    );
}
