//! Wire-format vectors for the compact-form primitives.

use blink_compact::compact::{self, Decimal};
use blink_compact::stream::{self, InputBuffer, OutputBuffer, VecStream};
use blink_compact::vlc;

fn encoded(encode: impl FnOnce(&mut VecStream)) -> Vec<u8> {
    let mut out = VecStream::new();
    encode(&mut out);
    out.into_inner()
}

#[test]
fn test_unsigned_vectors() {
    assert_eq!(
        vec![0x00],
        encoded(|out| compact::encode_u8(0, out).unwrap())
    );
    assert_eq!(
        vec![0x7f],
        encoded(|out| compact::encode_u8(127, out).unwrap())
    );
    assert_eq!(
        vec![0x80, 0x02],
        encoded(|out| compact::encode_u8(128, out).unwrap())
    );
    assert_eq!(
        vec![0xbf, 0x03],
        encoded(|out| compact::encode_u8(255, out).unwrap())
    );
    assert_eq!(
        vec![0xc2, 0xff, 0xff],
        encoded(|out| compact::encode_u16(65_535, out).unwrap())
    );
    assert_eq!(
        vec![0xc4, 0xff, 0xff, 0xff, 0xff],
        encoded(|out| compact::encode_u32(u32::MAX, out).unwrap())
    );
    assert_eq!(
        vec![0xc8, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff],
        encoded(|out| compact::encode_u64(u64::MAX, out).unwrap())
    );
}

#[test]
fn test_signed_vectors() {
    assert_eq!(
        vec![0x3f],
        encoded(|out| compact::encode_i8(63, out).unwrap())
    );
    assert_eq!(
        vec![0x40],
        encoded(|out| compact::encode_i8(-64, out).unwrap())
    );
    assert_eq!(
        vec![0xbf, 0xfe],
        encoded(|out| compact::encode_i8(-65, out).unwrap())
    );
    assert_eq!(
        vec![0x80, 0xfe],
        encoded(|out| compact::encode_i8(i8::MIN, out).unwrap())
    );
    assert_eq!(
        vec![0xbf, 0x01],
        encoded(|out| compact::encode_i8(i8::MAX, out).unwrap())
    );
    assert_eq!(
        vec![0xc2, 0x00, 0x80],
        encoded(|out| compact::encode_i16(i16::MIN, out).unwrap())
    );
    assert_eq!(
        vec![0xc2, 0xff, 0x7f],
        encoded(|out| compact::encode_i16(i16::MAX, out).unwrap())
    );
}

#[test]
fn test_null_and_present() {
    assert_eq!(vec![0xc0], encoded(|out| compact::encode_null(out).unwrap()));
    assert_eq!(
        vec![0x01],
        encoded(|out| compact::encode_present(out).unwrap())
    );
}

#[test]
fn test_decimal_and_string_vectors() {
    assert_eq!(
        vec![0x00, 0x00],
        encoded(|out| compact::encode_decimal(
            Decimal {
                mantissa: 0,
                exponent: 0
            },
            out
        )
        .unwrap())
    );
    assert_eq!(
        vec![0x03, 0x49, 0x42, 0x4d],
        encoded(|out| compact::encode_string(b"IBM", out).unwrap())
    );
}

#[test]
fn test_sign_extension_of_non_minimal_forms() {
    // -128 sent as a three-byte i16 still sign extends
    let mut input = InputBuffer::new(&[0xc2, 0x80, 0xff]);
    assert_eq!(Some(-128), compact::decode_i16(&mut input).unwrap());
}

#[test]
fn test_unsigned_boundary_grid() {
    let boundaries: [(u64, usize); 10] = [
        (127, 1),
        (128, 2),
        (16_383, 2),
        (16_384, 3),
        (0xffff, 3),
        (0x1_0000, 4),
        (0xff_ffff, 4),
        (0x100_0000, 5),
        (0xffff_ffff, 5),
        (0x1_0000_0000, 6),
    ];
    for (value, len) in boundaries {
        let bytes = encoded(|out| compact::encode_u64(value, out).unwrap());
        assert_eq!(len, bytes.len(), "encoded length of {value}");
        let mut input = InputBuffer::new(&bytes);
        assert_eq!(Some(value), compact::decode_u64(&mut input).unwrap());
    }
}

#[test]
fn test_signed_boundary_grid() {
    let boundaries: [(i64, usize); 12] = [
        (63, 1),
        (64, 2),
        (-64, 1),
        (-65, 2),
        (8191, 2),
        (8192, 3),
        (-8192, 2),
        (-8193, 3),
        (32_767, 3),
        (-32_768, 3),
        (8_388_607, 4),
        (-8_388_608, 4),
    ];
    for (value, len) in boundaries {
        let bytes = encoded(|out| compact::encode_i64(value, out).unwrap());
        assert_eq!(len, bytes.len(), "encoded length of {value}");
        let mut input = InputBuffer::new(&bytes);
        assert_eq!(Some(value), compact::decode_i64(&mut input).unwrap());
    }
}

#[test]
fn test_output_buffer_target() {
    let mut buffer = [0u8; 3];
    {
        let mut out = OutputBuffer::new(&mut buffer);
        compact::encode_u16(65_535, &mut out).unwrap();
    }
    assert_eq!([0xc2, 0xff, 0xff], buffer);

    // an exhausted buffer reports failure, not a partial write
    let mut short = [0u8; 2];
    let mut out = OutputBuffer::new(&mut short);
    assert!(compact::encode_u16(65_535, &mut out).is_err());
}

#[test]
fn test_decode_present_accepts_null() {
    let mut input = InputBuffer::new(&[0xc0]);
    assert!(!compact::decode_present(&mut input).unwrap());
    let mut input = InputBuffer::new(&[0x01]);
    assert!(compact::decode_present(&mut input).unwrap());
    let mut input = InputBuffer::new(&[0x02]);
    assert_eq!(
        Err(compact::Error::BadPresence(0x02)),
        compact::decode_present(&mut input)
    );
}

#[test]
fn test_truncated_input() {
    for bytes in [&[0x80u8] as &[u8], &[0xc2, 0xff], &[0xc8]] {
        let mut input = InputBuffer::new(bytes);
        assert_eq!(
            Err(compact::Error::Stream(stream::Error::Eof)),
            compact::decode_u64(&mut input),
            "input {bytes:02x?}"
        );
    }
}

#[test]
fn test_vlc_size_tables() {
    assert_eq!(1, vlc::size_of_unsigned(0x7f));
    assert_eq!(2, vlc::size_of_unsigned(0x80));
    assert_eq!(2, vlc::size_of_unsigned(0x3fff));
    assert_eq!(3, vlc::size_of_unsigned(0x4000));
    assert_eq!(9, vlc::size_of_unsigned(u64::MAX));

    assert_eq!(1, vlc::size_of_signed(-64));
    assert_eq!(2, vlc::size_of_signed(-65));
    assert_eq!(2, vlc::size_of_signed(8191));
    assert_eq!(3, vlc::size_of_signed(8192));
    assert_eq!(9, vlc::size_of_signed(i64::MIN));
}
