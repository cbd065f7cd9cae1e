use std::{error, fmt};

/// Largest byte count a single stream operation will accept.
pub const MAX_IO_LEN: usize = i32::MAX as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    Eof,
    Overflow,
    NotReadable,
    NotWritable,
    NotSeekable,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Eof => "unexpected end of stream",
            Self::Overflow => "stream operation exceeds bounds",
            Self::NotReadable => "stream is not readable",
            Self::NotWritable => "stream is not writable",
            Self::NotSeekable => "stream is not seekable",
        })
    }
}

impl error::Error for Error {}

/// A byte-oriented cursor shared by every encoder and decoder in this
/// crate. Operations are all-or-nothing: a short read or write reports
/// failure and transfers nothing.
///
/// Implement this directly to feed the codec from a socket, a ring
/// buffer, or any other source; such implementations may leave the
/// default `peek`/`seek_set`/`seek_cur` bodies in place when the
/// underlying transport cannot rewind.
pub trait Stream {
    fn read(&mut self, _out: &mut [u8]) -> Result<(), Error> {
        Err(Error::NotReadable)
    }

    fn write(&mut self, _input: &[u8]) -> Result<(), Error> {
        Err(Error::NotWritable)
    }

    fn peek(&mut self) -> Result<u8, Error> {
        Err(Error::NotReadable)
    }

    fn tell(&self) -> u64;

    fn seek_set(&mut self, _pos: u64) -> Result<(), Error> {
        Err(Error::NotSeekable)
    }

    fn seek_cur(&mut self, _offset: i64) -> Result<(), Error> {
        Err(Error::NotSeekable)
    }

    fn read_u8(&mut self) -> Result<u8, Error> {
        let mut byte = [0u8];
        self.read(&mut byte)?;
        Ok(byte[0])
    }
}

/// Read-only cursor over a borrowed buffer.
#[derive(Debug, Clone)]
pub struct InputBuffer<'input> {
    data: &'input [u8],
    pos: usize,
}

impl<'input> InputBuffer<'input> {
    #[must_use]
    pub fn new(data: &'input [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

impl Stream for InputBuffer<'_> {
    fn read(&mut self, out: &mut [u8]) -> Result<(), Error> {
        if out.len() > MAX_IO_LEN {
            return Err(Error::Overflow);
        }
        let end = self.pos + out.len();
        let src = self.data.get(self.pos..end).ok_or(Error::Eof)?;
        out.copy_from_slice(src);
        self.pos = end;
        Ok(())
    }

    fn peek(&mut self) -> Result<u8, Error> {
        self.data.get(self.pos).copied().ok_or(Error::Eof)
    }

    fn tell(&self) -> u64 {
        self.pos as u64
    }

    fn seek_set(&mut self, pos: u64) -> Result<(), Error> {
        if pos > self.data.len() as u64 {
            return Err(Error::Overflow);
        }
        self.pos = pos as usize;
        Ok(())
    }

    fn seek_cur(&mut self, offset: i64) -> Result<(), Error> {
        let pos = (self.pos as i64).checked_add(offset).ok_or(Error::Overflow)?;
        if pos < 0 {
            return Err(Error::Overflow);
        }
        self.seek_set(pos as u64)
    }
}

/// Bounded writer over a borrowed buffer.
#[derive(Debug)]
pub struct OutputBuffer<'output> {
    data: &'output mut [u8],
    pos: usize,
}

impl<'output> OutputBuffer<'output> {
    #[must_use]
    pub fn new(data: &'output mut [u8]) -> Self {
        Self { data, pos: 0 }
    }
}

impl Stream for OutputBuffer<'_> {
    fn write(&mut self, input: &[u8]) -> Result<(), Error> {
        if input.len() > MAX_IO_LEN {
            return Err(Error::Overflow);
        }
        let end = self.pos + input.len();
        let dst = self.data.get_mut(self.pos..end).ok_or(Error::Overflow)?;
        dst.copy_from_slice(input);
        self.pos = end;
        Ok(())
    }

    fn tell(&self) -> u64 {
        self.pos as u64
    }

    fn seek_set(&mut self, pos: u64) -> Result<(), Error> {
        if pos > self.data.len() as u64 {
            return Err(Error::Overflow);
        }
        self.pos = pos as usize;
        Ok(())
    }

    fn seek_cur(&mut self, offset: i64) -> Result<(), Error> {
        let pos = (self.pos as i64).checked_add(offset).ok_or(Error::Overflow)?;
        if pos < 0 {
            return Err(Error::Overflow);
        }
        self.seek_set(pos as u64)
    }
}

/// Growable owned writer, the convenient target for whole-message
/// encoding (the length-prefixed framing of dynamic groups needs the
/// payload in hand before the prefix can be written).
#[derive(Debug, Default, Clone)]
pub struct VecStream {
    data: Vec<u8>,
    pos: usize,
}

impl VecStream {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

impl Stream for VecStream {
    fn write(&mut self, input: &[u8]) -> Result<(), Error> {
        if input.len() > MAX_IO_LEN || self.data.len() + input.len() > MAX_IO_LEN {
            return Err(Error::Overflow);
        }
        let end = self.pos + input.len();
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[self.pos..end].copy_from_slice(input);
        self.pos = end;
        Ok(())
    }

    fn tell(&self) -> u64 {
        self.pos as u64
    }

    fn seek_set(&mut self, pos: u64) -> Result<(), Error> {
        if pos > self.data.len() as u64 {
            return Err(Error::Overflow);
        }
        self.pos = pos as usize;
        Ok(())
    }

    fn seek_cur(&mut self, offset: i64) -> Result<(), Error> {
        let pos = (self.pos as i64).checked_add(offset).ok_or(Error::Overflow)?;
        if pos < 0 {
            return Err(Error::Overflow);
        }
        self.seek_set(pos as u64)
    }
}

#[test]
fn test_input_buffer_read() {
    let data = [0u8, 1, 2, 3, 4];
    let mut s = InputBuffer::new(&data);
    let mut out = [0u8; 2];
    s.read(&mut out).unwrap();
    assert_eq!([0, 1], out);
    assert_eq!(2, s.tell());
    assert_eq!(2, s.peek().unwrap());
    assert_eq!(2, s.read_u8().unwrap());

    let mut big = [0u8; 3];
    assert_eq!(Err(Error::Eof), s.read(&mut big));
    assert_eq!(3, s.tell());

    s.seek_set(4).unwrap();
    assert_eq!(4, s.read_u8().unwrap());
    assert_eq!(Err(Error::Eof), s.peek());
    s.seek_cur(-5).unwrap();
    assert_eq!(0, s.read_u8().unwrap());
    assert_eq!(Err(Error::Overflow), s.seek_cur(-2));
}

#[test]
fn test_input_buffer_not_writable() {
    let data = [0u8; 4];
    let mut s = InputBuffer::new(&data);
    assert_eq!(Err(Error::NotWritable), s.write(&[1]));
}

#[test]
fn test_output_buffer_write() {
    let mut data = [0u8; 4];
    let mut s = OutputBuffer::new(&mut data);
    s.write(&[1, 2]).unwrap();
    s.write(&[3, 4]).unwrap();
    assert_eq!(4, s.tell());
    assert_eq!(Err(Error::Overflow), s.write(&[5]));
    assert_eq!([1, 2, 3, 4], data);
}

#[test]
fn test_output_buffer_rewrite() {
    let mut data = [0u8; 4];
    {
        let mut s = OutputBuffer::new(&mut data);
        s.write(&[1, 2, 3, 4]).unwrap();
        s.seek_set(1).unwrap();
        s.write(&[9]).unwrap();
        assert_eq!(2, s.tell());
    }
    assert_eq!([1, 9, 3, 4], data);
}

#[test]
fn test_vec_stream() {
    let mut s = VecStream::new();
    s.write(&[1, 2, 3]).unwrap();
    assert_eq!(3, s.tell());
    s.seek_set(1).unwrap();
    s.write(&[9]).unwrap();
    s.seek_cur(1).unwrap();
    s.write(&[7]).unwrap();
    assert_eq!(&[1, 9, 3, 7], s.as_slice());
}
