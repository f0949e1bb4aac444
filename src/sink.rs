//! Endian-aware byte sink
//!
//! All IFD primitives go through [`ByteSink`], which serializes multi-byte
//! values in the byte order selected for the file and tracks the running
//! write position. The position is authoritative for layout bookkeeping,
//! including sinks that cannot seek.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use std::io::{self, Seek, SeekFrom, Write};

use crate::error::Result;

/// Byte order of a TIFF stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endian {
    /// Big endian, `MM` marker
    #[default]
    Big,
    /// Little endian, `II` marker
    Little,
}

impl Endian {
    /// Two-byte order marker at the start of the file
    pub fn marker(self) -> [u8; 2] {
        match self {
            Endian::Big => *b"MM",
            Endian::Little => *b"II",
        }
    }
}

/// Write-only stream with endian-aware primitives and position tracking
pub struct ByteSink<W> {
    inner: W,
    endian: Endian,
    position: u64,
}

impl<W: Write> ByteSink<W> {
    /// Create a sink writing in the given byte order, position zero
    pub fn new(inner: W, endian: Endian) -> Self {
        ByteSink {
            inner,
            endian,
            position: 0,
        }
    }

    /// Byte order of this sink
    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// Number of bytes written so far (or the seek target after a seek)
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Consume the sink, returning the underlying writer
    pub fn into_inner(self) -> W {
        self.inner
    }

    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.write_bytes(&[value])
    }

    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        let mut buf = [0u8; 2];
        match self.endian {
            Endian::Big => BigEndian::write_u16(&mut buf, value),
            Endian::Little => LittleEndian::write_u16(&mut buf, value),
        }
        self.write_bytes(&buf)
    }

    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        let mut buf = [0u8; 4];
        match self.endian {
            Endian::Big => BigEndian::write_u32(&mut buf, value),
            Endian::Little => LittleEndian::write_u32(&mut buf, value),
        }
        self.write_bytes(&buf)
    }

    pub fn write_i32(&mut self, value: i32) -> Result<()> {
        self.write_u32(value as u32)
    }

    pub fn write_f32(&mut self, value: f32) -> Result<()> {
        self.write_u32(value.to_bits())
    }

    pub fn write_f64(&mut self, value: f64) -> Result<()> {
        let mut buf = [0u8; 8];
        match self.endian {
            Endian::Big => BigEndian::write_f64(&mut buf, value),
            Endian::Little => LittleEndian::write_f64(&mut buf, value),
        }
        self.write_bytes(&buf)
    }

    /// Unsigned rational, numerator then denominator
    pub fn write_rational(&mut self, numerator: u32, denominator: u32) -> Result<()> {
        self.write_u32(numerator)?;
        self.write_u32(denominator)
    }

    /// Signed rational, numerator then denominator
    pub fn write_srational(&mut self, numerator: i32, denominator: i32) -> Result<()> {
        self.write_i32(numerator)?;
        self.write_i32(denominator)
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes)?;
        self.position += bytes.len() as u64;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }
}

impl<W: Write + Seek> ByteSink<W> {
    /// Reposition the sink to an absolute byte offset
    pub fn seek(&mut self, position: u64) -> Result<()> {
        self.inner.seek(SeekFrom::Start(position))?;
        self.position = position;
        Ok(())
    }
}

// Raw `Write` access keeps the position current; external codecs that
// stream directly into the file use this.
impl<W: Write> Write for ByteSink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.position += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
