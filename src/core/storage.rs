//! Byte-level helpers for the versioned counter image format: little-endian
//! scalars, tagged chunks, and LZ4 block compression.

use std::io::{self, Read, Write};

/// Leading magic of a counter image.
pub const MAGIC: &[u8; 8] = b"EMBERS01";

/// Current counter image version.
pub const VERSION_V1: u32 = 1;

/// LZ4 block compression.
pub fn compress_lz4(data: &[u8]) -> Vec<u8> {
    lz4_flex::compress(data)
}

/// LZ4 block decompression; the caller supplies the expected plain size.
pub fn decompress_lz4(data: &[u8], uncompressed_len: usize) -> io::Result<Vec<u8>> {
    lz4_flex::decompress(data, uncompressed_len).map_err(|e| {
        io::Error::new(io::ErrorKind::InvalidData, format!("lz4 decompress failed: {e}"))
    })
}

/// Writer that discards bytes and only counts them, for exact size probes
/// without buffering a whole image.
#[derive(Debug, Default)]
pub struct CountingWriter {
    written: usize,
}

impl CountingWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn written(&self) -> usize {
        self.written
    }
}

impl Write for CountingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub fn write_u32_le<W: Write>(w: &mut W, value: u32) -> io::Result<()> {
    w.write_all(&value.to_le_bytes())
}

pub fn read_exact<const N: usize, R: Read>(r: &mut R) -> io::Result<[u8; N]> {
    let mut buf = [0u8; N];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

pub fn read_u32_le<R: Read>(r: &mut R) -> io::Result<u32> {
    Ok(u32::from_le_bytes(read_exact::<4, _>(r)?))
}

fn chunk_len(len: usize) -> io::Result<u32> {
    u32::try_from(len)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "chunk payload too large"))
}

/// Write one plain chunk: 4-byte tag, u32 payload length, payload.
pub fn write_chunk<W: Write>(w: &mut W, tag: [u8; 4], payload: &[u8]) -> io::Result<()> {
    w.write_all(&tag)?;
    write_u32_le(w, chunk_len(payload.len())?)?;
    w.write_all(payload)
}

/// Write one compressed chunk: 4-byte tag, u32 total length, then a u32
/// uncompressed length followed by the LZ4 block.
pub fn write_chunk_lz4<W: Write>(w: &mut W, tag: [u8; 4], payload: &[u8]) -> io::Result<()> {
    let compressed = compress_lz4(payload);
    w.write_all(&tag)?;
    write_u32_le(w, chunk_len(4 + compressed.len())?)?;
    write_u32_le(w, chunk_len(payload.len())?)?;
    w.write_all(&compressed)
}

/// Read the next chunk's tag and payload length. `UnexpectedEof` at a chunk
/// boundary means a clean end of image.
pub fn read_chunk_header<R: Read>(r: &mut R) -> io::Result<([u8; 4], u32)> {
    let tag = read_exact::<4, _>(r)?;
    let len = read_u32_le(r)?;
    Ok((tag, len))
}

/// Read and decompress the payload of a chunk written by [`write_chunk_lz4`],
/// given the length from its header.
pub fn read_chunk_lz4<R: Read>(r: &mut R, len: u32) -> io::Result<Vec<u8>> {
    let len = len as usize;
    if len < 4 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "compressed chunk shorter than its length prefix",
        ));
    }
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    let uncompressed_len = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    decompress_lz4(&buf[4..], uncompressed_len)
}

/// Drain a chunk payload without interpreting it.
pub fn skip_chunk<R: Read>(r: &mut R, len: u32) -> io::Result<()> {
    let mut take = r.take(u64::from(len));
    io::copy(&mut take, &mut io::sink())?;
    Ok(())
}
