use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};

/// Maximum size of all parts of one message (100MB)
pub const MAX_MESSAGE_SIZE: usize = 100 * 1024 * 1024;

/// Maximum number of parts in one message
pub const MAX_PARTS: u32 = 4096;

/// A message made of one or more byte frames
pub type Multipart = Vec<Vec<u8>>;

/// Write one multipart message
///
/// Layout: 4-byte big-endian part count, then for each part a 4-byte
/// big-endian length followed by the bytes.
pub async fn write_message<W>(writer: &mut W, parts: &[Vec<u8>]) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let count = u32::try_from(parts.len())
        .ok()
        .filter(|count| *count <= MAX_PARTS)
        .ok_or_else(|| Error::InvalidFrame(format!("Too many parts: {}", parts.len())))?;

    let size: usize = parts.iter().map(Vec::len).sum();
    if size > MAX_MESSAGE_SIZE {
        return Err(Error::InvalidFrame(format!("Message too large: {size} bytes")));
    }

    // Encode into one buffer so the message hits the stream in a single write
    let mut buf = Vec::with_capacity(4 + parts.len() * 4 + size);
    buf.extend_from_slice(&count.to_be_bytes());
    for part in parts {
        let len = u32::try_from(part.len())
            .map_err(|_| Error::InvalidFrame(format!("Part too large: {} bytes", part.len())))?;
        buf.extend_from_slice(&len.to_be_bytes());
        buf.extend_from_slice(part);
    }

    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one multipart message
pub async fn read_message<R>(reader: &mut R) -> Result<Multipart>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let count = reader.read_u32().await.map_err(closed_on_eof)?;
    if count > MAX_PARTS {
        return Err(Error::InvalidFrame(format!("Too many parts: {count}")));
    }

    let mut parts = Vec::with_capacity(count as usize);
    let mut size = 0usize;
    for _ in 0..count {
        let len = reader.read_u32().await.map_err(closed_on_eof)? as usize;

        // Validate length before allocating
        size = size.saturating_add(len);
        if size > MAX_MESSAGE_SIZE {
            return Err(Error::InvalidFrame(format!("Message too large: {size} bytes")));
        }

        let mut part = vec![0u8; len];
        reader.read_exact(&mut part).await.map_err(closed_on_eof)?;
        parts.push(part);
    }

    Ok(parts)
}

fn closed_on_eof(error: std::io::Error) -> Error {
    if error.kind() == std::io::ErrorKind::UnexpectedEof {
        Error::ConnectionClosed
    } else {
        error.into()
    }
}
