use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::{message::ACK, HEADER_LEN, MAX_PAYLOAD_LEN};

// the most we reserve for a payload before more of it arrives
const BLOCK_SIZE: usize = 4096;

#[derive(thiserror::Error, Debug)]
pub enum FrameErr {
    #[error("{0}")]
    Io(#[from] tokio::io::Error),

    #[error("Invalid frame header: {0:?}")]
    InvalidHeader(String),

    #[error("Reached eof after {read} out of {expected} bytes")]
    UnexpectedEof { read: usize, expected: usize },

    #[error("Payload is not valid utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("A payload of {0} bytes does not fit in a frame")]
    TooLong(usize),
}

/// Encodes a message as `<8 digits length><payload>`
pub fn encode(text: &str) -> Result<Bytes, FrameErr> {
    let payload = text.as_bytes();
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(FrameErr::TooLong(payload.len()));
    }

    let mut frame = BytesMut::with_capacity(HEADER_LEN + payload.len());
    frame.put_slice(format!("{:0width$}", payload.len(), width = HEADER_LEN).as_bytes());
    frame.put_slice(payload);

    Ok(frame.freeze())
}

/// Reads exactly one message from the reader.
///
/// reaching EOF anywhere before the end of the frame is an error,
/// including before the first byte of the header.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<String, FrameErr> {
    let mut header = [0u8; HEADER_LEN];
    read_exactly(reader, &mut header).await?;
    let length = parse_header(&header)?;

    let mut payload = Vec::new();
    read_payload(reader, &mut payload, length).await?;

    Ok(String::from_utf8(payload)?)
}

/// Writes a single message and flushes the writer
pub async fn write_frame<W>(writer: &mut W, text: &str) -> Result<(), FrameErr>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode(text)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;

    Ok(())
}

pub async fn send_ack<W: AsyncWrite + Unpin>(writer: &mut W) -> Result<(), FrameErr> {
    write_frame(writer, ACK).await
}

// fills the entire buffer, unlike read_exact we keep track of how much
// was read so the error can tell a short frame from an empty connection
async fn read_exactly<R>(reader: &mut R, buf: &mut [u8]) -> Result<(), FrameErr>
where
    R: AsyncRead + Unpin,
{
    let mut rcount = 0;
    while rcount < buf.len() {
        let count = reader.read(&mut buf[rcount..]).await?;
        if count == 0 {
            return Err(FrameErr::UnexpectedEof {
                read: rcount,
                expected: buf.len(),
            });
        }
        rcount += count;
    }

    Ok(())
}

// reads the payload in blocks, the buffer only grows as data arrives
// so a header alone can't make us reserve the declared length
async fn read_payload<R>(
    reader: &mut R,
    payload: &mut Vec<u8>,
    length: usize,
) -> Result<(), FrameErr>
where
    R: AsyncRead + Unpin,
{
    let mut limited = reader.take(length as u64);

    while payload.len() < length {
        payload.reserve(BLOCK_SIZE.min(length - payload.len()));

        let count = limited.read_buf(payload).await?;
        if count == 0 {
            return Err(FrameErr::UnexpectedEof {
                read: payload.len(),
                expected: length,
            });
        }
    }

    Ok(())
}

fn parse_header(header: &[u8]) -> Result<usize, FrameErr> {
    let invalid = || FrameErr::InvalidHeader(String::from_utf8_lossy(header).into_owned());

    if !header.iter().all(u8::is_ascii_digit) {
        return Err(invalid());
    }

    std::str::from_utf8(header)
        .ok()
        .and_then(|digits| digits.parse().ok())
        .ok_or_else(invalid)
}
