use bytes::BytesMut;
use prost::Message as _;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::common::{Error, Result};
use crate::protocol::Envelope;

pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Reads one frame. Returns `Ok(None)` when the peer closed the connection
/// cleanly at a frame boundary.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Envelope>>
where
    R: AsyncRead + Unpin,
{
    let mut len_bytes = [0u8; 4];
    let mut filled = 0;
    while filled < len_bytes.len() {
        let n = reader.read(&mut len_bytes[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(Error::Transport(format!(
                "Connection closed inside a frame header after {} bytes",
                filled
            )));
        }
        filled += n;
    }
    let len = u32::from_be_bytes(len_bytes) as usize;
    if len > MAX_FRAME_LEN {
        return Err(Error::FrameTooLarge {
            len,
            limit: MAX_FRAME_LEN,
        });
    }
    let mut buffer = BytesMut::zeroed(len);
    reader.read_exact(&mut buffer).await?;
    let envelope = Envelope::decode(buffer.freeze())?;
    Ok(Some(envelope))
}

pub async fn write_frame<W>(writer: &mut W, envelope: &Envelope) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let payload = envelope.encode_to_vec();
    if payload.len() > MAX_FRAME_LEN {
        return Err(Error::FrameTooLarge {
            len: payload.len(),
            limit: MAX_FRAME_LEN,
        });
    }
    let mut frame = Vec::with_capacity(4 + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(&payload);
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[tokio::test]
    async fn test_frame_over_duplex() {
        let (mut a, mut b) = tokio::io::duplex(1024);
        let envelope = Envelope {
            name: "7".to_string(),
            body: Bytes::from_static(b"payload"),
            from: "tcp://127.0.0.1:1".to_string(),
        };
        write_frame(&mut a, &envelope).await.unwrap();
        write_frame(&mut a, &Envelope::default()).await.unwrap();
        drop(a);

        assert_eq!(read_frame(&mut b).await.unwrap(), Some(envelope));
        assert_eq!(read_frame(&mut b).await.unwrap(), Some(Envelope::default()));
        assert_eq!(read_frame(&mut b).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_rejects_oversized_frame() {
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_all(&(MAX_FRAME_LEN as u32 + 1).to_be_bytes())
            .await
            .unwrap();
        match read_frame(&mut b).await {
            Err(Error::FrameTooLarge { len, .. }) => assert_eq!(len, MAX_FRAME_LEN + 1),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_truncated_header_is_error() {
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_all(&[0u8, 0u8]).await.unwrap();
        drop(a);
        match read_frame(&mut b).await {
            Err(Error::Transport(_)) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_truncated_frame_is_error() {
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_all(&10u32.to_be_bytes()).await.unwrap();
        a.write_all(b"abc").await.unwrap();
        drop(a);
        assert!(read_frame(&mut b).await.is_err());
    }
}
