use std::io;

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::{FRAME_LEN_SIZE, FrameLen, MAX_FRAME_LEN, Serialize};

/// The sending end of a link.
///
/// The fixed part of every frame is staged in a reusable buffer, the message's float tail
/// is written straight from the caller's slice.
pub struct OnoSender<W: AsyncWrite + Unpin> {
    tx: W,
    head: Vec<u8>,
}

impl<W: AsyncWrite + Unpin> OnoSender<W> {
    pub(super) fn new(tx: W) -> Self {
        Self {
            tx,
            head: Vec::new(),
        }
    }

    /// Writes `msg` as a single frame and flushes the writer.
    ///
    /// # Errors
    /// `io::ErrorKind::InvalidInput` if the frame is too large, or any error of the writer.
    pub async fn send<'a, T: Serialize<'a>>(&mut self, msg: &'a T) -> io::Result<()> {
        let Self { tx, head } = self;

        head.clear();
        head.resize(FRAME_LEN_SIZE, 0);

        let tail = msg.serialize(head);
        let len = head.len() - FRAME_LEN_SIZE + tail.map_or(0, <[u8]>::len);

        if len > MAX_FRAME_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Frame of {len} bytes exceeds the maximum of {MAX_FRAME_LEN}"),
            ));
        }

        head[..FRAME_LEN_SIZE].copy_from_slice(&(len as FrameLen).to_be_bytes());
        tx.write_all(head).await?;

        if let Some(tail) = tail {
            tx.write_all(tail).await?;
        }

        tx.flush().await
    }
}
