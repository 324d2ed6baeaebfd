use std::io;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::{Deserialize, FRAME_LEN_SIZE, FrameLen, MAX_FRAME_LEN};

/// The receiving end handle of the communication.
///
/// Frames are read into an inner buffer of `u32` words so that the `f32` tails of the
/// data messages can be reinterpreted in place.
pub struct OnoReceiver<R: AsyncRead + Unpin> {
    rx: R,
    buf: Vec<u32>,
}

impl<R: AsyncRead + Unpin> OnoReceiver<R> {
    /// Creates a new `OnoReceiver` instance.
    ///
    /// # Arguments
    /// * `rx` - The underlying reader.
    pub(super) fn new(rx: R) -> Self {
        Self {
            rx,
            buf: Vec::new(),
        }
    }

    /// Waits to receive a new message from the inner receiver.
    ///
    /// The returned `T` borrows from the inner buffer, so it must be dropped (or copied
    /// out of) before receiving again.
    ///
    /// # Returns
    /// A result object that returns `T` on success or `io::Error` on failure.
    pub async fn recv<'a, T: Deserialize<'a>>(&'a mut self) -> io::Result<T> {
        let Self { rx, buf } = self;

        let mut size_buf = [0; FRAME_LEN_SIZE];
        rx.read_exact(&mut size_buf).await?;
        let len = FrameLen::from_be_bytes(size_buf) as usize;

        if len > MAX_FRAME_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Frame of {len} bytes exceeds the maximum of {MAX_FRAME_LEN}"),
            ));
        }

        buf.clear();
        buf.resize(len.div_ceil(size_of::<u32>()), 0);

        let view: &'a mut [u8] = bytemuck::cast_slice_mut(buf.as_mut_slice());
        let slice = &mut view[..len];
        rx.read_exact(slice).await?;

        T::deserialize(slice)
    }
}
