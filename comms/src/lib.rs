//! Framed message passing between a master and its workers.
//!
//! Every frame is a big endian `u64` length followed by the serialized message. Data messages
//! end in a raw `f32` tail that is written and read without copying it into the frame buffer.

mod deserialize;
pub mod msg;
mod receiver;
mod sender;
mod serialize;
pub mod specs;

use tokio::io::{AsyncRead, AsyncWrite};

pub use deserialize::Deserialize;
pub use receiver::OnoReceiver;
pub use sender::OnoSender;
pub use serialize::Serialize;

type FrameLen = u64;
const FRAME_LEN_SIZE: usize = size_of::<FrameLen>();

/// Frames above this size are rejected on both ends.
const MAX_FRAME_LEN: usize = 1 << 30;

/// Wraps the two halves of a stream into the receiving and sending ends of a link.
pub fn channel<R, W>(rx: R, tx: W) -> (OnoReceiver<R>, OnoSender<W>)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    (OnoReceiver::new(rx), OnoSender::new(tx))
}
