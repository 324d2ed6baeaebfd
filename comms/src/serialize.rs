/// Types that can be written into a frame.
///
/// The fixed part of the message is appended to `buf`, a trailing slice that can be
/// sent without copying is returned separately.
pub trait Serialize<'a> {
    fn serialize(&'a self, buf: &mut Vec<u8>) -> Option<&'a [u8]>;
}
