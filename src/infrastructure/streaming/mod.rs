//! Stream sink implementations

mod channel;
mod recording;

pub use channel::{ChannelStreamer, SseFrame};
pub use recording::RecordingStreamer;
