//! Audio capture and playback pipelines.

pub mod capture;
pub mod frame;
pub mod playback;
pub mod ring_buffer;
