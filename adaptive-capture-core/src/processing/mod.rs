pub mod frame_buffer;
pub mod level;
pub mod pcm;
pub mod resampler;
pub mod ring_buffer;
