pub mod audio_capture;
pub(crate) mod capture_loop;
pub mod reconfigure;
pub mod silence;
