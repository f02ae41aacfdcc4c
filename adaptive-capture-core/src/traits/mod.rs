pub mod capture_backend;
pub mod capture_delegate;
pub mod capture_device;
pub mod capture_pipeline;
pub mod recognition_sink;
