pub mod candidates;
pub mod device_handle;
pub mod negotiator;
