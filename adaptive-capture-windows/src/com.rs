//! Per-thread COM apartment membership.
//!
//! Devices are opened on the caller's thread during negotiation and then
//! read from the capture thread, so every thread that touches WASAPI joins
//! the multithreaded apartment on first use and leaves it when it exits.

use windows::Win32::System::Com::{CoInitializeEx, CoUninitialize, COINIT_MULTITHREADED};

struct ComApartment {
    error: Option<String>,
}

impl ComApartment {
    fn enter() -> Self {
        // SAFETY: balanced by CoUninitialize in Drop when this succeeds.
        let hr = unsafe { CoInitializeEx(None, COINIT_MULTITHREADED) };
        match hr.ok() {
            Ok(()) => Self { error: None },
            Err(e) => Self {
                error: Some(format!("CoInitializeEx failed: {}", e)),
            },
        }
    }
}

impl Drop for ComApartment {
    fn drop(&mut self) {
        if self.error.is_none() {
            unsafe {
                CoUninitialize();
            }
        }
    }
}

thread_local! {
    static APARTMENT: ComApartment = ComApartment::enter();
}

/// Make sure the current thread is in the MTA.
pub(crate) fn ensure_mta() -> Result<(), String> {
    APARTMENT.with(|apartment| match &apartment.error {
        Some(e) => Err(e.clone()),
        None => Ok(()),
    })
}
