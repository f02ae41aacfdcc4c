//! Windows audio endpoint enumeration via the MMDevice API.
//!
//! Wraps `IMMDeviceEnumerator` to list capture endpoints as
//! [`RoutedDevice`]s with friendly names, transport types and the shared-mode
//! mix rate.

use windows::core::*;
use windows::Win32::Devices::FunctionDiscovery::*;
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;

use adaptive_capture_core::models::audio_models::{AudioTransportType, RoutedDevice};
use adaptive_capture_core::models::error::CaptureError;

use crate::com::ensure_mta;

/// Audio endpoint enumerator using the Windows MMDevice API.
pub struct DeviceEnumerator {
    enumerator: IMMDeviceEnumerator,
}

impl DeviceEnumerator {
    /// Joins the MTA on the calling thread if needed.
    pub fn new() -> std::result::Result<Self, CaptureError> {
        ensure_mta().map_err(CaptureError::Device)?;
        unsafe {
            let enumerator: IMMDeviceEnumerator =
                CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL).map_err(|e| {
                    CaptureError::Device(format!("failed to create enumerator: {}", e))
                })?;
            Ok(Self { enumerator })
        }
    }

    pub fn raw(&self) -> &IMMDeviceEnumerator {
        &self.enumerator
    }

    /// Active capture endpoints.
    pub fn list_capture_devices(&self) -> std::result::Result<Vec<RoutedDevice>, CaptureError> {
        unsafe {
            let collection = self
                .enumerator
                .EnumAudioEndpoints(eCapture, DEVICE_STATE_ACTIVE)
                .map_err(|e| CaptureError::Device(format!("EnumAudioEndpoints failed: {}", e)))?;

            let count = collection
                .GetCount()
                .map_err(|e| CaptureError::Device(format!("GetCount failed: {}", e)))?;

            let mut devices = Vec::new();
            for i in 0..count {
                let Ok(device) = collection.Item(i) else {
                    continue;
                };
                if let Some(described) = Self::describe(&device) {
                    devices.push(described);
                }
            }
            Ok(devices)
        }
    }

    /// Endpoint for a data flow and role, or a specific endpoint by ID.
    pub fn endpoint(
        &self,
        flow: EDataFlow,
        role: ERole,
        device_id: Option<&str>,
    ) -> std::result::Result<IMMDevice, String> {
        unsafe {
            match device_id {
                Some(id) => {
                    let wide: Vec<u16> = id.encode_utf16().chain(std::iter::once(0)).collect();
                    self.enumerator
                        .GetDevice(PCWSTR(wide.as_ptr()))
                        .map_err(|e| format!("GetDevice({}) failed: {}", id, e))
                }
                None => self
                    .enumerator
                    .GetDefaultAudioEndpoint(flow, role)
                    .map_err(|e| format!("GetDefaultAudioEndpoint failed: {}", e)),
            }
        }
    }

    /// Shared-mode mix rate of an endpoint.
    pub fn mix_rate(device: &IMMDevice) -> Option<u32> {
        unsafe {
            let client: IAudioClient = device.Activate(CLSCTX_ALL, None).ok()?;
            let format = client.GetMixFormat().ok()?;
            let rate = (*format).nSamplesPerSec;
            CoTaskMemFree(Some(format as *const _));
            Some(rate)
        }
    }

    /// ID, friendly name, transport type and mix rate of an endpoint.
    pub fn describe(device: &IMMDevice) -> Option<RoutedDevice> {
        unsafe {
            let id = device.GetId().ok()?.to_string().ok()?;
            let name = friendly_name(device)
                .unwrap_or_else(|| id.clone());
            Some(RoutedDevice {
                id,
                name,
                transport_type: Some(detect_transport_type(device)),
                sample_rates: Self::mix_rate(device).into_iter().collect(),
            })
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

fn friendly_name(device: &IMMDevice) -> Option<String> {
    unsafe {
        let store = device.OpenPropertyStore(STGM_READ).ok()?;
        non_empty(store.GetValue(&PKEY_Device_FriendlyName).ok()?.to_string())
    }
}

fn enumerator_name(device: &IMMDevice) -> Option<String> {
    unsafe {
        let store = device.OpenPropertyStore(STGM_READ).ok()?;
        non_empty(store.GetValue(&PKEY_Device_EnumeratorName).ok()?.to_string())
    }
}

/// Classify the endpoint by the bus enumerator that exposed it.
fn detect_transport_type(device: &IMMDevice) -> AudioTransportType {
    let Some(enumerator_name) = enumerator_name(device) else {
        return AudioTransportType::Unknown;
    };
    if enumerator_name.contains("BTHLEENUM") {
        AudioTransportType::BluetoothLE
    } else if enumerator_name.contains("BTHENUM") {
        AudioTransportType::Bluetooth
    } else if enumerator_name.contains("USB") {
        AudioTransportType::Usb
    } else if enumerator_name.contains("SWD") || enumerator_name.contains("ROOT") {
        AudioTransportType::Virtual
    } else {
        AudioTransportType::BuiltIn
    }
}
