//! Input device selection
//!
//! The pipeline captures from the default input device at a fixed rate and
//! channel count; there is no runtime device switching.

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::SampleFormat;

use crate::error::CaptureError;

/// Wrapper around a cpal input device.
pub struct InputDevice {
    inner: cpal::Device,
    pub name: String,
}

impl InputDevice {
    /// Get the default input device of the default host.
    pub fn default_input() -> Result<Self, CaptureError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| CaptureError::DeviceNotFound("no default input device".to_string()))?;
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        Ok(Self { inner: device, name })
    }

    pub fn into_inner(self) -> cpal::Device {
        self.inner
    }

    /// Pick a stream config for the requested rate and mono capture.
    ///
    /// Prefers a native i16 config; falls back to f32 (converted in the
    /// callback). Errors if the device supports neither at the rate.
    pub fn negotiate_config(
        &self,
        sample_rate: u32,
        channels: u16,
    ) -> Result<(cpal::StreamConfig, SampleFormat), CaptureError> {
        let rate = cpal::SampleRate(sample_rate);
        let supported = self
            .inner
            .supported_input_configs()
            .map_err(|e| CaptureError::StreamError(e.to_string()))?
            .collect::<Vec<_>>();

        for preferred in [SampleFormat::I16, SampleFormat::F32] {
            if let Some(range) = supported.iter().find(|range| {
                range.sample_format() == preferred
                    && range.channels() == channels
                    && range.min_sample_rate() <= rate
                    && rate <= range.max_sample_rate()
            }) {
                let config = range.with_sample_rate(rate).config();
                return Ok((config, preferred));
            }
        }

        Err(CaptureError::UnsupportedFormat(format!(
            "{}: no i16/f32 input config at {} Hz, {} channel(s)",
            self.name, sample_rate, channels
        )))
    }
}
