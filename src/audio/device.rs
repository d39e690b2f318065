use std::sync::Arc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, SampleRate, Stream, StreamConfig};
use log::{debug, error, warn};

use crate::audio::{GainControl, LineBuffer, MasterGain, Mixer, OutputLine};
use crate::error::AudioError;
use crate::models::{AudioFormat, Encoding};

/// Extra time a drain waits beyond the buffered audio before giving up
const DRAIN_GRACE: Duration = Duration::from_millis(250);

/// Opens cpal output streams as playback lines
#[derive(Debug, Clone, Default)]
pub struct CpalMixer {
    preferred_device: Option<String>,
}

impl CpalMixer {
    /// Mixer on the host's default output device
    pub fn new() -> Self {
        Self::default()
    }

    /// Mixer on a named device, falling back to the default one
    pub fn with_device(device_name: Option<String>) -> Self {
        Self {
            preferred_device: device_name,
        }
    }

    /// Get a list of all available output device names
    pub fn list_devices() -> Result<Vec<String>, AudioError> {
        let host = cpal::default_host();
        let devices = host
            .output_devices()
            .map_err(|e| AudioError::LineUnavailable(format!("Failed to enumerate devices: {}", e)))?;

        Ok(devices.filter_map(|device| device.name().ok()).collect())
    }

    /// Select the preferred device by name, with fallback to the default device
    fn select_device(&self) -> Result<Device, AudioError> {
        let host = cpal::default_host();

        if let Some(name) = &self.preferred_device {
            let found = host
                .output_devices()
                .map_err(|e| AudioError::LineUnavailable(format!("Failed to enumerate devices: {}", e)))?
                .find(|device| device.name().map(|n| &n == name).unwrap_or(false));

            match found {
                Some(device) => return Ok(device),
                None => warn!("Output device '{}' not found, using default device", name),
            }

            return host
                .default_output_device()
                .ok_or_else(|| AudioError::DeviceNotFound { device: name.clone() });
        }

        host.default_output_device()
            .ok_or_else(|| AudioError::LineUnavailable("No default output device available".to_string()))
    }
}

impl Mixer for CpalMixer {
    fn open(&self, format: &AudioFormat, buffer_bytes: usize) -> Result<Box<dyn OutputLine>, AudioError> {
        if format.encoding != Encoding::PcmSigned || format.sample_size_bits != 16 || format.big_endian {
            return Err(AudioError::UnsupportedFormat {
                format: format.format_description(),
            });
        }

        let device = self.select_device()?;
        let line = CpalLine::open(&device, format, buffer_bytes)?;
        Ok(Box::new(line))
    }
}

/// A playback line on one cpal output stream.
///
/// Written PCM goes through a bounded [`LineBuffer`]; the stream callback
/// pulls from it and applies the master gain.
pub struct CpalLine {
    stream: Option<Stream>,
    buffer: Arc<LineBuffer>,
    gain: Arc<MasterGain>,
    // Odd trailing byte of the previous write
    carry: Option<u8>,
    samples: Vec<i16>,
}

impl CpalLine {
    fn open(device: &Device, format: &AudioFormat, buffer_bytes: usize) -> Result<Self, AudioError> {
        let config = StreamConfig {
            channels: format.channels,
            sample_rate: SampleRate(format.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let default_config = device
            .default_output_config()
            .map_err(|e| AudioError::LineUnavailable(format!("Failed to get default config: {}", e)))?;

        let buffer = Arc::new(LineBuffer::new(buffer_bytes / 2, format.channels, format.sample_rate));
        let gain = Arc::new(MasterGain::new());

        let stream = match default_config.sample_format() {
            SampleFormat::F32 => Self::build_stream::<f32>(device, &config, &buffer, &gain)?,
            SampleFormat::I16 => Self::build_stream::<i16>(device, &config, &buffer, &gain)?,
            SampleFormat::U16 => Self::build_stream::<u16>(device, &config, &buffer, &gain)?,
            sample_format => {
                return Err(AudioError::LineUnavailable(format!(
                    "Unsupported device sample format: {:?}",
                    sample_format
                )));
            }
        };

        stream
            .play()
            .map_err(|e| AudioError::LineUnavailable(format!("Failed to start stream: {}", e)))?;
        debug!("Opened output line {} with {} byte buffer", format, buffer_bytes);

        Ok(Self {
            stream: Some(stream),
            buffer,
            gain,
            carry: None,
            samples: Vec::new(),
        })
    }

    /// Create a typed output stream reading from the line buffer
    fn build_stream<T>(
        device: &Device,
        config: &StreamConfig,
        buffer: &Arc<LineBuffer>,
        gain: &Arc<MasterGain>,
    ) -> Result<Stream, AudioError>
    where
        T: cpal::Sample + cpal::SizedSample + Send + 'static,
        T: cpal::FromSample<f32>,
    {
        let buffer = Arc::clone(buffer);
        let gain = Arc::clone(gain);
        let mut scratch: Vec<i16> = Vec::new();

        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    if scratch.len() < data.len() {
                        scratch.resize(data.len(), 0);
                    }
                    let read = buffer.read(&mut scratch[..data.len()]);
                    let factor = gain.linear();

                    for (i, sample) in data.iter_mut().enumerate() {
                        let value = if i < read {
                            scratch[i] as f32 / 32768.0 * factor
                        } else {
                            0.0 // Silence if not enough data
                        };
                        *sample = cpal::Sample::from_sample(value.clamp(-1.0, 1.0));
                    }
                },
                move |err| {
                    error!("Audio stream error: {}", err);
                },
                None,
            )
            .map_err(|e| AudioError::LineUnavailable(format!("Failed to build output stream: {}", e)))
    }
}

impl OutputLine for CpalLine {
    fn write(&mut self, bytes: &[u8]) -> Result<usize, AudioError> {
        if self.stream.is_none() {
            return Err(AudioError::StreamError("line is closed".to_string()));
        }
        if bytes.is_empty() {
            return Ok(0);
        }

        // Reassemble little-endian samples, keeping an odd byte for the next write
        self.samples.clear();
        let mut rest = bytes;
        if let Some(low) = self.carry.take() {
            self.samples.push(i16::from_le_bytes([low, rest[0]]));
            rest = &rest[1..];
        }
        let mut pairs = rest.chunks_exact(2);
        self.samples.extend(pairs.by_ref().map(|pair| i16::from_le_bytes([pair[0], pair[1]])));
        let odd = pairs.remainder().first().copied();

        let mut offset = 0;
        while offset < self.samples.len() {
            let written = self.buffer.write(&self.samples[offset..]);
            if written == 0 {
                return Err(AudioError::StreamError("line closed while writing".to_string()));
            }
            offset += written;
        }
        self.carry = odd;
        Ok(bytes.len())
    }

    fn drain(&mut self) {
        let timeout = self.buffer.buffered_duration() + DRAIN_GRACE;
        if !self.buffer.wait_drained(timeout) {
            warn!("Output line did not drain within {:?}", timeout);
        }
    }

    fn stop(&mut self) {
        if let Some(stream) = &self.stream {
            if let Err(e) = stream.pause() {
                debug!("Failed to pause output stream: {}", e);
            }
        }
    }

    fn close(&mut self) {
        self.buffer.close();
        self.stream = None;
    }

    fn gain_control(&self) -> Option<Arc<dyn GainControl>> {
        let gain: Arc<dyn GainControl> = self.gain.clone();
        Some(gain)
    }
}

impl Drop for CpalLine {
    fn drop(&mut self) {
        self.close();
    }
}
