use serde::{Deserialize, Serialize};
use std::fmt;

/// Sample encoding of an audio stream
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Encoding {
    /// Signed linear PCM
    PcmSigned,
    /// Unsigned linear PCM
    PcmUnsigned,
    /// IEEE float PCM
    PcmFloat,
    /// Compressed or container-specific encoding, named by codec
    Encoded(String),
}

impl Encoding {
    pub fn name(&self) -> &str {
        match self {
            Encoding::PcmSigned => "PCM_SIGNED",
            Encoding::PcmUnsigned => "PCM_UNSIGNED",
            Encoding::PcmFloat => "PCM_FLOAT",
            Encoding::Encoded(codec) => codec,
        }
    }
}

/// Audio format descriptor, for both encoded sources and decoded PCM
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AudioFormat {
    pub encoding: Encoding,
    pub sample_rate: u32,
    pub sample_size_bits: u16,
    pub channels: u16,
    pub big_endian: bool,
}

impl AudioFormat {
    pub fn new(encoding: Encoding, sample_rate: u32, sample_size_bits: u16, channels: u16, big_endian: bool) -> Self {
        Self {
            encoding,
            sample_rate,
            sample_size_bits,
            channels,
            big_endian,
        }
    }

    /// Signed 16-bit little-endian PCM, the format every decoded stream uses
    pub fn pcm_s16le(sample_rate: u32, channels: u16) -> Self {
        Self::new(Encoding::PcmSigned, sample_rate, 16, channels, false)
    }

    /// Bytes per frame (one sample for every channel)
    pub fn frame_size(&self) -> usize {
        self.channels as usize * ((self.sample_size_bits as usize + 7) / 8)
    }

    /// Bytes of audio per second of playback
    pub fn byte_rate(&self) -> u64 {
        self.sample_rate as u64 * self.frame_size() as u64
    }

    /// Round a byte count down to a whole number of frames
    pub fn align_down(&self, bytes: usize) -> usize {
        match self.frame_size() {
            0 => bytes,
            frame => bytes - bytes % frame,
        }
    }

    pub fn key(&self) -> FormatKey {
        FormatKey::from(self)
    }

    /// Get a human-readable format description
    pub fn format_description(&self) -> String {
        format!(
            "{} - {}-bit/{} Hz - {} channel{}",
            self.encoding.name(),
            self.sample_size_bits,
            self.sample_rate,
            self.channels,
            if self.channels == 1 { "" } else { "s" }
        )
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_description())
    }
}

/// Identity of a line format: two formats with the same key can share an output line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FormatKey {
    pub sample_rate: u32,
    pub channels: u16,
}

impl From<&AudioFormat> for FormatKey {
    fn from(format: &AudioFormat) -> Self {
        Self {
            sample_rate: format.sample_rate,
            channels: format.channels,
        }
    }
}

impl fmt::Display for FormatKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[channel:{},sampleRate:{}]", self.channels, self.sample_rate)
    }
}

/// How often a track is replayed after its first pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Looping {
    /// Play once and stop
    #[default]
    Off,
    /// Replay this many more times
    Times(u32),
    /// Replay until stopped
    Forever,
}

impl Looping {
    /// Consume one replay. Returns false when no replay is left.
    pub fn take_replay(&mut self) -> bool {
        match *self {
            Looping::Off | Looping::Times(0) => {
                *self = Looping::Off;
                false
            }
            Looping::Times(n) => {
                *self = if n == 1 { Looping::Off } else { Looping::Times(n - 1) };
                true
            }
            Looping::Forever => true,
        }
    }

    /// Signed loop count: -1 for unbounded looping
    pub fn as_count(&self) -> i32 {
        match self {
            Looping::Off => 0,
            Looping::Times(n) => (*n).min(i32::MAX as u32) as i32,
            Looping::Forever => -1,
        }
    }
}

impl From<i32> for Looping {
    fn from(count: i32) -> Self {
        match count {
            -1 => Looping::Forever,
            n if n > 0 => Looping::Times(n as u32),
            _ => Looping::Off,
        }
    }
}

/// Snapshot of the streaming player's transport state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlaybackStatus {
    pub running: bool,
    pub playing: bool,
    pub paused: bool,
    pub looping: Looping,
}

impl PlaybackStatus {
    /// Short label for status displays
    pub fn label(&self) -> &'static str {
        match (self.running, self.playing, self.paused) {
            (false, _, _) => "destroyed",
            (true, true, true) => "paused",
            (true, true, false) => "playing",
            (true, false, _) => "stopped",
        }
    }
}
