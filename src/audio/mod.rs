pub mod buffer;
pub mod decoder;
pub mod device;
pub mod gain;

#[cfg(test)]
pub mod tests;

use std::fmt;
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{AudioError, DecodeError};
use crate::models::AudioFormat;

// Re-export the production collaborators
pub use buffer::LineBuffer;
pub use decoder::SymphoniaDecoder;
pub use device::{CpalLine, CpalMixer};
pub use gain::MasterGain;

/// Encoded audio input handed to a decoder
pub enum AudioSource {
    File(PathBuf),
    Bytes(Vec<u8>),
    Reader(Box<dyn Read + Send + Sync>),
}

impl AudioSource {
    /// File extension, used as a probing hint
    pub fn extension(&self) -> Option<String> {
        match self {
            AudioSource::File(path) => path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.to_lowercase()),
            _ => None,
        }
    }
}

impl fmt::Debug for AudioSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioSource::File(path) => f.debug_tuple("File").field(path).finish(),
            AudioSource::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            AudioSource::Reader(_) => f.write_str("Reader(..)"),
        }
    }
}

impl From<PathBuf> for AudioSource {
    fn from(path: PathBuf) -> Self {
        AudioSource::File(path)
    }
}

impl From<Vec<u8>> for AudioSource {
    fn from(bytes: Vec<u8>) -> Self {
        AudioSource::Bytes(bytes)
    }
}

/// A decoded PCM byte stream. `read` returning 0 signals end of data.
pub trait DecodedStream: Read + Send {
    /// Format of the encoded source
    fn base_format(&self) -> &AudioFormat;

    /// Format of the bytes produced by `read`
    fn format(&self) -> &AudioFormat;

    /// Number of decoded frames, when the container reports one
    fn frame_length(&self) -> Option<u64>;
}

/// Converts encoded sources into raw PCM streams
pub trait Decoder: Send + Sync {
    /// Decoded format for a given source format. Pure.
    fn decoded_format(&self, base: &AudioFormat) -> AudioFormat;

    /// Open an encoded source and wrap it in a lazily decoding stream
    fn open(&self, source: AudioSource) -> Result<Box<dyn DecodedStream>, DecodeError>;
}

/// Master gain of an output line, in decibels
pub trait GainControl: Send + Sync {
    fn value(&self) -> f32;

    /// Set the gain; values outside [minimum, maximum] are clamped
    fn set_value(&self, db: f32);

    fn minimum(&self) -> f32;

    fn maximum(&self) -> f32;
}

/// An open playback channel for one format.
///
/// Lines are opened, used and closed on a single thread.
pub trait OutputLine {
    /// Queue bytes for playback, blocking until the line accepts some.
    /// Returns how many bytes were taken; callers retry the remainder.
    fn write(&mut self, bytes: &[u8]) -> Result<usize, AudioError>;

    /// Block until everything written so far has been played
    fn drain(&mut self);

    fn stop(&mut self);

    fn close(&mut self);

    fn gain_control(&self) -> Option<Arc<dyn GainControl>>;
}

/// Opens output lines
pub trait Mixer: Send + Sync {
    fn open(&self, format: &AudioFormat, buffer_bytes: usize) -> Result<Box<dyn OutputLine>, AudioError>;
}

/// Write every byte to the line, retrying partial writes
pub fn write_fully(line: &mut dyn OutputLine, mut bytes: &[u8]) -> Result<(), AudioError> {
    while !bytes.is_empty() {
        let accepted = line.write(bytes)?;
        if accepted == 0 {
            return Err(AudioError::StreamError("line accepted no data".to_string()));
        }
        bytes = &bytes[accepted.min(bytes.len())..];
    }
    Ok(())
}

/// Fill `buf` from the reader, stopping early only at end of data.
/// Returns the number of bytes read.
pub fn read_full(reader: &mut dyn Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Read the reader to its end, discarding the data. Returns the byte count.
pub fn count_bytes(reader: &mut dyn Read, scratch: &mut [u8]) -> io::Result<u64> {
    let mut total = 0u64;
    loop {
        match reader.read(scratch) {
            Ok(0) => return Ok(total),
            Ok(n) => total += n as u64,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod helper_tests {
    use super::*;
    use crate::audio::tests::stubs::{ChunkedReader, RecordingMixer};
    use crate::models::AudioFormat;

    #[test]
    fn test_write_fully_retries_partial_writes() {
        let mixer = RecordingMixer::new().with_max_accept(3);
        let mut line = mixer.open(&AudioFormat::pcm_s16le(44100, 2), 1024).unwrap();

        let data: Vec<u8> = (0..100u8).collect();
        write_fully(line.as_mut(), &data).unwrap();

        let log = mixer.log();
        assert_eq!(log.written(0), data);
        assert!(log.write_calls(0) >= 34);
    }

    #[test]
    fn test_read_full_spans_short_reads() {
        let data: Vec<u8> = (0..50u8).collect();
        let mut reader = ChunkedReader::new(data.clone(), 7);
        let mut buf = [0u8; 32];

        assert_eq!(read_full(&mut reader, &mut buf).unwrap(), 32);
        assert_eq!(&buf[..], &data[..32]);
        assert_eq!(read_full(&mut reader, &mut buf).unwrap(), 18);
        assert_eq!(read_full(&mut reader, &mut buf).unwrap(), 0);
    }

    #[test]
    fn test_count_bytes() {
        let mut reader = ChunkedReader::new(vec![1u8; 1001], 64);
        let mut scratch = [0u8; 100];
        assert_eq!(count_bytes(&mut reader, &mut scratch).unwrap(), 1001);
    }

    #[test]
    fn test_source_extension_hint() {
        let source = AudioSource::from(PathBuf::from("/music/Track.MP3"));
        assert_eq!(source.extension().as_deref(), Some("mp3"));
        assert_eq!(AudioSource::Bytes(vec![]).extension(), None);
        assert_eq!(format!("{:?}", AudioSource::Bytes(vec![0; 3])), "Bytes(3 bytes)");
    }
}
