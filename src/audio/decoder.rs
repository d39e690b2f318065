use std::fs::File;
use std::io::{self, Cursor, Read};

use log::{debug, warn};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder as CodecDecoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::{MediaSource, MediaSourceStream, ReadOnlySource};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::audio::{AudioSource, DecodedStream, Decoder};
use crate::error::DecodeError;
use crate::models::{AudioFormat, Encoding};

/// Decoder backed by symphonia's codec and container registry.
///
/// Every source is decoded to signed 16-bit little-endian PCM at its native
/// sample rate and channel count.
#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaDecoder;

impl SymphoniaDecoder {
    pub fn new() -> Self {
        SymphoniaDecoder
    }
}

impl Decoder for SymphoniaDecoder {
    fn decoded_format(&self, base: &AudioFormat) -> AudioFormat {
        AudioFormat::pcm_s16le(base.sample_rate, base.channels)
    }

    fn open(&self, source: AudioSource) -> Result<Box<dyn DecodedStream>, DecodeError> {
        let stream = SymphoniaStream::open(source, self)?;
        Ok(Box::new(stream))
    }
}

/// Lazily decoding PCM stream over one symphonia track
pub struct SymphoniaStream {
    format_reader: Box<dyn FormatReader>,
    decoder: Box<dyn CodecDecoder>,
    track_id: u32,
    base_format: AudioFormat,
    format: AudioFormat,
    frame_length: Option<u64>,
    sample_buf: Option<SampleBuffer<i16>>,
    pending: Vec<u8>,
    cursor: usize,
    finished: bool,
}

impl SymphoniaStream {
    fn open(source: AudioSource, codec: &SymphoniaDecoder) -> Result<Self, DecodeError> {
        // Create a hint to help the format registry guess the format
        let mut hint = Hint::new();
        if let Some(extension) = source.extension() {
            hint.with_extension(&extension);
        }

        let media: Box<dyn MediaSource> = match source {
            AudioSource::File(path) => Box::new(File::open(&path)?),
            AudioSource::Bytes(bytes) => Box::new(Cursor::new(bytes)),
            AudioSource::Reader(reader) => Box::new(ReadOnlySource::new(reader)),
        };
        let media_source = MediaSourceStream::new(media, Default::default());

        let probed = symphonia::default::get_probe()
            .format(&hint, media_source, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| DecodeError::UnsupportedFormat {
                format: format!("probe failed: {}", e),
            })?;

        let format_reader = probed.format;

        // First decodable audio track
        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| DecodeError::UnsupportedFormat {
                format: "no audio track found".to_string(),
            })?;

        let track_id = track.id;
        let params = track.codec_params.clone();

        let decoder = symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| DecodeError::UnsupportedFormat {
                format: format!("no decoder for track: {}", e),
            })?;

        let sample_rate = params.sample_rate.ok_or_else(|| DecodeError::CorruptedFile(
            "track does not declare a sample rate".to_string(),
        ))?;
        let channels = match params.channels {
            Some(channels) => channels.count() as u16,
            None => {
                warn!("Track does not declare its channel layout, assuming stereo");
                2
            }
        };
        let codec_name = symphonia::default::get_codecs()
            .get_codec(params.codec)
            .map(|descriptor| descriptor.short_name.to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let base_format = AudioFormat::new(
            Encoding::Encoded(codec_name),
            sample_rate,
            params.bits_per_sample.unwrap_or(0) as u16,
            channels,
            false,
        );
        let format = codec.decoded_format(&base_format);
        debug!("Opened {} -> {}", base_format, format);

        Ok(SymphoniaStream {
            format_reader,
            decoder,
            track_id,
            base_format,
            format,
            frame_length: params.n_frames,
            sample_buf: None,
            pending: Vec::new(),
            cursor: 0,
            finished: false,
        })
    }

    /// Decode the next packet of our track into `pending`
    fn decode_next_packet(&mut self) -> io::Result<()> {
        self.pending.clear();
        self.cursor = 0;

        let packet = match self.format_reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref err)) if err.kind() == io::ErrorKind::UnexpectedEof => {
                // End of stream
                self.finished = true;
                return Ok(());
            }
            Err(SymphoniaError::ResetRequired) => {
                // Chained streams are not followed
                self.finished = true;
                return Ok(());
            }
            Err(err) => return Err(io::Error::new(io::ErrorKind::InvalidData, err)),
        };

        // Only process packets for our track
        if packet.track_id() != self.track_id {
            return Ok(());
        }

        match self.decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                let needed = decoded.frames() * spec.channels.count();
                if self.sample_buf.as_ref().map_or(true, |buf| buf.capacity() < needed) {
                    self.sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
                }
                if let Some(buf) = self.sample_buf.as_mut() {
                    buf.copy_interleaved_ref(decoded);
                    self.pending.reserve(buf.samples().len() * 2);
                    for sample in buf.samples() {
                        self.pending.extend_from_slice(&sample.to_le_bytes());
                    }
                }
                Ok(())
            }
            Err(SymphoniaError::DecodeError(msg)) => {
                // A corrupt packet is skipped, the stream continues
                warn!("Skipping undecodable packet: {}", msg);
                Ok(())
            }
            Err(err) => Err(io::Error::new(io::ErrorKind::InvalidData, err)),
        }
    }
}

impl Read for SymphoniaStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.cursor >= self.pending.len() {
            if self.finished {
                return Ok(0);
            }
            self.decode_next_packet()?;
        }

        let n = buf.len().min(self.pending.len() - self.cursor);
        buf[..n].copy_from_slice(&self.pending[self.cursor..self.cursor + n]);
        self.cursor += n;
        Ok(n)
    }
}

impl DecodedStream for SymphoniaStream {
    fn base_format(&self) -> &AudioFormat {
        &self.base_format
    }

    fn format(&self) -> &AudioFormat {
        &self.format
    }

    fn frame_length(&self) -> Option<u64> {
        self.frame_length
    }
}
