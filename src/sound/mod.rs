mod pool;

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::debug;

use crate::audio::{read_full, write_fully, AudioSource, CpalMixer, Decoder, Mixer, OutputLine, SymphoniaDecoder};
use crate::config::{EffectSettings, PlayerConfig};
use crate::error::{AudioError, EffectError};
use crate::logging::{AudioEventType, AudioLogger};
use crate::models::{AudioFormat, FormatKey};
use pool::EffectPool;

/// Predicate polled between loop-until repetitions
pub type LoopPredicate = Box<dyn FnMut() -> bool + Send>;

/// What one effect task writes to its line
enum PlaybackPlan {
    Times(u32),
    Until { predicate: LoopPredicate, restart: usize },
}

/// Builds effects and owns the worker pool they play on
pub struct EffectFactory {
    pool: Arc<EffectPool>,
    decoder: Arc<dyn Decoder>,
    mixer: Arc<dyn Mixer>,
    settings: EffectSettings,
    logger: AudioLogger,
    built: Mutex<HashMap<FormatKey, usize>>,
}

impl EffectFactory {
    pub fn new(
        decoder: Arc<dyn Decoder>,
        mixer: Arc<dyn Mixer>,
        settings: EffectSettings,
    ) -> Result<Self, EffectError> {
        let pool = Arc::new(EffectPool::new(&settings)?);

        Ok(Self {
            pool,
            decoder,
            mixer,
            settings,
            logger: AudioLogger::new(),
            built: Mutex::new(HashMap::new()),
        })
    }

    /// Factory on the symphonia decoder and the configured cpal device
    pub fn from_config(config: &PlayerConfig) -> Result<Self, EffectError> {
        let mixer = CpalMixer::with_device(config.preferred_device.clone());
        Self::new(Arc::new(SymphoniaDecoder::new()), Arc::new(mixer), config.effects.clone())
    }

    /// Decode a source fully into memory
    pub fn build_effect(&self, source: impl Into<AudioSource>) -> Result<Effect, EffectError> {
        let source = source.into();
        debug!("Building effect from {:?}", source);

        let mut stream = self.decoder.open(source)?;
        let format = stream.format().clone();

        let mut data = Vec::new();
        let mut chunk = vec![0u8; self.settings.load_chunk_bytes.max(1)];
        loop {
            let n = read_full(&mut stream, &mut chunk)?;
            if n == 0 {
                break;
            }
            data.extend_from_slice(&chunk[..n]);
        }

        *self
            .built
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .entry(format.key())
            .or_insert(0) += 1;

        Ok(Effect {
            format,
            data: Arc::from(data),
            pool: Arc::clone(&self.pool),
            mixer: Arc::clone(&self.mixer),
            settings: self.settings.clone(),
            logger: self.logger.clone(),
        })
    }

    pub fn build_effect_from_file(&self, path: impl AsRef<Path>) -> Result<Effect, EffectError> {
        let path = path.as_ref();
        std::fs::metadata(path)?;
        self.build_effect(AudioSource::File(path.to_path_buf()))
    }

    /// Number of effects built per line format
    pub fn built_formats(&self) -> HashMap<FormatKey, usize> {
        self.built.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn is_active(&self) -> bool {
        self.pool.is_accepting()
    }

    /// Effect playback event history
    pub fn logger(&self) -> &AudioLogger {
        &self.logger
    }

    /// Stop accepting effect tasks and wait for in-flight ones, up to the
    /// configured timeout. Playing lines are not cut.
    pub fn destroy(&self) {
        self.pool.shutdown(self.settings.shutdown_timeout());
    }
}

impl Drop for EffectFactory {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// A fully decoded clip that can be played any number of times concurrently.
///
/// Every play opens its own output line on the shared pool.
#[derive(Clone)]
pub struct Effect {
    format: AudioFormat,
    data: Arc<[u8]>,
    pool: Arc<EffectPool>,
    mixer: Arc<dyn Mixer>,
    settings: EffectSettings,
    logger: AudioLogger,
}

impl Effect {
    pub fn format(&self) -> &AudioFormat {
        &self.format
    }

    pub fn key(&self) -> FormatKey {
        self.format.key()
    }

    /// Decoded size in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn duration(&self) -> Duration {
        match self.format.byte_rate() {
            0 => Duration::ZERO,
            rate => Duration::from_secs_f64(self.data.len() as f64 / rate as f64),
        }
    }

    /// Play the clip once
    pub fn play(&self) -> Result<(), EffectError> {
        self.submit(PlaybackPlan::Times(1))
    }

    /// Play the clip `times` times back to back on one line
    pub fn loop_times(&self, times: u32) -> Result<(), EffectError> {
        if times == 0 {
            return Ok(());
        }
        self.submit(PlaybackPlan::Times(times))
    }

    /// Play the clip once, then again from the start while `predicate` holds
    pub fn loop_until<F>(&self, predicate: F) -> Result<(), EffectError>
    where
        F: FnMut() -> bool + Send + 'static,
    {
        self.loop_until_from(predicate, 0)
    }

    /// Play the clip once, then replay from `restart_offset` while `predicate`
    /// holds. The offset is rounded down to a frame boundary.
    pub fn loop_until_from<F>(&self, predicate: F, restart_offset: usize) -> Result<(), EffectError>
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let restart = self.format.align_down(restart_offset.min(self.data.len()));
        self.submit(PlaybackPlan::Until {
            predicate: Box::new(predicate),
            restart,
        })
    }

    fn submit(&self, plan: PlaybackPlan) -> Result<(), EffectError> {
        let effect = self.clone();
        self.pool.submit(move || effect.run(plan))
    }

    /// Body of one effect task
    fn run(&self, plan: PlaybackPlan) {
        let mut line = match self.mixer.open(&self.format, self.settings.line_buffer_bytes) {
            Ok(line) => line,
            Err(e) => {
                self.logger
                    .log_event(AudioEventType::LineUnavailable, format!("{} for effect {}", e, self.format));
                return;
            }
        };

        let result = match plan {
            PlaybackPlan::Times(times) => (0..times).try_for_each(|_| self.write_from(line.as_mut(), 0)),
            PlaybackPlan::Until { mut predicate, restart } => {
                self.write_from(line.as_mut(), 0).and_then(|()| {
                    while predicate() {
                        self.write_from(line.as_mut(), restart)?;
                    }
                    Ok(())
                })
            }
        };

        if let Err(e) = result {
            self.logger
                .log_event(AudioEventType::StreamError, format!("Effect write failed: {}", e));
        }

        line.drain();
        line.stop();
        line.close();
        self.logger.log_event(
            AudioEventType::EffectPlayed,
            format!("{} bytes of {}", self.data.len(), self.format),
        );
    }

    /// Write the clip from `offset` to its end in frame-aligned chunks
    fn write_from(&self, line: &mut dyn OutputLine, offset: usize) -> Result<(), AudioError> {
        let chunk = self
            .format
            .align_down(self.settings.chunk_bytes)
            .max(self.format.frame_size().max(1));

        for piece in self.data[offset..].chunks(chunk) {
            write_fully(line, piece)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("format", &self.format)
            .field("bytes", &self.data.len())
            .finish()
    }
}
