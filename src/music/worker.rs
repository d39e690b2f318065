use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};

use crate::audio::{count_bytes, read_full, write_fully, AudioSource, DecodedStream, Decoder, Mixer};
use crate::config::MusicSettings;
use crate::error::DecodeError;
use crate::logging::{AudioEventType, OperationTimer};
use crate::models::{AudioFormat, Looping, PlaybackStatus};
use crate::music::{PlayerCommand, Shared};

/// Probes slower than this are reported as warnings
const PROBE_WARN_THRESHOLD: Duration = Duration::from_millis(500);

/// Transport state, touched only by the player thread
#[derive(Debug, Clone, Copy)]
struct PlayerState {
    running: bool,
    playing: bool,
    paused: bool,
    looping: Looping,
}

impl PlayerState {
    fn new() -> Self {
        Self {
            running: true,
            playing: false,
            paused: false,
            looping: Looping::Off,
        }
    }

    fn status(&self) -> PlaybackStatus {
        PlaybackStatus {
            running: self.running,
            playing: self.playing,
            paused: self.paused,
            looping: self.looping,
        }
    }
}

/// The loaded track
struct TrackSession {
    path: PathBuf,
    format: AudioFormat,
    /// Open between passes only; taken by a pass and dropped at its end
    stream: Option<Box<dyn DecodedStream>>,
    total_bytes: u64,
}

/// Body of the player thread
pub(crate) struct PlayerWorker {
    receiver: Receiver<PlayerCommand>,
    shared: Arc<Shared>,
    decoder: Arc<dyn Decoder>,
    mixer: Arc<dyn Mixer>,
    settings: MusicSettings,
    initial_gain_db: Option<f32>,
    state: PlayerState,
    session: Option<TrackSession>,
}

impl PlayerWorker {
    pub(crate) fn new(
        receiver: Receiver<PlayerCommand>,
        shared: Arc<Shared>,
        decoder: Arc<dyn Decoder>,
        mixer: Arc<dyn Mixer>,
        settings: MusicSettings,
        initial_gain_db: Option<f32>,
    ) -> Self {
        Self {
            receiver,
            shared,
            decoder,
            mixer,
            settings,
            initial_gain_db,
            state: PlayerState::new(),
            session: None,
        }
    }

    pub(crate) fn run(mut self) {
        self.publish_status();

        while self.state.running {
            self.idle();
            if !self.state.running {
                break;
            }

            let completed = self.play_pass();
            self.finish_pass(completed);
        }

        self.session = None;
        *self.shared.gain.write().unwrap_or_else(|p| p.into_inner()) = None;
        self.publish_status();
        self.shared.logger.log_event(AudioEventType::PlayerDestroyed, "Player thread exiting");
    }

    /// Wait for a play command, executing everything queued in between
    fn idle(&mut self) {
        while self.state.running && !self.state.playing {
            if self.wait_command(self.settings.idle_poll()) {
                self.drain_all();
            }
        }
    }

    /// Block up to `timeout` for one command and execute it.
    /// Returns whether a command arrived.
    fn wait_command(&mut self, timeout: Duration) -> bool {
        match self.receiver.recv_timeout(timeout) {
            Ok(command) => {
                self.execute(command);
                true
            }
            Err(RecvTimeoutError::Timeout) => false,
            Err(RecvTimeoutError::Disconnected) => {
                self.execute(PlayerCommand::Destroy);
                false
            }
        }
    }

    /// Execute at most one pending command without blocking
    fn drain_one(&mut self) -> bool {
        match self.receiver.try_recv() {
            Ok(command) => {
                self.execute(command);
                true
            }
            Err(TryRecvError::Empty) => false,
            Err(TryRecvError::Disconnected) => {
                self.execute(PlayerCommand::Destroy);
                false
            }
        }
    }

    fn drain_all(&mut self) {
        while self.state.running && self.drain_one() {}
    }

    fn execute(&mut self, command: PlayerCommand) {
        if !self.state.running {
            debug!("Dropping {:?}, player destroyed", command);
            return;
        }

        let logger = self.shared.logger.clone();
        match command {
            PlayerCommand::Init { path, stream } => {
                if self.state.playing {
                    debug!("Ignoring init of {} while playing", path.display());
                } else {
                    self.load_track(path, stream);
                }
            }
            PlayerCommand::Play(looping) => {
                if !self.state.playing {
                    self.state.playing = true;
                    self.state.paused = false;
                    self.state.looping = looping;
                    logger.log_event(
                        AudioEventType::PlaybackStarted,
                        format!("Play requested (loop count {})", looping.as_count()),
                    );
                }
            }
            PlayerCommand::Pause => {
                if self.state.playing && !self.state.paused {
                    self.state.paused = true;
                    logger.log_event(
                        AudioEventType::PlaybackPaused,
                        format!("Paused at {} bytes", self.shared.played.load(Ordering::Relaxed)),
                    );
                }
            }
            PlayerCommand::Resume => {
                if self.state.playing && self.state.paused {
                    self.state.paused = false;
                    logger.log_event(AudioEventType::PlaybackResumed, "Playback resumed");
                }
            }
            PlayerCommand::Stop => {
                if self.state.playing {
                    self.clear_playback();
                    logger.log_event(AudioEventType::PlaybackStopped, "Stopped by request");
                }
            }
            PlayerCommand::Destroy => {
                self.state.running = false;
                self.clear_playback();
            }
        }

        self.publish_status();
    }

    fn clear_playback(&mut self) {
        self.state.playing = false;
        self.state.paused = false;
        self.state.looping = Looping::Off;
    }

    fn publish_status(&self) {
        *self.shared.status.lock().unwrap_or_else(|p| p.into_inner()) = self.state.status();
    }

    /// Probe the length of an opened track, replacing any previous session
    fn load_track(&mut self, path: PathBuf, stream: Box<dyn DecodedStream>) {
        self.session = None;
        self.shared.played.store(0, Ordering::Relaxed);
        self.shared.total.store(0, Ordering::Relaxed);
        *self.shared.format.write().unwrap_or_else(|p| p.into_inner()) = None;

        let format = stream.format().clone();

        match self.probe_length(&path, &format) {
            Ok(total_bytes) => {
                *self.shared.format.write().unwrap_or_else(|p| p.into_inner()) = Some(format.clone());
                self.shared.total.store(total_bytes, Ordering::Relaxed);
                self.shared.logger.log_event(
                    AudioEventType::TrackLoaded,
                    format!(
                        "{} ({} -> {}, {} bytes)",
                        path.display(),
                        stream.base_format(),
                        format,
                        total_bytes
                    ),
                );
                self.session = Some(TrackSession {
                    path,
                    format,
                    stream: Some(stream),
                    total_bytes,
                });
            }
            Err(e) => {
                self.shared.logger.log_event(
                    AudioEventType::DecodeError,
                    format!("Failed to load {}: {}", path.display(), e),
                );
            }
        }
    }

    /// Total decoded bytes of a track, read from a fresh stream
    fn probe_length(&self, path: &Path, format: &AudioFormat) -> Result<u64, DecodeError> {
        let timer = OperationTimer::new(format!("length probe of {}", path.display()));
        let mut probe = self.decoder.open(AudioSource::File(path.to_path_buf()))?;

        let frame_size = format.frame_size() as u64;
        let total = match probe.frame_length() {
            Some(frames) if frames > 0 && frame_size > 0 => frames * frame_size,
            _ => {
                let mut scratch = vec![0u8; self.settings.chunk_bytes.max(1)];
                count_bytes(&mut probe, &mut scratch)?
            }
        };

        timer.finish_with_threshold(PROBE_WARN_THRESHOLD);
        Ok(total)
    }

    /// Stream the loaded track once through a fresh output line.
    /// Returns whether the pass reached the end of the track having written audio.
    fn play_pass(&mut self) -> bool {
        let logger = self.shared.logger.clone();

        let Some(session) = self.session.as_mut() else {
            warn!("Play requested with no track loaded");
            self.clear_playback();
            self.publish_status();
            return false;
        };

        let mut stream = match session.stream.take() {
            Some(stream) => stream,
            None => match self.decoder.open(AudioSource::File(session.path.clone())) {
                Ok(stream) => stream,
                Err(e) => {
                    logger.log_event(
                        AudioEventType::DecodeError,
                        format!("Failed to reopen {}: {}", session.path.display(), e),
                    );
                    self.clear_playback();
                    self.publish_status();
                    return false;
                }
            },
        };
        let format = session.format.clone();
        let total_bytes = session.total_bytes;

        let mut line = match self.mixer.open(&format, self.settings.line_buffer_bytes) {
            Ok(line) => line,
            Err(e) => {
                logger.log_event(AudioEventType::LineUnavailable, format!("{} for {}", e, format));
                self.clear_playback();
                self.publish_status();
                return false;
            }
        };

        let gain = line.gain_control();
        if let (Some(gain), Some(db)) = (&gain, self.initial_gain_db) {
            gain.set_value(db);
        }
        *self.shared.gain.write().unwrap_or_else(|p| p.into_inner()) = gain;

        self.shared.played.store(0, Ordering::Relaxed);
        let chunk = format.align_down(self.settings.chunk_bytes).max(format.frame_size().max(1));
        let mut buffer = vec![0u8; chunk];
        let mut played = 0u64;
        let mut reached_end = false;

        loop {
            let n = match read_full(&mut stream, &mut buffer) {
                Ok(0) => {
                    reached_end = true;
                    break;
                }
                Ok(n) => n,
                Err(e) => {
                    logger.log_event(AudioEventType::StreamError, format!("Read failed: {}", e));
                    break;
                }
            };

            self.drain_one();
            while self.state.paused && self.state.running {
                self.wait_command(self.settings.idle_poll());
            }
            if !self.state.playing {
                break;
            }

            if let Err(e) = write_fully(line.as_mut(), &buffer[..n]) {
                logger.log_event(AudioEventType::StreamError, format!("Write failed: {}", e));
                break;
            }

            played += n as u64;
            self.shared.played.store(played, Ordering::Relaxed);
            self.shared.notify_progress(played, total_bytes);
        }

        line.drain();
        line.stop();
        line.close();
        *self.shared.gain.write().unwrap_or_else(|p| p.into_inner()) = None;
        drop(stream);

        reached_end && played > 0
    }

    /// Decide between a loop restart and returning to idle.
    /// Commands queued during the pass run first.
    fn finish_pass(&mut self, completed: bool) {
        self.drain_all();
        if !self.state.playing {
            return;
        }

        if !completed {
            // A pass without audio would restart forever
            self.clear_playback();
            self.shared.logger.log_event(
                AudioEventType::StreamError,
                "Pass ended without streaming the track, playback stopped",
            );
        } else if self.state.looping.take_replay() {
            self.shared.logger.log_event(
                AudioEventType::LoopRestart,
                format!("Restarting, loop count now {}", self.state.looping.as_count()),
            );
        } else {
            self.clear_playback();
            self.shared.logger.log_event(AudioEventType::PlaybackStopped, "Reached end of track");
        }
        self.publish_status();
    }
}
