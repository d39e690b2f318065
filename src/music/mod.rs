mod worker;

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, RwLock};
use std::thread;

use log::{debug, warn};

use crate::audio::{AudioSource, CpalMixer, DecodedStream, Decoder, GainControl, Mixer, SymphoniaDecoder};
use crate::config::{MusicSettings, PlayerConfig};
use crate::error::{AudioError, PlayerError};
use crate::logging::AudioLogger;
use crate::models::{AudioFormat, Looping, PlaybackStatus};
use worker::PlayerWorker;

/// Callback receiving `(bytes_played, total_bytes)` after every buffer write.
/// Runs on the player thread.
pub type ProgressListener = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Commands sent to the player thread
pub enum PlayerCommand {
    /// A track whose header already decoded on the caller's thread
    Init {
        path: PathBuf,
        stream: Box<dyn DecodedStream>,
    },
    Play(Looping),
    Pause,
    Resume,
    Stop,
    Destroy,
}

impl fmt::Debug for PlayerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerCommand::Init { path, stream } => f
                .debug_struct("Init")
                .field("path", path)
                .field("format", stream.format())
                .finish(),
            PlayerCommand::Play(looping) => f.debug_tuple("Play").field(looping).finish(),
            PlayerCommand::Pause => f.write_str("Pause"),
            PlayerCommand::Resume => f.write_str("Resume"),
            PlayerCommand::Stop => f.write_str("Stop"),
            PlayerCommand::Destroy => f.write_str("Destroy"),
        }
    }
}

/// State shared between the handle and the player thread
pub(crate) struct Shared {
    played: AtomicU64,
    total: AtomicU64,
    format: RwLock<Option<AudioFormat>>,
    gain: RwLock<Option<Arc<dyn GainControl>>>,
    listener: RwLock<Option<ProgressListener>>,
    status: Mutex<PlaybackStatus>,
    logger: AudioLogger,
}

impl Shared {
    fn new(logger: AudioLogger) -> Self {
        Self {
            played: AtomicU64::new(0),
            total: AtomicU64::new(0),
            format: RwLock::new(None),
            gain: RwLock::new(None),
            listener: RwLock::new(None),
            status: Mutex::new(PlaybackStatus::default()),
            logger,
        }
    }

    fn gain(&self) -> Option<Arc<dyn GainControl>> {
        self.gain.read().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub(crate) fn notify_progress(&self, played: u64, total: u64) {
        let listener = self.listener.read().unwrap_or_else(|p| p.into_inner()).clone();
        if let Some(listener) = listener {
            listener(played, total);
        }
    }
}

/// Streaming music player.
///
/// Owns one background thread that decodes the loaded track incrementally and
/// feeds an output line. Transport calls only enqueue a command; the thread
/// executes them in order between buffer writes.
pub struct MusicPlayer {
    sender: Sender<PlayerCommand>,
    decoder: Arc<dyn Decoder>,
    shared: Arc<Shared>,
    handle: Option<thread::JoinHandle<()>>,
}

impl MusicPlayer {
    /// Start a player thread on the given collaborators
    pub fn new(
        decoder: Arc<dyn Decoder>,
        mixer: Arc<dyn Mixer>,
        settings: MusicSettings,
    ) -> Result<Self, PlayerError> {
        Self::spawn(decoder, mixer, settings, None, AudioLogger::new())
    }

    /// Player on the symphonia decoder and the configured cpal device
    pub fn from_config(config: &PlayerConfig) -> Result<Self, PlayerError> {
        let mixer = CpalMixer::with_device(config.preferred_device.clone());
        Self::spawn(
            Arc::new(SymphoniaDecoder::new()),
            Arc::new(mixer),
            config.music.clone(),
            config.initial_gain_db,
            AudioLogger::new(),
        )
    }

    pub fn with_defaults() -> Result<Self, PlayerError> {
        Self::from_config(&PlayerConfig::default())
    }

    fn spawn(
        decoder: Arc<dyn Decoder>,
        mixer: Arc<dyn Mixer>,
        settings: MusicSettings,
        initial_gain_db: Option<f32>,
        logger: AudioLogger,
    ) -> Result<Self, PlayerError> {
        let (sender, receiver) = mpsc::channel();
        let shared = Arc::new(Shared::new(logger));
        *shared.status.lock().unwrap_or_else(|p| p.into_inner()) = PlaybackStatus {
            running: true,
            ..PlaybackStatus::default()
        };

        let worker = PlayerWorker::new(
            receiver,
            Arc::clone(&shared),
            Arc::clone(&decoder),
            mixer,
            settings,
            initial_gain_db,
        );

        let handle = thread::Builder::new()
            .name("cadence-music".to_string())
            .spawn(move || {
                // Set high priority for the player thread (platform-specific)
                #[cfg(target_os = "macos")]
                {
                    unsafe {
                        let thread = libc::pthread_self();
                        let mut policy: libc::c_int = 0;
                        let mut param: libc::sched_param = std::mem::zeroed();

                        if libc::pthread_getschedparam(thread, &mut policy, &mut param) == 0 {
                            param.sched_priority = libc::sched_get_priority_max(policy);
                            let _ = libc::pthread_setschedparam(thread, policy, &param);
                        }
                    }
                }

                worker.run();
            })
            .map_err(|e| AudioError::StreamError(format!("Failed to create player thread: {}", e)))?;

        Ok(Self {
            sender,
            decoder,
            shared,
            handle: Some(handle),
        })
    }

    fn send(&self, command: PlayerCommand) -> Result<(), PlayerError> {
        self.sender.send(command).map_err(|_| PlayerError::Closed)
    }

    /// Load a track. The header is decoded here, so unreadable and
    /// unsupported files fail immediately; the length probe runs on the
    /// player thread. Ignored by the player thread while a track is playing.
    pub fn init_music(&self, path: impl Into<PathBuf>) -> Result<(), PlayerError> {
        let path = path.into();
        let metadata = std::fs::metadata(&path)?;
        if !metadata.is_file() {
            return Err(PlayerError::File(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} is not a file", path.display()),
            )));
        }
        let stream = self.decoder.open(AudioSource::File(path.clone()))?;
        self.send(PlayerCommand::Init { path, stream })
    }

    /// Start playback. `loop_count` is the number of extra replays, -1 for
    /// unbounded looping.
    pub fn play(&self, loop_count: i32) -> Result<(), PlayerError> {
        self.send(PlayerCommand::Play(Looping::from(loop_count)))
    }

    pub fn play_once(&self) -> Result<(), PlayerError> {
        self.play(0)
    }

    pub fn pause(&self) -> Result<(), PlayerError> {
        self.send(PlayerCommand::Pause)
    }

    pub fn resume(&self) -> Result<(), PlayerError> {
        self.send(PlayerCommand::Resume)
    }

    pub fn stop(&self) -> Result<(), PlayerError> {
        self.send(PlayerCommand::Stop)
    }

    /// Terminate the player thread. No command runs after this one.
    pub fn destroy(&self) -> Result<(), PlayerError> {
        self.send(PlayerCommand::Destroy)
    }

    /// Set the master gain of the active line, in decibels
    pub fn set_volume(&self, db: f32) {
        match self.shared.gain() {
            Some(gain) => gain.set_value(db),
            None => debug!("No active line, ignoring volume change to {} dB", db),
        }
    }

    pub fn volume(&self) -> f32 {
        self.shared.gain().map_or(0.0, |gain| gain.value())
    }

    pub fn min_volume(&self) -> f32 {
        self.shared.gain().map_or(0.0, |gain| gain.minimum())
    }

    pub fn max_volume(&self) -> f32 {
        self.shared.gain().map_or(0.0, |gain| gain.maximum())
    }

    /// Decoded bytes written during the current pass
    pub fn current_played(&self) -> u64 {
        self.shared.played.load(Ordering::Relaxed)
    }

    /// Decoded length of the loaded track in bytes
    pub fn total_length(&self) -> u64 {
        self.shared.total.load(Ordering::Relaxed)
    }

    /// Decoded format of the loaded track
    pub fn track_format(&self) -> Option<AudioFormat> {
        self.shared.format.read().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn set_progress_listener<F>(&self, listener: F)
    where
        F: Fn(u64, u64) + Send + Sync + 'static,
    {
        *self.shared.listener.write().unwrap_or_else(|p| p.into_inner()) = Some(Arc::new(listener));
    }

    pub fn clear_progress_listener(&self) {
        *self.shared.listener.write().unwrap_or_else(|p| p.into_inner()) = None;
    }

    /// Transport state as last published by the player thread
    pub fn status(&self) -> PlaybackStatus {
        *self.shared.status.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Playback event history
    pub fn logger(&self) -> &AudioLogger {
        &self.shared.logger
    }
}

impl Drop for MusicPlayer {
    fn drop(&mut self) {
        let _ = self.send(PlayerCommand::Destroy);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Player thread panicked");
            }
        }
    }
}
