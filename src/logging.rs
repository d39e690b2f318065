use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use log::{debug, error, info, trace, warn};

/// Default number of events kept in a logger's history
const DEFAULT_MAX_EVENTS: usize = 1000;

/// Audio event for logging and debugging
#[derive(Debug, Clone)]
pub struct AudioEvent {
    pub timestamp: DateTime<Utc>,
    pub event_type: AudioEventType,
    pub details: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioEventType {
    TrackLoaded,
    PlaybackStarted,
    PlaybackPaused,
    PlaybackResumed,
    PlaybackStopped,
    LoopRestart,
    EffectPlayed,
    LineUnavailable,
    DecodeError,
    StreamError,
    PlayerDestroyed,
}

impl AudioEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioEventType::TrackLoaded => "TRACK_LOADED",
            AudioEventType::PlaybackStarted => "PLAYBACK_STARTED",
            AudioEventType::PlaybackPaused => "PLAYBACK_PAUSED",
            AudioEventType::PlaybackResumed => "PLAYBACK_RESUMED",
            AudioEventType::PlaybackStopped => "PLAYBACK_STOPPED",
            AudioEventType::LoopRestart => "LOOP_RESTART",
            AudioEventType::EffectPlayed => "EFFECT_PLAYED",
            AudioEventType::LineUnavailable => "LINE_UNAVAILABLE",
            AudioEventType::DecodeError => "DECODE_ERROR",
            AudioEventType::StreamError => "STREAM_ERROR",
            AudioEventType::PlayerDestroyed => "PLAYER_DESTROYED",
        }
    }
}

/// Initialize logging system with appropriate log level
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    // Set log level based on environment variable or default to Info
    let log_level = std::env::var("CADENCE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

    let mut builder = env_logger::Builder::new();

    builder.format(|buf, record| {
        use std::io::Write;
        writeln!(
            buf,
            "{} [{}] [{}] {}",
            chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            record.level(),
            std::thread::current().name().unwrap_or("unnamed"),
            record.args()
        )
    });

    builder.filter_level(parse_level(&log_level));
    builder.try_init()?;

    info!("Cadence logging initialized with level: {}", log_level);
    Ok(())
}

fn parse_level(level: &str) -> log::LevelFilter {
    match level.to_lowercase().as_str() {
        "trace" => log::LevelFilter::Trace,
        "debug" => log::LevelFilter::Debug,
        "warn" => log::LevelFilter::Warn,
        "error" => log::LevelFilter::Error,
        "off" => log::LevelFilter::Off,
        _ => log::LevelFilter::Info,
    }
}

/// Playback event recorder.
///
/// Every event goes to the `log` facade and into a bounded in-memory history
/// that status displays and tests can inspect.
#[derive(Clone)]
pub struct AudioLogger {
    events: Arc<Mutex<VecDeque<AudioEvent>>>,
    max_events: usize,
}

impl Default for AudioLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioLogger {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_EVENTS)
    }

    pub fn with_capacity(max_events: usize) -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::new())),
            max_events: max_events.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<AudioEvent>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Log an audio event
    pub fn log_event(&self, event_type: AudioEventType, details: impl Into<String>) {
        let details = details.into();

        match event_type {
            AudioEventType::TrackLoaded
            | AudioEventType::PlaybackStarted
            | AudioEventType::PlaybackStopped
            | AudioEventType::PlayerDestroyed => {
                info!("[{}] {}", event_type.as_str(), details);
            }
            AudioEventType::PlaybackPaused
            | AudioEventType::PlaybackResumed
            | AudioEventType::LoopRestart
            | AudioEventType::EffectPlayed => {
                debug!("[{}] {}", event_type.as_str(), details);
            }
            AudioEventType::LineUnavailable => {
                warn!("[{}] {}", event_type.as_str(), details);
            }
            AudioEventType::DecodeError | AudioEventType::StreamError => {
                error!("[{}] {}", event_type.as_str(), details);
            }
        }

        let mut events = self.lock();
        events.push_back(AudioEvent {
            timestamp: Utc::now(),
            event_type,
            details,
        });
        while events.len() > self.max_events {
            events.pop_front();
        }
    }

    /// Get recent events, oldest first
    pub fn get_recent_events(&self, count: usize) -> Vec<AudioEvent> {
        let events = self.lock();
        let skip = events.len().saturating_sub(count);
        events.iter().skip(skip).cloned().collect()
    }

    /// Number of recorded events of one type
    pub fn count(&self, event_type: AudioEventType) -> usize {
        self.lock().iter().filter(|e| e.event_type == event_type).count()
    }

    pub fn clear_events(&self) {
        self.lock().clear();
    }
}

/// Timer utility for measuring operation durations
pub struct OperationTimer {
    start_time: Instant,
    operation_name: String,
}

impl OperationTimer {
    pub fn new(operation_name: impl Into<String>) -> Self {
        let operation_name = operation_name.into();
        trace!("Starting operation: {}", operation_name);
        Self {
            start_time: Instant::now(),
            operation_name,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn finish_with_threshold(self, threshold: Duration) -> Duration {
        let duration = self.elapsed();
        if duration > threshold {
            warn!(
                "Operation '{}' took {}ms (threshold: {}ms)",
                self.operation_name,
                duration.as_millis(),
                threshold.as_millis()
            );
        } else {
            debug!("Completed operation '{}' in {}ms", self.operation_name, duration.as_millis());
        }
        duration
    }
}
