use std::time::Duration;

use crate::error::PlayerError;
use crate::models::{AudioFormat, PlaybackStatus};

/// Status display formatter for the CLI
pub struct StatusDisplay;

impl StatusDisplay {
    /// One-line progress for a streaming track, redrawn in place
    pub fn progress_line(status: &PlaybackStatus, played: u64, total: u64, format: Option<&AudioFormat>) -> String {
        let progress = if total > 0 {
            (played as f64 / total as f64).min(1.0) as f32
        } else {
            0.0
        };

        let times = match format.map(|f| f.byte_rate()).filter(|rate| *rate > 0) {
            Some(rate) => format!(
                "{}/{}",
                Self::format_duration(Duration::from_secs_f64(played as f64 / rate as f64)),
                Self::format_duration(Duration::from_secs_f64(total as f64 / rate as f64)),
            ),
            None => format!("{}/{}", Self::format_size(played), Self::format_size(total)),
        };

        format!(
            "{} [{}] {} ({}%)",
            Self::format_state(status),
            Self::create_progress_bar(progress, 30),
            times,
            (progress * 100.0) as u8
        )
    }

    /// Display error with a single recovery hint
    pub fn display_simple_error(error: &PlayerError) {
        let severity = error.severity();
        eprintln!("[{}] {}", severity.as_str(), error.user_message());

        let suggestions = error.recovery_suggestions();
        if let Some(first) = suggestions.first() {
            eprintln!("Suggestion: {}", first);
        }
    }

    pub fn display_devices(devices: &[String]) {
        if devices.is_empty() {
            println!("No output devices found");
            return;
        }
        println!("Output devices:");
        for (i, name) in devices.iter().enumerate() {
            println!("  {}. {}", i + 1, name);
        }
    }

    /// Format duration as MM:SS or HH:MM:SS for longer tracks
    pub fn format_duration(duration: Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
        } else {
            format!("{:02}:{:02}", minutes, seconds)
        }
    }

    /// Format a byte count in human-readable form
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
        let mut size_f = size as f64;
        let mut unit_index = 0;

        while size_f >= 1024.0 && unit_index < UNITS.len() - 1 {
            size_f /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size, UNITS[unit_index])
        } else {
            format!("{:.1} {}", size_f, UNITS[unit_index])
        }
    }

    pub fn create_progress_bar(progress: f32, width: usize) -> String {
        let filled = ((progress.clamp(0.0, 1.0) * width as f32) as usize).min(width);
        format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
    }

    pub fn format_state(status: &PlaybackStatus) -> &'static str {
        match status.label() {
            "playing" => "▶",
            "paused" => "⏸",
            _ => "⏹",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Looping;

    fn playing() -> PlaybackStatus {
        PlaybackStatus {
            running: true,
            playing: true,
            paused: false,
            looping: Looping::Off,
        }
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(StatusDisplay::format_duration(Duration::from_secs(0)), "00:00");
        assert_eq!(StatusDisplay::format_duration(Duration::from_secs(95)), "01:35");
        assert_eq!(StatusDisplay::format_duration(Duration::from_secs(3725)), "01:02:05");
    }

    #[test]
    fn test_format_size() {
        assert_eq!(StatusDisplay::format_size(512), "512 B");
        assert_eq!(StatusDisplay::format_size(2048), "2.0 KB");
        assert_eq!(StatusDisplay::format_size(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn test_create_progress_bar() {
        assert_eq!(StatusDisplay::create_progress_bar(0.0, 4), "░░░░");
        assert_eq!(StatusDisplay::create_progress_bar(0.5, 4), "██░░");
        assert_eq!(StatusDisplay::create_progress_bar(1.5, 4), "████");
    }

    #[test]
    fn test_progress_line_with_format() {
        let format = AudioFormat::pcm_s16le(44100, 2);
        let line = StatusDisplay::progress_line(&playing(), 176_400 * 30, 176_400 * 60, Some(&format));

        assert!(line.starts_with("▶"));
        assert!(line.contains("00:30/01:00"));
        assert!(line.ends_with("(50%)"));
    }

    #[test]
    fn test_progress_line_without_total() {
        let mut status = playing();
        status.paused = true;
        let line = StatusDisplay::progress_line(&status, 0, 0, None);

        assert!(line.starts_with("⏸"));
        assert!(line.contains("0 B/0 B"));
        assert!(line.ends_with("(0%)"));
    }

    #[test]
    fn test_format_state() {
        assert_eq!(StatusDisplay::format_state(&PlaybackStatus::default()), "⏹");
        assert_eq!(StatusDisplay::format_state(&playing()), "▶");
    }
}
