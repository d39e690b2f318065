//! Scenarios spanning the decoder, the players and the output lines.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tempfile::TempDir;

use crate::audio::tests::fixtures::{pattern_bytes, pcm_bytes, sine_wave, wav_bytes, write_temp_file};
use crate::audio::tests::stubs::{LineEvent, RecordingMixer, StubDecoder};
use crate::audio::SymphoniaDecoder;
use crate::config::{MusicSettings, PlayerConfig};
use crate::error::{DecodeError, PlayerError};
use crate::models::AudioFormat;
use crate::{EffectFactory, MusicPlayer};

const TIMEOUT: Duration = Duration::from_secs(10);

/// One second of 44.1 kHz stereo sine as a WAV file, plus its PCM bytes
fn one_second_wav() -> (TempDir, PathBuf, Vec<u8>) {
    let samples = sine_wave(44100, 2, 44100);
    let dir = TempDir::new().unwrap();
    let path = write_temp_file(&dir, "tone.wav", &wav_bytes(44100, 2, &samples));
    (dir, path, pcm_bytes(&samples))
}

fn fast_settings() -> MusicSettings {
    MusicSettings {
        idle_poll_ms: 1,
        ..MusicSettings::default()
    }
}

fn wait_until<F: Fn() -> bool>(condition: F) {
    let deadline = Instant::now() + TIMEOUT;
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached within {:?}", TIMEOUT);
        thread::sleep(Duration::from_millis(2));
    }
}

#[test]
fn test_music_streams_decoded_wav_with_loop() {
    let (_dir, path, pcm) = one_second_wav();
    let mixer = RecordingMixer::new();
    let player = MusicPlayer::new(Arc::new(SymphoniaDecoder::new()), Arc::new(mixer.clone()), fast_settings()).unwrap();

    let progress = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&progress);
    player.set_progress_listener(move |played, total| sink.lock().unwrap().push((played, total)));

    player.init_music(&path).unwrap();
    player.play(1).unwrap();

    let log = mixer.wait_for(TIMEOUT, |log| log.closed() == 2);
    wait_until(|| !player.status().playing);

    assert_eq!(player.total_length(), 176_400);
    assert_eq!(player.track_format(), Some(AudioFormat::pcm_s16le(44100, 2)));
    for line in &log.lines {
        assert_eq!(line.format, AudioFormat::pcm_s16le(44100, 2));
        assert_eq!(line.written, pcm);
        assert_eq!(line.tail(), vec![LineEvent::Drain, LineEvent::Stop, LineEvent::Close]);
    }

    // Progress restarts for the second pass and never runs backwards within one
    let progress = progress.lock().unwrap();
    assert!(progress.iter().all(|(_, total)| *total == 176_400));
    let passes: Vec<&[(u64, u64)]> = progress
        .split_inclusive(|(played, _)| *played == 176_400)
        .collect();
    assert_eq!(passes.len(), 2);
    for pass in passes {
        assert!(pass.windows(2).all(|w| w[0].0 < w[1].0));
        assert_eq!(pass.last().map(|p| p.0), Some(176_400));
    }
}

#[test]
fn test_effect_loop_times_from_wav() {
    let (_dir, path, pcm) = one_second_wav();
    let mixer = RecordingMixer::new();
    let factory = EffectFactory::new(
        Arc::new(SymphoniaDecoder::new()),
        Arc::new(mixer.clone()),
        PlayerConfig::default().effects,
    )
    .unwrap();

    let effect = factory.build_effect_from_file(&path).unwrap();
    assert_eq!(effect.len(), 176_400);
    assert_eq!(effect.duration(), Duration::from_secs(1));

    effect.loop_times(3).unwrap();
    let log = mixer.wait_for(TIMEOUT, |log| log.closed() == 1);

    let line = &log.lines[0];
    assert_eq!(line.written, pcm.repeat(3));
    assert_eq!(line.count(&LineEvent::Drain), 1);
    assert_eq!(line.count(&LineEvent::Stop), 1);
    assert_eq!(line.count(&LineEvent::Close), 1);
    assert_eq!(line.tail(), vec![LineEvent::Drain, LineEvent::Stop, LineEvent::Close]);
}

#[test]
fn test_effects_and_music_use_independent_lines() {
    let (_dir, path, pcm) = one_second_wav();
    let mixer = RecordingMixer::new().with_write_delay(Duration::from_millis(1));
    let decoder = Arc::new(SymphoniaDecoder::new());
    let settings = MusicSettings {
        chunk_bytes: 1024,
        ..fast_settings()
    };

    let player = MusicPlayer::new(decoder.clone(), Arc::new(mixer.clone()), settings).unwrap();
    let factory = EffectFactory::new(decoder, Arc::new(mixer.clone()), PlayerConfig::default().effects).unwrap();
    let effect = factory.build_effect_from_file(&path).unwrap();

    player.init_music(&path).unwrap();
    player.play(-1).unwrap();
    mixer.wait_for(TIMEOUT, |log| log.opened() == 1);
    player.pause().unwrap();
    wait_until(|| player.status().paused);

    effect.play().unwrap();
    effect.play().unwrap();
    let log = mixer.wait_for(TIMEOUT, |log| log.closed() == 2);

    // The paused music line stays open while both effect lines complete
    assert_eq!(log.opened(), 3);
    assert!(!log.lines[0].is_closed());
    for line in &log.lines[1..] {
        assert_eq!(line.written, pcm);
    }

    player.stop().unwrap();
    let log = mixer.wait_for(TIMEOUT, |log| log.closed() == 3);
    assert_eq!(log.opened(), 3);
    factory.destroy();
}

#[test]
fn test_init_music_rejects_undecodable_file() {
    let dir = TempDir::new().unwrap();
    let path = write_temp_file(&dir, "noise.mp3", &[0x42u8; 4096]);
    let mixer = RecordingMixer::new();
    let player = MusicPlayer::new(Arc::new(SymphoniaDecoder::new()), Arc::new(mixer.clone()), fast_settings()).unwrap();

    let result = player.init_music(&path);
    assert!(matches!(
        result,
        Err(PlayerError::Decode(DecodeError::UnsupportedFormat { .. }))
    ));
    assert_eq!(player.total_length(), 0);
    assert_eq!(mixer.log().opened(), 0);
}

#[test]
fn test_probe_fallback_matches_streamed_bytes() {
    let dir = TempDir::new().unwrap();
    let path = write_temp_file(&dir, "stream.ogg", b"placeholder");
    let decoder = StubDecoder::new(48000, 2, pattern_bytes(9_999)).without_frame_length().with_read_chunk(700);
    let mixer = RecordingMixer::new();
    let player = MusicPlayer::new(Arc::new(decoder), Arc::new(mixer.clone()), fast_settings()).unwrap();

    player.init_music(&path).unwrap();
    player.play_once().unwrap();
    let log = mixer.wait_for(TIMEOUT, |log| log.closed() == 1);

    assert_eq!(player.total_length(), log.written(0).len() as u64);
    assert_eq!(player.total_length(), 9_999);
}

#[test]
fn test_configured_chunk_sizes_reach_the_line() {
    let config: PlayerConfig = toml::from_str(
        r#"
        [music]
        chunk_bytes = 4098
        line_buffer_bytes = 32768
        idle_poll_ms = 1
        "#,
    )
    .unwrap();

    let dir = TempDir::new().unwrap();
    let path = write_temp_file(&dir, "track.flac", b"placeholder");
    let mixer = RecordingMixer::new();
    let decoder = StubDecoder::new(44100, 2, pattern_bytes(20_000));
    let player = MusicPlayer::new(Arc::new(decoder), Arc::new(mixer.clone()), config.music).unwrap();

    player.init_music(&path).unwrap();
    player.play_once().unwrap();
    let log = mixer.wait_for(TIMEOUT, |log| log.closed() == 1);

    let line = &log.lines[0];
    assert_eq!(line.buffer_bytes, 32_768);
    // 4098 rounds down to whole stereo frames
    assert_eq!(line.events[0], LineEvent::Write(4096));
    assert_eq!(line.written.len(), 20_000);
}
