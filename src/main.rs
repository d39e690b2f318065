use std::io::{self, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use cadence_audio::audio::CpalMixer;
use cadence_audio::cli::{CliApp, Commands, StatusDisplay};
use cadence_audio::config::{ConfigManager, PlayerConfig};
use cadence_audio::logging::{self, AudioEventType};
use cadence_audio::{EffectFactory, MusicPlayer, PlayerError};
use log::{info, warn};

/// How often the progress line is redrawn
const REFRESH_INTERVAL: Duration = Duration::from_millis(100);
/// How long to wait for the player thread to pick up a play request
const START_TIMEOUT: Duration = Duration::from_secs(5);

fn load_config() -> PlayerConfig {
    match ConfigManager::new() {
        Ok(manager) => manager.get_config().clone(),
        Err(e) => {
            warn!("Using default configuration: {}", e);
            PlayerConfig::default()
        }
    }
}

fn install_interrupt_flag() -> Arc<AtomicBool> {
    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupted);
    if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
        warn!("Failed to install Ctrl-C handler: {}", e);
    }
    interrupted
}

fn run_music(config: &PlayerConfig, file: &Path, loops: i32, interrupted: &AtomicBool) -> Result<(), PlayerError> {
    let player = MusicPlayer::from_config(config)?;
    player.init_music(file)?;
    player.play(loops)?;

    let started = Instant::now();
    let mut seen_playing = false;
    loop {
        if interrupted.load(Ordering::SeqCst) {
            player.stop()?;
            break;
        }

        let status = player.status();
        if status.playing {
            seen_playing = true;
        } else if seen_playing || started.elapsed() > START_TIMEOUT {
            break;
        }

        let format = player.track_format();
        print!(
            "\r{}",
            StatusDisplay::progress_line(&status, player.current_played(), player.total_length(), format.as_ref())
        );
        let _ = io::stdout().flush();
        thread::sleep(REFRESH_INTERVAL);
    }
    println!();

    player.destroy()?;
    Ok(())
}

fn run_effect(
    config: &PlayerConfig,
    file: &Path,
    times: u32,
    overlap: u32,
    interrupted: &AtomicBool,
) -> Result<(), PlayerError> {
    let factory = EffectFactory::from_config(config)?;
    let effect = factory.build_effect_from_file(file)?;
    println!(
        "Loaded {} ({}, {})",
        file.display(),
        effect.format(),
        StatusDisplay::format_duration(effect.duration())
    );

    for _ in 0..overlap {
        effect.loop_times(times)?;
    }

    let logger = factory.logger();
    let expected = if times == 0 { 0 } else { overlap as usize };
    while !interrupted.load(Ordering::SeqCst) {
        let finished =
            logger.count(AudioEventType::EffectPlayed) + logger.count(AudioEventType::LineUnavailable);
        if finished >= expected {
            break;
        }
        thread::sleep(REFRESH_INTERVAL);
    }

    factory.destroy();
    Ok(())
}

fn run(cli: CliApp, interrupted: &AtomicBool) -> Result<(), PlayerError> {
    let mut config = load_config();
    if cli.device.is_some() {
        config.preferred_device = cli.device;
    }

    match cli.command {
        Commands::Music { file, loops, volume } => {
            if volume.is_some() {
                config.initial_gain_db = volume;
            }
            run_music(&config, &CliApp::expand_path(&file), loops, interrupted)
        }
        Commands::Effect { file, times, overlap } => {
            run_effect(&config, &CliApp::expand_path(&file), times, overlap, interrupted)
        }
        Commands::Devices => {
            let devices = CpalMixer::list_devices()?;
            StatusDisplay::display_devices(&devices);
            Ok(())
        }
    }
}

fn main() {
    if let Err(e) = logging::init() {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    let cli = CliApp::parse_args();
    let interrupted = install_interrupt_flag();

    if let Err(e) = run(cli, &interrupted) {
        log::log!(e.severity().log_level(), "{}", e);
        StatusDisplay::display_simple_error(&e);
        std::process::exit(1);
    }

    info!("Shutdown complete");
}
