//! camera-recorder
//!
//! Records camera frames and microphone audio onto a shared 100 ns timeline.
//! Ships with a synthetic test-pattern source and a sample dump sink.

mod capture;
mod config;
mod error;
mod filter;
mod logging;
mod mux;
mod recorder;
mod sink;

use anyhow::{bail, Context, Result};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};

use config::Config;
use filter::FilterKind;
use mux::clock_to_secs;
use recorder::{create_engine_channels, EngineCommand, EngineStatus, RecorderEngine};
use sink::{read_dump, DumpSinkFactory, StreamConfig};

/// Parsed command line
#[derive(Debug, Default, PartialEq)]
struct CliOptions {
    help: bool,
    output: Option<PathBuf>,
    duration_secs: Option<u64>,
    grayscale: bool,
    no_audio: bool,
    config: Option<PathBuf>,
    inspect: Option<PathBuf>,
}

impl CliOptions {
    fn parse(args: &[String]) -> Result<Self> {
        let mut options = CliOptions::default();
        let mut args = args.iter();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-h" | "--help" => options.help = true,
                "-g" | "--grayscale" => options.grayscale = true,
                "--no-audio" => options.no_audio = true,
                "-o" | "--output" => options.output = Some(PathBuf::from(value(&mut args, arg)?)),
                "-c" | "--config" => options.config = Some(PathBuf::from(value(&mut args, arg)?)),
                "--inspect" => options.inspect = Some(PathBuf::from(value(&mut args, arg)?)),
                "-d" | "--duration" => {
                    let raw = value(&mut args, arg)?;
                    let secs = raw
                        .parse()
                        .with_context(|| format!("Invalid duration: {:?}", raw))?;
                    options.duration_secs = Some(secs);
                }
                other => bail!("Unknown argument: {} (see --help)", other),
            }
        }

        Ok(options)
    }

    /// Apply command line overrides on top of the loaded configuration
    fn apply(&self, config: &mut Config) {
        if self.grayscale {
            config.recording.filter = FilterKind::Grayscale;
        }
        if self.no_audio {
            config.audio.enabled = false;
        }
        if let Some(secs) = self.duration_secs {
            config.recording.duration_secs = secs;
        }
    }
}

fn value<'a>(args: &mut impl Iterator<Item = &'a String>, flag: &str) -> Result<&'a str> {
    match args.next() {
        Some(value) => Ok(value.as_str()),
        None => bail!("{} requires a value", flag),
    }
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let options = CliOptions::parse(args.get(1..).unwrap_or_default())?;

    if options.help {
        print_help();
        return Ok(());
    }

    // Keep the guard alive so buffered log lines reach the file
    let _log_guard = match logging::init_logging() {
        Ok(guard) => Some(guard),
        Err(e) => {
            logging::init_stderr_logging();
            warn!("File logging unavailable, logging to stderr only: {:#}", e);
            None
        }
    };

    if let Some(path) = &options.inspect {
        return inspect(path);
    }

    info!("camera-recorder starting...");

    // Load configuration
    let mut config = match &options.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    info!("Configuration loaded from {:?}", config.config_path());
    options.apply(&mut config);
    config.validate()?;

    let runtime = Arc::new(tokio::runtime::Runtime::new()?);

    let (cmd_tx, cmd_rx, status_tx, status_rx) = create_engine_channels();

    let source = capture::create_frame_source(&config);
    let mut engine = RecorderEngine::new(
        config.clone(),
        Box::new(DumpSinkFactory::new()),
        cmd_rx,
        status_tx,
    );
    engine.set_source(Some(source))?;

    let mut engine_task = runtime.spawn(async move { engine.run().await });
    runtime.spawn(report_status(status_rx));

    // Ctrl+C stops the recording and shuts the engine down
    let ctrl_c_tx = cmd_tx.clone();
    let ctrl_c_runtime = runtime.clone();
    ctrlc::set_handler(move || {
        info!("Ctrl+C received, shutting down...");
        let tx = ctrl_c_tx.clone();
        ctrl_c_runtime.spawn(async move {
            let _ = tx.send(EngineCommand::Shutdown).await;
        });
    })?;

    spawn_console_controls(cmd_tx.clone());

    let duration_secs = config.recording.duration_secs;
    let result = runtime.block_on(async {
        if !config.recording.autostart_on_launch {
            cmd_tx
                .send(EngineCommand::StartRecording {
                    output: options.output.clone(),
                })
                .await
                .context("Recorder engine is not running")?;
        }

        if duration_secs == 0 {
            info!("Recording until Ctrl+C or `quit`...");
        } else {
            info!("Recording for {}s (Ctrl+C to stop early)", duration_secs);
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(duration_secs)) => {
                    info!("Recording duration reached");
                    let _ = cmd_tx.send(EngineCommand::StopRecording).await;
                    let _ = cmd_tx.send(EngineCommand::Shutdown).await;
                }
                res = &mut engine_task => {
                    return res.context("Recorder engine panicked")?;
                }
            }
        }

        engine_task.await.context("Recorder engine panicked")?
    });

    if let Err(e) = &result {
        error!("Recorder engine error: {:#}", e);
    }

    info!("Shutdown complete");
    result
}

/// Log engine status changes until the engine goes away
async fn report_status(mut status_rx: broadcast::Receiver<EngineStatus>) {
    loop {
        match status_rx.recv().await {
            Ok(EngineStatus::Recording {
                video_frames,
                audio_chunks,
                elapsed_secs,
                timeline_secs,
            }) => {
                info!(
                    "Recording: {}s ({:.2}s on the timeline), {} frames, {} audio chunks",
                    elapsed_secs, timeline_secs, video_frames, audio_chunks
                );
            }
            Ok(EngineStatus::Idle) => info!("Recorder idle"),
            Ok(EngineStatus::Error(message)) => error!("Recorder error: {}", message),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Missed {} status updates", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Map one console line to an engine command
fn parse_control(line: &str) -> Option<EngineCommand> {
    let mut words = line.split_whitespace();
    let command = match (words.next()?, words.next()) {
        ("start", path) => EngineCommand::StartRecording {
            output: path.map(PathBuf::from),
        },
        ("stop", None) => EngineCommand::StopRecording,
        ("gray" | "grayscale", None) => EngineCommand::SetFilter(FilterKind::Grayscale),
        ("color" | "colour", None) => EngineCommand::SetFilter(FilterKind::None),
        ("audio", Some("on")) => EngineCommand::SetAudioEnabled(true),
        ("audio", Some("off")) => EngineCommand::SetAudioEnabled(false),
        ("quit" | "exit", None) => EngineCommand::Shutdown,
        _ => return None,
    };
    if words.next().is_some() {
        return None;
    }
    Some(command)
}

/// Read engine commands from stdin until it closes
fn spawn_console_controls(cmd_tx: mpsc::Sender<EngineCommand>) {
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if line.trim().is_empty() {
                continue;
            }
            match parse_control(&line) {
                Some(cmd) => {
                    if cmd_tx.blocking_send(cmd).is_err() {
                        break;
                    }
                }
                None => warn!(
                    "Unknown command {:?} (start [PATH], stop, gray, color, audio on|off, quit)",
                    line.trim()
                ),
            }
        }
    });
}

/// Print a summary of a sample dump
fn inspect(path: &Path) -> Result<()> {
    let contents = read_dump(path)?;

    println!("{}", path.display());
    println!(
        "  finalized: {}",
        if contents.finalized { "yes" } else { "no (truncated)" }
    );

    for (index, stream) in &contents.streams {
        let samples: Vec<_> = contents.stream_samples(*index).collect();
        let bytes: usize = samples.iter().map(|s| s.data.len()).sum();
        let elapsed = samples
            .last()
            .map(|s| s.timestamp.saturating_add(s.duration))
            .unwrap_or(0);

        let description = match stream {
            StreamConfig::Video(video) => format!(
                "video {}x{} @ {} fps, {} bps",
                video.width, video.height, video.fps, video.bitrate
            ),
            StreamConfig::Audio(audio) => format!(
                "audio {} Hz, {} ch, {} bit",
                audio.sample_rate, audio.channels, audio.bits_per_sample
            ),
        };

        println!("  stream {}: {}", index.0, description);
        println!(
            "    {} samples, {} bytes, {:.3}s",
            samples.len(),
            bytes,
            clock_to_secs(elapsed)
        );
    }

    Ok(())
}

fn print_help() {
    println!("camera-recorder - Camera and microphone capture onto a shared timeline");
    println!();
    println!("USAGE:");
    println!("    camera-recorder [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help             Print this help message");
    println!("    -o, --output PATH      Write the recording to PATH");
    println!("    -d, --duration SECS    Stop after SECS seconds (0 records until Ctrl+C)");
    println!("    -g, --grayscale        Convert frames to grayscale");
    println!("        --no-audio         Record video only");
    println!("    -c, --config PATH      Load configuration from PATH");
    println!("        --inspect PATH     Summarize a recording and exit");
    println!();
    println!("CONTROLS (one per line on stdin while running):");
    println!("    start [PATH]   Start a new recording");
    println!("    stop           Stop and finalize the current recording");
    println!("    gray | color   Switch the frame filter");
    println!("    audio on|off   Record audio in the next recording");
    println!("    quit           Stop and exit");
    println!();
    println!("ENVIRONMENT:");
    println!("    RUST_LOG                   Set log level (e.g., debug, info, warn)");
    println!("    CAMERA_RECORDER_LOG_PATH   Override the log directory");
    if let Ok(dir) = logging::log_dir() {
        println!();
        println!("Logs are written to {}", dir.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_flags() {
        let options = CliOptions::parse(&args(&[
            "-o",
            "out.samples",
            "--duration",
            "5",
            "-g",
            "--no-audio",
        ]))
        .unwrap();

        assert_eq!(options.output, Some(PathBuf::from("out.samples")));
        assert_eq!(options.duration_secs, Some(5));
        assert!(options.grayscale);
        assert!(options.no_audio);
        assert!(!options.help);
    }

    #[test]
    fn test_parse_errors() {
        assert!(CliOptions::parse(&args(&["--output"])).is_err());
        assert!(CliOptions::parse(&args(&["-d", "soon"])).is_err());
        assert!(CliOptions::parse(&args(&["--fast"])).is_err());
    }

    #[test]
    fn test_parse_controls() {
        assert!(matches!(
            parse_control("start"),
            Some(EngineCommand::StartRecording { output: None })
        ));
        match parse_control("start /tmp/a.samples") {
            Some(EngineCommand::StartRecording { output }) => {
                assert_eq!(output, Some(PathBuf::from("/tmp/a.samples")));
            }
            other => panic!("unexpected command: {:?}", other),
        }
        assert!(matches!(parse_control(" stop "), Some(EngineCommand::StopRecording)));
        assert!(matches!(
            parse_control("gray"),
            Some(EngineCommand::SetFilter(FilterKind::Grayscale))
        ));
        assert!(matches!(
            parse_control("color"),
            Some(EngineCommand::SetFilter(FilterKind::None))
        ));
        assert!(matches!(
            parse_control("audio off"),
            Some(EngineCommand::SetAudioEnabled(false))
        ));
        assert!(matches!(parse_control("quit"), Some(EngineCommand::Shutdown)));

        assert!(parse_control("audio").is_none());
        assert!(parse_control("stop now").is_none());
        assert!(parse_control("rewind").is_none());
    }

    #[test]
    fn test_overrides_apply_to_config() {
        let options = CliOptions::parse(&args(&["-g", "--no-audio", "-d", "0"])).unwrap();
        let mut config = Config::default();
        options.apply(&mut config);

        assert_eq!(config.recording.filter, FilterKind::Grayscale);
        assert!(!config.audio.enabled);
        assert_eq!(config.recording.duration_secs, 0);
        assert!(config.session_config().audio.is_none());
    }
}
