//! Export a frame range.

use std::io::Write;
use std::path::{Path, PathBuf};

use framecast_common::clock::MonotonicClock;
use framecast_common::config::{config_file_path, AppConfig};
use framecast_common::error::{FramecastError, FramecastResult};
use framecast_export::ffmpeg::{command_exists, FfmpegSink};
use framecast_export::{
    progress_channel, validate_range, CancelFlag, ExportLoop, ExportOutcome, ProgressEvent,
    RawFileSink, TestPatternSource,
};
use framecast_model::{
    resolve_output_path, Bitrate, ExportSettings, ExportType, Fraction, OutputRequest,
    OutputTarget, SettingsSnapshot,
};

use crate::ExportArgs;

pub async fn run(args: ExportArgs, config: &AppConfig) -> anyhow::Result<()> {
    config.validate()?;
    let range = validate_range(args.start, args.end)?;
    let settings = build_settings(&args, config)?;

    let output = output_target(&args, &settings, config)?.path;

    if !args.raw && !command_exists("ffmpeg") {
        return Err(FramecastError::unsupported(
            "ffmpeg was not found on PATH; install it or pass --raw",
        )
        .into());
    }

    println!("Exporting frames {}-{}", range.start_frame(), range.end_frame());
    println!("  Output: {}", output.display());
    println!(
        "  Video: {}x{} @ {} fps ({})",
        settings.video.width,
        settings.video.height,
        settings.video.fps.as_f64(),
        if args.raw { "raw rgba" } else { settings.video.codec.as_str() }
    );

    let cancel = CancelFlag::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, cancelling export");
                cancel.cancel();
            }
        })
    };

    let clock = MonotonicClock::start();
    tracing::info!(started_at = clock.epoch_wall(), "Export job started");

    let (mut observer, mut events) = progress_channel(config.export.channel_capacity);
    let defaults = config.export.clone();
    let job_settings = settings.clone();
    let raw = args.raw;
    let job = tokio::task::spawn_blocking(move || {
        let mut source =
            TestPatternSource::new(job_settings.video.width, job_settings.video.height);
        let export = ExportLoop::from_config(clock, &defaults);
        let outcome = if raw {
            let mut sink = RawFileSink::new(&output);
            export.run(range, &mut source, &mut sink, &mut observer, &cancel)
        } else {
            let mut sink = FfmpegSink::new(&output, job_settings, range.frame_count());
            export.run(range, &mut source, &mut sink, &mut observer, &cancel)
        };
        (outcome, observer.dropped())
    });

    while let Some(event) = events.recv().await {
        print_event(&event);
    }
    let (outcome, dropped) = job.await?;
    ctrl_c.abort();
    tracing::debug!(dropped, "Progress events skipped by the display");

    if let Err(e) = save_last_settings(&settings) {
        tracing::warn!("Failed to save export settings: {e}");
    }

    match outcome {
        ExportOutcome::Completed {
            frames_written,
            elapsed,
        } => {
            println!(
                "Export complete: {frames_written} frames in {:.1}s",
                elapsed.as_secs_f64()
            );
            Ok(())
        }
        ExportOutcome::Cancelled { frames_written } => {
            println!("Export cancelled after {frames_written} frames");
            Ok(())
        }
        failed => {
            let message = failed
                .error()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown failure".to_string());
            Err(FramecastError::export(message).into())
        }
    }
}

/// Where the export goes, refusing to replace an existing file unless forced.
fn output_target(
    args: &ExportArgs,
    settings: &ExportSettings,
    config: &AppConfig,
) -> anyhow::Result<OutputTarget> {
    let target = match &args.output {
        Some(path) => OutputTarget {
            path: path.clone(),
            export_type: settings.export_type,
        },
        None => {
            let video_format = if args.raw { "rgba" } else { settings.video.format.as_str() };
            resolve_output_path(
                &OutputRequest {
                    folder: &args.folder,
                    file_name: &args.name,
                    export_type: settings.export_type,
                    video_format,
                    image_suffix: &args.image_suffix,
                },
                &config.exports_dir,
            )
        }
    };
    if target.would_overwrite() && !args.force {
        anyhow::bail!(
            "{} already exists; pass --force to overwrite it",
            target.path.display()
        );
    }
    Ok(target)
}

/// Merge configuration, saved settings and flags, in that order.
fn build_settings(args: &ExportArgs, config: &AppConfig) -> anyhow::Result<ExportSettings> {
    let mut settings = ExportSettings::default();
    settings.video.width = config.export.width;
    settings.video.height = config.export.height;
    settings.video.fps = Fraction::new(config.export.fps, 1);
    settings.video.codec = config.export.video_codec.clone();

    if let Some(path) = &args.settings {
        settings = load_settings(path)?.restore(settings)?;
    }

    settings.export_type = ExportType::from(args.export_type);
    if let Some(width) = args.width {
        settings.video.width = width;
    }
    if let Some(height) = args.height {
        settings.video.height = height;
    }
    if let Some(fps) = args.fps {
        settings.video.fps = Fraction::new(fps, 1);
    }
    if let Some(codec) = &args.codec {
        settings.video.codec = codec.clone();
    }
    if let Some(bitrate) = &args.video_bitrate {
        settings.video.bitrate = Bitrate::parse(bitrate);
    }
    if settings.export_type == ExportType::ImageSequence {
        settings.video.apply_image_sequence(&args.image_suffix);
    }

    if settings.video.width == 0 || settings.video.height == 0 {
        anyhow::bail!("Output size must be non-zero");
    }
    Ok(settings)
}

fn load_settings(path: &Path) -> FramecastResult<SettingsSnapshot> {
    if !path.exists() {
        return Err(FramecastError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let json = std::fs::read_to_string(path)?;
    SettingsSnapshot::from_json(&json).map_err(|e| FramecastError::config(e.to_string()))
}

fn last_settings_path() -> PathBuf {
    config_file_path().with_file_name("last-export.json")
}

fn save_last_settings(settings: &ExportSettings) -> FramecastResult<()> {
    let path = last_settings_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = SettingsSnapshot::capture(settings)
        .to_json()
        .map_err(|e| FramecastError::config(e.to_string()))?;
    std::fs::write(&path, json)?;
    tracing::debug!(path = %path.display(), "Saved export settings");
    Ok(())
}

fn print_event(event: &ProgressEvent) {
    match event {
        ProgressEvent::Started { .. } => {}
        ProgressEvent::Frame(progress) => {
            print!(
                "\r  {}{:<48}",
                progress.percentage_label(),
                progress.label
            );
            if progress.is_final {
                println!();
            }
            std::io::stdout().flush().ok();
        }
        ProgressEvent::Ended { path } => {
            tracing::debug!(path = %path.display(), "Export ended");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn export_args(extra: &[&str]) -> ExportArgs {
        let argv = ["framecast", "export", "--end", "10"]
            .into_iter()
            .chain(extra.iter().copied());
        match crate::Cli::try_parse_from(argv).unwrap().command {
            crate::Commands::Export(args) => args,
            _ => unreachable!("parsed a non-export command"),
        }
    }

    fn scratch_file(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("framecast-cli-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, b"existing").unwrap();
        path
    }

    #[test]
    fn test_explicit_output_is_not_overwritten_without_force() {
        let path = scratch_file("explicit.mp4");
        let config = AppConfig::default();
        let out = path.to_str().unwrap();

        let args = export_args(&["-o", out]);
        let settings = build_settings(&args, &config).unwrap();
        let err = output_target(&args, &settings, &config).unwrap_err();
        assert!(err.to_string().contains("--force"));

        let forced = export_args(&["-o", out, "--force"]);
        let target = output_target(&forced, &settings, &config).unwrap();
        assert_eq!(target.path, path);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_resolved_output_is_not_overwritten_without_force() {
        let path = scratch_file("resolved.mp4");
        let config = AppConfig::default();
        let folder = path.parent().unwrap().to_str().unwrap();

        let args = export_args(&["--folder", folder, "--name", "resolved"]);
        let settings = build_settings(&args, &config).unwrap();
        assert!(output_target(&args, &settings, &config).is_err());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_new_explicit_output_is_accepted() {
        let config = AppConfig::default();
        let path = std::env::temp_dir().join("framecast-cli-does-not-exist.mp4");
        let args = export_args(&["-o", path.to_str().unwrap()]);
        let settings = build_settings(&args, &config).unwrap();
        let target = output_target(&args, &settings, &config).unwrap();
        assert_eq!(target.path, path);
    }
}
