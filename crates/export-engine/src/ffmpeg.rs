//! A sink that pipes raw frames into an `ffmpeg` child process.

use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread::JoinHandle;

use framecast_model::{Bitrate, ExportSettings, ExportType, Fraction};

use crate::error::{SinkError, SinkErrorKind};
use crate::sink::Sink;
use crate::source::FrameBuffer;

/// Encodes frames with the `ffmpeg` binary found on `PATH`.
pub struct FfmpegSink {
    path: PathBuf,
    settings: ExportSettings,
    frame_count: u64,
    binary: String,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_task: Option<JoinHandle<String>>,
}

impl FfmpegSink {
    /// `frame_count` bounds the output length when audio is generated.
    pub fn new(path: impl Into<PathBuf>, settings: ExportSettings, frame_count: u64) -> Self {
        Self {
            path: path.into(),
            settings,
            frame_count,
            binary: "ffmpeg".to_string(),
            child: None,
            stdin: None,
            stderr_task: None,
        }
    }

    /// Use a different ffmpeg executable.
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Wait for the child to exit and turn a failed exit into a sink error.
    fn finish(&mut self) -> Result<(), SinkError> {
        // Closing stdin signals end of input so ffmpeg can flush and mux.
        drop(self.stdin.take());

        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        let status = child
            .wait()
            .map_err(|e| SinkError::unknown(format!("Failed to wait on ffmpeg: {e}")))?;

        let stderr_output = self
            .stderr_task
            .take()
            .map(|task| {
                task.join()
                    .unwrap_or_else(|_| "<failed to join stderr reader>".to_string())
            })
            .unwrap_or_default();

        if !status.success() {
            return Err(SinkError::from_message(format!(
                "ffmpeg export failed (status {status}): {}",
                stderr_output.trim()
            )));
        }

        tracing::debug!(output = %self.path.display(), "ffmpeg finished");
        Ok(())
    }
}

impl Sink for FfmpegSink {
    fn path(&self) -> &Path {
        &self.path
    }

    fn open(&mut self) -> Result<(), SinkError> {
        if !command_exists(&self.binary) {
            return Err(SinkError::new(
                SinkErrorKind::CodecUnsupported,
                format!("No encoder available ({} not found in PATH)", self.binary),
            ));
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let args = ffmpeg_args(&self.settings, &self.path, self.frame_count);
        tracing::debug!(args = ?args, "Running ffmpeg");

        let pipes_frames = self.settings.export_type.has_video();
        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(if pipes_frames {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| SinkError::unknown(format!("Failed to start ffmpeg: {e}")))?;

        let stdin = if pipes_frames {
            Some(
                child
                    .stdin
                    .take()
                    .ok_or_else(|| SinkError::unknown("Failed to capture ffmpeg stdin"))?,
            )
        } else {
            None
        };
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| SinkError::unknown("Failed to capture ffmpeg stderr"))?;

        // Drain stderr concurrently so ffmpeg never blocks on a full pipe.
        let stderr_task = std::thread::spawn(move || -> String {
            let mut reader = BufReader::new(stderr);
            let mut output = String::new();
            match reader.read_to_string(&mut output) {
                Ok(_) => output,
                Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
            }
        });

        tracing::info!(pid = child.id(), args_len = args.len(), "ffmpeg process started");

        self.child = Some(child);
        self.stdin = stdin;
        self.stderr_task = Some(stderr_task);
        Ok(())
    }

    fn write(&mut self, frame: &FrameBuffer) -> Result<(), SinkError> {
        if self.child.is_none() {
            return Err(SinkError::unknown("ffmpeg sink written before open"));
        }
        // Audio-only output has no video input to feed.
        if !self.settings.export_type.has_video() {
            return Ok(());
        }

        let expected = (self.settings.video.width, self.settings.video.height);
        if (frame.width, frame.height) != expected {
            return Err(SinkError::new(
                SinkErrorKind::EncodeFailure,
                format!(
                    "Frame {} is {}x{}, encoder expects {}x{}",
                    frame.number, frame.width, frame.height, expected.0, expected.1
                ),
            ));
        }

        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| SinkError::unknown("ffmpeg sink written before open"))?;

        if let Err(err) = stdin.write_all(&frame.data) {
            // A broken pipe means ffmpeg already exited; its stderr says why.
            return match self.finish() {
                Err(exit_err) => Err(exit_err),
                Ok(()) => Err(SinkError::new(
                    SinkErrorKind::EncodeFailure,
                    format!("Failed to write frame {} to ffmpeg: {err}", frame.number),
                )),
            };
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        self.finish()
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            drop(self.stdin.take());
            if let Err(err) = child.kill() {
                tracing::debug!(error = %err, "ffmpeg already exited");
            }
            child.wait().ok();
        }
    }
}

/// Command-line arguments for encoding `frame_count` raw RGBA frames from
/// stdin into `output`.
///
/// Audio-only exports read no frames; their silent track is cut to the
/// duration the frames would have covered.
pub fn ffmpeg_args(settings: &ExportSettings, output: &Path, frame_count: u64) -> Vec<String> {
    let video = &settings.video;
    let audio = &settings.audio;

    let mut args: Vec<String> = ["-y", "-hide_banner", "-loglevel", "error", "-nostats"]
        .into_iter()
        .map(String::from)
        .collect();

    if settings.export_type.has_video() {
        for arg in ["-f", "rawvideo", "-pix_fmt", "rgba"] {
            args.push(arg.to_string());
        }
        args.push("-s".to_string());
        args.push(format!("{}x{}", video.width, video.height));
        args.push("-r".to_string());
        args.push(format!("{}/{}", video.fps.num, video.fps.den.max(1)));
        args.push("-i".to_string());
        args.push("pipe:0".to_string());
    }

    let wants_audio = settings.wants_audio();
    if wants_audio {
        // Frames carry no audio; encode a silent track with the requested layout.
        args.push("-f".to_string());
        args.push("lavfi".to_string());
        args.push("-i".to_string());
        args.push(format!(
            "anullsrc=r={}:cl={}:d={}",
            audio.sample_rate,
            audio.channel_layout.ffmpeg_name(),
            duration_secs(video.fps, frame_count)
        ));
    }

    if settings.export_type == ExportType::AudioOnly {
        args.push("-vn".to_string());
    } else {
        args.push("-c:v".to_string());
        args.push(video.codec.clone());
        if settings.export_type != ExportType::ImageSequence {
            args.push("-pix_fmt".to_string());
            args.push("yuv420p".to_string());
        }
        match video.bitrate {
            Bitrate::Bits(0) => {}
            Bitrate::Bits(bits) => {
                args.push("-b:v".to_string());
                args.push(bits.to_string());
            }
            quality => {
                if let Some(option) = quality.quality_option() {
                    args.push(format!("-{option}"));
                    args.push(quality.as_value().to_string());
                }
            }
        }
        if video.pixel_ratio.num > 0 && video.pixel_ratio.den > 0 {
            args.push("-vf".to_string());
            args.push(format!(
                "setsar={}/{}",
                video.pixel_ratio.num, video.pixel_ratio.den
            ));
        }
        if video.interlaced {
            args.push("-flags".to_string());
            args.push("+ilme+ildct".to_string());
            args.push("-top".to_string());
            args.push(if video.top_field_first { "1" } else { "0" }.to_string());
        }
    }

    if wants_audio {
        args.push("-c:a".to_string());
        args.push(audio.codec.clone());
        args.push("-ar".to_string());
        args.push(audio.sample_rate.to_string());
        args.push("-ac".to_string());
        args.push(audio.channels.to_string());
        if audio.bitrate.as_value() > 0 {
            args.push("-b:a".to_string());
            args.push(audio.bitrate.as_value().to_string());
        }
        args.push("-shortest".to_string());
    } else {
        args.push("-an".to_string());
    }

    if settings.export_type == ExportType::ImageSequence {
        args.push("-f".to_string());
        args.push("image2".to_string());
    } else if matches!(video.format.as_str(), "mp4" | "mov" | "m4v") {
        args.push("-movflags".to_string());
        args.push("+faststart".to_string());
    }

    args.push(output.display().to_string());
    args
}

/// Seconds covered by `frame_count` frames at `fps`, formatted for ffmpeg.
fn duration_secs(fps: Fraction, frame_count: u64) -> String {
    let rate = fps.as_f64();
    let secs = if rate > 0.0 {
        frame_count as f64 / rate
    } else {
        0.0
    };
    format!("{secs:.6}")
}

/// Whether `binary` resolves on `PATH`.
pub fn command_exists(binary: &str) -> bool {
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {binary} >/dev/null 2>&1"))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}
