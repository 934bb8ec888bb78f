use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;
use std::process::{Child, Command, Stdio};

pub struct EncodeSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub codec: String,
    pub pix_fmt: String,
    pub crf: u32,
    pub bitrate: Option<String>,
}

/// Pipes raw RGBA frames into an ffmpeg child process and muxes the source
/// clip's audio into the output, so the rendered sweep plays back in sync
/// with the audible clip.
pub struct FfmpegEncoder {
    child: Child,
}

impl FfmpegEncoder {
    pub fn new(output_path: &Path, audio_path: &Path, settings: &EncodeSettings) -> Result<Self> {
        let mut command = Command::new("ffmpeg");
        command
            .arg("-y")
            .args(["-f", "rawvideo"])
            .args(["-pixel_format", "rgba"])
            .args(["-video_size", &format!("{}x{}", settings.width, settings.height)])
            .args(["-framerate", &settings.fps.to_string()])
            .args(["-i", "pipe:0"])
            .arg("-i")
            .arg(audio_path)
            .args(["-c:v", &settings.codec])
            .args(["-pix_fmt", &settings.pix_fmt]);

        if let Some(ref bitrate) = settings.bitrate {
            command.args(["-b:v", bitrate]);
        } else {
            command.args(["-crf", &settings.crf.to_string()]);
            command.args(["-preset", "medium"]);
        }

        command
            .args(["-c:a", "aac"])
            .args(["-b:a", "192k"])
            .arg("-shortest")
            .arg(output_path);

        let child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .context("Failed to spawn ffmpeg. Is ffmpeg installed?")?;

        log::info!(
            "FFmpeg encoder started: {}x{} @ {}fps, codec={}",
            settings.width,
            settings.height,
            settings.fps,
            settings.codec
        );

        Ok(Self { child })
    }

    pub fn write_frame(&mut self, rgba_pixels: &[u8]) -> Result<()> {
        let stdin = self.child.stdin.as_mut().context("FFmpeg stdin not available")?;
        stdin
            .write_all(rgba_pixels)
            .context("Failed to write frame to ffmpeg")?;
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        // Close stdin to signal EOF
        drop(self.child.stdin.take());

        let output = self.child.wait_with_output().context("Failed to wait for ffmpeg")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("FFmpeg exited with error:\n{}", stderr);
        }

        log::info!("FFmpeg encoding complete");
        Ok(())
    }
}
