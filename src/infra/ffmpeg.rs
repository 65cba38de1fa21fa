use std::{io::ErrorKind, path::PathBuf, process::Stdio, time::Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, warn};

use crate::application::clients::{EncodeError, EncodeRequest, VideoEncoder};

/// Encodes videos by shelling out to an `ffmpeg` binary.
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    binary: PathBuf,
    width: u32,
    height: u32,
}

impl FfmpegEncoder {
    pub fn new(binary: impl Into<PathBuf>, width: u32, height: u32) -> Self {
        Self {
            binary: binary.into(),
            width,
            height,
        }
    }

    /// Scale into the frame keeping the aspect ratio, then pad with black.
    fn frame_filter(&self) -> String {
        let (w, h) = (self.width, self.height);
        format!(
            "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:color=black"
        )
    }
}

#[async_trait]
impl VideoEncoder for FfmpegEncoder {
    async fn encode(&self, request: &EncodeRequest) -> Result<(), EncodeError> {
        let started_at = Instant::now();
        let output = Command::new(&self.binary)
            .arg("-y")
            .args(["-loop", "1", "-i"])
            .arg(&request.image)
            .arg("-i")
            .arg(&request.audio)
            .args(["-c:a", "aac", "-c:v", "libx264", "-vf"])
            .arg(self.frame_filter())
            .args(["-pix_fmt", "yuv420p", "-shortest"])
            .arg(&request.output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|err| {
                warn!(
                    target = "tunesmith::infra::ffmpeg",
                    error = %err,
                    binary = %self.binary.display(),
                    "failed to spawn ffmpeg"
                );
                if err.kind() == ErrorKind::NotFound {
                    EncodeError::NotFound(err)
                } else {
                    EncodeError::Io(err)
                }
            })?;

        if !output.status.success() {
            let exit_code = output.status.code();
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            warn!(
                target = "tunesmith::infra::ffmpeg",
                exit_code = exit_code.map(i64::from).unwrap_or(-1),
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                stderr = %stderr,
                "ffmpeg invocation failed"
            );
            return Err(EncodeError::Failed { exit_code, stderr });
        }

        info!(
            target = "tunesmith::infra::ffmpeg",
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            output = %request.output.display(),
            "video encoded"
        );
        Ok(())
    }
}
