use async_trait::async_trait;
use image::{ExtendedColorType, ImageFormat};
use log::info;
use std::path::{Path, PathBuf};

use super::DisplaySink;
use crate::capture::Frame;
use crate::error::{Error, Result};

/// Writes every drawn frame as `frame_0000.png`, `frame_0001.png`, ...
pub struct PngSequenceSink {
    dir: PathBuf,
    next_index: usize,
    written: Vec<PathBuf>,
}

impl PngSequenceSink {
    /// Create the sink, creating `dir` if needed.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            next_index: 0,
            written: Vec::new(),
        })
    }

    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

#[async_trait]
impl DisplaySink for PngSequenceSink {
    async fn configure(&mut self, width: u32, height: u32) -> Result<()> {
        info!(
            "PngSequenceSink: writing {}x{} frames to {}",
            width,
            height,
            self.dir.display()
        );
        Ok(())
    }

    async fn draw_frame(&mut self, frame: &Frame) -> Result<()> {
        let path = self.dir.join(format!("frame_{:04}.png", self.next_index));
        let (width, height) = frame.dimensions();
        let data = frame.data().to_vec();

        let target = path.clone();
        tokio::task::spawn_blocking(move || {
            image::save_buffer_with_format(
                &target,
                &data,
                width,
                height,
                ExtendedColorType::Rgba8,
                ImageFormat::Png,
            )
        })
        .await
        .map_err(|e| Error::Sink(format!("png writer task failed: {}", e)))?
        .map_err(|e| Error::Sink(format!("{}: {}", path.display(), e)))?;

        self.next_index += 1;
        self.written.push(path);
        Ok(())
    }
}
