//! Motion-JPEG 证据文件
//!
//! 连续拼接的 JPEG 帧 (`ffplay -f mjpeg` 可直接播放), 结束时写入同名 `.json` 元数据.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::RgbImage;
use serde::{Deserialize, Serialize};

use super::{EvidenceSink, FrameWriter};
use crate::error::{Result, SentinelError};
use crate::rules::ViolationKind;

/// 证据元数据 (sidecar)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceMeta {
    pub kind: String,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
    pub frames: u64,
}

/// MJPEG 证据输出
#[derive(Debug, Clone, Copy)]
pub struct MjpegSink {
    quality: u8,
}

impl MjpegSink {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }
}

impl Default for MjpegSink {
    fn default() -> Self {
        Self::new(85)
    }
}

impl EvidenceSink for MjpegSink {
    fn extension(&self) -> &str {
        "mjpeg"
    }

    fn open(
        &mut self,
        path: &Path,
        size: (u32, u32),
        fps: f64,
        kind: ViolationKind,
    ) -> Result<Box<dyn FrameWriter>> {
        let file = File::create(path).map_err(|source| SentinelError::EvidenceAllocation {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Box::new(MjpegWriter {
            out: Some(BufWriter::new(file)),
            path: path.to_path_buf(),
            size,
            fps,
            kind,
            quality: self.quality,
            frames: 0,
        }))
    }
}

/// 固定尺寸的 MJPEG 写入器
pub struct MjpegWriter {
    out: Option<BufWriter<File>>,
    path: PathBuf,
    size: (u32, u32),
    fps: f64,
    kind: ViolationKind,
    quality: u8,
    frames: u64,
}

impl FrameWriter for MjpegWriter {
    fn write_frame(&mut self, image: &RgbImage) -> Result<()> {
        let out = self
            .out
            .as_mut()
            .ok_or_else(|| SentinelError::EvidenceWrite("writer already finished".to_string()))?;

        // 尺寸与会话不一致时缩放到会话尺寸
        let resized;
        let frame = if image.dimensions() == self.size {
            image
        } else {
            resized = imageops::resize(image, self.size.0, self.size.1, FilterType::Triangle);
            &resized
        };

        let encoder = JpegEncoder::new_with_quality(&mut *out, self.quality);
        frame
            .write_with_encoder(encoder)
            .map_err(|e| SentinelError::EvidenceWrite(format!("{}: {}", self.path.display(), e)))?;
        self.frames += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<u64> {
        let Some(mut out) = self.out.take() else {
            return Ok(self.frames);
        };
        out.flush()
            .map_err(|e| SentinelError::EvidenceWrite(format!("{}: {}", self.path.display(), e)))?;

        let meta = EvidenceMeta {
            kind: self.kind.label().to_string(),
            fps: self.fps,
            width: self.size.0,
            height: self.size.1,
            frames: self.frames,
        };
        let json = serde_json::to_string_pretty(&meta)
            .map_err(|e| SentinelError::EvidenceWrite(e.to_string()))?;
        let sidecar = self.path.with_extension("json");
        std::fs::write(&sidecar, json)
            .map_err(|e| SentinelError::EvidenceWrite(format!("{}: {}", sidecar.display(), e)))?;
        Ok(self.frames)
    }
}
