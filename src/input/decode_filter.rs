//! FFmpeg解码过滤器模块
//! FFmpeg decode filter: YUV420P 帧 → RGB `Frame` → 主循环

use crate::detection::Frame;
use crossbeam_channel::{Sender, TrySendError};
use ez_ffmpeg::filter::frame_filter::FrameFilter;
use ez_ffmpeg::filter::frame_filter_context::FrameFilterContext;
use ez_ffmpeg::{AVMediaType, Frame as AvFrame};
use image::RgbImage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// FFmpeg解码过滤器
#[derive(Clone)]
pub struct DecodeFilter {
    pub tx: Sender<Frame>, // 发送给主循环
    pub stop: Arc<AtomicBool>,
    /// 实时源: 主循环忙时丢帧; 文件源: 阻塞等待, 不丢帧
    pub live: bool,
    pub next_index: u64,
    pub dropped: u64,
    pub count: usize,
    pub last: Instant,
    pub current_fps: f64,
}

impl DecodeFilter {
    pub fn new(tx: Sender<Frame>, stop: Arc<AtomicBool>, live: bool) -> Self {
        Self {
            tx,
            stop,
            live,
            next_index: 0,
            dropped: 0,
            count: 0,
            last: Instant::now(),
            current_fps: 0.0,
        }
    }

    fn deliver(&mut self, frame: Frame) -> Result<(), String> {
        if self.live {
            match self.tx.try_send(frame) {
                Ok(()) => Ok(()),
                Err(TrySendError::Full(_)) => {
                    self.dropped += 1;
                    Ok(())
                }
                Err(TrySendError::Disconnected(_)) => Err("frame receiver closed".to_string()),
            }
        } else {
            self.tx
                .send(frame)
                .map_err(|_| "frame receiver closed".to_string())
        }
    }
}

/// YUV420P → RGB (BT.601)
pub fn yuv420p_to_rgb(
    data_y: &[u8],
    data_u: &[u8],
    data_v: &[u8],
    y_stride: usize,
    uv_stride: usize,
    w: u32,
    h: u32,
) -> RgbImage {
    let mut rgb = RgbImage::new(w, h);
    for (x, y, px) in rgb.enumerate_pixels_mut() {
        let (x, y) = (x as usize, y as usize);
        let y_val = data_y[y * y_stride + x] as f32;
        let u_val = data_u[(y / 2) * uv_stride + x / 2] as f32 - 128.0;
        let v_val = data_v[(y / 2) * uv_stride + x / 2] as f32 - 128.0;

        let r = (y_val + 1.402 * v_val).clamp(0.0, 255.0) as u8;
        let g = (y_val - 0.344 * u_val - 0.714 * v_val).clamp(0.0, 255.0) as u8;
        let b = (y_val + 1.772 * u_val).clamp(0.0, 255.0) as u8;
        px.0 = [r, g, b];
    }
    rgb
}

impl FrameFilter for DecodeFilter {
    fn media_type(&self) -> AVMediaType {
        AVMediaType::AVMEDIA_TYPE_VIDEO
    }

    fn init(&mut self, _ctx: &FrameFilterContext) -> Result<(), String> {
        info!("✅ 采集线程启动");
        Ok(())
    }

    fn filter_frame(
        &mut self,
        frame: AvFrame,
        _ctx: &FrameFilterContext,
    ) -> Result<Option<AvFrame>, String> {
        if self.stop.load(Ordering::Relaxed) {
            return Err("capture cancelled".to_string());
        }

        let image = unsafe {
            if frame.as_ptr().is_null() {
                return Ok(Some(frame));
            }

            let raw = &*frame.as_ptr();
            let w = raw.width as u32;
            let h = raw.height as u32;
            if w == 0 || h == 0 {
                return Ok(Some(frame));
            }

            // 解码链路前置 format=yuv420p, 三个平面均有效
            let y_stride = raw.linesize[0] as usize;
            let uv_stride = raw.linesize[1] as usize;
            let uv_rows = (h as usize).div_ceil(2);
            let data_y = std::slice::from_raw_parts(raw.data[0], y_stride * h as usize);
            let data_u = std::slice::from_raw_parts(raw.data[1], uv_stride * uv_rows);
            let data_v = std::slice::from_raw_parts(raw.data[2], uv_stride * uv_rows);

            yuv420p_to_rgb(data_y, data_u, data_v, y_stride, uv_stride, w, h)
        };

        self.count += 1;

        // 计算FPS
        if self.last.elapsed().as_secs_f64() >= 1.0 {
            let elapsed = self.last.elapsed().as_secs_f64();
            self.current_fps = self.count as f64 / elapsed;
            debug!(
                "📺 采集统计: {}帧 | 实际{:.1}fps | 丢帧{}",
                self.count, self.current_fps, self.dropped
            );
            self.last = Instant::now();
            self.count = 0;
        }

        let index = self.next_index;
        self.next_index += 1;
        self.deliver(Frame::new(index, image))?;

        Ok(Some(frame))
    }

    fn uninit(&mut self, _ctx: &FrameFilterContext) {
        info!("✅ 采集线程退出 (共{}帧, 丢帧{})", self.next_index, self.dropped);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grey_yuv_is_grey_rgb() {
        let (w, h) = (4u32, 2u32);
        let y = vec![128u8; 4 * 2];
        let u = vec![128u8; 2];
        let v = vec![128u8; 2];
        let rgb = yuv420p_to_rgb(&y, &u, &v, 4, 2, w, h);
        assert_eq!(rgb.dimensions(), (4, 2));
        assert!(rgb.pixels().all(|p| p.0 == [128, 128, 128]));
    }

    #[test]
    fn test_red_chroma() {
        let y = vec![76u8; 4];
        let u = vec![85u8; 1];
        let v = vec![255u8; 1];
        let rgb = yuv420p_to_rgb(&y, &u, &v, 2, 1, 2, 2);
        let p = rgb.get_pixel(1, 1).0;
        assert!(p[0] > 240);
        assert!(p[1] < 10);
        assert!(p[2] < 10);
    }

    #[test]
    fn test_file_delivery_blocks_and_live_drops() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let mut live = DecodeFilter::new(tx, Arc::new(AtomicBool::new(false)), true);
        live.deliver(Frame::new(0, RgbImage::new(2, 2))).unwrap();
        live.deliver(Frame::new(1, RgbImage::new(2, 2))).unwrap();
        assert_eq!(live.dropped, 1);
        assert_eq!(rx.recv().unwrap().index, 0);
        drop(rx);
        assert!(live.deliver(Frame::new(2, RgbImage::new(2, 2))).is_err());
    }
}
