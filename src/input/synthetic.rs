//! 合成帧来源 - 没有摄像头时调试整个流水线

use image::{Rgb, RgbImage};

use super::{Frame, FrameSource};

pub struct SyntheticCamera {
    width: u32,
    height: u32,
    device: usize,
    frame_id: u64,
    opened: bool,
}

impl SyntheticCamera {
    pub fn new(device: usize, width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            device,
            frame_id: 0,
            opened: false,
        }
    }
}

impl FrameSource for SyntheticCamera {
    fn open(&mut self) -> anyhow::Result<()> {
        anyhow::ensure!(self.width > 0 && self.height > 0, "无效的帧尺寸");
        self.opened = true;
        tracing::info!(
            "🎨 合成摄像头 #{}: {}x{}",
            self.device,
            self.width,
            self.height
        );
        Ok(())
    }

    fn acquire(&mut self) -> Option<Frame> {
        if !self.opened {
            return None;
        }
        self.frame_id += 1;

        // 随帧号平移的渐变, 不同设备颜色不同
        let shift = (self.frame_id * 4) as u32;
        let tint = (self.device as u32 * 85) % 256;
        let image = RgbImage::from_fn(self.width, self.height, |x, y| {
            Rgb([
                ((x + shift) % 256) as u8,
                ((y + shift / 2) % 256) as u8,
                tint as u8,
            ])
        });
        Some(image)
    }

    fn select_device(&mut self, device: usize) -> anyhow::Result<()> {
        self.device = device;
        self.frame_id = 0;
        Ok(())
    }

    fn close(&mut self) {
        self.opened = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_after_open() {
        let mut camera = SyntheticCamera::new(0, 32, 24);
        assert!(camera.acquire().is_none());

        camera.open().unwrap();
        let frame = camera.acquire().unwrap();
        assert_eq!(frame.dimensions(), (32, 24));

        camera.close();
        assert!(camera.acquire().is_none());
    }

    #[test]
    fn test_zero_size_rejected() {
        let mut camera = SyntheticCamera::new(0, 0, 24);
        assert!(camera.open().is_err());
    }
}
