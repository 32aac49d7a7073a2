//! 采集模块 - 独立线程
//!
//! 控制循环发来 `Acquire{tick}` → 读取一帧 → 转发给分类模块 (和预览模块).
//! 读不到帧时直接通知控制循环, 本tick不做分类.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};

use super::FrameSource;
use crate::pipeline::{CaptureCommand, ClassifyCommand, ControlMessage, PreviewCommand, StageId};

const OPEN_RETRIES: u32 = 3;
const OPEN_RETRY_DELAY: Duration = Duration::from_secs(1);

pub struct CaptureStage<S: FrameSource> {
    source: S,
    commands: Receiver<CaptureCommand>,
    classifier: Sender<ClassifyCommand>,
    preview: Option<Sender<PreviewCommand>>,
    control: Sender<ControlMessage>,

    // 统计
    frames: u64,
    missing: u64,
}

impl<S: FrameSource> CaptureStage<S> {
    pub fn new(
        source: S,
        commands: Receiver<CaptureCommand>,
        classifier: Sender<ClassifyCommand>,
        preview: Option<Sender<PreviewCommand>>,
        control: Sender<ControlMessage>,
    ) -> Self {
        Self {
            source,
            commands,
            classifier,
            preview,
            control,
            frames: 0,
            missing: 0,
        }
    }

    pub fn run(mut self) {
        tracing::info!("🎥 采集模块启动");

        if let Err(e) = self.open() {
            tracing::error!("❌ 摄像头打开失败: {:#}", e);
            let _ = self.control.send(ControlMessage::StageFailed {
                stage: StageId::Capture,
                reason: format!("{:#}", e),
            });
            return;
        }
        let _ = self.control.send(ControlMessage::StageReady(StageId::Capture));

        while let Ok(cmd) = self.commands.recv() {
            match cmd {
                CaptureCommand::Acquire { tick } => {
                    if !self.acquire(tick) {
                        break;
                    }
                }
                CaptureCommand::SelectDevice(device) => match self.source.select_device(device) {
                    Ok(()) => tracing::info!("📷 已切换到设备 {}", device),
                    Err(e) => tracing::warn!("⚠️  切换设备 {} 失败: {:#}", device, e),
                },
                CaptureCommand::Close => break,
            }
        }

        self.source.close();
        tracing::info!(
            "📹 采集模块退出 (帧: {}, 丢失: {})",
            self.frames,
            self.missing
        );
    }

    /// 设备忙时重试几次
    fn open(&mut self) -> anyhow::Result<()> {
        let mut retry_count = 0;
        loop {
            match self.source.open() {
                Ok(()) => return Ok(()),
                Err(e) => {
                    retry_count += 1;
                    if retry_count >= OPEN_RETRIES {
                        return Err(e);
                    }
                    tracing::warn!(
                        "⚠️ 摄像头忙或无法打开, {}秒后重试... ({}/{}): {:#}",
                        OPEN_RETRY_DELAY.as_secs(),
                        retry_count,
                        OPEN_RETRIES,
                        e
                    );
                    std::thread::sleep(OPEN_RETRY_DELAY);
                }
            }
        }
    }

    /// 返回 false 表示下游已关闭
    fn acquire(&mut self, tick: u64) -> bool {
        let Some(frame) = self.source.acquire() else {
            self.missing += 1;
            tracing::debug!("📭 tick {} 没有取到帧", tick);
            return self
                .control
                .send(ControlMessage::FrameMissing { tick })
                .is_ok();
        };

        self.frames += 1;
        if self.frames == 1 {
            tracing::info!("✅ 收到第一帧: {}x{}", frame.width(), frame.height());
        }

        let frame = Arc::new(frame);
        if let Some(preview) = &self.preview {
            // 预览跟不上就丢帧
            let _ = preview.try_send(PreviewCommand::Show(frame.clone()));
        }
        self.classifier
            .send(ClassifyCommand::Classify { tick, frame })
            .is_ok()
    }
}
