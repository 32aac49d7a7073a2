//! 预览模块 - 独立线程, 把采集到的帧交给观察者 (显示/保存)
//!
//! 预览慢了只会丢帧, 不会拖慢 采集→分类 主路径.

use std::path::PathBuf;
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};

use crate::error::MirrorError;
use crate::input::Frame;
use crate::pipeline::{ControlMessage, PreviewCommand, StageId};

pub trait FrameObserver: Send + 'static {
    fn init(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_frame(&mut self, frame: &Frame) -> anyhow::Result<()>;
}

impl<T: FrameObserver + ?Sized> FrameObserver for Box<T> {
    fn init(&mut self) -> anyhow::Result<()> {
        (**self).init()
    }

    fn on_frame(&mut self, frame: &Frame) -> anyhow::Result<()> {
        (**self).on_frame(frame)
    }
}

pub struct PreviewStage<O: FrameObserver> {
    observer: O,
    commands: Receiver<PreviewCommand>,
    control: Sender<ControlMessage>,
    shown: u64,
}

impl<O: FrameObserver> PreviewStage<O> {
    pub fn new(observer: O, commands: Receiver<PreviewCommand>, control: Sender<ControlMessage>) -> Self {
        Self {
            observer,
            commands,
            control,
            shown: 0,
        }
    }

    pub fn run(mut self) {
        tracing::info!("🖼️  预览模块启动");

        if let Err(e) = self.observer.init() {
            tracing::error!("❌ 预览初始化失败: {:#}", e);
            let _ = self.control.send(ControlMessage::StageFailed {
                stage: StageId::Preview,
                reason: format!("{:#}", e),
            });
            return;
        }
        let _ = self.control.send(ControlMessage::StageReady(StageId::Preview));

        while let Ok(cmd) = self.commands.recv() {
            match cmd {
                PreviewCommand::Show(frame) => self.show(frame),
                PreviewCommand::Close => break,
            }
        }
        tracing::info!("🖼️  预览模块退出 (显示: {})", self.shown);
    }

    fn show(&mut self, frame: Arc<Frame>) {
        match self.observer.on_frame(&frame) {
            Ok(()) => self.shown += 1,
            Err(e) => tracing::warn!("⚠️  预览失败: {:#}", e),
        }
    }
}

/// 每 N 帧保存一张 PNG 快照
pub struct SnapshotObserver {
    dir: PathBuf,
    every: u64,
    seen: u64,
}

impl SnapshotObserver {
    pub fn new(dir: impl Into<PathBuf>, every: u64) -> Self {
        Self {
            dir: dir.into(),
            every: every.max(1),
            seen: 0,
        }
    }
}

impl FrameObserver for SnapshotObserver {
    fn init(&mut self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.dir).map_err(|e| MirrorError::io(&self.dir, e))?;
        tracing::info!("📸 快照目录: {}", self.dir.display());
        Ok(())
    }

    fn on_frame(&mut self, frame: &Frame) -> anyhow::Result<()> {
        self.seen += 1;
        if self.seen % self.every != 0 {
            return Ok(());
        }
        let path = self.dir.join(format!("frame_{:06}.png", self.seen));
        frame.save(&path)?;
        tracing::debug!("📸 {}", path.display());
        Ok(())
    }
}
