//! 分类模块 (Detector)
//! 职责: 接收采集模块的帧 → 分类 → 把置信度发回控制循环

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender};

use super::Classifier;
use crate::pipeline::{ClassifyCommand, ControlMessage, StageId};

pub struct Detector<C: Classifier> {
    classifier: C,
    commands: Receiver<ClassifyCommand>,
    control: Sender<ControlMessage>,

    // 统计
    count: u64,
    failures: u64,
    last: Instant,
    current_fps: f64,
}

impl<C: Classifier> Detector<C> {
    pub fn new(
        classifier: C,
        commands: Receiver<ClassifyCommand>,
        control: Sender<ControlMessage>,
    ) -> Self {
        Self {
            classifier,
            commands,
            control,
            count: 0,
            failures: 0,
            last: Instant::now(),
            current_fps: 0.0,
        }
    }

    pub fn run(mut self) {
        tracing::info!("🔍 分类模块启动");

        let start = Instant::now();
        match self.classifier.load() {
            Ok(()) => {
                tracing::info!(
                    "✅ 分类模型加载成功 ({:.0}ms)",
                    start.elapsed().as_secs_f64() * 1000.0
                );
                let _ = self
                    .control
                    .send(ControlMessage::StageReady(StageId::Classifier));
            }
            Err(e) => {
                tracing::error!("❌ 分类模型加载失败: {:#}", e);
                let _ = self.control.send(ControlMessage::StageFailed {
                    stage: StageId::Classifier,
                    reason: format!("{:#}", e),
                });
                return;
            }
        }

        while let Ok(cmd) = self.commands.recv() {
            match cmd {
                ClassifyCommand::Classify { tick, frame } => {
                    // 分类器崩溃只丢弃本tick, 不能让控制循环一直等下去
                    let result = panic::catch_unwind(AssertUnwindSafe(|| {
                        self.classifier.classify(&frame)
                    }))
                    .unwrap_or_else(|payload| {
                        Err(anyhow::anyhow!("分类器崩溃: {}", panic_message(&*payload)))
                    })
                    .map_err(|e| {
                        self.failures += 1;
                        tracing::warn!("⚠️  tick {} 分类失败: {:#}", tick, e);
                        format!("{:#}", e)
                    });
                    self.update_stats();
                    if self
                        .control
                        .send(ControlMessage::Scores { tick, result })
                        .is_err()
                    {
                        break;
                    }
                }
                ClassifyCommand::Close => break,
            }
        }

        self.classifier.close();
        tracing::info!(
            "🔍 分类模块退出 (分类: {}, 失败: {})",
            self.count,
            self.failures
        );
    }

    fn update_stats(&mut self) {
        self.count += 1;
        let elapsed = self.last.elapsed().as_secs_f64();
        if elapsed >= 5.0 {
            self.current_fps = self.count as f64 / elapsed;
            tracing::debug!("🔍 分类统计: {:.1}fps", self.current_fps);
            self.last = Instant::now();
            self.count = 0;
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg
    } else {
        "unknown"
    }
}
