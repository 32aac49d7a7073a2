//! 流水线主控 (Pipeline supervisor)
//!
//! ## 线程结构
//! ```text
//!                  Acquire{tick}
//! ┌─────────┐ ──────────────────→ ┌─────────┐   Classify    ┌──────────┐
//! │ Control │                     │ Capture │ ────────────→ │ Detector │
//! │  loop   │ ←── FrameMissing ── └─────────┘               └──────────┘
//! │         │                          │ Show (try_send)          │
//! │         │                          ↓                          │
//! │         │                     ┌─────────┐                     │
//! │         │                     │ Preview │                     │
//! │         │ ←──────────────────── Scores{tick} ─────────────────┘
//! └─────────┘
//! ```
//! 控制循环独占 调度器/时间滤波/触发器 状态, 所有定时器都是截止时间,
//! 用 `recv_deadline` 等待最早的一个, 没有回调在别的线程里修改状态.

use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};

use super::filter::TemporalFilter;
use super::readiness::ReadinessBarrier;
use super::scheduler::TickScheduler;
use super::timer::{self, Timer};
use super::trigger::{PlayCommand, VideoTrigger};
use super::{
    CaptureCommand, ClassifyCommand, ControlMessage, PipelineStatus, PreviewCommand, StageId,
};
use crate::catalog::VideoCatalog;
use crate::config::PipelineConfig;
use crate::detection::{Classifier, Detector};
use crate::environment::DaySchedule;
use crate::error::{MirrorError, Result};
use crate::input::{CaptureStage, FrameSource};
use crate::labels::{ConfidenceMap, LabelSet};
use crate::playback::{PlaybackNotifier, PlaybackSink};
use crate::preview::{FrameObserver, PreviewStage};

/// 状态订阅通道容量, 订阅者跟不上时丢弃
const STATUS_CAPACITY: usize = 256;
/// 预览通道容量, 预览跟不上时丢帧
const PREVIEW_CAPACITY: usize = 2;

/// 外部控制接口 (可跨线程克隆)
#[derive(Clone)]
pub struct SupervisorHandle {
    control: Sender<ControlMessage>,
}

impl SupervisorHandle {
    pub fn set_target_fps(&self, fps: i64) {
        self.send(ControlMessage::SetTargetFps(fps));
    }

    pub fn select_camera(&self, device: usize) {
        self.send(ControlMessage::SelectCamera(device));
    }

    pub fn playback_stopped(&self) {
        self.send(ControlMessage::PlaybackStopped);
    }

    /// 视频窗口打开/关闭
    pub fn set_trigger_enabled(&self, enabled: bool) {
        self.send(ControlMessage::SetTriggerEnabled(enabled));
    }

    pub fn shutdown(&self) {
        self.send(ControlMessage::Shutdown);
    }

    fn send(&self, msg: ControlMessage) {
        if self.control.send(msg).is_err() {
            tracing::debug!("流水线已停止, 消息丢弃");
        }
    }
}

pub struct PipelineSupervisor<S: FrameSource, C: Classifier, P: PlaybackSink> {
    config: PipelineConfig,
    labels: LabelSet,
    catalog: VideoCatalog,
    source: S,
    classifier: C,
    playback: P,
    observer: Option<Box<dyn FrameObserver>>,

    control_tx: Sender<ControlMessage>,
    control_rx: Receiver<ControlMessage>,
    status: Vec<Sender<PipelineStatus>>,
}

impl<S: FrameSource, C: Classifier, P: PlaybackSink> PipelineSupervisor<S, C, P> {
    pub fn new(
        config: PipelineConfig,
        labels: LabelSet,
        catalog: VideoCatalog,
        source: S,
        classifier: C,
        playback: P,
    ) -> Self {
        let (control_tx, control_rx) = crossbeam_channel::unbounded();
        Self {
            config,
            labels,
            catalog,
            source,
            classifier,
            playback,
            observer: None,
            control_tx,
            control_rx,
            status: Vec::new(),
        }
    }

    /// 挂上预览观察者 (额外的一个就绪模块)
    pub fn with_preview(mut self, observer: impl FrameObserver) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn subscribe_status(&mut self) -> Receiver<PipelineStatus> {
        let (tx, rx) = crossbeam_channel::bounded(STATUS_CAPACITY);
        self.status.push(tx);
        rx
    }

    pub fn handle(&self) -> SupervisorHandle {
        SupervisorHandle {
            control: self.control_tx.clone(),
        }
    }

    /// 启动所有模块并运行控制循环, 直到 `shutdown` 或某个模块初始化失败
    pub fn run(self) -> Result<()> {
        let Self {
            config,
            labels,
            catalog,
            source,
            classifier,
            playback,
            observer,
            control_tx,
            control_rx,
            status,
        } = self;

        tracing::info!("🚀 流水线启动 ({} 个标签)", labels.len());

        // 配置错误要在任何模块启动之前报告
        let schedule = DaySchedule::from_config(&config.day)?;

        let (capture_tx, capture_rx) = crossbeam_channel::unbounded::<CaptureCommand>();
        let (classify_tx, classify_rx) = crossbeam_channel::unbounded::<ClassifyCommand>();

        let mut barrier = ReadinessBarrier::new();
        barrier.register(StageId::Capture);
        barrier.register(StageId::Classifier);

        let preview_tx = match observer {
            Some(observer) => {
                barrier.register(StageId::Preview);
                let (tx, rx) = crossbeam_channel::bounded(PREVIEW_CAPACITY);
                let stage = PreviewStage::new(observer, rx, control_tx.clone());
                spawn_stage(StageId::Preview, move || stage.run())?;
                Some(tx)
            }
            None => None,
        };

        let ready_tx = control_tx.clone();
        barrier.on_all_ready(move || {
            let _ = ready_tx.send(ControlMessage::AllReady);
        });

        let detector = Detector::new(classifier, classify_rx, control_tx.clone());
        spawn_stage(StageId::Classifier, move || detector.run())?;

        let capture = CaptureStage::new(
            source,
            capture_rx,
            classify_tx.clone(),
            preview_tx.clone(),
            control_tx.clone(),
        );
        spawn_stage(StageId::Capture, move || capture.run())?;

        let now = Instant::now();
        let mut control = ControlLoop {
            scheduler: TickScheduler::new(config.target_fps),
            filter: TemporalFilter::from_config(labels, &config.filter, now),
            trigger: VideoTrigger::new(
                catalog,
                config.idle_label.clone(),
                config.idle_timeout_range(),
                config.watchdog_timeout(),
            ),
            schedule,
            environment_timer: Timer::new(),
            environment_refresh: config.environment_refresh(),
            barrier,
            playback,
            notifier: PlaybackNotifier::new(control_tx.clone()),
            capture: capture_tx,
            classify: classify_tx,
            preview: preview_tx,
            status,
        };
        control.refresh_environment(now);

        let result = control.run(&control_rx);
        control.close();
        result
    }
}

fn spawn_stage<F>(stage: StageId, f: F) -> Result<()>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(stage.to_string())
        .spawn(f)
        .map(|_| ())
        .map_err(|e| MirrorError::StageSetup {
            stage,
            reason: e.to_string(),
        })
}

struct ControlLoop<P: PlaybackSink> {
    scheduler: TickScheduler,
    filter: TemporalFilter,
    trigger: VideoTrigger,
    schedule: DaySchedule,
    environment_timer: Timer,
    environment_refresh: Duration,
    barrier: ReadinessBarrier,

    playback: P,
    notifier: PlaybackNotifier,

    capture: Sender<CaptureCommand>,
    classify: Sender<ClassifyCommand>,
    preview: Option<Sender<PreviewCommand>>,
    status: Vec<Sender<PipelineStatus>>,
}

impl<P: PlaybackSink> ControlLoop<P> {
    fn run(&mut self, control: &Receiver<ControlMessage>) -> Result<()> {
        loop {
            let now = Instant::now();
            self.poll_timers(now)?;

            let deadline = timer::earliest([
                self.scheduler.next_deadline(),
                self.trigger.next_deadline(),
                self.environment_timer.deadline(),
            ]);
            let msg = match deadline {
                Some(deadline) => match control.recv_deadline(deadline) {
                    Ok(msg) => msg,
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => return Ok(()),
                },
                None => match control.recv() {
                    Ok(msg) => msg,
                    Err(_) => return Ok(()),
                },
            };

            if !self.handle(msg, Instant::now())? {
                tracing::info!("🛑 流水线停止");
                return Ok(());
            }
        }
    }

    fn poll_timers(&mut self, now: Instant) -> Result<()> {
        if let Some(tick) = self.scheduler.poll(now) {
            if self.capture.send(CaptureCommand::Acquire { tick }).is_err() {
                return Err(MirrorError::StageSetup {
                    stage: StageId::Capture,
                    reason: "采集模块已退出".to_string(),
                });
            }
        }

        if let Some(command) = self.trigger.poll(now) {
            self.play(command);
        }

        if self.environment_timer.poll(now) {
            self.refresh_environment(now);
        }
        Ok(())
    }

    /// 返回 false 表示停止
    fn handle(&mut self, msg: ControlMessage, now: Instant) -> Result<bool> {
        match msg {
            ControlMessage::StageReady(stage) => {
                self.barrier.signal_ready(stage);
            }
            ControlMessage::StageFailed { stage, reason } => {
                tracing::error!("❌ 模块 {} 初始化失败, 流水线无法启动", stage);
                return Err(MirrorError::StageSetup { stage, reason });
            }
            ControlMessage::AllReady => {
                tracing::info!("✅ 全部模块就绪, 开始采集");
                self.publish(PipelineStatus::Ready);
                self.scheduler.start(now);
            }
            ControlMessage::FrameMissing { tick } => self.complete_tick(tick, now),
            ControlMessage::Scores { tick, result } => {
                if self.scheduler.in_flight() != Some(tick) {
                    tracing::debug!("过期的tick {} 分类结果, 忽略", tick);
                    return Ok(true);
                }
                match result {
                    Ok(scores) => self.on_scores(scores, now),
                    Err(reason) => tracing::debug!("tick {} 无分类结果: {}", tick, reason),
                }
                self.complete_tick(tick, now);
            }
            ControlMessage::SetTargetFps(fps) => {
                self.scheduler.set_target_fps(fps);
            }
            ControlMessage::SelectCamera(device) => {
                let _ = self.capture.send(CaptureCommand::SelectDevice(device));
            }
            ControlMessage::PlaybackStopped => {
                if self.trigger.on_playback_stopped() {
                    self.publish(PipelineStatus::PlaybackStopped);
                }
            }
            ControlMessage::SetTriggerEnabled(enabled) => self.trigger.set_enabled(enabled, now),
            ControlMessage::Shutdown => return Ok(false),
        }
        Ok(true)
    }

    fn on_scores(&mut self, scores: ConfidenceMap, now: Instant) {
        let one_hot = self.filter.update(&scores, now);
        self.publish(PipelineStatus::Scores(scores));

        let label = one_hot.stable().clone();
        let command = self.trigger.on_label(&label, now);
        self.publish(PipelineStatus::Stable { label, one_hot });

        if let Some(command) = command {
            self.play(command);
        }
    }

    fn complete_tick(&mut self, tick: u64, now: Instant) {
        if let Some(fps) = self.scheduler.on_tick_complete(now, tick) {
            self.publish(PipelineStatus::Fps(fps));
        }
    }

    fn play(&mut self, command: PlayCommand) {
        match self.playback.play(&command.video, self.notifier.clone()) {
            Ok(()) => self.publish(PipelineStatus::Playing(command.video)),
            Err(e) => {
                // 播放失败按立即结束处理, 不等看门狗
                tracing::warn!("⚠️  播放 {} 失败: {:#}", command.video.display(), e);
                self.trigger.on_playback_stopped();
            }
        }
    }

    fn refresh_environment(&mut self, now: Instant) {
        self.trigger
            .set_idle_buckets(self.schedule.active_buckets_now());
        self.environment_timer.start(now, self.environment_refresh);
    }

    fn publish(&mut self, status: PipelineStatus) {
        self.status.retain(|tx| {
            !matches!(
                tx.try_send(status.clone()),
                Err(TrySendError::Disconnected(_))
            )
        });
    }

    /// 通知各模块退出, 不等待线程结束
    fn close(&mut self) {
        let _ = self.capture.send(CaptureCommand::Close);
        let _ = self.classify.send(ClassifyCommand::Close);
        if let Some(preview) = &self.preview {
            let _ = preview.try_send(PreviewCommand::Close);
        }
        self.playback.close();
    }
}
