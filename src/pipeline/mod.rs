/// 实时编排流水线 (Real-time Orchestration Pipeline)
///
/// 多线程架构, 模块间只通过 crossbeam-channel 消息通信:
/// - Capture:    帧采集 (独立线程)
/// - Classifier: 分类推理 (独立线程)
/// - Preview:    预览转换 (独立线程, 可选)
/// - Control:    控制循环 (调度器 + 时间滤波 + 视频触发器, 单线程独占状态)
pub mod filter;
pub mod readiness;
pub mod scheduler;
pub mod supervisor;
pub mod timer;
pub mod trigger;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::input::Frame;
use crate::labels::{ConfidenceMap, Label};

pub use filter::{DecayFilter, HysteresisFilter, OneHot, TemporalFilter};
pub use readiness::ReadinessBarrier;
pub use scheduler::{TickScheduler, TickTiming};
pub use supervisor::{PipelineSupervisor, SupervisorHandle};
pub use timer::Timer;
pub use trigger::{PlayCommand, TriggerState, VideoTrigger};

/// 需要异步初始化的模块
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageId {
    Capture,
    Classifier,
    Preview,
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StageId::Capture => "capture",
            StageId::Classifier => "classifier",
            StageId::Preview => "preview",
        };
        f.write_str(name)
    }
}

// ========== 消息类型定义 ==========

/// 控制循环的输入 (各模块 → 控制循环, 外部 → 控制循环)
#[derive(Clone, Debug)]
pub enum ControlMessage {
    StageReady(StageId),
    StageFailed { stage: StageId, reason: String },
    AllReady,

    /// 本tick没有取到帧
    FrameMissing { tick: u64 },
    /// 分类结果 (Err = 本tick分类失败)
    Scores {
        tick: u64,
        result: Result<ConfidenceMap, String>,
    },

    SetTargetFps(i64),
    SelectCamera(usize),
    PlaybackStopped,
    SetTriggerEnabled(bool),
    Shutdown,
}

/// 采集模块命令
#[derive(Clone, Debug)]
pub enum CaptureCommand {
    Acquire { tick: u64 },
    SelectDevice(usize),
    Close,
}

/// 分类模块命令 (采集模块 → 分类模块)
#[derive(Clone, Debug)]
pub enum ClassifyCommand {
    Classify { tick: u64, frame: Arc<Frame> },
    Close,
}

/// 预览模块命令 (采集模块 → 预览模块)
#[derive(Clone, Debug)]
pub enum PreviewCommand {
    Show(Arc<Frame>),
    Close,
}

/// 运行状态 (控制循环 → 订阅者, 用于监控/界面)
#[derive(Clone, Debug, PartialEq)]
pub enum PipelineStatus {
    Ready,
    Fps(f64),
    Scores(ConfidenceMap),
    Stable { label: Label, one_hot: OneHot },
    Playing(PathBuf),
    PlaybackStopped,
}
