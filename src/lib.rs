// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod catalog; // 视频目录
pub mod config; // 装置配置参数
pub mod detection; // 分类系统
pub mod environment; // 时段 (空闲视频分组)
pub mod error;
pub mod input; // 帧采集系统
pub mod labels; // 标签与置信度
pub mod pipeline; // 实时编排流水线
pub mod playback; // 视频播放
pub mod preview; // 预览

pub use crate::catalog::VideoCatalog;
pub use crate::config::{FilterConfig, FilterMode, PipelineConfig};
pub use crate::detection::{Classifier, ReplayClassifier};
pub use crate::error::{MirrorError, Result};
pub use crate::input::{Frame, FrameSource, SyntheticCamera};
pub use crate::labels::{load_labels, ConfidenceMap, Label, LabelSet};
pub use crate::pipeline::{PipelineStatus, PipelineSupervisor, SupervisorHandle};
pub use crate::playback::{CommandPlayback, LogPlayback, PlaybackNotifier, PlaybackSink};
pub use crate::preview::{FrameObserver, SnapshotObserver};
