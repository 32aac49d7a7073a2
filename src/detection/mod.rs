/// 识别系统 (Classification System)
///
/// 独立工作线程, 负责逐帧分类
/// - Classifier:       分类器接口 (模型加载/推理由实现方负责)
/// - Detector:         分类线程, 结果发回控制循环
/// - ReplayClassifier: 回放录制好的置信度 (离线调试用)
pub mod detector;
pub mod replay;

pub use detector::Detector;
pub use replay::ReplayClassifier;

use crate::input::Frame;
use crate::labels::ConfidenceMap;

/// 分类器接口
///
/// ## 核心流程
/// ```text
/// load (分类线程启动时一次) → classify (每tick一次) → close
/// ```
pub trait Classifier: Send + 'static {
    /// 加载模型
    fn load(&mut self) -> anyhow::Result<()>;

    /// 每个已知标签一个置信度 [0,1]
    fn classify(&mut self, frame: &Frame) -> anyhow::Result<ConfidenceMap>;

    fn close(&mut self) {}
}
