/// 帧采集系统 (Frame Acquisition System)
///
/// 独立工作线程, 按控制循环的请求取帧
/// - FrameSource:    帧来源接口 (摄像头/视频/合成)
/// - CaptureStage:   采集线程, 把帧转发给分类模块和预览模块
/// - SyntheticCamera: 合成帧来源 (无摄像头时调试用)
pub mod camera;
pub mod synthetic;

pub use camera::CaptureStage;
pub use synthetic::SyntheticCamera;

/// 一帧 RGB 图像
pub type Frame = image::RgbImage;

/// 帧来源接口
///
/// `acquire` 不能无限阻塞; 读不到帧时返回 `None`, 本tick跳过分类.
pub trait FrameSource: Send + 'static {
    /// 打开设备 (在采集线程中调用)
    fn open(&mut self) -> anyhow::Result<()>;

    /// 读取一帧
    fn acquire(&mut self) -> Option<Frame>;

    /// 切换设备
    fn select_device(&mut self, device: usize) -> anyhow::Result<()>;

    /// 释放设备
    fn close(&mut self) {}
}
