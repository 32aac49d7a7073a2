//! 视频播放 (Playback)
//!
//! 播放器只负责把视频放出来, 播完 (或被关闭) 时通过 `PlaybackNotifier` 告诉控制循环.
//! 播放器从不报告停止时, 由触发器的看门狗解除播放锁.

use std::path::{Path, PathBuf};
use std::process::Command;

use crossbeam_channel::Sender;

use crate::pipeline::ControlMessage;

/// 播放停止通知 (可跨线程)
#[derive(Clone)]
pub struct PlaybackNotifier {
    control: Sender<ControlMessage>,
}

impl PlaybackNotifier {
    pub fn new(control: Sender<ControlMessage>) -> Self {
        Self { control }
    }

    pub fn stopped(&self) {
        let _ = self.control.send(ControlMessage::PlaybackStopped);
    }
}

pub trait PlaybackSink: Send + 'static {
    /// 开始播放, 不阻塞
    fn play(&mut self, video: &Path, notifier: PlaybackNotifier) -> anyhow::Result<()>;

    fn close(&mut self) {}
}

impl<T: PlaybackSink + ?Sized> PlaybackSink for Box<T> {
    fn play(&mut self, video: &Path, notifier: PlaybackNotifier) -> anyhow::Result<()> {
        (**self).play(video, notifier)
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// 只打日志, 不报告停止
#[derive(Default)]
pub struct LogPlayback {
    played: u64,
}

impl LogPlayback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn played(&self) -> u64 {
        self.played
    }
}

impl PlaybackSink for LogPlayback {
    fn play(&mut self, video: &Path, _notifier: PlaybackNotifier) -> anyhow::Result<()> {
        self.played += 1;
        tracing::info!("🎞️  [log] {}", video.display());
        Ok(())
    }
}

/// 每个视频启动一个外部播放器进程, 进程退出即播放结束
///
/// `argv = [program, args..., video]`
pub struct CommandPlayback {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandPlayback {
    pub fn new(argv: &[String]) -> anyhow::Result<Self> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| anyhow::anyhow!("播放器命令为空"))?;
        Ok(Self {
            program: PathBuf::from(program),
            args: args.to_vec(),
        })
    }
}

impl PlaybackSink for CommandPlayback {
    fn play(&mut self, video: &Path, notifier: PlaybackNotifier) -> anyhow::Result<()> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(video)
            .spawn()
            .map_err(|e| anyhow::anyhow!("启动播放器 {} 失败: {}", self.program.display(), e))?;

        let name = video.display().to_string();
        std::thread::Builder::new()
            .name("playback".into())
            .spawn(move || {
                match child.wait() {
                    Ok(status) if status.success() => tracing::debug!("🎞️  {} 播放完毕", name),
                    Ok(status) => tracing::warn!("⚠️  播放器退出 {}: {}", status, name),
                    Err(e) => tracing::warn!("⚠️  等待播放器失败: {}", e),
                }
                notifier.stopped();
            })?;
        Ok(())
    }
}
