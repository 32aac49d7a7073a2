//! 视频触发器 (Video trigger)
//!
//! 状态机: 观察稳定标签的变化 (边沿触发), 决定播放哪个视频.
//! - 新标签是空闲标签: 重新启动随机空闲定时器, 到期播放空闲视频并再次启动
//! - 新标签是具体的人: 停止空闲定时器, 尝试播放该标签的视频
//! - 同一时间最多一个视频 (busy), 看门狗超时强制解除 busy

use std::path::PathBuf;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use super::timer::Timer;
use crate::catalog::VideoCatalog;
use crate::environment::COMMON_BUCKET;
use crate::labels::Label;

/// 播放命令 (触发器 → 播放器)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayCommand {
    pub label: Label,
    pub video: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerState {
    pub last_label: Option<Label>,
    pub busy: bool,
    pub idle_timer_armed: bool,
}

pub struct VideoTrigger {
    catalog: VideoCatalog,
    idle_label: Label,
    last_label: Option<Label>,
    busy: bool,
    enabled: bool,

    idle_timer: Timer,
    idle_range_ms: (u64, u64),
    watchdog: Timer,
    watchdog_timeout: Duration,

    idle_buckets: Vec<String>,
    rng: StdRng,
}

impl VideoTrigger {
    pub fn new(
        catalog: VideoCatalog,
        idle_label: impl Into<Label>,
        idle_range: (Duration, Duration),
        watchdog_timeout: Duration,
    ) -> Self {
        let (min, max) = idle_range;
        let min_ms = min.as_millis() as u64;
        let max_ms = (max.as_millis() as u64).max(min_ms);
        Self {
            catalog,
            idle_label: idle_label.into(),
            last_label: None,
            busy: false,
            enabled: true,
            idle_timer: Timer::new(),
            idle_range_ms: (min_ms, max_ms),
            watchdog: Timer::new(),
            watchdog_timeout,
            idle_buckets: vec![COMMON_BUCKET.to_string()],
            rng: StdRng::from_entropy(),
        }
    }

    /// 固定随机种子 (测试用)
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    /// 新的稳定标签 (每个tick一次)
    pub fn on_label(&mut self, label: &str, now: Instant) -> Option<PlayCommand> {
        if !self.enabled || self.last_label.as_deref() == Some(label) {
            return None;
        }

        let command = if label == self.idle_label {
            self.arm_idle_timer(now);
            None
        } else {
            self.idle_timer.stop();
            self.start_video(label, now)
        };

        self.last_label = Some(label.to_string());
        command
    }

    /// 开始播放. busy 时什么也不做.
    pub fn start_video(&mut self, label: &str, now: Instant) -> Option<PlayCommand> {
        if self.busy {
            tracing::debug!("⏳ 正在播放, 忽略 '{}'", label);
            return None;
        }

        let video = if label == self.idle_label {
            self.catalog
                .idle_candidates(&self.idle_buckets)
                .choose(&mut self.rng)
                .map(|p| (*p).clone())
        } else {
            self.catalog.videos(label).choose(&mut self.rng).cloned()
        };

        let Some(video) = video else {
            tracing::warn!("⚠️  标签 '{}' 没有可播放的视频", label);
            return None;
        };

        self.busy = true;
        self.watchdog.start(now, self.watchdog_timeout);
        tracing::info!("▶️  播放 [{}] {}", label, video.display());

        Some(PlayCommand {
            label: label.to_string(),
            video,
        })
    }

    /// 播放器报告停止. 重复调用无副作用.
    pub fn on_playback_stopped(&mut self) -> bool {
        self.watchdog.stop();
        if !self.busy {
            return false;
        }
        self.busy = false;
        tracing::info!("⏹️  播放结束");
        true
    }

    /// 处理到期的定时器 (看门狗优先, 然后是空闲定时器)
    pub fn poll(&mut self, now: Instant) -> Option<PlayCommand> {
        if self.watchdog.poll(now) && self.busy {
            tracing::warn!(
                "🐕 看门狗超时 ({}ms), 强制解除播放锁",
                self.watchdog_timeout.as_millis()
            );
            self.busy = false;
        }

        if self.idle_timer.poll(now) {
            let idle = self.idle_label.clone();
            let command = self.start_video(&idle, now);
            self.arm_idle_timer(now);
            return command;
        }
        None
    }

    fn arm_idle_timer(&mut self, now: Instant) {
        let (min, max) = self.idle_range_ms;
        let delay = Duration::from_millis(self.rng.gen_range(min..=max));
        self.idle_timer.start(now, delay);
        tracing::debug!("🕒 空闲定时器: {}ms", delay.as_millis());
    }

    /// 视频窗口打开/关闭. 关闭期间忽略标签, 停止空闲定时器.
    pub fn set_enabled(&mut self, enabled: bool, now: Instant) {
        if self.enabled == enabled {
            return;
        }
        self.enabled = enabled;
        if !enabled {
            self.idle_timer.stop();
        } else if self.last_label.as_deref() == Some(self.idle_label.as_str()) {
            self.arm_idle_timer(now);
        }
        tracing::info!("🎬 视频触发: {}", if enabled { "开启" } else { "关闭" });
    }

    /// 当前时段可用的空闲视频分组
    pub fn set_idle_buckets(&mut self, buckets: Vec<String>) {
        if buckets != self.idle_buckets {
            tracing::debug!("🌤️  空闲分组: {:?}", buckets);
            self.idle_buckets = buckets;
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        super::timer::earliest([self.idle_timer.deadline(), self.watchdog.deadline()])
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn state(&self) -> TriggerState {
        TriggerState {
            last_label: self.last_label.clone(),
            busy: self.busy,
            idle_timer_armed: self.idle_timer.is_active(),
        }
    }
}
