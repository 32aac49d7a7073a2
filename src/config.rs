//! 装置配置 - 通过JSON文件调整参数

use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

use crate::environment::DaySchedule;

/// 时段刷新间隔上限 (一天)
const MAX_ENVIRONMENT_REFRESH_SECS: u64 = 24 * 60 * 60;

/// 时间滤波模式
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    /// 指数平滑 + 滞回锁定 (默认)
    Hysteresis,
    /// 随时间衰减 (按实际经过时间累积)
    Decay,
}

/// 时间滤波参数
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub mode: FilterMode,
    pub smoothing_k: f64,        // 平滑系数 k ∈ (0,1]
    pub hysteresis_low: f64,     // 当前标签低于此值才允许切换
    pub hysteresis_high: f64,    // 新标签必须超过此值
    pub accept_threshold: f32,   // 衰减模式: 原始置信度接受阈值
    pub time_constant_secs: f64, // 衰减模式: 从0到1所需时间
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            mode: FilterMode::Hysteresis,
            smoothing_k: 0.2,
            hysteresis_low: 0.4,
            hysteresis_high: 0.7,
            accept_threshold: 0.7,
            time_constant_secs: 2.0,
        }
    }
}

/// 一天中的时段 (格式 HH:MM-HH:MM)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DayConfig {
    pub morning: String,
    pub afternoon: String,
    pub evening: String,
}

impl Default for DayConfig {
    fn default() -> Self {
        Self {
            morning: "06:00-11:59".to_string(),
            afternoon: "12:00-17:59".to_string(),
            evening: "18:00-23:59".to_string(),
        }
    }
}

/// 流水线参数配置
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    // === 模型数据 ===
    pub labels_file: String, // 标签文件 (每行一个)
    pub idle_label: String,  // 无人时的标签

    // === 视频 ===
    pub videos_dir: String,                  // 视频根目录
    pub player_command: Option<Vec<String>>, // 外部播放器命令, 视频路径追加在末尾

    // === 采集 ===
    pub target_fps: u32,
    pub camera_id: usize,

    // === 滤波 ===
    pub filter: FilterConfig,

    // === 定时器 (毫秒) ===
    pub idle_timeout_min_ms: u64,
    pub idle_timeout_max_ms: u64,
    pub watchdog_timeout_ms: u64,

    // === 时段 ===
    pub day: DayConfig,
    pub environment_refresh_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            labels_file: "result/labels.txt".to_string(),
            idle_label: "no_one".to_string(),

            videos_dir: "videos".to_string(),
            player_command: None,

            target_fps: 10,
            camera_id: 0,

            filter: FilterConfig::default(),

            idle_timeout_min_ms: 7_000,
            idle_timeout_max_ms: 15_000,
            watchdog_timeout_ms: 30_000,

            day: DayConfig::default(),
            environment_refresh_secs: 60,
        }
    }
}

impl PipelineConfig {
    /// 从JSON文件加载配置
    pub fn load(path: &str) -> Self {
        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str::<Self>(&json) {
                Ok(config) => {
                    tracing::info!("✅ 配置已从 {} 加载", path);
                    config.validated()
                }
                Err(e) => {
                    tracing::warn!("⚠️  配置文件解析失败: {}, 使用默认值", e);
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!("📝 配置文件不存在,创建默认配置...");
                let config = Self::default();
                config.save(path);
                config
            }
        }
    }

    /// 保存配置到JSON文件
    pub fn save(&self, path: &str) {
        match serde_json::to_string_pretty(self) {
            Ok(json) => {
                if let Err(e) = fs::write(path, json) {
                    tracing::error!("❌ 保存配置失败: {}", e);
                } else {
                    tracing::info!("💾 配置已保存到 {}", path);
                }
            }
            Err(e) => tracing::error!("❌ 序列化配置失败: {}", e),
        }
    }

    /// 越界的字段恢复为默认值
    pub fn validated(mut self) -> Self {
        let defaults = Self::default();

        if self.target_fps == 0 {
            tracing::warn!("⚠️  target_fps 必须大于0, 使用 {}", defaults.target_fps);
            self.target_fps = defaults.target_fps;
        }

        let k = self.filter.smoothing_k;
        if !(k > 0.0 && k <= 1.0) {
            tracing::warn!("⚠️  smoothing_k={} 超出 (0,1], 使用默认值", k);
            self.filter.smoothing_k = defaults.filter.smoothing_k;
        }

        let (lo, hi) = (self.filter.hysteresis_low, self.filter.hysteresis_high);
        if !(0.0..=1.0).contains(&lo) || !(0.0..=1.0).contains(&hi) || lo >= hi {
            tracing::warn!("⚠️  滞回阈值 ({}, {}) 无效, 使用默认值", lo, hi);
            self.filter.hysteresis_low = defaults.filter.hysteresis_low;
            self.filter.hysteresis_high = defaults.filter.hysteresis_high;
        }

        if !(self.filter.time_constant_secs > 0.0) {
            tracing::warn!("⚠️  time_constant_secs 必须大于0, 使用默认值");
            self.filter.time_constant_secs = defaults.filter.time_constant_secs;
        }

        if self.idle_timeout_min_ms > self.idle_timeout_max_ms {
            tracing::warn!(
                "⚠️  空闲定时范围 {}..{} 无效, 使用默认值",
                self.idle_timeout_min_ms,
                self.idle_timeout_max_ms
            );
            self.idle_timeout_min_ms = defaults.idle_timeout_min_ms;
            self.idle_timeout_max_ms = defaults.idle_timeout_max_ms;
        }

        if self.watchdog_timeout_ms == 0 {
            tracing::warn!("⚠️  watchdog_timeout_ms 必须大于0, 使用默认值");
            self.watchdog_timeout_ms = defaults.watchdog_timeout_ms;
        }

        if self.environment_refresh_secs == 0
            || self.environment_refresh_secs > MAX_ENVIRONMENT_REFRESH_SECS
        {
            tracing::warn!(
                "⚠️  environment_refresh_secs={} 超出 1..={}, 使用默认值",
                self.environment_refresh_secs,
                MAX_ENVIRONMENT_REFRESH_SECS
            );
            self.environment_refresh_secs = defaults.environment_refresh_secs;
        }

        if let Err(e) = DaySchedule::from_config(&self.day) {
            tracing::warn!("⚠️  {}, 时段使用默认值", e);
            self.day = defaults.day;
        }

        self
    }

    pub fn idle_timeout_range(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.idle_timeout_min_ms),
            Duration::from_millis(self.idle_timeout_max_ms),
        )
    }

    pub fn watchdog_timeout(&self) -> Duration {
        Duration::from_millis(self.watchdog_timeout_ms)
    }

    pub fn environment_refresh(&self) -> Duration {
        Duration::from_secs(self.environment_refresh_secs)
    }

    /// 打印当前配置
    pub fn print_summary(&self) {
        tracing::info!("🎛️  当前配置:");
        tracing::info!("  目标FPS: {}", self.target_fps);
        tracing::info!(
            "  滤波: {:?} k={:.2} 滞回=({:.2}, {:.2})",
            self.filter.mode,
            self.filter.smoothing_k,
            self.filter.hysteresis_low,
            self.filter.hysteresis_high
        );
        tracing::info!(
            "  空闲视频间隔: {}-{}ms | 看门狗: {}ms",
            self.idle_timeout_min_ms,
            self.idle_timeout_max_ms,
            self.watchdog_timeout_ms
        );
    }
}
