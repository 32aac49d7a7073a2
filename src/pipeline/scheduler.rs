//! Tick调度器 (Tick scheduler)
//!
//! 单次定时器驱动 采集→分类→滤波 循环. 定时器到期后不自动重启,
//! 只有在上一个tick完整结束 (`on_tick_complete`) 后才重新计时,
//! 所以同一时刻最多只有一个tick在处理中.
//!
//! 每个tick结束时测量实际FPS, 用积分反馈调整下一次的等待时间:
//! `delta = (1/target - 1/measured) * 100`.
//! 比目标慢时 delta < 0 (缩短等待), 比目标快时 delta > 0 (延长等待).

use std::time::{Duration, Instant};

use super::timer::Timer;

/// 等待时间上限 (毫秒)
pub const MAX_DELAY_MS: f64 = 1000.0;

/// 反馈增益: 周期误差(秒) → 等待时间修正(毫秒)
const FEEDBACK_GAIN: f64 = 100.0;

#[derive(Debug, Clone, PartialEq)]
pub struct TickTiming {
    pub current_delay_ms: f64,
    pub last_tick: Option<Instant>,
    pub target_fps: u32,
}

pub struct TickScheduler {
    timing: TickTiming,
    timer: Timer,
    next_tick: u64,
    in_flight: Option<u64>,
    measured_fps: f64,
}

impl TickScheduler {
    pub fn new(target_fps: u32) -> Self {
        let target_fps = target_fps.max(1);
        Self {
            timing: TickTiming {
                current_delay_ms: (1000 / target_fps) as f64,
                last_tick: None,
                target_fps,
            },
            timer: Timer::new(),
            next_tick: 0,
            in_flight: None,
            measured_fps: 0.0,
        }
    }

    /// 按当前等待时间启动定时器. tick处理中时忽略.
    pub fn start(&mut self, now: Instant) {
        if self.in_flight.is_some() {
            return;
        }
        let delay = Duration::from_secs_f64(self.timing.current_delay_ms / 1000.0);
        self.timer.start(now, delay);
    }

    /// 定时器到期 → 返回新tick的序号
    pub fn poll(&mut self, now: Instant) -> Option<u64> {
        if !self.timer.poll(now) {
            return None;
        }
        self.next_tick += 1;
        self.in_flight = Some(self.next_tick);
        Some(self.next_tick)
    }

    /// tick全部处理完毕: 测量FPS, 调整等待时间, 重新计时.
    /// 返回本次测得的FPS (第一个tick没有参考时间, 返回 None).
    pub fn on_tick_complete(&mut self, now: Instant, tick: u64) -> Option<f64> {
        if self.in_flight != Some(tick) {
            tracing::debug!("过期的tick {} 完成通知, 忽略", tick);
            return None;
        }
        self.in_flight = None;

        let fps = self.adapt(now);
        self.start(now);
        fps
    }

    fn adapt(&mut self, now: Instant) -> Option<f64> {
        let last = self.timing.last_tick.replace(now)?;
        let dt = now.saturating_duration_since(last).as_secs_f64();
        if dt <= 0.0 {
            return None;
        }

        let fps = (10.0 / dt).round() / 10.0;
        self.measured_fps = fps;

        let target = self.timing.target_fps;
        if fps != 0.0 && target != 0 {
            let delta = (1.0 / target as f64 - 1.0 / fps) * FEEDBACK_GAIN;
            self.timing.current_delay_ms =
                (self.timing.current_delay_ms + delta).clamp(0.0, MAX_DELAY_MS);
            tracing::debug!(
                "⏱️  fps={:.1} target={} delay={:.1}ms",
                fps,
                target,
                self.timing.current_delay_ms
            );
        }
        Some(fps)
    }

    /// 运行时修改目标FPS, 只接受正数
    pub fn set_target_fps(&mut self, fps: i64) -> bool {
        if fps <= 0 || fps > u32::MAX as i64 {
            tracing::warn!("⚠️  无效的目标FPS {}, 保持 {}", fps, self.timing.target_fps);
            return false;
        }
        self.timing.target_fps = fps as u32;
        tracing::info!("🎯 目标FPS: {}", fps);
        true
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timer.deadline()
    }

    pub fn in_flight(&self) -> Option<u64> {
        self.in_flight
    }

    pub fn timing(&self) -> &TickTiming {
        &self.timing
    }

    pub fn measured_fps(&self) -> f64 {
        self.measured_fps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    /// 等到定时器到期, 处理 `work` 后完成, 返回完成时刻
    fn run_tick(s: &mut TickScheduler, work: Duration) -> Instant {
        let deadline = s.next_deadline().expect("timer armed");
        let tick = s.poll(deadline).expect("tick fired");
        let done = deadline + work;
        s.on_tick_complete(done, tick);
        done
    }

    #[test]
    fn test_first_tick_does_not_adapt() {
        let t0 = Instant::now();
        let mut s = TickScheduler::new(10);
        assert_eq!(s.timing().current_delay_ms, 100.0);

        s.start(t0);
        let tick = s.poll(t0 + ms(100)).unwrap();
        assert_eq!(s.on_tick_complete(t0 + ms(100), tick), None);
        assert_eq!(s.timing().current_delay_ms, 100.0);
        assert_eq!(s.timing().last_tick, Some(t0 + ms(100)));
    }

    #[test]
    fn test_no_rearm_while_in_flight() {
        let t0 = Instant::now();
        let mut s = TickScheduler::new(10);
        s.start(t0);
        let tick = s.poll(t0 + ms(100)).unwrap();

        assert_eq!(s.next_deadline(), None);
        s.start(t0 + ms(100));
        assert_eq!(s.next_deadline(), None);
        assert_eq!(s.poll(t0 + ms(10_000)), None);

        s.on_tick_complete(t0 + ms(150), tick);
        assert!(s.next_deadline().is_some());
    }

    #[test]
    fn test_stale_completion_ignored() {
        let t0 = Instant::now();
        let mut s = TickScheduler::new(10);
        s.start(t0);
        let tick = s.poll(t0 + ms(100)).unwrap();
        assert_eq!(s.on_tick_complete(t0 + ms(120), tick + 1), None);
        assert_eq!(s.in_flight(), Some(tick));
    }

    #[test]
    fn test_slower_than_target_shortens_delay() {
        let t0 = Instant::now();
        let mut s = TickScheduler::new(10);
        s.start(t0);
        let tick = s.poll(t0 + ms(100)).unwrap();
        s.on_tick_complete(t0 + ms(100), tick);

        // 200ms 一个周期 → 5fps, 比目标 10fps 慢
        let tick = s.poll(t0 + ms(200)).unwrap();
        assert_eq!(s.on_tick_complete(t0 + ms(300), tick), Some(5.0));
        assert!((s.timing().current_delay_ms - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_faster_than_target_extends_delay() {
        let t0 = Instant::now();
        let mut s = TickScheduler::new(10);
        s.start(t0);
        let tick = s.poll(t0 + ms(100)).unwrap();
        s.on_tick_complete(t0 + ms(100), tick);

        // 实际 10fps, 目标降到 5fps → 比目标快, 等待时间 +10ms
        assert!(s.set_target_fps(5));
        assert_eq!(s.poll(t0 + ms(150)), None);
        let tick = s.poll(t0 + ms(200)).unwrap();
        assert_eq!(s.on_tick_complete(t0 + ms(200), tick), Some(10.0));
        assert!((s.timing().current_delay_ms - 110.0).abs() < 1e-9);
    }

    #[test]
    fn test_converges_to_target_fps() {
        // 每个tick处理耗时40ms, 目标10fps → 等待时间应收敛到约60ms
        let t0 = Instant::now();
        let mut s = TickScheduler::new(10);
        s.start(t0);
        for _ in 0..200 {
            run_tick(&mut s, ms(40));
        }
        assert!((s.measured_fps() - 10.0).abs() <= 0.2, "fps={}", s.measured_fps());
        assert!((s.timing().current_delay_ms - 60.0).abs() < 3.0);

        // 提高目标后继续收敛
        assert!(s.set_target_fps(20));
        for _ in 0..300 {
            run_tick(&mut s, ms(40));
        }
        assert!((s.measured_fps() - 20.0).abs() <= 0.5, "fps={}", s.measured_fps());
    }

    #[test]
    fn test_unreachable_target_clamps_to_zero() {
        let t0 = Instant::now();
        let mut s = TickScheduler::new(30);
        s.start(t0);
        for _ in 0..100 {
            run_tick(&mut s, ms(80));
        }
        assert_eq!(s.timing().current_delay_ms, 0.0);
    }

    #[test]
    fn test_delay_stays_in_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        let t0 = Instant::now();
        let mut s = TickScheduler::new(60);
        s.start(t0);
        for _ in 0..2000 {
            let work = Duration::from_micros(rng.gen_range(1..3_000_000));
            run_tick(&mut s, work);
            let delay = s.timing().current_delay_ms;
            assert!((0.0..=MAX_DELAY_MS).contains(&delay), "delay={}", delay);
            if rng.gen_bool(0.05) {
                s.set_target_fps(rng.gen_range(1..120));
            }
        }
    }

    #[test]
    fn test_invalid_target_rejected() {
        let mut s = TickScheduler::new(15);
        assert!(!s.set_target_fps(0));
        assert!(!s.set_target_fps(-3));
        assert_eq!(s.timing().target_fps, 15);
    }
}
