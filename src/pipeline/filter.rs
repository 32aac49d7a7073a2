//! 时间滤波 (Temporal filter)
//!
//! 把每帧有噪声的分类置信度变成一个稳定的标签, 输出 one-hot.
//! 两种模式:
//! - `Hysteresis`: 指数平滑 + 双阈值滞回, 按帧计
//! - `Decay`:      按实际经过时间累积/衰减, 对tick频率变化不敏感

use std::collections::HashMap;
use std::time::Instant;

use crate::config::{FilterConfig, FilterMode};
use crate::labels::{ConfidenceMap, Label, LabelSet};

/// one-hot 输出: 稳定标签为1, 其余为0
#[derive(Debug, Clone, PartialEq)]
pub struct OneHot {
    entries: Vec<(Label, u8)>,
    stable: usize,
}

impl OneHot {
    fn new(labels: &LabelSet, stable: usize) -> Self {
        let entries = labels
            .iter()
            .enumerate()
            .map(|(i, l)| (l.clone(), u8::from(i == stable)))
            .collect();
        Self { entries, stable }
    }

    pub fn stable(&self) -> &Label {
        &self.entries[self.stable].0
    }

    pub fn get(&self, label: &str) -> Option<u8> {
        self.entries.iter().find(|(l, _)| l == label).map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Label, u8)> {
        self.entries.iter().map(|(l, v)| (l, *v))
    }

    pub fn to_map(&self) -> HashMap<Label, u8> {
        self.entries.iter().cloned().collect()
    }
}

/// 已知标签的置信度, 缺失视为0, 限制在 [0,1]
fn score_of(scores: &ConfidenceMap, label: &str) -> f32 {
    match scores.get(label) {
        Some(v) if v.is_finite() => v.clamp(0.0, 1.0),
        _ => 0.0,
    }
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

fn warn_unknown(labels: &LabelSet, scores: &ConfidenceMap) {
    for key in scores.keys() {
        if !labels.contains(key) {
            tracing::debug!("未知标签 '{}' 的置信度被忽略", key);
        }
    }
}

// ========== 指数平滑 + 滞回 ==========

pub struct HysteresisFilter {
    labels: LabelSet,
    values: Vec<f64>,
    stable: usize,
    k: f64,
    low: f64,
    high: f64,
}

impl HysteresisFilter {
    pub fn new(labels: LabelSet, config: &FilterConfig) -> Self {
        Self {
            values: vec![0.0; labels.len()],
            labels,
            stable: 0,
            k: config.smoothing_k,
            low: config.hysteresis_low,
            high: config.hysteresis_high,
        }
    }

    pub fn update(&mut self, scores: &ConfidenceMap) -> OneHot {
        warn_unknown(&self.labels, scores);

        for (value, label) in self.values.iter_mut().zip(self.labels.iter()) {
            let score = score_of(scores, label) as f64;
            *value = round4((1.0 - self.k) * *value + self.k * score).clamp(0.0, 1.0);
        }

        if self.values[self.stable] < self.low {
            // 并列时保留第一个
            let (max_idx, max_value) = self.values.iter().enumerate().skip(1).fold(
                (0, self.values[0]),
                |(bi, bv), (i, v)| if *v > bv { (i, *v) } else { (bi, bv) },
            );
            if max_value > self.high && max_idx != self.stable {
                tracing::info!(
                    "🔀 稳定标签: {} → {} ({:.4})",
                    self.labels.iter().nth(self.stable).map_or("?", |l| l.as_str()),
                    self.labels.iter().nth(max_idx).map_or("?", |l| l.as_str()),
                    max_value
                );
                self.stable = max_idx;
            }
        }

        OneHot::new(&self.labels, self.stable)
    }

    pub fn value(&self, label: &str) -> Option<f64> {
        self.labels
            .iter()
            .position(|l| l == label)
            .map(|i| self.values[i])
    }

    pub fn stable_label(&self) -> &Label {
        self.labels.iter().nth(self.stable).unwrap_or(self.labels.first())
    }
}

// ========== 时间衰减 ==========

pub struct DecayFilter {
    labels: LabelSet,
    values: Vec<f64>,
    accept: f32,
    time_constant: f64,
    last_update: Instant,
    fallback: usize,
    current: usize,
}

impl DecayFilter {
    pub fn new(labels: LabelSet, config: &FilterConfig, now: Instant) -> Self {
        let fallback = labels
            .iter()
            .position(|l| labels.is_idle(l))
            .unwrap_or(0);
        Self {
            values: vec![0.0; labels.len()],
            labels,
            accept: config.accept_threshold,
            time_constant: config.time_constant_secs,
            last_update: now,
            fallback,
            current: fallback,
        }
    }

    pub fn update(&mut self, scores: &ConfidenceMap, now: Instant) -> OneHot {
        warn_unknown(&self.labels, scores);

        let dt = now
            .saturating_duration_since(self.last_update)
            .as_secs_f64()
            .min(self.time_constant);
        let dv = dt / self.time_constant;
        self.last_update = now;

        let mut max_idx = self.fallback;
        let mut max_value = 0.0;
        for (i, (value, label)) in self.values.iter_mut().zip(self.labels.iter()).enumerate() {
            if score_of(scores, label) > self.accept {
                *value = (*value + dv).min(1.0);
            } else {
                *value = (*value - dv).max(0.0);
            }
            if *value > max_value {
                max_idx = i;
                max_value = *value;
            }
        }

        if max_idx != self.current {
            tracing::info!(
                "🔀 稳定标签: {}",
                self.labels.iter().nth(max_idx).map_or("?", |l| l.as_str())
            );
            self.current = max_idx;
        }
        OneHot::new(&self.labels, max_idx)
    }

    pub fn value(&self, label: &str) -> Option<f64> {
        self.labels
            .iter()
            .position(|l| l == label)
            .map(|i| self.values[i])
    }

    pub fn stable_label(&self) -> &Label {
        self.labels.iter().nth(self.current).unwrap_or(self.labels.first())
    }
}

// ========== 统一入口 ==========

pub enum TemporalFilter {
    Hysteresis(HysteresisFilter),
    Decay(DecayFilter),
}

impl TemporalFilter {
    pub fn from_config(labels: LabelSet, config: &FilterConfig, now: Instant) -> Self {
        match config.mode {
            FilterMode::Hysteresis => {
                tracing::info!("🧮 时间滤波: 指数平滑 + 滞回");
                TemporalFilter::Hysteresis(HysteresisFilter::new(labels, config))
            }
            FilterMode::Decay => {
                tracing::info!("🧮 时间滤波: 时间衰减");
                TemporalFilter::Decay(DecayFilter::new(labels, config, now))
            }
        }
    }

    pub fn update(&mut self, scores: &ConfidenceMap, now: Instant) -> OneHot {
        match self {
            TemporalFilter::Hysteresis(f) => f.update(scores),
            TemporalFilter::Decay(f) => f.update(scores, now),
        }
    }

    pub fn stable_label(&self) -> &Label {
        match self {
            TemporalFilter::Hysteresis(f) => f.stable_label(),
            TemporalFilter::Decay(f) => f.stable_label(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::time::Duration;

    fn labels() -> LabelSet {
        LabelSet::new(["no_one", "alice", "bob"], "no_one").unwrap()
    }

    fn scores(pairs: &[(&str, f32)]) -> ConfidenceMap {
        pairs.iter().map(|(l, v)| (l.to_string(), *v)).collect()
    }

    fn assert_one_hot(out: &OneHot) {
        let ones = out.iter().filter(|(_, v)| *v == 1).count();
        let zeros = out.iter().filter(|(_, v)| *v == 0).count();
        assert_eq!(ones, 1);
        assert_eq!(ones + zeros, 3);
    }

    #[test]
    fn test_alice_takes_over_on_tick_seven() {
        let mut f = HysteresisFilter::new(labels(), &FilterConfig::default());
        assert_eq!(f.stable_label(), "no_one");

        let input = scores(&[("alice", 0.9)]);
        for tick in 1..=10 {
            let out = f.update(&input);
            let expected = if tick < 7 { "no_one" } else { "alice" };
            assert_eq!(out.stable(), expected, "tick {}", tick);
            if tick == 6 {
                assert_eq!(f.value("alice"), Some(0.6641));
            }
        }
        assert_eq!(f.value("alice"), Some(0.8034));
    }

    #[test]
    fn test_switch_when_stable_drops_and_challenger_clears_high() {
        let mut f = HysteresisFilter::new(labels(), &FilterConfig::default());
        for _ in 0..20 {
            f.update(&scores(&[("alice", 1.0)]));
        }
        assert_eq!(f.stable_label(), "alice");

        // alice 开始下降, bob 上升
        let mut switched_at = None;
        for tick in 0..30 {
            let out = f.update(&scores(&[("bob", 1.0)]));
            let alice = f.value("alice").unwrap();
            let bob = f.value("bob").unwrap();
            if alice < 0.4 && bob > 0.7 {
                assert_eq!(out.stable(), "bob");
                switched_at.get_or_insert(tick);
            } else if switched_at.is_none() {
                assert_eq!(out.stable(), "alice");
            }
        }
        assert!(switched_at.is_some());
    }

    #[test]
    fn test_stable_label_holds_above_low_threshold() {
        let config = FilterConfig::default();
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..50 {
            let mut f = HysteresisFilter::new(labels(), &config);
            for _ in 0..200 {
                let previous = f.stable_label().clone();
                let input = scores(&[
                    ("no_one", rng.gen_range(0.0..1.0)),
                    ("alice", rng.gen_range(0.0..1.0)),
                    ("bob", rng.gen_range(0.0..1.0)),
                ]);
                let out = f.update(&input);
                assert_one_hot(&out);
                if f.value(&previous).unwrap() >= config.hysteresis_low {
                    assert_eq!(out.stable(), &previous);
                }
            }
        }
    }

    #[test]
    fn test_tie_keeps_first_label() {
        let config = FilterConfig {
            smoothing_k: 1.0,
            ..FilterConfig::default()
        };
        let mut f = HysteresisFilter::new(labels(), &config);
        let out = f.update(&scores(&[("alice", 0.9), ("bob", 0.9)]));
        assert_eq!(out.stable(), "alice");
    }

    #[test]
    fn test_out_of_range_and_unknown_scores() {
        let config = FilterConfig {
            smoothing_k: 1.0,
            ..FilterConfig::default()
        };
        let mut f = HysteresisFilter::new(labels(), &config);
        f.update(&scores(&[("alice", 7.0), ("bob", -2.0), ("carol", 1.0)]));
        assert_eq!(f.value("alice"), Some(1.0));
        assert_eq!(f.value("bob"), Some(0.0));
        assert_eq!(f.value("carol"), None);

        f.update(&scores(&[("alice", f32::NAN)]));
        assert_eq!(f.value("alice"), Some(0.0));
    }

    #[test]
    fn test_decay_follows_wall_time() {
        let t0 = Instant::now();
        let mut f = DecayFilter::new(labels(), &FilterConfig::default(), t0);

        let out = f.update(&scores(&[]), t0 + Duration::from_millis(500));
        assert_eq!(out.stable(), "no_one");

        let out = f.update(&scores(&[("alice", 0.9)]), t0 + Duration::from_millis(1000));
        assert_eq!(out.stable(), "alice");
        assert_eq!(f.value("alice"), Some(0.25));

        // dt 上限为时间常数
        f.update(&scores(&[("alice", 0.9)]), t0 + Duration::from_secs(30));
        assert_eq!(f.value("alice"), Some(1.0));

        // 低于接受阈值 → 衰减回空闲
        let out = f.update(&scores(&[("alice", 0.69)]), t0 + Duration::from_secs(60));
        assert_eq!(f.value("alice"), Some(0.0));
        assert_eq!(out.stable(), "no_one");
    }

    #[test]
    fn test_decay_one_hot_invariant() {
        let t0 = Instant::now();
        let mut rng = StdRng::seed_from_u64(3);
        let mut f = DecayFilter::new(labels(), &FilterConfig::default(), t0);
        let mut now = t0;
        for _ in 0..500 {
            now += Duration::from_millis(rng.gen_range(0..400));
            let input = scores(&[
                ("alice", rng.gen_range(0.0..1.0)),
                ("bob", rng.gen_range(0.0..1.0)),
            ]);
            let out = f.update(&input, now);
            assert_one_hot(&out);
            for label in ["no_one", "alice", "bob"] {
                let v = f.value(label).unwrap();
                assert!((0.0..=1.0).contains(&v));
            }
        }
    }

    #[test]
    fn test_enum_dispatch() {
        let t0 = Instant::now();
        let config = FilterConfig {
            mode: FilterMode::Decay,
            ..FilterConfig::default()
        };
        let mut f = TemporalFilter::from_config(labels(), &config, t0);
        assert!(matches!(f, TemporalFilter::Decay(_)));
        let out = f.update(&scores(&[("bob", 1.0)]), t0 + Duration::from_secs(1));
        assert_eq!(out.stable(), "bob");
        assert_eq!(f.stable_label(), "bob");
    }
}
