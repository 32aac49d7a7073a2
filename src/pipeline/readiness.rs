//! 就绪屏障 (Readiness barrier)
//!
//! 每个模块初始化完成后调用一次 `signal_ready`; 全部到齐时回调 `on_all_ready` 一次.
//! 不阻塞任何线程.

use std::collections::HashSet;

use super::StageId;

type ReadyCallback = Box<dyn FnOnce() + Send>;

pub struct ReadinessBarrier {
    expected: HashSet<StageId>,
    ready: HashSet<StageId>,
    callback: Option<ReadyCallback>,
    fired: bool,
}

impl ReadinessBarrier {
    pub fn new() -> Self {
        Self {
            expected: HashSet::new(),
            ready: HashSet::new(),
            callback: None,
            fired: false,
        }
    }

    /// 登记一个需要等待的模块
    pub fn register(&mut self, stage: StageId) {
        self.expected.insert(stage);
    }

    pub fn on_all_ready<F>(&mut self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.callback = Some(Box::new(callback));
    }

    /// 模块就绪. 返回 true 表示本次调用触发了回调.
    pub fn signal_ready(&mut self, stage: StageId) -> bool {
        if !self.expected.contains(&stage) {
            tracing::warn!("⚠️  未登记的模块 {} 报告就绪, 忽略", stage);
            return false;
        }
        if !self.ready.insert(stage) {
            tracing::warn!("⚠️  模块 {} 重复报告就绪, 忽略", stage);
            return false;
        }

        tracing::info!(
            "✅ 模块 {} 就绪 ({}/{})",
            stage,
            self.ready.len(),
            self.expected.len()
        );

        if self.fired || self.ready.len() < self.expected.len() {
            return false;
        }

        self.fired = true;
        if let Some(callback) = self.callback.take() {
            callback();
        }
        true
    }

    pub fn is_released(&self) -> bool {
        self.fired
    }

    pub fn pending(&self) -> usize {
        self.expected.len() - self.ready.len()
    }
}

impl Default for ReadinessBarrier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn barrier_with_counter(stages: &[StageId]) -> (ReadinessBarrier, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let mut barrier = ReadinessBarrier::new();
        for stage in stages {
            barrier.register(*stage);
        }
        let c = count.clone();
        barrier.on_all_ready(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        (barrier, count)
    }

    #[test]
    fn test_fires_after_all_stages() {
        let stages = [StageId::Capture, StageId::Classifier, StageId::Preview];
        let (mut barrier, count) = barrier_with_counter(&stages);

        assert!(!barrier.signal_ready(StageId::Preview));
        assert!(!barrier.signal_ready(StageId::Capture));
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(barrier.pending(), 1);

        assert!(barrier.signal_ready(StageId::Classifier));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(barrier.is_released());
    }

    #[test]
    fn test_any_arrival_order() {
        let stages = [StageId::Capture, StageId::Classifier, StageId::Preview];
        let orders = [
            [0, 1, 2],
            [0, 2, 1],
            [1, 0, 2],
            [1, 2, 0],
            [2, 0, 1],
            [2, 1, 0],
        ];
        for order in orders {
            let (mut barrier, count) = barrier_with_counter(&stages);
            for (i, idx) in order.iter().enumerate() {
                barrier.signal_ready(stages[*idx]);
                let expected = if i == 2 { 1 } else { 0 };
                assert_eq!(count.load(Ordering::SeqCst), expected);
            }
        }
    }

    #[test]
    fn test_extra_signals_are_ignored() {
        let (mut barrier, count) = barrier_with_counter(&[StageId::Capture, StageId::Classifier]);

        barrier.signal_ready(StageId::Capture);
        barrier.signal_ready(StageId::Capture);
        barrier.signal_ready(StageId::Preview);
        assert_eq!(count.load(Ordering::SeqCst), 0);

        barrier.signal_ready(StageId::Classifier);
        barrier.signal_ready(StageId::Classifier);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
