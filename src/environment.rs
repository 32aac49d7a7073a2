/// 外部环境 (时段) → 空闲视频分组
///
/// 空闲标签下的视频按子目录分组: `common` 始终可用,
/// `morning` / `afternoon` / `evening` 只在对应时段内参与随机选择.
use chrono::{Local, NaiveTime};

use crate::config::DayConfig;
use crate::error::{MirrorError, Result};

pub const COMMON_BUCKET: &str = "common";

/// 闭区间时段 [start, end]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeRange {
    /// 解析 "HH:MM-HH:MM"
    pub fn parse(text: &str) -> Result<Self> {
        let invalid = || MirrorError::InvalidDayRange(text.to_string());
        let (start, end) = text.split_once('-').ok_or_else(invalid)?;
        let start = NaiveTime::parse_from_str(start.trim(), "%H:%M").map_err(|_| invalid())?;
        let end = NaiveTime::parse_from_str(end.trim(), "%H:%M").map_err(|_| invalid())?;
        Ok(Self { start, end })
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        self.start <= time && time <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaySchedule {
    periods: Vec<(&'static str, TimeRange)>,
}

impl DaySchedule {
    pub fn from_config(config: &DayConfig) -> Result<Self> {
        Ok(Self {
            periods: vec![
                ("morning", TimeRange::parse(&config.morning)?),
                ("afternoon", TimeRange::parse(&config.afternoon)?),
                ("evening", TimeRange::parse(&config.evening)?),
            ],
        })
    }

    /// 给定时刻可用的分组, 第一个总是 `common`
    pub fn active_buckets(&self, time: NaiveTime) -> Vec<String> {
        let mut buckets = vec![COMMON_BUCKET.to_string()];
        for (name, range) in &self.periods {
            if range.contains(time) {
                buckets.push(name.to_string());
            }
        }
        buckets
    }

    pub fn active_buckets_now(&self) -> Vec<String> {
        self.active_buckets(Local::now().time())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_parse_range() {
        let range = TimeRange::parse("06:30-11:00").unwrap();
        assert_eq!(range.start, at(6, 30));
        assert!(range.contains(at(11, 0)));
        assert!(!range.contains(at(11, 1)));
        assert!(TimeRange::parse("6-11").is_err());
        assert!(TimeRange::parse("06:00").is_err());
    }

    #[test]
    fn test_active_buckets() {
        let schedule = DaySchedule::from_config(&DayConfig::default()).unwrap();
        assert_eq!(schedule.active_buckets(at(9, 15)), vec!["common", "morning"]);
        assert_eq!(schedule.active_buckets(at(19, 0)), vec!["common", "evening"]);
        assert_eq!(schedule.active_buckets(at(3, 0)), vec!["common"]);
    }
}
