//! 标签集合与置信度表
//! Label set and confidence maps
//!
//! 标签集合在启动时从模型数据目录读取, 运行期间不再变化.
//! 集合的顺序就是文件中的顺序, 滤波器求最大值时按此顺序处理并列.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::error::{MirrorError, Result};

/// 单个标签 (识别的类别名称)
pub type Label = String;

/// 分类器输出: 标签 → 置信度 [0,1], 不要求归一化
pub type ConfidenceMap = HashMap<Label, f32>;

/// 固定的标签集合 + 空闲标签
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSet {
    labels: Arc<[Label]>,
    idle: Label,
}

impl LabelSet {
    pub fn new<I, S>(labels: I, idle: impl Into<Label>) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<Label>,
    {
        let mut ordered: Vec<Label> = Vec::new();
        for label in labels {
            let label = label.into();
            if ordered.contains(&label) {
                return Err(MirrorError::DuplicateLabel(label));
            }
            ordered.push(label);
        }
        if ordered.is_empty() {
            return Err(MirrorError::EmptyLabels("<memory>".into()));
        }

        let idle = idle.into();
        if !ordered.contains(&idle) {
            tracing::warn!("⚠️  空闲标签 '{}' 不在标签集合中, 空闲视频不会被触发", idle);
        }

        Ok(Self {
            labels: ordered.into(),
            idle,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Label> {
        self.labels.iter()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    /// 第一个标签 (滤波器的初始稳定标签)
    pub fn first(&self) -> &Label {
        &self.labels[0]
    }

    pub fn idle(&self) -> &Label {
        &self.idle
    }

    pub fn is_idle(&self, label: &str) -> bool {
        self.idle == label
    }
}

/// 从标签文件读取 (每行一个标签)
pub fn load_labels(path: impl AsRef<Path>, idle: &str) -> Result<LabelSet> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| MirrorError::io(path, e))?;
    let labels: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    if labels.is_empty() {
        return Err(MirrorError::EmptyLabels(path.to_path_buf()));
    }

    let set = LabelSet::new(labels, idle)?;
    tracing::info!("🏷️  已加载 {} 个标签: {}", set.len(), path.display());
    Ok(set)
}
