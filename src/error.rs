//! 错误类型 (Error types)

use std::path::PathBuf;

use thiserror::Error;

use crate::pipeline::StageId;

pub type Result<T> = std::result::Result<T, MirrorError>;

#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("读取文件失败 {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("标签文件为空: {0}")]
    EmptyLabels(PathBuf),

    #[error("重复的标签: {0}")]
    DuplicateLabel(String),

    #[error("视频目录缺失: {0}")]
    MissingVideoDir(PathBuf),

    #[error("时间段格式错误 '{0}', 应为 HH:MM-HH:MM")]
    InvalidDayRange(String),

    #[error("回放文件第{line}行解析失败: {reason}")]
    InvalidReplay { line: usize, reason: String },

    #[error("模块 {stage} 初始化失败: {reason}")]
    StageSetup { stage: StageId, reason: String },
}

impl MirrorError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MirrorError::Io {
            path: path.into(),
            source,
        }
    }
}
