//! 置信度回放 - 按行读取 JSON, 每次分类返回下一行, 读完从头开始
//!
//! ```text
//! {"no_one": 0.95, "alice": 0.02}
//! {"no_one": 0.10, "alice": 0.91}
//! ```

use std::fs;
use std::path::PathBuf;

use super::Classifier;
use crate::error::MirrorError;
use crate::input::Frame;
use crate::labels::ConfidenceMap;

pub struct ReplayClassifier {
    path: Option<PathBuf>,
    frames: Vec<ConfidenceMap>,
    cursor: usize,
}

impl ReplayClassifier {
    /// 从文件回放 (在 `load` 中读取)
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            frames: Vec::new(),
            cursor: 0,
        }
    }

    pub fn from_maps(frames: Vec<ConfidenceMap>) -> Self {
        Self {
            path: None,
            frames,
            cursor: 0,
        }
    }

    pub fn parse(text: &str) -> Result<Vec<ConfidenceMap>, MirrorError> {
        text.lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| {
                serde_json::from_str::<ConfidenceMap>(line).map_err(|e| {
                    MirrorError::InvalidReplay {
                        line: i + 1,
                        reason: e.to_string(),
                    }
                })
            })
            .collect()
    }
}

impl Classifier for ReplayClassifier {
    fn load(&mut self) -> anyhow::Result<()> {
        if let Some(path) = &self.path {
            let text = fs::read_to_string(path).map_err(|e| MirrorError::io(path, e))?;
            self.frames = Self::parse(&text)?;
            tracing::info!("📼 回放 {} 帧置信度: {}", self.frames.len(), path.display());
        }
        anyhow::ensure!(!self.frames.is_empty(), "回放数据为空");
        self.cursor = 0;
        Ok(())
    }

    fn classify(&mut self, _frame: &Frame) -> anyhow::Result<ConfidenceMap> {
        anyhow::ensure!(!self.frames.is_empty(), "回放数据未加载");
        let scores = self.frames[self.cursor].clone();
        self.cursor = (self.cursor + 1) % self.frames.len();
        Ok(scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_replay_loops() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"no_one": 0.9, "alice": 0.1}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"alice": 0.8}}"#).unwrap();

        let mut replay = ReplayClassifier::new(file.path());
        replay.load().unwrap();

        let frame = Frame::new(2, 2);
        assert_eq!(replay.classify(&frame).unwrap()["no_one"], 0.9);
        assert_eq!(replay.classify(&frame).unwrap()["alice"], 0.8);
        assert_eq!(replay.classify(&frame).unwrap()["no_one"], 0.9);
    }

    #[test]
    fn test_parse_error_reports_line() {
        let err = ReplayClassifier::parse("{\"a\": 1.0}\n{oops}\n").unwrap_err();
        assert!(matches!(err, MirrorError::InvalidReplay { line: 2, .. }));
    }

    #[test]
    fn test_empty_replay_fails_to_load() {
        let mut replay = ReplayClassifier::from_maps(Vec::new());
        assert!(replay.load().is_err());
    }
}
