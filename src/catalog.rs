//! 视频目录 (Video catalog)
//!
//! 目录结构:
//! ```text
//! videos/
//!   alice/        a1.mp4 a2.mp4
//!   bob/          b1.mp4
//!   no_one/
//!     common/     idle1.mp4
//!     morning/    sunrise.mp4
//! ```
//! 启动时扫描一次, 之后只读.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use crate::environment::COMMON_BUCKET;
use crate::error::{MirrorError, Result};
use crate::labels::{Label, LabelSet};

#[derive(Debug, Clone, Default)]
pub struct VideoCatalog {
    videos: HashMap<Label, Vec<PathBuf>>,
    idle_buckets: BTreeMap<String, Vec<PathBuf>>,
}

impl VideoCatalog {
    /// 内存构建 (测试/嵌入使用)
    pub fn from_entries<L, V, B>(videos: L, idle_buckets: B) -> Self
    where
        L: IntoIterator<Item = (Label, V)>,
        B: IntoIterator<Item = (String, V)>,
        V: IntoIterator<Item = PathBuf>,
    {
        let sorted = |v: V| {
            let mut v: Vec<PathBuf> = v.into_iter().collect();
            v.sort();
            v.dedup();
            v
        };
        Self {
            videos: videos.into_iter().map(|(l, v)| (l, sorted(v))).collect(),
            idle_buckets: idle_buckets.into_iter().map(|(b, v)| (b, sorted(v))).collect(),
        }
    }

    /// 扫描视频根目录
    pub fn scan(root: impl AsRef<Path>, labels: &LabelSet) -> Result<Self> {
        let root = root.as_ref();
        let mut catalog = Self::default();

        for label in labels.iter() {
            let dir = root.join(label);
            if labels.is_idle(label) {
                let common = dir.join(COMMON_BUCKET);
                if !common.is_dir() {
                    return Err(MirrorError::MissingVideoDir(common));
                }
                for entry in fs::read_dir(&dir).map_err(|e| MirrorError::io(&dir, e))? {
                    let entry = entry.map_err(|e| MirrorError::io(&dir, e))?;
                    if entry.path().is_dir() {
                        let bucket = entry.file_name().to_string_lossy().into_owned();
                        let files = list_files(&entry.path())?;
                        catalog.idle_buckets.insert(bucket, files);
                    }
                }
            } else {
                if !dir.is_dir() {
                    return Err(MirrorError::MissingVideoDir(dir));
                }
                let files = list_files(&dir)?;
                if files.is_empty() {
                    tracing::warn!("⚠️  标签 '{}' 没有视频: {}", label, dir.display());
                }
                catalog.videos.insert(label.clone(), files);
            }
        }

        tracing::info!(
            "🎞️  视频目录扫描完成: {} 个标签, {} 个空闲分组",
            catalog.videos.len(),
            catalog.idle_buckets.len()
        );
        Ok(catalog)
    }

    /// 某个标签的视频 (有序)
    pub fn videos(&self, label: &str) -> &[PathBuf] {
        self.videos.get(label).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn idle_bucket(&self, bucket: &str) -> &[PathBuf] {
        self.idle_buckets
            .get(bucket)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// 空闲视频候选: 所有可用分组的并集
    pub fn idle_candidates(&self, buckets: &[String]) -> Vec<&PathBuf> {
        let mut candidates: Vec<&PathBuf> = Vec::new();
        for bucket in buckets {
            candidates.extend(self.idle_bucket(bucket));
        }
        candidates
    }
}

fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| MirrorError::io(dir, e))? {
        let path = entry.map_err(|e| MirrorError::io(dir, e))?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
