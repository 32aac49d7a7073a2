/// 神经镜像 (Neural Mirror)
///
/// 互动装置主程序: 认出镜子前的人, 播放对应的视频
///
/// 系统架构:
/// 1. 采集线程: 按tick取帧 (独立工作线程)
/// 2. 分类线程: 逐帧分类 (独立工作线程)
/// 3. 主线程:   控制循环 (调度 + 时间滤波 + 视频触发)
use std::time::Duration;

use clap::Parser;
use neural_mirror_rs::{
    load_labels, CommandPlayback, LogPlayback, PipelineConfig, PipelineSupervisor, PlaybackSink,
    ReplayClassifier, SnapshotObserver, SyntheticCamera, VideoCatalog,
};
use tracing_subscriber::EnvFilter;

/// 神经镜像参数 (未给出的项使用配置文件)
#[derive(Parser, Debug)]
#[command(author, version, about = "神经镜像 - 互动视频装置", long_about = None)]
struct Args {
    /// 配置文件
    #[arg(short, long, default_value = "mirror_config.json")]
    config: String,

    /// 标签文件 (每行一个)
    #[arg(short, long)]
    labels: Option<String>,

    /// 视频根目录
    #[arg(short, long)]
    videos: Option<String>,

    /// 目标FPS
    #[arg(short, long)]
    fps: Option<u32>,

    /// 摄像头编号
    #[arg(long)]
    camera: Option<usize>,

    /// 置信度回放文件 (每行一个JSON)
    #[arg(short, long, default_value = "result/scores.jsonl")]
    replay: String,

    /// 外部播放器命令, 例如 "mpv --fs"
    #[arg(short, long)]
    player: Option<String>,

    /// 运行时长 (秒), 不给则一直运行
    #[arg(long)]
    duration_secs: Option<u64>,

    /// 快照目录 (每 snapshot_every 帧保存一张)
    #[arg(long)]
    snapshot: Option<String>,

    #[arg(long, default_value_t = 30)]
    snapshot_every: u64,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_target(false)
        .init();

    let args = Args::parse();

    // ========== 配置 ==========
    let mut config = PipelineConfig::load(&args.config);
    if let Some(labels) = args.labels {
        config.labels_file = labels;
    }
    if let Some(videos) = args.videos {
        config.videos_dir = videos;
    }
    if let Some(fps) = args.fps {
        config.target_fps = fps;
    }
    if let Some(camera) = args.camera {
        config.camera_id = camera;
    }
    if let Some(player) = args.player {
        config.player_command = Some(player.split_whitespace().map(String::from).collect());
    }
    let config = config.validated();
    config.print_summary();

    // ========== 模型数据 ==========
    let labels = load_labels(&config.labels_file, &config.idle_label)?;
    let catalog = VideoCatalog::scan(&config.videos_dir, &labels)?;

    tracing::info!("🚀 神经镜像启动");
    tracing::info!("🏷️  标签: {}", labels.iter().cloned().collect::<Vec<_>>().join(", "));
    tracing::info!("📼 置信度回放: {}", args.replay);
    tracing::info!("🎞️  视频目录: {}", config.videos_dir);

    let playback: Box<dyn PlaybackSink> = match &config.player_command {
        Some(argv) => Box::new(CommandPlayback::new(argv)?),
        None => Box::new(LogPlayback::new()),
    };

    let camera = SyntheticCamera::new(config.camera_id, 320, 240);
    let classifier = ReplayClassifier::new(&args.replay);

    let mut supervisor =
        PipelineSupervisor::new(config, labels, catalog, camera, classifier, playback);
    if let Some(dir) = args.snapshot {
        supervisor = supervisor.with_preview(SnapshotObserver::new(dir, args.snapshot_every));
    }

    // ========== 定时退出 ==========
    if let Some(secs) = args.duration_secs {
        let handle = supervisor.handle();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_secs(secs));
            tracing::info!("⏰ 运行 {}秒, 退出", secs);
            handle.shutdown();
        });
    }

    supervisor.run()?;
    Ok(())
}
