use clap::ValueEnum;
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use reqwest::Client;
use std::path::PathBuf;

use crate::assembler::BatchAssembler;
use crate::error::DownloadError;
use crate::fetcher::SegmentFetcher;
use crate::http::fetch_playlist_text;
use crate::playlist::{self, KeyMode};

/// 分段抓取失败时的处理策略
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SegmentErrorPolicy {
    /// Warn and continue; the output is missing that segment's audio.
    Skip,
    /// The first failed segment aborts the whole run.
    Abort,
}

/// 每隔多少个分段折叠一次输出
const BATCH_SIZE: usize = 30;

fn is_batch_boundary(index: usize, total: usize) -> bool {
    index % BATCH_SIZE == 0 || index + 1 == total
}

/// 已抓取但尚未折叠进输出文件的分段
#[derive(Default)]
struct BatchState {
    pending: Vec<PathBuf>,
}

impl BatchState {
    fn push(&mut self, piece: PathBuf) {
        self.pending.push(piece);
    }

    /// flush成功后以输出文件打头，后续分段接在其后
    fn reseed(&mut self, artifact: PathBuf) {
        self.pending.clear();
        self.pending.push(artifact);
    }
}

/// 顺序驱动 解析 → 抓取 → 折叠 的状态机
pub struct Pipeline {
    client: Client,
    fetcher: SegmentFetcher,
    assembler: BatchAssembler,
    scratch_dir: PathBuf,
    key_mode: KeyMode,
    error_policy: SegmentErrorPolicy,
}

impl Pipeline {
    pub fn new(
        client: Client,
        fetcher: SegmentFetcher,
        assembler: BatchAssembler,
        scratch_dir: PathBuf,
        key_mode: KeyMode,
        error_policy: SegmentErrorPolicy,
    ) -> Self {
        Self {
            client,
            fetcher,
            assembler,
            scratch_dir,
            key_mode,
            error_policy,
        }
    }

    /// 运行完整流水线，返回最终产物路径。
    /// 一个分段都没折叠进输出时返回None。
    pub async fn run(&self, playlist_url: &str) -> Result<Option<PathBuf>, DownloadError> {
        info!("Fetching the playlist from {}", playlist_url);
        let playlist_text = fetch_playlist_text(&self.client, playlist_url).await?;

        let base_url = playlist::base_url_of(playlist_url);
        if base_url.len() == playlist_url.len() {
            warn!("Playlist URL does not contain 'index.m3u8'; segment URLs may not resolve");
        }

        info!("Parsing the playlist...");
        let segments = playlist::parse(base_url, &playlist_text, self.key_mode);
        let total = segments.len();
        info!("{} chunks found. Fetching:", total);

        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
                )
                .unwrap()
                .progress_chars("#>-"),
        );

        let mut batch = BatchState::default();
        let mut artifact = None;

        for descriptor in &segments {
            let destination = self
                .scratch_dir
                .join(format!("chunk{}.mp3", descriptor.index));

            match self.fetcher.fetch(descriptor, &destination).await {
                Ok(()) => batch.push(destination),
                Err(e) => match self.error_policy {
                    SegmentErrorPolicy::Abort => {
                        pb.abandon();
                        return Err(e);
                    }
                    // 跳过的分段不进清单，输出里会缺这一段音频
                    SegmentErrorPolicy::Skip => {
                        warn!("Skipping segment {}: {}", descriptor.index, e)
                    }
                },
            }
            pb.inc(1);

            if is_batch_boundary(descriptor.index, total) && !batch.pending.is_empty() {
                match self.assembler.flush(&batch.pending).await {
                    Ok(path) => {
                        batch.reseed(path.clone());
                        artifact = Some(path);
                    }
                    Err(e) => {
                        pb.abandon();
                        return Err(e);
                    }
                }
            }
        }
        pb.finish_with_message("done");

        Ok(artifact)
    }
}
