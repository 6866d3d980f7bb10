pub mod assembler;
pub mod cli;
pub mod error;
pub mod fetcher;
pub mod http;
pub mod pipeline;
pub mod playlist;

use anyhow::Result;
use log::{info, warn};
use std::path::PathBuf;
use tokio::fs;
use url::Url;

use crate::assembler::{output_file_name, BatchAssembler};
use crate::cli::Args;
use crate::fetcher::SegmentFetcher;
use crate::http::build_http_client;
use crate::pipeline::Pipeline;

/// 运行HLS音频下载器的主要逻辑
pub async fn run(args: Args) -> Result<()> {
    let client = build_http_client(&args.headers)?;
    Url::parse(&args.url)?;

    // 每个URL一个独立的scratch目录，避免并发运行互相覆盖
    let url_hash = &sha256::digest(&args.url)[..12];
    let scratch_dir = args.scratch_dir.join(url_hash);
    info!("Scratch files will be kept in: {:?}", scratch_dir);
    fs::create_dir_all(&scratch_dir).await?;
    fs::create_dir_all(&args.output_dir).await?;

    let ffmpeg = args
        .ffmpeg_path
        .clone()
        .unwrap_or_else(|| PathBuf::from("ffmpeg"));
    let artist = args.artist.clone().filter(|artist| !artist.is_empty());
    let output_path = args
        .output_dir
        .join(output_file_name(artist.as_deref(), &args.title));

    let fetcher = SegmentFetcher::new(scratch_dir.clone(), ffmpeg.clone(), args.segment_retries);
    let assembler = BatchAssembler::new(
        scratch_dir.clone(),
        output_path,
        ffmpeg,
        artist,
        &args.title,
    );
    let pipeline = Pipeline::new(
        client,
        fetcher,
        assembler,
        scratch_dir.clone(),
        args.key_mode,
        args.on_segment_error,
    );

    match pipeline.run(&args.url).await? {
        Some(artifact) => info!("Saved to {:?}", artifact),
        None => warn!("No segments were fetched; no output file was produced"),
    }

    // 运行成功后尽力清理scratch目录
    if let Err(e) = fs::remove_dir_all(&scratch_dir).await {
        warn!("Failed to remove scratch dir {:?}: {}", scratch_dir, e);
    }

    Ok(())
}
