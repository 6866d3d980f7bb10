use log::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志系统
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = m3u8_audio_rs::cli::parse_args();

    info!("Starting HLS audio downloader...");
    match &args.artist {
        Some(artist) => info!("Track: {} - {}", artist, args.title),
        None => info!("Track: {}", args.title),
    }
    info!("Playlist URL: {}", args.url);

    // 运行下载流水线
    if let Err(e) = m3u8_audio_rs::run(args).await {
        error!("Download failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
