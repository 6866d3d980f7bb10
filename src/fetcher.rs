use log::warn;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::process::Command;

use crate::error::DownloadError;
use crate::playlist::SegmentDescriptor;

/// 为单个分段合成最小可用的HLS播放列表
fn synthesize_playlist(descriptor: &SegmentDescriptor) -> String {
    let mut data = String::from(
        "#EXTM3U\n\
         #EXT-X-TARGETDURATION:3\n\
         #EXT-X-ALLOW-CACHE:NO\n\
         #EXT-X-PLAYLIST-TYPE:VOD\n\
         #EXT-X-VERSION:3\n\
         #EXT-X-MEDIA-SEQUENCE:1\n",
    );
    if !descriptor.key.is_empty() {
        data.push_str(&descriptor.key);
        data.push('\n');
    }
    if !descriptor.media_line.is_empty() {
        data.push_str(&descriptor.media_line);
        data.push('\n');
    }
    data.push_str(&descriptor.uri);
    data.push('\n');
    data.push_str("#EXT-X-ENDLIST\n");
    data
}

/// 通过外部转码器把一个分段落地为本地音频文件
pub struct SegmentFetcher {
    scratch_dir: PathBuf,
    ffmpeg: PathBuf,
    retries: u32,
}

impl SegmentFetcher {
    pub fn new(scratch_dir: PathBuf, ffmpeg: PathBuf, retries: u32) -> Self {
        Self {
            scratch_dir,
            ffmpeg,
            retries,
        }
    }

    /// 抓取一个分段并写入destination。
    /// 转码失败会按配置重试；最终失败时scratch中的chunk.m3u8会保留，便于排查。
    pub async fn fetch(
        &self,
        descriptor: &SegmentDescriptor,
        destination: &Path,
    ) -> Result<(), DownloadError> {
        let playlist_path = self.scratch_dir.join("chunk.m3u8");
        fs::write(&playlist_path, synthesize_playlist(descriptor))
            .await
            .map_err(|source| DownloadError::Filesystem {
                path: playlist_path.clone(),
                source,
            })?;

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self
                .transcode(descriptor.index, &playlist_path, destination)
                .await
            {
                Ok(()) => break,
                Err(e) if attempt <= self.retries => {
                    warn!(
                        "Segment {} attempt {} failed, retrying: {}",
                        descriptor.index, attempt, e
                    );
                    tokio::time::sleep(Duration::from_millis(500 * u64::from(attempt))).await;
                }
                Err(e) => return Err(e),
            }
        }

        // 成功后删除临时播放列表
        let _ = fs::remove_file(&playlist_path).await;
        Ok(())
    }

    async fn transcode(
        &self,
        index: usize,
        playlist_path: &Path,
        destination: &Path,
    ) -> Result<(), DownloadError> {
        let output = Command::new(&self.ffmpeg)
            .arg("-protocol_whitelist")
            .arg("crypto,https,file,tls,tcp")
            .arg("-i")
            .arg(playlist_path)
            .arg("-vn")
            .arg("-dn")
            .arg("-sn")
            .arg("-acodec")
            .arg("copy")
            .arg("-y")
            .arg(destination)
            .output()
            .await
            .map_err(|e| DownloadError::SegmentFetch {
                index,
                detail: format!("failed to run {:?}: {}", self.ffmpeg, e),
            })?;

        if !output.status.success() {
            return Err(DownloadError::SegmentFetch {
                index,
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(())
    }
}
