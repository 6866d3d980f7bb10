use std::path::PathBuf;
use thiserror::Error;

/// 下载流水线的错误类型
#[derive(Debug, Error)]
pub enum DownloadError {
    /// 播放列表无法获取，整个运行中止
    #[error("failed to fetch playlist {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// 单个分段转码失败
    #[error("transcoder failed on segment {index}: {detail}")]
    SegmentFetch { index: usize, detail: String },

    /// 拼接步骤失败
    #[error("concat step failed: {detail}")]
    Assemble { detail: String },

    /// 文件系统操作失败
    #[error("filesystem operation failed on {path:?}: {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
