use log::warn;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::process::Command;

use crate::error::DownloadError;

/// 根据artist/title拼出最终文件名
pub fn output_file_name(artist: Option<&str>, title: &str) -> String {
    let file_name = if title.to_lowercase().ends_with(".mp3") {
        title.to_string()
    } else {
        format!("{title}.mp3")
    };
    match artist {
        Some(artist) if !artist.is_empty() => format!("{artist} - {file_name}"),
        _ => file_name,
    }
}

/// 元数据里的标题不带扩展名
fn strip_mp3_suffix(title: &str) -> &str {
    let n = title.len();
    if n >= 4 && title.is_char_boundary(n - 4) && title[n - 4..].eq_ignore_ascii_case(".mp3") {
        &title[..n - 4]
    } else {
        title
    }
}

/// 渲染concat清单，行顺序即最终音频顺序
fn render_manifest(piece_refs: &[PathBuf]) -> String {
    piece_refs
        .iter()
        .map(|p| format!("file '{}'\n", p.display()))
        .collect()
}

/// 把已解码的分段按顺序折叠进最终输出文件
pub struct BatchAssembler {
    scratch_dir: PathBuf,
    output_path: PathBuf,
    ffmpeg: PathBuf,
    artist: Option<String>,
    title_tag: String,
}

impl BatchAssembler {
    pub fn new(
        scratch_dir: PathBuf,
        output_path: PathBuf,
        ffmpeg: PathBuf,
        artist: Option<String>,
        title: &str,
    ) -> Self {
        Self {
            scratch_dir,
            output_path,
            ffmpeg,
            artist,
            title_tag: strip_mp3_suffix(title).to_string(),
        }
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// 写清单 → ffmpeg concat → 清理分段 → 原子改名。
    /// 任一步失败即中止；清单和temp.mp3可能留在磁盘上供排查。
    pub async fn flush(&self, piece_refs: &[PathBuf]) -> Result<PathBuf, DownloadError> {
        let manifest_path = self.scratch_dir.join("playlist.txt");
        fs::write(&manifest_path, render_manifest(piece_refs))
            .await
            .map_err(|source| DownloadError::Filesystem {
                path: manifest_path.clone(),
                source,
            })?;

        // temp与最终输出同目录，保证rename原子完成
        let temp_path = self.output_path.with_file_name("temp.mp3");

        let mut command = Command::new(&self.ffmpeg);
        command
            .arg("-f")
            .arg("concat")
            .arg("-safe")
            .arg("0")
            .arg("-i")
            .arg(&manifest_path)
            .arg("-c")
            .arg("copy");
        if let Some(artist) = &self.artist {
            command.arg("-metadata").arg(format!("artist={artist}"));
        }
        command
            .arg("-metadata")
            .arg(format!("title={}", self.title_tag));

        let output = command
            .arg("-y")
            .arg(&temp_path)
            .output()
            .await
            .map_err(|e| DownloadError::Assemble {
                detail: format!("failed to run {:?}: {}", self.ffmpeg, e),
            })?;

        if !output.status.success() {
            return Err(DownloadError::Assemble {
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        fs::remove_file(&manifest_path)
            .await
            .map_err(|source| DownloadError::Filesystem {
                path: manifest_path.clone(),
                source,
            })?;

        self.cleanup_chunks().await;

        fs::rename(&temp_path, &self.output_path)
            .await
            .map_err(|source| DownloadError::Filesystem {
                path: self.output_path.clone(),
                source,
            })?;

        Ok(self.output_path.clone())
    }

    /// 尽力删除scratch里的chunk*.mp3，失败只记日志
    async fn cleanup_chunks(&self) {
        let mut read_dir = match fs::read_dir(&self.scratch_dir).await {
            Ok(read_dir) => read_dir,
            Err(e) => {
                warn!("Failed to scan scratch dir {:?}: {}", self.scratch_dir, e);
                return;
            }
        };

        loop {
            match read_dir.next_entry().await {
                Ok(Some(entry)) => {
                    let name = entry.file_name();
                    let name = name.to_string_lossy();
                    if name.starts_with("chunk") && name.ends_with(".mp3") {
                        if let Err(e) = fs::remove_file(entry.path()).await {
                            warn!("Failed to remove {:?}: {}", entry.path(), e);
                        }
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("Failed to scan scratch dir {:?}: {}", self.scratch_dir, e);
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn bare_title_gets_mp3_suffix() {
        assert_eq!(output_file_name(None, "song"), "song.mp3");
    }

    #[test]
    fn artist_is_prefixed() {
        assert_eq!(output_file_name(Some("Artist"), "song"), "Artist - song.mp3");
    }

    #[test]
    fn existing_suffix_is_kept() {
        assert_eq!(output_file_name(None, "song.MP3"), "song.MP3");
    }

    #[test]
    fn empty_artist_is_ignored() {
        assert_eq!(output_file_name(Some(""), "song"), "song.mp3");
    }

    #[test]
    fn title_tag_drops_extension() {
        assert_eq!(strip_mp3_suffix("song.mp3"), "song");
        assert_eq!(strip_mp3_suffix("song.MP3"), "song");
        assert_eq!(strip_mp3_suffix("song"), "song");
        assert_eq!(strip_mp3_suffix("mp3"), "mp3");
    }

    #[test]
    fn manifest_preserves_piece_order() {
        let pieces = vec![
            PathBuf::from("out.mp3"),
            PathBuf::from("chunk31.mp3"),
            PathBuf::from("chunk32.mp3"),
        ];
        assert_eq!(
            render_manifest(&pieces),
            "file 'out.mp3'\nfile 'chunk31.mp3'\nfile 'chunk32.mp3'\n"
        );
    }

    #[test]
    fn empty_manifest_is_empty() {
        assert_eq!(render_manifest(&[]), "");
    }

    #[tokio::test]
    async fn cleanup_removes_only_chunk_files() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("chunk0.mp3"), b"x").unwrap();
        std::fs::write(tmp.path().join("chunk12.mp3"), b"x").unwrap();
        std::fs::write(tmp.path().join("notes.txt"), b"x").unwrap();
        std::fs::write(tmp.path().join("song.mp3"), b"x").unwrap();

        let assembler = BatchAssembler::new(
            tmp.path().to_path_buf(),
            tmp.path().join("song.mp3"),
            PathBuf::from("ffmpeg"),
            None,
            "song",
        );
        assembler.cleanup_chunks().await;

        assert!(!tmp.path().join("chunk0.mp3").exists());
        assert!(!tmp.path().join("chunk12.mp3").exists());
        assert!(tmp.path().join("notes.txt").exists());
        assert!(tmp.path().join("song.mp3").exists());
    }

    #[tokio::test]
    async fn failed_flush_leaves_manifest_behind() {
        let tmp = TempDir::new().unwrap();
        let assembler = BatchAssembler::new(
            tmp.path().to_path_buf(),
            tmp.path().join("song.mp3"),
            PathBuf::from("/nonexistent/ffmpeg"),
            None,
            "song",
        );

        let err = assembler
            .flush(&[PathBuf::from("chunk0.mp3")])
            .await
            .unwrap_err();

        assert!(matches!(err, DownloadError::Assemble { .. }));
        assert!(tmp.path().join("playlist.txt").exists());
    }
}
