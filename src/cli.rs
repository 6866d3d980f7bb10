use clap::Parser;
use std::path::PathBuf;

use crate::pipeline::SegmentErrorPolicy;
use crate::playlist::KeyMode;

/// An HLS audio stream downloader implemented in Rust.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// The M3U8 playlist URL to download (HTTPS).
    pub url: String,

    /// Track title; also names the output file.
    pub title: String,

    /// Track artist, prepended to the output filename when present.
    #[arg(short, long)]
    pub artist: Option<String>,

    /// Directory for scratch files (a per-run subdirectory is created inside).
    #[arg(long, default_value = "scratch")]
    pub scratch_dir: PathBuf,

    /// Directory the final audio file is written to.
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Path to the FFmpeg executable.
    #[arg(long)]
    pub ffmpeg_path: Option<PathBuf>,

    /// How a failed segment fetch affects the run.
    #[arg(long, value_enum, default_value = "skip")]
    pub on_segment_error: SegmentErrorPolicy,

    /// Whether a key directive applies to all following segments or only the next one.
    #[arg(long, value_enum, default_value = "persist")]
    pub key_mode: KeyMode,

    /// Retry attempts per segment before the error policy applies.
    #[arg(long, default_value_t = 3)]
    pub segment_retries: u32,

    /// Custom HTTP header(s). E.g., -H "Cookie: mycookie"
    #[arg(short = 'H', long = "header", action = clap::ArgAction::Append)]
    pub headers: Vec<String>,
}

pub fn parse_args() -> Args {
    Args::parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn positional_args_and_policy_flags_parse() {
        let args = Args::parse_from([
            "m3u8_audio_rs",
            "https://cdn.example.com/audio/index.m3u8",
            "song",
            "--artist",
            "Artist",
            "--on-segment-error",
            "abort",
            "--key-mode",
            "single",
        ]);

        assert_eq!(args.title, "song");
        assert_eq!(args.artist.as_deref(), Some("Artist"));
        assert_eq!(args.on_segment_error, SegmentErrorPolicy::Abort);
        assert_eq!(args.key_mode, KeyMode::Single);
        assert_eq!(args.segment_retries, 3);
    }
}
