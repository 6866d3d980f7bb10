use clap::ValueEnum;

/// `#EXT-X-KEY`指令的作用范围。
/// HLS规范里密钥对其后所有分段生效，直到被下一条覆盖；
/// 个别服务端只对紧随其后的一个分段使用该密钥。
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyMode {
    /// Key line stays active until overridden by a later key line.
    Persist,
    /// Key line applies to exactly one segment, then clears.
    Single,
}

/// 播放列表中的一个待抓取分段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentDescriptor {
    /// 0-based出现顺序，决定最终音频顺序
    pub index: usize,
    /// `#EXTINF`行，原样透传（可能为空）
    pub media_line: String,
    /// 分段的绝对URL
    pub uri: String,
    /// 当前生效的`#EXT-X-KEY`行，未加密流为空
    pub key: String,
}

#[derive(Default)]
struct ParseState {
    key: String,
    media_line: String,
    segments: Vec<SegmentDescriptor>,
}

/// 解析播放列表文本，按出现顺序返回分段
pub fn parse(base_url: &str, playlist_text: &str, key_mode: KeyMode) -> Vec<SegmentDescriptor> {
    let state = playlist_text
        .lines()
        .fold(ParseState::default(), |mut state, line| {
            if line.contains("#EXT-X-KEY:METHOD") {
                state.key = line.to_string();
            } else if line.contains("#EXTINF:") {
                state.media_line = line.to_string();
            } else if line.contains(".ts?") {
                let key = match key_mode {
                    KeyMode::Persist => state.key.clone(),
                    KeyMode::Single => std::mem::take(&mut state.key),
                };
                state.segments.push(SegmentDescriptor {
                    index: state.segments.len(),
                    media_line: std::mem::take(&mut state.media_line),
                    uri: format!("{base_url}{line}"),
                    key,
                });
            }
            state
        });

    state.segments
}

/// 截取基础URL：`index.m3u8`之前的部分。
/// 找不到标记时返回完整URL，由调用方决定是否告警。
pub fn base_url_of(playlist_url: &str) -> &str {
    playlist_url
        .split("index.m3u8")
        .next()
        .unwrap_or(playlist_url)
}
