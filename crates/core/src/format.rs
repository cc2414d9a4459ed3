use crate::types::Segment;

pub const MAX_TITLE_CHARS: usize = 100;
pub const MIN_TITLE_CHARS: usize = 10;
pub const FALLBACK_TITLE: &str = "Untitled video summary";

/// How many leading segments are searched for a title sentence.
const TITLE_SEGMENTS: usize = 3;

/// Format seconds as MM:SS timestamp
pub fn format_timestamp(seconds: f64) -> String {
    let mins = (seconds / 60.0) as u32;
    let secs = (seconds % 60.0) as u32;
    format!("{:02}:{:02}", mins, secs)
}

/// Truncate to at most `max` characters, never splitting a code point.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].trim_end().to_string(),
        None => text.to_string(),
    }
}

/// Apply the shared title rules: truncate, then fall back when too short.
pub fn normalize_title(candidate: &str) -> String {
    let title = truncate_chars(candidate.trim(), MAX_TITLE_CHARS);
    if title.chars().count() < MIN_TITLE_CHARS {
        FALLBACK_TITLE.to_string()
    } else {
        title
    }
}

/// Title from the first non-empty sentence of the first few caption segments.
pub fn title_from_segments(segments: &[Segment]) -> String {
    let opening = segments
        .iter()
        .take(TITLE_SEGMENTS)
        .map(|seg| seg.text.trim())
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    let sentence = opening
        .split(['.', '!', '?', '。', '！', '？'])
        .map(str::trim)
        .find(|sentence| !sentence.is_empty())
        .unwrap_or("");

    normalize_title(sentence)
}

/// Title from an uploaded subtitle file name, without its extension.
pub fn title_from_file_name(file_name: &str) -> String {
    let stem = file_name
        .rsplit_once('.')
        .map_or(file_name, |(stem, _)| stem)
        .replace(['_', '-'], " ");
    normalize_title(&stem)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(text: &str) -> Segment {
        Segment {
            start: 0.0,
            end: 1.0,
            text: text.to_string(),
        }
    }

    #[test]
    fn title_uses_first_sentence() {
        let segments = [
            seg("Welcome back to the channel"),
            seg("today we talk about caches. Then"),
            seg("something else"),
        ];
        assert_eq!(
            title_from_segments(&segments),
            "Welcome back to the channel today we talk about caches"
        );
    }

    #[test]
    fn short_titles_fall_back() {
        assert_eq!(title_from_segments(&[seg("Hi."), seg("Okay")]), FALLBACK_TITLE);
        assert_eq!(title_from_segments(&[]), FALLBACK_TITLE);
        assert_eq!(title_from_file_name("talk.srt"), FALLBACK_TITLE);
    }

    #[test]
    fn long_titles_are_truncated() {
        let long = "a".repeat(150);
        assert_eq!(title_from_segments(&[seg(&long)]).chars().count(), MAX_TITLE_CHARS);
    }

    #[test]
    fn file_name_titles_drop_extension() {
        assert_eq!(
            title_from_file_name("rust_conf-keynote.2024.srt"),
            "rust conf keynote.2024"
        );
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("日本語のテキスト", 3), "日本語");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[test]
    fn timestamps_are_minutes_and_seconds() {
        assert_eq!(format_timestamp(125.5), "02:05");
    }
}
