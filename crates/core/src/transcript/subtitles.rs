//! SubRip (`.srt`) parsing for uploaded subtitle files.

use std::sync::LazyLock;

use regex::Regex;

static SRT_TIMING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{2}):(\d{2}):(\d{2}),(\d{3})\s*-->\s*(\d{2}):(\d{2}):(\d{2}),(\d{3})")
        .expect("static regex")
});

static BLANK_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*\n").expect("static regex"));

#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleEntry {
    pub index: u32,
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Blocks without a numeric index, a valid timing line, or any text are skipped.
pub fn parse_srt(content: &str) -> Vec<SubtitleEntry> {
    let content = content.trim_start_matches('\u{feff}').replace("\r\n", "\n");

    BLANK_LINE
        .split(&content)
        .filter_map(parse_block)
        .collect()
}

fn parse_block(block: &str) -> Option<SubtitleEntry> {
    let mut lines = block.lines().map(str::trim).skip_while(|line| line.is_empty());

    let index = lines.next()?.parse::<u32>().ok()?;
    let caps = SRT_TIMING.captures(lines.next()?)?;
    let stamp = |offset: usize| -> f64 {
        let part = |i: usize| caps[offset + i].parse::<f64>().unwrap_or(0.0);
        part(1) * 3600.0 + part(2) * 60.0 + part(3) + part(4) / 1000.0
    };

    let text = lines
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if text.is_empty() {
        return None;
    }

    Some(SubtitleEntry {
        index,
        start: stamp(0),
        end: stamp(4),
        text,
    })
}

pub fn join_entries(entries: &[SubtitleEntry]) -> String {
    entries
        .iter()
        .map(|entry| entry.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_blocks_in_order() {
        let srt = "\u{feff}1\r\n00:00:01,000 --> 00:00:03,500\r\nFirst line\r\nsecond line\r\n\r\n2\r\n01:00:00,250 --> 01:00:02,000\r\nNext\r\n";
        let entries = parse_srt(srt);

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].text, "First line second line");
        assert_eq!(entries[0].end, 3.5);
        assert_eq!(entries[1].start, 3600.25);
        assert_eq!(join_entries(&entries), "First line second line Next");
    }

    #[test]
    fn whitespace_only_separator_lines_split_cues() {
        let srt = "1\n00:00:01,000 --> 00:00:02,000\nHello there\n \n2\n00:00:02,000 --> 00:00:03,000\nGeneral Kenobi\n\t\n";
        let entries = parse_srt(srt);

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].text, "Hello there");
        assert_eq!(entries[1].index, 2);
        assert_eq!(entries[1].text, "General Kenobi");
    }

    #[test]
    fn malformed_blocks_are_skipped() {
        let srt = "\
one
00:00:01,000 --> 00:00:02,000
bad index

2
00:00:01.000 --> 00:00:02.000
dots instead of commas

3
00:00:03,000 --> 00:00:04,000

4
00:00:05,000 --> 00:00:06,000
kept
";
        let entries = parse_srt(srt);

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].index, 4);
        assert_eq!(entries[0].text, "kept");
    }
}
