//! Output cleaning shared by every generative backend.
//!
//! Well-formed output (it already contains one of the section markers the prompts ask for) only
//! loses boilerplate lead-in lines in front of the first marker. Anything else goes through the
//! broader set of preamble strips for the supported languages.

use std::sync::LazyLock;

use regex::Regex;

/// Leading glyphs that open a section in the structured summary templates.
pub const SECTION_MARKERS: &[&str] = &[
    "🎯", "📌", "📝", "💡", "🔑", "🎙️", "🗣️", "📊", "✅", "🔍", "📖", "⭐",
];

static LEAD_IN_LINE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"(?i)^(sure|certainly|of course|okay|ok|absolutely)\s*[,!.]+.*$",
        r"(?i)^(here(\s+is|\s+are|'s)|below\s+is|the\s+following\s+is)\b.*[:：]\s*$",
        r"^(好的|當然|当然)[，,！!。].*$",
        r"^(以下是|以下為|以下为|這是|这是).*[:：]\s*$",
        r"^(はい|もちろん)[、,！!。].*$",
        r"^(以下は|こちらは).*[:：]\s*$",
        r"^```[a-zA-Z]*\s*$",
    ])
});

/// Only the interjection itself is removed, so a sentence that merely starts with one of these
/// words survives.
static AGGRESSIVE_STRIPS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"(?i)\A\s*(sure|certainly|of course|okay|ok|absolutely)\s*[,!.]+\s*",
        r"(?i)\A\s*(i\s+can\s+help\s+with\s+that|happy\s+to\s+help|here\s+you\s+go)\s*[.!:]*\s*",
        r"(?i)\A\s*(here(\s+is|\s+are|'s)|below\s+is|the\s+following\s+is)\b[^\n:：]*[:：]\s*",
        r"(?i)\A\s*(as\s+requested|as\s+an\s+ai(\s+language\s+model)?)\s*[,:]\s*",
        r"\A\s*(好的|當然|当然)[，,！!。]+\s*",
        r"\A\s*(以下是|以下為|以下为|這是|这是)[^\n:：]*[:：]\s*",
        r"\A\s*(はい|もちろん)[、,！!。]+\s*",
        r"\A\s*(以下は|こちらは)[^\n:：]*[:：]\s*",
        r"\A\s*```[a-zA-Z]*\s*\n",
        r"\n\s*```\s*\z",
        r"(?i)\n\s*(i\s+hope\s+this\s+helps|let\s+me\s+know\s+if|feel\s+free\s+to)[^\n]*\s*\z",
        r"\n\s*(希望這|希望这|如果您有|如有)[^\n]*\s*\z",
    ])
});

static EXCESS_BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("static regex"));

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|pattern| Regex::new(pattern).expect("static regex"))
        .collect()
}

pub fn has_section_markers(text: &str) -> bool {
    SECTION_MARKERS.iter().any(|marker| text.contains(marker))
}

pub fn clean_output(raw: &str) -> String {
    let text = raw.replace("\r\n", "\n");
    let cleaned = if has_section_markers(&text) {
        clean_structured(&text)
    } else {
        clean_unstructured(&text)
    };

    EXCESS_BLANK_LINES
        .replace_all(cleaned.trim(), "\n\n")
        .into_owned()
}

fn first_marker_line_start(text: &str) -> Option<usize> {
    let marker_at = SECTION_MARKERS
        .iter()
        .filter_map(|marker| text.find(marker))
        .min()?;
    Some(text[..marker_at].rfind('\n').map_or(0, |nl| nl + 1))
}

fn clean_structured(text: &str) -> String {
    let Some(body_start) = first_marker_line_start(text) else {
        return text.trim().to_string();
    };
    let (head, body) = text.split_at(body_start);

    let kept_head: Vec<&str> = head
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !LEAD_IN_LINE.iter().any(|re| re.is_match(line)))
        .collect();

    let body = body.strip_suffix("```").unwrap_or(body).trim_end();
    if kept_head.is_empty() {
        body.to_string()
    } else {
        format!("{}\n\n{}", kept_head.join("\n"), body)
    }
}

/// Never turns non-empty output into an empty string.
fn clean_unstructured(text: &str) -> String {
    let original = text.trim();
    let mut current = original.to_string();

    // Preambles can be stacked ("Sure!\nHere is the summary:"), so strip until stable.
    loop {
        let before = current.len();
        for re in AGGRESSIVE_STRIPS.iter() {
            current = re.replace(&current, "").into_owned();
        }
        current = current.trim().to_string();
        if current.len() == before {
            break;
        }
    }

    if current.is_empty() {
        original.to_string()
    } else {
        current
    }
}
