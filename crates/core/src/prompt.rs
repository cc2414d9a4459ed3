//! Prompt templates for the per-chunk and final summarization calls.

use crate::types::SummaryMode;

/// Joins partial summaries before the final call.
pub const SECTION_SEPARATOR: &str = "\n\n---\n\n";

/// Human name of a summary language code, as spelled out in prompts.
pub fn language_name(code: &str) -> &str {
    match code.trim().to_ascii_lowercase().as_str() {
        "en" | "en-us" | "en-gb" => "English",
        "zh-tw" | "zh-hant" => "Traditional Chinese",
        "zh-cn" | "zh-hans" | "zh" => "Simplified Chinese",
        "ja" => "Japanese",
        "ko" => "Korean",
        "es" => "Spanish",
        "fr" => "French",
        "de" => "German",
        "uk" => "Ukrainian",
        _ => code.trim(),
    }
}

pub fn chunk_prompt(chunk: &str, index: usize, total: usize, language: &str) -> String {
    let language = language_name(language);
    format!(
        "This is part {part} of {total} of a video transcript.\n\
         Summarize the key points of this part in {language}.\n\
         Only use information that appears in this part. Do not add outside knowledge, do not \
         speculate, and do not mention that the text is a transcript or a part.\n\n\
         Transcript:\n{chunk}",
        part = index + 1,
    )
}

struct Headings {
    overview: &'static str,
    key_points: &'static str,
    details: &'static str,
    takeaways: &'static str,
    speakers: &'static str,
    quotes: &'static str,
}

fn headings(language: &str) -> Headings {
    match language.trim().to_ascii_lowercase().as_str() {
        "zh-tw" | "zh-hant" => Headings {
            overview: "🎯 概述",
            key_points: "📌 重點",
            details: "📝 詳細內容",
            takeaways: "💡 結論",
            speakers: "🗣️ 講者觀點",
            quotes: "⭐ 精彩語錄",
        },
        "zh-cn" | "zh-hans" | "zh" => Headings {
            overview: "🎯 概述",
            key_points: "📌 要点",
            details: "📝 详细内容",
            takeaways: "💡 结论",
            speakers: "🗣️ 讲者观点",
            quotes: "⭐ 精彩语录",
        },
        "ja" => Headings {
            overview: "🎯 概要",
            key_points: "📌 要点",
            details: "📝 詳細",
            takeaways: "💡 まとめ",
            speakers: "🗣️ 話者の見解",
            quotes: "⭐ 印象的な発言",
        },
        _ => Headings {
            overview: "🎯 Overview",
            key_points: "📌 Key Points",
            details: "📝 Details",
            takeaways: "💡 Takeaways",
            speakers: "🗣️ Speakers & Perspectives",
            quotes: "⭐ Notable Quotes",
        },
    }
}

/// Final structured prompt over the joined partial summaries.
pub fn final_prompt(partials: &str, language: &str, mode: SummaryMode, title: &str) -> String {
    let h = headings(language);
    let language = language_name(language);

    let layout = match mode {
        SummaryMode::Video => format!(
            "{}\n(2-3 sentences on what the video is about)\n\n\
             {}\n(5-8 bullet points)\n\n\
             {}\n(short paragraphs walking through the main content in order)\n\n\
             {}\n(what the viewer should remember or do)",
            h.overview, h.key_points, h.details, h.takeaways
        ),
        SummaryMode::Podcast => format!(
            "{}\n(2-3 sentences on the episode and its guests)\n\n\
             {}\n(each speaker's main positions, attributed)\n\n\
             {}\n(the topics discussed, in conversation order)\n\n\
             {}\n(up to 3 short quotes taken verbatim from the notes, if any)\n\n\
             {}\n(what the listener should remember)",
            h.overview, h.speakers, h.key_points, h.quotes, h.takeaways
        ),
    };

    format!(
        "Below are notes summarizing consecutive parts of \"{title}\".\n\
         Write one coherent summary in {language} using exactly this structure, keeping the \
         section headings as written:\n\n{layout}\n\n\
         Merge repeated points, keep only facts present in the notes, and start directly with the \
         first heading.\n\n\
         Notes:\n{partials}"
    )
}
