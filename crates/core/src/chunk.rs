//! Splits long transcripts into overlapping, budget-sized windows.

pub const DEFAULT_CHUNK_BUDGET: usize = 8000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 500;

/// Character overlap is approximated by this many characters per word.
const CHARS_PER_OVERLAP_WORD: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    /// Leading words repeated from the end of the previous chunk.
    pub overlap_words: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSettings {
    pub budget: usize,
    pub overlap: usize,
}

impl Default for ChunkSettings {
    fn default() -> Self {
        Self {
            budget: DEFAULT_CHUNK_BUDGET,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

/// Greedy whitespace split: chunks stay within `budget` characters (words joined by one space)
/// unless a single word is longer than the budget, in which case it gets a chunk of its own.
pub fn split(text: &str, budget: usize, overlap: usize) -> Vec<Chunk> {
    let overlap_words = overlap / CHARS_PER_OVERLAP_WORD;
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_len = 0;
    let mut carried = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if !current.is_empty() && current_len + 1 + word_len > budget {
            chunks.push(Chunk {
                text: current.join(" "),
                overlap_words: carried,
            });

            let keep = overlap_words.min(current.len());
            let mut tail: Vec<&str> = current[current.len() - keep..].to_vec();
            let mut tail_len = joined_len(&tail);
            // The seeded tail plus the incoming word must still fit.
            while !tail.is_empty() && tail_len + 1 + word_len > budget {
                let dropped = tail.remove(0);
                tail_len = tail_len.saturating_sub(dropped.chars().count() + 1);
                if tail.is_empty() {
                    tail_len = 0;
                }
            }

            carried = tail.len();
            current = tail;
            current_len = tail_len;
        }

        current_len = if current.is_empty() {
            word_len
        } else {
            current_len + 1 + word_len
        };
        current.push(word);
    }

    if !current.is_empty() {
        chunks.push(Chunk {
            text: current.join(" "),
            overlap_words: carried,
        });
    }

    chunks
}

fn joined_len(words: &[&str]) -> usize {
    if words.is_empty() {
        return 0;
    }
    words.iter().map(|w| w.chars().count()).sum::<usize>() + words.len() - 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String {
        (0..n)
            .map(|i| format!("word{i:04}"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn reconstruct(chunks: &[Chunk]) -> Vec<String> {
        chunks
            .iter()
            .flat_map(|chunk| {
                chunk
                    .text
                    .split_whitespace()
                    .skip(chunk.overlap_words)
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunks = split("hello there world", 100, 20);
        assert_eq!(
            chunks,
            vec![Chunk {
                text: "hello there world".into(),
                overlap_words: 0
            }]
        );
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(split("   \n\t ", 100, 20).is_empty());
    }

    #[test]
    fn chunks_respect_budget_and_reconstruct_original_order() {
        let text = words(500);
        let original: Vec<String> = text.split_whitespace().map(str::to_string).collect();

        let chunks = split(&text, 200, 50);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.text.chars().count() <= 200, "chunk too long: {}", chunk.text);
        }
        assert_eq!(reconstruct(&chunks), original);
    }

    #[test]
    fn consecutive_chunks_share_overlap_words() {
        let text = words(300);
        let chunks = split(&text, 200, 50);

        for pair in chunks.windows(2) {
            let prev: Vec<&str> = pair[0].text.split_whitespace().collect();
            let next: Vec<&str> = pair[1].text.split_whitespace().collect();

            assert_eq!(pair[1].overlap_words, 5);
            assert_eq!(&prev[prev.len() - 5..], &next[..5]);
        }
    }

    #[test]
    fn oversized_word_gets_its_own_chunk() {
        let long = "x".repeat(50);
        let text = format!("alpha beta {long} gamma");

        let chunks = split(&text, 20, 20);

        assert!(chunks.iter().any(|c| c.text == long));
        assert_eq!(reconstruct(&chunks), vec!["alpha", "beta", long.as_str(), "gamma"]);
        for chunk in chunks.iter().filter(|c| c.text != long) {
            assert!(chunk.text.chars().count() <= 20);
        }
    }

    #[test]
    fn split_is_deterministic() {
        let text = words(120);
        assert_eq!(split(&text, 100, 30), split(&text, 100, 30));
    }
}
