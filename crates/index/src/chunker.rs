/// Default chunk budget, in characters.
pub const DEFAULT_MAX_CHARS: usize = 800;

/// Split `text` into retrieval chunks.
///
/// Paragraphs are the trimmed, non-empty lines of `text`. They are packed
/// greedily into chunks joined with `'\n'`; a paragraph that would push the
/// current chunk past `max_chars` starts a new one. A single paragraph longer
/// than `max_chars` becomes its own chunk and is never cut.
///
/// Lengths are counted in `char`s, not bytes.
///
/// ```
/// use index::chunk_text;
///
/// let chunks = chunk_text("first line\n\n  second line  \n", 800);
/// assert_eq!(chunks, vec!["first line\nsecond line".to_string()]);
/// ```
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut buf = String::new();
    let mut buf_chars = 0usize;

    for paragraph in text.lines().map(str::trim).filter(|p| !p.is_empty()) {
        let p_chars = paragraph.chars().count();
        if !buf.is_empty() && buf_chars + p_chars + 1 > max_chars {
            chunks.push(std::mem::take(&mut buf));
            buf_chars = 0;
        }
        if !buf.is_empty() {
            buf.push('\n');
            buf_chars += 1;
        }
        buf.push_str(paragraph);
        buf_chars += p_chars;
    }

    if !buf.is_empty() {
        chunks.push(buf);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraphs(text: &str) -> String {
        text.lines()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn empty_and_blank_text_yield_no_chunks() {
        assert!(chunk_text("", 800).is_empty());
        assert!(chunk_text("  \n\n\t\n", 800).is_empty());
    }

    #[test]
    fn two_long_paragraphs_split_in_two() {
        let text = format!("{}\n\n{}", "a".repeat(600), "b".repeat(600));
        let chunks = chunk_text(&text, DEFAULT_MAX_CHARS);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], "a".repeat(600));
        assert_eq!(chunks[1], "b".repeat(600));
    }

    #[test]
    fn oversized_paragraph_is_kept_whole() {
        let long = "x".repeat(1000);
        let text = format!("short\n{long}\ntail");
        let chunks = chunk_text(&text, 100);
        assert_eq!(chunks, vec!["short".to_string(), long, "tail".to_string()]);
    }

    #[test]
    fn boundary_is_inclusive() {
        // 4 + 1 + 5 = 10 fits exactly.
        assert_eq!(chunk_text("abcd\nefghi", 10).len(), 1);
        assert_eq!(chunk_text("abcd\nefghij", 10).len(), 2);
    }

    #[test]
    fn counts_characters_not_bytes() {
        // Each 'é' is two bytes; five of them plus a newline plus four more
        // is 10 characters.
        let text = "ééééé\néééé";
        assert_eq!(chunk_text(text, 10).len(), 1);
    }

    #[test]
    fn rejoined_chunks_reproduce_paragraphs() {
        let text = "Step 1: open valve\n   \nStep 2: check pressure\r\n\
                    Step 3: record reading in the QC log\n\nStep 4: close valve";
        for max in [1, 10, 25, 40, 800] {
            let chunks = chunk_text(text, max);
            assert_eq!(chunks.join("\n"), paragraphs(text), "max_chars={max}");
            assert!(chunks.iter().all(|c| !c.is_empty()));
        }
    }

    #[test]
    fn chunking_is_deterministic() {
        let text = "alpha\nbeta\ngamma\ndelta\n".repeat(50);
        assert_eq!(chunk_text(&text, 64), chunk_text(&text, 64));
    }
}
