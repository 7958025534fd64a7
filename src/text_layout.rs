use crate::font::FontFace;

#[derive(Debug, Clone)]
struct Chunk<'a> {
    text: &'a str,
    width: f32,
    is_whitespace: bool,
}

/// Breaks a single paragraph into lines that fit within `target_width`.
///
/// Lines break at whitespace where possible. A word wider than the whole line
/// is split between characters. Whitespace at a line break is dropped, and an
/// empty or all-whitespace paragraph yields no lines.
pub fn wrap_text(face: FontFace, font_size: f32, text: &str, target_width: f32) -> Vec<String> {
    let chunks = chunk_text(face, font_size, text);

    let mut lines = Vec::new();
    let mut current = String::new();
    let mut x = 0.0;
    // Whitespace seen since the last word; only committed if another word fits.
    let mut pending_space: Vec<&Chunk> = Vec::new();

    for chunk in &chunks {
        if chunk.is_whitespace {
            if !current.is_empty() {
                pending_space.push(chunk);
            }
            continue;
        }

        let space_width = pending_space.iter().map(|c| c.width).sum::<f32>();
        if !current.is_empty() && x + space_width + chunk.width > target_width {
            lines.push(std::mem::take(&mut current));
            x = 0.0;
            pending_space.clear();
        } else {
            for space in pending_space.drain(..) {
                current.push_str(space.text);
                x += space.width;
            }
        }

        if chunk.width > target_width {
            x = split_long_word(face, font_size, chunk.text, target_width, &mut current, &mut lines);
        } else {
            current.push_str(chunk.text);
            x += chunk.width;
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }

    lines
}

/// Appends `word` character by character, flushing full lines. Returns the
/// width of the trailing partial line left in `current`.
fn split_long_word(
    face: FontFace,
    font_size: f32,
    word: &str,
    target_width: f32,
    current: &mut String,
    lines: &mut Vec<String>,
) -> f32 {
    let mut x = face.text_width(current, font_size);
    for c in word.chars() {
        let width = face.char_width(c, font_size);
        if !current.is_empty() && x + width > target_width {
            lines.push(std::mem::take(current));
            x = 0.0;
        }
        current.push(c);
        x += width;
    }
    x
}

fn chunk_text(face: FontFace, font_size: f32, text: &str) -> Vec<Chunk<'_>> {
    let mut chunks = Vec::new();
    let mut current_chunk_start = 0;
    let mut current_chunk_width = 0.0;
    for (i, c) in text.char_indices() {
        let width = face.char_width(c, font_size);

        if c.is_whitespace() {
            let next_i = i + c.len_utf8();

            if current_chunk_start < i {
                chunks.push(Chunk {
                    text: &text[current_chunk_start..i],
                    width: current_chunk_width,
                    is_whitespace: false,
                });
            }

            chunks.push(Chunk {
                text: &text[i..next_i],
                width,
                is_whitespace: true,
            });

            current_chunk_start = next_i;
            current_chunk_width = 0.0;
        } else {
            current_chunk_width += width;
        }
    }

    if current_chunk_start < text.len() {
        chunks.push(Chunk {
            text: &text[current_chunk_start..],
            width: current_chunk_width,
            is_whitespace: false,
        });
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIZE: f32 = 10.0;

    #[test]
    fn test_short_text_is_one_line() {
        let lines = wrap_text(FontFace::Regular, SIZE, "Hello, world!", 500.0);
        assert_eq!(lines, vec!["Hello, world!"]);
    }

    #[test]
    fn test_breaks_at_whitespace() {
        // "aaaa" is 22.24pt wide at 10pt; two words plus a space do not fit in 40pt.
        let lines = wrap_text(FontFace::Regular, SIZE, "aaaa aaaa aaaa", 40.0);
        assert_eq!(lines, vec!["aaaa", "aaaa", "aaaa"]);
    }

    #[test]
    fn test_every_line_fits() {
        let text = "The quick brown fox jumps over the lazy dog again and again until the page runs out";
        let width = 120.0;
        let lines = wrap_text(FontFace::Regular, SIZE, text, width);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(FontFace::Regular.text_width(line, SIZE) <= width, "{line:?}");
            assert_eq!(line.trim(), line);
        }
        assert_eq!(lines.join(" "), text);
    }

    #[test]
    fn test_long_word_is_split() {
        let word = "x".repeat(50);
        let lines = wrap_text(FontFace::Regular, SIZE, &word, 50.0);
        assert!(lines.len() > 1);
        assert_eq!(lines.concat(), word);
    }

    #[test]
    fn test_blank_text_has_no_lines() {
        assert!(wrap_text(FontFace::Regular, SIZE, "   ", 100.0).is_empty());
        assert!(wrap_text(FontFace::Regular, SIZE, "", 100.0).is_empty());
    }
}
