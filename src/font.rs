/// One of the PDF standard fonts used by the report.
///
/// Standard fonts are never embedded, so only their advance widths are needed
/// for layout. Widths are in thousandths of an em, as in the Adobe AFM files.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FontFace {
    #[default]
    Regular,
    Bold,
}

// Printable ASCII, starting at U+0020.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // '0'..'?'
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // '@'..'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 'P'..'_'
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // '`'..'o'
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 'p'..'~'
];

const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611, // '0'..'?'
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778, // '@'..'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556, // 'P'..'_'
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611, // '`'..'o'
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584, // 'p'..'~'
];

/// Byte written for characters WinAnsiEncoding cannot represent.
pub const REPLACEMENT: u8 = b'?';

impl FontFace {
    pub fn ps_name(self) -> &'static str {
        match self {
            FontFace::Regular => "Helvetica",
            FontFace::Bold => "Helvetica-Bold",
        }
    }

    /// Resource name used inside page content streams.
    pub fn resource_name(self) -> &'static str {
        match self {
            FontFace::Regular => "F1",
            FontFace::Bold => "F2",
        }
    }

    pub fn all() -> [FontFace; 2] {
        [FontFace::Regular, FontFace::Bold]
    }

    /// Advance width of an encoded byte in thousandths of an em.
    fn code_width(self, code: u8) -> u16 {
        let table = match self {
            FontFace::Regular => &HELVETICA_WIDTHS,
            FontFace::Bold => &HELVETICA_BOLD_WIDTHS,
        };
        match code {
            0x20..=0x7E => table[(code - 0x20) as usize],
            // Latin-1 supplement and the 0x80 block use the lowercase average.
            _ => match self {
                FontFace::Regular => 556,
                FontFace::Bold => 611,
            },
        }
    }

    pub fn char_width(self, c: char, font_size: f32) -> f32 {
        self.code_width(encode_char(c)) as f32 * font_size / 1000.0
    }

    pub fn text_width(self, text: &str, font_size: f32) -> f32 {
        text.chars().map(|c| self.char_width(c, font_size)).sum()
    }
}

/// Maps a character to its WinAnsiEncoding byte.
pub fn encode_char(c: char) -> u8 {
    match c {
        ' '..='~' => c as u8,
        '\t' => b' ',
        '\u{A0}'..='\u{FF}' => c as u32 as u8,
        '€' => 0x80,
        '‚' => 0x82,
        '„' => 0x84,
        '…' => 0x85,
        '•' => 0x95,
        '–' => 0x96,
        '—' => 0x97,
        '‘' => 0x91,
        '’' => 0x92,
        '“' => 0x93,
        '”' => 0x94,
        '™' => 0x99,
        _ => REPLACEMENT,
    }
}

pub fn encode_str(text: &str) -> Vec<u8> {
    text.chars().map(encode_char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_widths() {
        assert_eq!(FontFace::Regular.text_width("a", 1000.0), 556.0);
        assert_eq!(FontFace::Regular.text_width("i", 1000.0), 222.0);
        assert_eq!(FontFace::Bold.text_width("i", 1000.0), 278.0);
        assert_eq!(FontFace::Regular.text_width("W", 10.0), 9.44);
    }

    #[test]
    fn test_encoding() {
        assert_eq!(encode_str("Año €"), vec![b'A', 0xF1, b'o', b' ', 0x80]);
        assert_eq!(encode_str("日本"), vec![REPLACEMENT, REPLACEMENT]);
    }
}
