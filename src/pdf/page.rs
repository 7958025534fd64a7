use std::io::Write;

use glam::Vec2;

use crate::{
    document::{Color, Op, TextStyle},
    font::encode_str,
};

use super::Error;

pub fn image_name(index: usize) -> String {
    format!("Im{index}")
}

/// Builds the content stream of one page.
///
/// Ops use top-left coordinates; the stream is written in PDF user space,
/// whose origin is the bottom-left corner.
pub struct PageBuilder {
    content: Vec<u8>,
    page_size: Vec2,
    style: TextStyle,
}

impl PageBuilder {
    pub fn new(page_size: Vec2) -> Self {
        Self {
            content: Vec::new(),
            page_size,
            style: TextStyle::default(),
        }
    }

    pub fn ops(mut self, ops: &[Op]) -> Result<Self, Error> {
        for op in ops {
            match op {
                Op::Style(style) => self.style = *style,
                Op::Text { origin, text } => self.text(*origin, text)?,
                Op::Image { id, origin, size } => self.image(id.0, *origin, *size)?,
                Op::Rule { from, to, color } => self.rule(*from, *to, *color)?,
            }
        }
        Ok(self)
    }

    fn flip(&self, y: f32) -> f32 {
        self.page_size.y - y
    }

    fn text(&mut self, origin: Vec2, text: &str) -> Result<(), Error> {
        let TextStyle {
            face,
            font_size,
            color: Color(r, g, b),
        } = self.style;
        let y = self.flip(origin.y);

        writeln!(self.content, "BT")?;
        writeln!(self.content, "/{} {} Tf", face.resource_name(), font_size)?;
        writeln!(self.content, "{} {} {} rg", unit(r), unit(g), unit(b))?;
        writeln!(self.content, "{} {} Td", origin.x, y)?;
        write!(self.content, "(")?;
        escape_into(&mut self.content, &encode_str(text));
        writeln!(self.content, ") Tj")?;
        writeln!(self.content, "ET")?;
        Ok(())
    }

    fn image(&mut self, index: usize, origin: Vec2, size: Vec2) -> Result<(), Error> {
        // Images are drawn from their bottom-left corner.
        let y = self.flip(origin.y + size.y);
        writeln!(self.content, "q")?;
        writeln!(self.content, "{} 0 0 {} {} {} cm", size.x, size.y, origin.x, y)?;
        writeln!(self.content, "/{} Do", image_name(index))?;
        writeln!(self.content, "Q")?;
        Ok(())
    }

    fn rule(&mut self, from: Vec2, to: Vec2, Color(r, g, b): Color) -> Result<(), Error> {
        writeln!(self.content, "{} {} {} RG", unit(r), unit(g), unit(b))?;
        writeln!(self.content, "0.5 w")?;
        writeln!(self.content, "{} {} m", from.x, self.flip(from.y))?;
        writeln!(self.content, "{} {} l", to.x, self.flip(to.y))?;
        writeln!(self.content, "S")?;
        Ok(())
    }

    pub fn build(self) -> Vec<u8> {
        self.content
    }
}

fn unit(channel: u8) -> f32 {
    channel as f32 / 255.0
}

/// Writes bytes as the body of a PDF literal string, keeping the output 7-bit.
fn escape_into(out: &mut Vec<u8>, bytes: &[u8]) {
    for &b in bytes {
        match b {
            b'(' | b')' | b'\\' => out.extend_from_slice(&[b'\\', b]),
            0x20..=0x7E => out.push(b),
            _ => out.extend_from_slice(format!("\\{b:03o}").as_bytes()),
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::vec2;

    use super::*;
    use crate::{document::ImageId, font::FontFace};

    fn build(ops: &[Op]) -> String {
        let content = PageBuilder::new(vec2(100.0, 200.0))
            .ops(ops)
            .unwrap()
            .build();
        String::from_utf8(content).unwrap()
    }

    #[test]
    fn test_text_uses_active_style_and_flips_y() {
        let content = build(&[
            Op::Style(TextStyle::new(FontFace::Bold, 18.0, Color(255, 0, 0))),
            Op::Text {
                origin: vec2(10.0, 50.0),
                text: "Hi".to_string(),
            },
        ]);
        assert!(content.contains("/F2 18 Tf\n1 0 0 rg\n10 150 Td\n(Hi) Tj"));
    }

    #[test]
    fn test_escaping() {
        let mut out = Vec::new();
        escape_into(&mut out, &encode_str("a(b)\\ é"));
        assert_eq!(out, b"a\\(b\\)\\\\ \\351");
    }

    #[test]
    fn test_image_placement() {
        let content = build(&[Op::Image {
            id: ImageId(3),
            origin: vec2(10.0, 20.0),
            size: vec2(80.0, 40.0),
        }]);
        assert!(content.contains("80 0 0 40 10 140 cm\n/Im3 Do"));
    }
}
