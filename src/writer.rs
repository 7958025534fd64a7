use glam::{vec2, Vec2};

use crate::{
    config::LayoutConfig,
    document::{Color, Document, ImageId, Op, Page, TextStyle},
    images::EmbeddedImage,
    text_layout::wrap_text,
};

/// Where the next block will be placed: 1-based page index and the vertical
/// offset from the top of that page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cursor {
    pub page: usize,
    pub y: f32,
}

/// An indivisible piece of content. A block is never split across pages.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    /// One line of text in the active style; `y` is its baseline.
    Line { text: String, height: f32 },
    Image { id: ImageId, size: Vec2, gap: f32 },
    /// A horizontal rule across the content width.
    Rule { color: Color, height: f32 },
}

impl Block {
    pub fn height(&self) -> f32 {
        match self {
            Block::Line { height, .. } | Block::Rule { height, .. } => *height,
            Block::Image { size, gap, .. } => size.y + gap,
        }
    }
}

/// Lays blocks out top to bottom, starting a new page whenever the next block
/// would cross the bottom margin.
///
/// One writer is built per document. Its cursor is exclusively owned, so
/// writes are strictly sequential.
#[derive(Debug)]
pub struct DocumentWriter {
    config: LayoutConfig,
    pages: Vec<Page>,
    images: Vec<EmbeddedImage>,
    cursor: Cursor,
    style: TextStyle,
}

impl DocumentWriter {
    pub fn new(config: LayoutConfig) -> Self {
        let style = TextStyle::default();
        Self {
            cursor: Cursor {
                page: 1,
                y: config.top_margin,
            },
            pages: vec![Page {
                ops: vec![Op::Style(style)],
            }],
            images: Vec::new(),
            config,
            style,
        }
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn style(&self) -> TextStyle {
        self.style
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    fn current_page(&mut self) -> &mut Page {
        // `pages` always holds at least the first page.
        let index = self.cursor.page - 1;
        &mut self.pages[index]
    }

    pub fn set_style(&mut self, style: TextStyle) {
        if style != self.style {
            self.style = style;
            self.current_page().ops.push(Op::Style(style));
        }
    }

    pub fn fits(&self, height: f32) -> bool {
        self.cursor.y + height <= self.config.content_bottom()
    }

    /// Breaks the page unless `height` still fits below the cursor. Returns
    /// whether a break happened.
    pub fn reserve(&mut self, height: f32) -> bool {
        // A block taller than the whole content area goes on a fresh page
        // as-is; breaking again would only add an empty page.
        if self.fits(height) || self.cursor.y <= self.config.top_margin {
            return false;
        }
        self.break_page();
        true
    }

    /// Starts a new page and carries the active style over to it.
    pub fn break_page(&mut self) {
        self.pages.push(Page {
            ops: vec![Op::Style(self.style)],
        });
        self.cursor = Cursor {
            page: self.pages.len(),
            y: self.config.top_margin,
        };
        tracing::debug!("Page break, now on page {}", self.cursor.page);
    }

    /// Moves the cursor down without writing anything.
    pub fn advance(&mut self, dy: f32) {
        self.cursor.y += dy;
    }

    /// Places `block` at the cursor, breaking the page first if it would not
    /// fit. Returns the position the block was placed at.
    pub fn write(&mut self, block: Block) -> Cursor {
        let height = block.height();
        self.reserve(height);

        let at = self.cursor;
        let origin = vec2(self.config.margin, at.y);
        let op = match block {
            Block::Line { text, .. } => Op::Text { origin, text },
            Block::Image { id, size, .. } => Op::Image { id, origin, size },
            Block::Rule { color, .. } => Op::Rule {
                from: origin,
                to: vec2(self.config.page_size.x - self.config.margin, at.y),
                color,
            },
        };
        self.current_page().ops.push(op);
        self.cursor.y += height;
        at
    }

    pub fn line(&mut self, text: impl Into<String>, height: f32) -> Cursor {
        self.write(Block::Line {
            text: text.into(),
            height,
        })
    }

    /// Wraps `text` to the content width in the active style and writes one
    /// block per line. Returns the number of lines written.
    pub fn paragraph(&mut self, text: &str) -> usize {
        let lines = wrap_text(
            self.style.face,
            self.style.font_size,
            text,
            self.config.content_width(),
        );
        let count = lines.len();
        for line in lines {
            self.line(line, self.config.line_height);
        }
        count
    }

    pub fn rule(&mut self, color: Color, height: f32) -> Cursor {
        self.write(Block::Rule { color, height })
    }

    fn add_image(&mut self, image: EmbeddedImage) -> ImageId {
        self.images.push(image);
        ImageId(self.images.len() - 1)
    }

    /// Writes `image` scaled to the content width. The display height is
    /// clamped to `max_height` without narrowing the width, so very tall
    /// images are squashed rather than cropped.
    pub fn image(&mut self, image: EmbeddedImage, max_height: f32, gap: f32) -> Cursor {
        let width = self.config.content_width();
        let height = (width * image.aspect_ratio()).min(max_height);
        let id = self.add_image(image);
        self.write(Block::Image {
            id,
            size: vec2(width, height),
            gap,
        })
    }

    /// Writes `image` across the content width at a fixed display height.
    pub fn image_with_height(&mut self, image: EmbeddedImage, height: f32, gap: f32) -> Cursor {
        let width = self.config.content_width();
        let id = self.add_image(image);
        self.write(Block::Image {
            id,
            size: vec2(width, height),
            gap,
        })
    }

    /// Stamps a footer on every page and hands over the finished document.
    ///
    /// `label` receives the 1-based page index and the total page count.
    pub fn finish(mut self, style: TextStyle, label: impl Fn(usize, usize) -> String) -> Document {
        let total = self.pages.len();
        let origin = self.config.page_size - self.config.footer_offset;
        for (i, page) in self.pages.iter_mut().enumerate() {
            page.ops.push(Op::Style(style));
            page.ops.push(Op::Text {
                origin,
                text: label(i + 1, total),
            });
        }

        tracing::debug!("Finished document with {} pages", total);
        Document {
            pages: self.pages,
            images: self.images,
            page_size: self.config.page_size,
        }
    }
}
