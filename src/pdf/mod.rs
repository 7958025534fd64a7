use std::{fmt, io::Write};

use thiserror::Error;

use crate::{
    document::Document,
    font::FontFace,
    images::{ColorSpace, EmbeddedImage, ImageFilter},
};

use self::page::PageBuilder;

pub mod page;

const HEADER: &[u8] = b"%PDF-1.7\n";

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to write pdf: {0}")]
    Io(#[from] std::io::Error),
    #[error("document has no pages")]
    NoPages,
}

pub struct PDFBuilder {
    content: Vec<u8>,
    xref: Vec<XRefEntry>,
    pages_ref: Ref,
    page_refs: Vec<Ref>,
    root: Ref,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Ref(u32, u16);

#[derive(Debug)]
enum XRefEntry {
    Free { next_free: u32, generation: u16 },
    InUse { offset: u32, generation: u16 },
}

impl fmt::Display for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} R", self.0, self.1)
    }
}

impl Default for PDFBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializes a laid-out document.
pub fn write_document(document: &Document) -> Result<Vec<u8>, Error> {
    if document.pages.is_empty() {
        return Err(Error::NoPages);
    }

    let mut builder = PDFBuilder::new();
    for page in &document.pages {
        let content = PageBuilder::new(document.page_size).ops(&page.ops)?.build();
        builder.page(&content)?;
    }
    builder.catalog(&document.images, document.page_size.to_array())?;
    builder.build()
}

impl PDFBuilder {
    pub fn new() -> Self {
        let mut builder = Self {
            content: HEADER.to_owned(),
            xref: vec![XRefEntry::Free {
                // Will be filled in when XREF table is generated
                next_free: 0,
                generation: u16::MAX,
            }],
            pages_ref: Ref::default(),
            page_refs: Vec::new(),
            root: Ref::default(),
        };
        builder.pages_ref = builder.preallocate_object();
        builder
    }

    fn preallocate_object(&mut self) -> Ref {
        let id = self.xref.len() as u32;
        self.xref.push(XRefEntry::Free {
            next_free: 0,
            generation: u16::MAX,
        });
        Ref(id, 0)
    }

    fn start_object(&mut self) -> Result<Ref, Error> {
        let ref_ = self.preallocate_object();
        self.start_object_with_ref(ref_)?;
        Ok(ref_)
    }

    fn start_object_with_ref(&mut self, ref_: Ref) -> Result<(), Error> {
        let Ref(id, generation) = ref_;

        let offset = self.content.len() as u32;
        self.xref[id as usize] = XRefEntry::InUse { offset, generation };

        writeln!(self.content, "{id} {generation} obj")?;
        Ok(())
    }

    fn end_object(&mut self) -> Result<(), Error> {
        writeln!(self.content, "endobj")?;
        Ok(())
    }

    fn stream_object(&mut self, dict: &str, data: &[u8]) -> Result<Ref, Error> {
        let ref_ = self.start_object()?;
        writeln!(self.content, "<< {dict} /Length {} >>", data.len())?;
        writeln!(self.content, "stream")?;
        self.content.extend_from_slice(data);
        write!(self.content, "\nendstream\n")?;
        self.end_object()?;
        Ok(ref_)
    }

    fn font(&mut self, face: FontFace) -> Result<Ref, Error> {
        let font_ref = self.start_object()?;
        write!(
            self.content,
            "<< /Type /Font /Subtype /Type1 /BaseFont /{ps_name} /Encoding /WinAnsiEncoding >>",
            ps_name = face.ps_name(),
        )?;
        writeln!(self.content)?;
        self.end_object()?;
        Ok(font_ref)
    }

    fn image(&mut self, image: &EmbeddedImage) -> Result<Ref, Error> {
        let color_space = match image.color_space {
            ColorSpace::Gray => "/DeviceGray",
            ColorSpace::Rgb => "/DeviceRGB",
        };
        let filter = match image.filter {
            ImageFilter::Dct => "[/ASCII85Decode /DCTDecode]",
            ImageFilter::Flate => "[/ASCII85Decode /FlateDecode]",
        };
        let dict = format!(
            "/Type /XObject /Subtype /Image /Width {} /Height {} /ColorSpace {color_space} /BitsPerComponent 8 /Filter {filter}",
            image.width, image.height,
        );
        self.stream_object(&dict, armour(&image.data).as_bytes())
    }

    pub fn page(&mut self, content: &[u8]) -> Result<(), Error> {
        let contents = self.stream_object("", content)?;

        let page = self.start_object()?;
        writeln!(
            self.content,
            "<< /Type /Page /Parent {pages} /Contents {contents} >>",
            pages = self.pages_ref,
        )?;
        self.end_object()?;

        self.page_refs.push(page);
        Ok(())
    }

    pub fn catalog(&mut self, images: &[EmbeddedImage], page_size: [f32; 2]) -> Result<(), Error> {
        let font_refs = FontFace::all()
            .into_iter()
            .map(|face| Ok((face.resource_name(), self.font(face)?)))
            .collect::<Result<Vec<_>, Error>>()?;
        let image_refs = images
            .iter()
            .map(|image| self.image(image))
            .collect::<Result<Vec<_>, Error>>()?;

        self.start_object_with_ref(self.pages_ref)?;
        write!(self.content, "<< /Type /Pages /Kids [ ")?;
        for page_ref in &self.page_refs {
            write!(self.content, "{page_ref} ")?;
        }
        write!(
            self.content,
            "] /Count {page_count} ",
            page_count = self.page_refs.len(),
        )?;
        write!(self.content, "/Resources << /Font << ")?;
        for (name, font_ref) in font_refs {
            write!(self.content, "/{name} {font_ref} ")?;
        }
        write!(self.content, ">> /XObject << ")?;
        for (i, image_ref) in image_refs.iter().enumerate() {
            write!(self.content, "/{} {image_ref} ", page::image_name(i))?;
        }
        let [width, height] = page_size;
        writeln!(self.content, ">> >> /MediaBox [ 0 0 {width} {height} ] >>")?;
        self.end_object()?;

        let catalog = self.start_object()?;
        writeln!(
            self.content,
            "<< /Type /Catalog /Pages {pages} >>",
            pages = self.pages_ref,
        )?;
        self.end_object()?;

        self.root = catalog;
        Ok(())
    }

    pub fn build(self) -> Result<Vec<u8>, Error> {
        let Self {
            mut content,
            mut xref,
            root,
            ..
        } = self;

        let xref_size = xref.len() as u32;
        xref[0] = XRefEntry::Free {
            next_free: 0,
            generation: u16::MAX,
        };

        let start_xref = content.len();
        writeln!(content, "xref")?;
        writeln!(content, "0 {xref_size}")?;
        for entry in xref {
            let (n, g, c) = match entry {
                XRefEntry::Free {
                    next_free,
                    generation,
                } => (next_free, generation, 'f'),
                XRefEntry::InUse { offset, generation } => (offset, generation, 'n'),
            };
            write!(content, "{n:010} {g:05} {c}\r\n")?;
        }

        writeln!(content, "trailer")?;
        writeln!(content, "<< /Size {xref_size} /Root {root} >>")?;

        writeln!(content, "startxref")?;
        writeln!(content, "{start_xref}")?;
        writeln!(content, "%%EOF")?;

        Ok(content)
    }
}

/// ASCII85-encodes binary stream data, terminated with `~>` as the
/// `/ASCII85Decode` filter expects.
fn armour(data: &[u8]) -> String {
    let encoded = ascii85::encode(data);
    let body = encoded.strip_prefix("<~").unwrap_or(&encoded);
    if body.ends_with("~>") {
        body.to_string()
    } else {
        format!("{body}~>")
    }
}

#[cfg(test)]
mod tests {
    use glam::vec2;

    use super::*;
    use crate::document::{Op, Page, TextStyle};

    fn document(pages: usize, images: Vec<EmbeddedImage>) -> Document {
        Document {
            pages: (0..pages)
                .map(|i| Page {
                    ops: vec![
                        Op::Style(TextStyle::default()),
                        Op::Text {
                            origin: vec2(72.0, 72.0),
                            text: format!("page {i}"),
                        },
                    ],
                })
                .collect(),
            images,
            page_size: vec2(595.0, 842.0),
        }
    }

    fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
        haystack.windows(needle.len()).position(|w| w == needle)
    }

    #[test]
    fn test_structure() {
        let pdf = write_document(&document(2, Vec::new())).unwrap();

        assert!(pdf.starts_with(HEADER));
        assert!(pdf.ends_with(b"%%EOF\n"));
        assert!(find(&pdf, b"/Count 2").is_some());
        assert!(find(&pdf, b"/BaseFont /Helvetica-Bold").is_some());
        assert!(find(&pdf, b"(page 1) Tj").is_some());
    }

    #[test]
    fn test_xref_offsets_point_at_objects() {
        let pdf = write_document(&document(1, Vec::new())).unwrap();
        let text = String::from_utf8_lossy(&pdf);
        let xref = text.rfind("xref\n").unwrap();
        let entries = text[xref..]
            .lines()
            .skip(2)
            .take_while(|line| !line.starts_with("trailer"))
            .collect::<Vec<_>>();

        for (id, entry) in entries.iter().enumerate().skip(1) {
            let offset = entry[..10].parse::<usize>().unwrap();
            assert!(text[offset..].starts_with(&format!("{id} 0 obj")), "object {id}");
        }
    }

    #[test]
    fn test_images_are_armoured() {
        let image = EmbeddedImage::from_rgb(&image::RgbImage::new(2, 2)).unwrap();
        let pdf = write_document(&document(1, vec![image])).unwrap();

        assert!(find(&pdf, b"/Filter [/ASCII85Decode /FlateDecode]").is_some());
        assert!(find(&pdf, b"/XObject << /Im0 ").is_some());
        assert!(pdf.iter().all(|b| b.is_ascii()));
    }

    #[test]
    fn test_empty_document_is_rejected() {
        assert!(matches!(
            write_document(&document(0, Vec::new())),
            Err(Error::NoPages)
        ));
    }

    #[test]
    fn test_armour_terminator() {
        assert!(armour(b"hello").ends_with("~>"));
        assert!(!armour(b"hello").starts_with("<~"));
    }
}
