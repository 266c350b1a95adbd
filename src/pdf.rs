use crate::canvas::{Command, OutputDocument, Page};
use crate::error::FormPressError;
use crate::metrics::Face;
use crate::types::{Color, Mm};
use std::collections::HashMap;
use std::io::Write;

const PDF_CATALOG_ID: usize = 1;
const PDF_PAGES_ID: usize = 2;
const PDF_RESOURCES_ID: usize = 3;
const PDF_FONT_REGULAR_ID: usize = 4;
const PDF_FONT_BOLD_ID: usize = 5;

/// Serializes an [`OutputDocument`] into a complete PDF stream: header,
/// body objects written as pages arrive, then fonts, resources, page tree,
/// xref, and trailer. Every page carries its own `/MediaBox`, since
/// attachment pages may be sized to their source content.
pub(crate) struct PdfStreamWriter<'a, W: Write> {
    writer: &'a mut W,
    offset: usize,
    offsets: Vec<usize>, // index by object id; 0 is the free object.
    next_id: usize,

    image_resources: Vec<(String, usize)>,
    image_name_map: HashMap<String, String>,
    image_content_map: HashMap<u64, String>,
    next_image_index: usize,

    // Page object ids in page order.
    page_ids: Vec<usize>,
}

impl<'a, W: Write> PdfStreamWriter<'a, W> {
    pub(crate) fn new(writer: &'a mut W) -> Result<Self, FormPressError> {
        let mut offset = 0;
        write_bytes(writer, b"%PDF-1.7\n", &mut offset)?;
        write_bytes(writer, b"%\xE2\xE3\xCF\xD3\n", &mut offset)?;
        Ok(Self {
            writer,
            offset,
            offsets: vec![0; PDF_FONT_BOLD_ID + 1],
            next_id: PDF_FONT_BOLD_ID + 1,
            image_resources: Vec::new(),
            image_name_map: HashMap::new(),
            image_content_map: HashMap::new(),
            next_image_index: 1,
            page_ids: Vec::new(),
        })
    }

    pub(crate) fn add_document(&mut self, document: &OutputDocument) -> Result<(), FormPressError> {
        for page in &document.pages {
            self.add_page(page, &document.images)?;
        }
        Ok(())
    }

    fn add_page(
        &mut self,
        page: &Page,
        images: &HashMap<String, Vec<u8>>,
    ) -> Result<(), FormPressError> {
        let content = self.render_page(page, images)?;
        let content_id = self.alloc_id();
        let page_id = self.alloc_id();
        self.write_object(content_id, &stream_object(&content))?;
        let page_obj = format!(
            "<< /Type /Page /Parent {} 0 R /MediaBox [0 0 {} {}] /Resources {} 0 R /Contents {} 0 R >>",
            PDF_PAGES_ID,
            fmt_pt(page.size.width),
            fmt_pt(page.size.height),
            PDF_RESOURCES_ID,
            content_id
        );
        self.write_object(page_id, &page_obj)?;
        self.page_ids.push(page_id);
        Ok(())
    }

    fn render_page(
        &mut self,
        page: &Page,
        images: &HashMap<String, Vec<u8>>,
    ) -> Result<String, FormPressError> {
        let page_height = page.size.height;
        let mut out = String::new();
        let mut face = Face::Helvetica;
        let mut font_size = 10.0f32;

        for command in &page.commands {
            match command {
                Command::SetFillColor(color) => {
                    out.push_str(&color_ops(*color));
                }
                Command::SetFont(new_face) => face = *new_face,
                Command::SetFontSize(size) => font_size = *size,
                Command::SetLineWidth(width) => {
                    out.push_str(&format!("{} w\n", fmt_pt(*width)));
                }
                Command::DrawLine { x1, y1, x2, y2 } => {
                    out.push_str(&format!(
                        "{} {} m\n{} {} l\nS\n",
                        fmt_pt(*x1),
                        fmt_pt(page_height - *y1),
                        fmt_pt(*x2),
                        fmt_pt(page_height - *y2)
                    ));
                }
                Command::FillRect {
                    x,
                    y,
                    width,
                    height,
                } => {
                    let draw_y = page_height - *y - *height;
                    out.push_str(&format!(
                        "{} {} {} {} re\nf\n",
                        fmt_pt(*x),
                        fmt_pt(draw_y),
                        fmt_pt(*width),
                        fmt_pt(*height)
                    ));
                }
                Command::DrawString { x, y, text } => {
                    out.push_str("BT\n");
                    out.push_str(&format!("/{} {} Tf\n", face.resource(), fmt_f32(font_size)));
                    out.push_str(&format!(
                        "{} {} Td\n",
                        fmt_pt(*x),
                        fmt_pt(page_height - *y)
                    ));
                    out.push_str(&format!("({}) Tj\n", encode_winansi(text)));
                    out.push_str("ET\n");
                }
                Command::DrawImage {
                    x,
                    y,
                    width,
                    height,
                    resource_id,
                } => {
                    let Some(name) = self.ensure_image(resource_id, images)? else {
                        log::warn!("skipping unresolved image resource {resource_id}");
                        continue;
                    };
                    let draw_y = page_height - *y - *height;
                    out.push_str("q\n");
                    out.push_str(&format!(
                        "{} 0 0 {} {} {} cm\n",
                        fmt_pt(*width),
                        fmt_pt(*height),
                        fmt_pt(*x),
                        fmt_pt(draw_y)
                    ));
                    out.push_str(&format!("/{} Do\n", name));
                    out.push_str("Q\n");
                }
            }
        }
        Ok(out)
    }

    /// Embeds the referenced raster once; identical bytes reuse one XObject.
    fn ensure_image(
        &mut self,
        resource_id: &str,
        images: &HashMap<String, Vec<u8>>,
    ) -> Result<Option<String>, FormPressError> {
        if let Some(name) = self.image_name_map.get(resource_id) {
            return Ok(Some(name.clone()));
        }
        let Some(data) = images.get(resource_id) else {
            return Ok(None);
        };
        let content_key = hash_bytes(data);
        if let Some(name) = self.image_content_map.get(&content_key) {
            let name = name.clone();
            self.image_name_map
                .insert(resource_id.to_string(), name.clone());
            return Ok(Some(name));
        }

        let Some(payload) = decode_image_payload(data) else {
            log::warn!("image resource {resource_id} could not be decoded; dropped");
            return Ok(None);
        };

        let smask_id = match &payload.alpha {
            Some(alpha) => {
                let id = self.alloc_id();
                self.write_object(id, &image_smask_object(alpha))?;
                Some(id)
            }
            None => None,
        };
        let image_id = self.alloc_id();
        self.write_object(image_id, &image_object(&payload, smask_id))?;

        let name = format!("Im{}", self.next_image_index);
        self.next_image_index += 1;
        self.image_resources.push((name.clone(), image_id));
        self.image_name_map
            .insert(resource_id.to_string(), name.clone());
        self.image_content_map.insert(content_key, name.clone());
        Ok(Some(name))
    }

    pub(crate) fn finish(mut self) -> Result<usize, FormPressError> {
        let fonts = [
            (PDF_FONT_REGULAR_ID, Face::Helvetica),
            (PDF_FONT_BOLD_ID, Face::HelveticaBold),
        ];
        for (id, face) in fonts {
            self.write_object(
                id,
                &format!(
                    "<< /Type /Font /Subtype /Type1 /BaseFont /{} /Encoding /WinAnsiEncoding >>",
                    face.base_font()
                ),
            )?;
        }

        let mut resources = String::from("<< /Font <<");
        for (id, face) in fonts {
            resources.push_str(&format!(" /{} {} 0 R", face.resource(), id));
        }
        resources.push_str(" >>");
        if !self.image_resources.is_empty() {
            resources.push_str(" /XObject <<");
            for (name, id) in &self.image_resources {
                resources.push_str(&format!(" /{} {} 0 R", name, id));
            }
            resources.push_str(" >>");
        }
        resources.push_str(" >>");
        self.write_object(PDF_RESOURCES_ID, &resources)?;

        let kids: Vec<String> = self
            .page_ids
            .iter()
            .map(|page_id| format!("{} 0 R", page_id))
            .collect();
        let pages_obj = format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids.join(" "),
            self.page_ids.len()
        );
        self.write_object(PDF_PAGES_ID, &pages_obj)?;
        self.write_object(
            PDF_CATALOG_ID,
            &format!("<< /Type /Catalog /Pages {} 0 R >>", PDF_PAGES_ID),
        )?;

        // Cross-reference table and trailer.
        let xref_offset = self.offset;
        let count = self.offsets.len();
        let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", count);
        for offset in self.offsets.iter().skip(1) {
            xref.push_str(&format!("{:010} 00000 n \n", offset));
        }
        write_bytes(self.writer, xref.as_bytes(), &mut self.offset)?;
        let trailer = format!(
            "trailer\n<< /Size {} /Root {} 0 R >>\nstartxref\n{}\n%%EOF\n",
            count, PDF_CATALOG_ID, xref_offset
        );
        write_bytes(self.writer, trailer.as_bytes(), &mut self.offset)?;
        Ok(self.offset)
    }

    fn alloc_id(&mut self) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn write_object(&mut self, id: usize, body: &str) -> Result<(), FormPressError> {
        if self.offsets.len() <= id {
            self.offsets.resize(id + 1, 0);
        }
        self.offsets[id] = self.offset;
        let text = format!("{} 0 obj\n{}\nendobj\n", id, body);
        write_bytes(self.writer, text.as_bytes(), &mut self.offset)
    }
}

/// Serializes a composed document into PDF bytes.
pub(crate) fn document_to_pdf(document: &OutputDocument) -> Result<Vec<u8>, FormPressError> {
    let mut bytes = Vec::new();
    document_to_writer(document, &mut bytes)?;
    Ok(bytes)
}

pub(crate) fn document_to_writer<W: Write>(
    document: &OutputDocument,
    writer: &mut W,
) -> Result<usize, FormPressError> {
    let mut stream = PdfStreamWriter::new(writer)?;
    stream.add_document(document)?;
    stream.finish()
}

fn write_bytes<W: Write>(
    writer: &mut W,
    bytes: &[u8],
    offset: &mut usize,
) -> Result<(), FormPressError> {
    writer.write_all(bytes)?;
    *offset += bytes.len();
    Ok(())
}

fn stream_object(content: &str) -> String {
    format!(
        "<< /Length {} >>\nstream\n{}\nendstream",
        content.len(),
        content
    )
}

fn fmt_pt(value: Mm) -> String {
    fmt_f32(value.to_pt())
}

fn fmt_f32(value: f32) -> String {
    let rounded = (value * 100.0).round() / 100.0;
    if rounded == rounded.trunc() {
        format!("{}", rounded as i64)
    } else {
        let mut text = format!("{:.2}", rounded);
        while text.ends_with('0') {
            text.pop();
        }
        if text.ends_with('.') {
            text.pop();
        }
        text
    }
}

fn color_ops(color: Color) -> String {
    let r = color.r.clamp(0.0, 1.0);
    let g = color.g.clamp(0.0, 1.0);
    let b = color.b.clamp(0.0, 1.0);
    format!(
        "{} {} {} rg\n{} {} {} RG\n",
        fmt_f32(r),
        fmt_f32(g),
        fmt_f32(b),
        fmt_f32(r),
        fmt_f32(g),
        fmt_f32(b)
    )
}

/// WinAnsi string literal: ASCII passes through with delimiter escapes,
/// the Latin-1 block maps to octal escapes, anything else degrades to '?'.
fn encode_winansi(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '(' => out.push_str("\\("),
            ')' => out.push_str("\\)"),
            '\n' | '\r' | '\t' => out.push(' '),
            c if (' '..='~').contains(&c) => out.push(c),
            c => {
                let code = c as u32;
                if (0xA0..=0xFF).contains(&code) {
                    out.push_str(&format!("\\{:03o}", code));
                } else {
                    out.push('?');
                }
            }
        }
    }
    out
}

struct ImagePayload {
    width: u32,
    height: u32,
    color_space: &'static str,
    filter: &'static str,
    data: Vec<u8>,
    alpha: Option<AlphaPayload>,
}

struct AlphaPayload {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

fn decode_image_payload(data: &[u8]) -> Option<ImagePayload> {
    use image::GenericImageView;

    let format = image::guess_format(data).ok();
    let decoded = image::load_from_memory(data).ok()?;
    let (width, height) = decoded.dimensions();

    if matches!(format, Some(image::ImageFormat::Jpeg)) {
        // JPEG passes through untouched under DCTDecode.
        let color_space = match decoded.color() {
            image::ColorType::L8 | image::ColorType::La8 => "/DeviceGray",
            _ => "/DeviceRGB",
        };
        return Some(ImagePayload {
            width,
            height,
            color_space,
            filter: "/DCTDecode",
            data: data.to_vec(),
            alpha: None,
        });
    }

    let rgba = decoded.to_rgba8();
    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    let mut alpha = Vec::with_capacity((width * height) as usize);
    let mut has_alpha = false;
    for pixel in rgba.pixels() {
        let [r, g, b, a] = pixel.0;
        if a != 255 {
            has_alpha = true;
        }
        rgb.extend_from_slice(&[r, g, b]);
        alpha.push(a);
    }

    let alpha = if has_alpha {
        Some(AlphaPayload {
            width,
            height,
            data: flate_compress(&alpha),
        })
    } else {
        None
    };
    Some(ImagePayload {
        width,
        height,
        color_space: "/DeviceRGB",
        filter: "/FlateDecode",
        data: flate_compress(&rgb),
        alpha,
    })
}

fn flate_compress(data: &[u8]) -> Vec<u8> {
    use flate2::Compression;
    use flate2::write::ZlibEncoder;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    let _ = encoder.write_all(data);
    encoder.finish().unwrap_or_default()
}

fn hash_bytes(data: &[u8]) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    data.hash(&mut hasher);
    hasher.finish()
}

fn image_object(image: &ImagePayload, smask_id: Option<usize>) -> String {
    let stream_data = encode_stream_data(&image.data);
    let filters = match image.filter {
        "/DCTDecode" => "[/ASCIIHexDecode /DCTDecode]",
        _ => "[/ASCIIHexDecode /FlateDecode]",
    };
    let smask = smask_id
        .map(|id| format!(" /SMask {} 0 R", id))
        .unwrap_or_default();
    format!(
        "<< /Type /XObject /Subtype /Image /Width {} /Height {} /ColorSpace {} /BitsPerComponent 8 /Length {} /Filter {}{} >>\nstream\n{}\nendstream",
        image.width,
        image.height,
        image.color_space,
        stream_data.len(),
        filters,
        smask,
        stream_data
    )
}

fn image_smask_object(alpha: &AlphaPayload) -> String {
    let stream_data = encode_stream_data(&alpha.data);
    format!(
        "<< /Type /XObject /Subtype /Image /Width {} /Height {} /ColorSpace /DeviceGray /BitsPerComponent 8 /Length {} /Filter [/ASCIIHexDecode /FlateDecode] >>\nstream\n{}\nendstream",
        alpha.width,
        alpha.height,
        stream_data.len(),
        stream_data
    )
}

fn encode_stream_data(data: &[u8]) -> String {
    let mut hex = String::with_capacity(data.len() * 2 + 1);
    for byte in data {
        hex.push_str(&format!("{:02X}", byte));
    }
    hex.push('>');
    hex
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Canvas;
    use crate::types::Size;

    fn count_token(haystack: &[u8], needle: &[u8]) -> usize {
        haystack
            .windows(needle.len())
            .filter(|window| *window == needle)
            .count()
    }

    fn jpeg_fixture() -> Vec<u8> {
        let mut img = image::RgbImage::new(4, 4);
        for pixel in img.pixels_mut() {
            *pixel = image::Rgb([200, 30, 30]);
        }
        let mut bytes = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut bytes);
        let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, 90);
        img.write_with_encoder(encoder).unwrap();
        bytes
    }

    #[test]
    fn minimal_document_has_header_xref_and_trailer() {
        let mut canvas = Canvas::new(Size::a4());
        canvas.draw_string(Mm::from_i32(10), Mm::from_i32(20), "Hello");
        let bytes = document_to_pdf(&canvas.finish()).unwrap();
        assert!(bytes.starts_with(b"%PDF-1.7"));
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("xref"));
        assert!(text.contains("trailer"));
        assert!(text.ends_with("%%EOF\n"));
        assert!(text.contains("(Hello) Tj"));
    }

    #[test]
    fn each_page_carries_its_own_media_box() {
        let mut canvas = Canvas::new(Size::a4());
        canvas.draw_string(Mm::from_i32(10), Mm::from_i32(20), "data");
        canvas.new_page(Size::new(Mm::from_i32(300), Mm::from_i32(150)));
        canvas.draw_string(Mm::from_i32(10), Mm::from_i32(20), "attachment");
        let bytes = document_to_pdf(&canvas.finish()).unwrap();
        let text = String::from_utf8_lossy(&bytes);
        // 210x297 mm and 300x150 mm in points.
        assert!(text.contains("/MediaBox [0 0 595.28 841.89]"));
        assert!(text.contains("/MediaBox [0 0 850.39 425.2]"));
        assert!(text.contains("/Count 2"));
    }

    #[test]
    fn identical_image_bytes_embed_once() {
        let jpeg = jpeg_fixture();
        let mut canvas = Canvas::new(Size::a4());
        let first = canvas.register_image(jpeg.clone());
        let second = canvas.register_image(jpeg);
        let box_mm = Mm::from_i32(30);
        canvas.draw_image(Mm::from_i32(10), Mm::from_i32(10), box_mm, box_mm, &first);
        canvas.draw_image(Mm::from_i32(60), Mm::from_i32(10), box_mm, box_mm, &second);
        let bytes = document_to_pdf(&canvas.finish()).unwrap();
        assert_eq!(count_token(&bytes, b"/Subtype /Image"), 1);
        assert_eq!(count_token(&bytes, b"/Im1 Do"), 2);
    }

    #[test]
    fn jpeg_sources_pass_through_as_dctdecode() {
        let jpeg = jpeg_fixture();
        let mut canvas = Canvas::new(Size::a4());
        let id = canvas.register_image(jpeg);
        canvas.draw_image(
            Mm::from_i32(10),
            Mm::from_i32(10),
            Mm::from_i32(40),
            Mm::from_i32(40),
            &id,
        );
        let bytes = document_to_pdf(&canvas.finish()).unwrap();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("/DCTDecode"));
    }

    #[test]
    fn missing_image_resource_is_skipped_not_fatal() {
        let mut canvas = Canvas::new(Size::a4());
        canvas.draw_image(
            Mm::from_i32(10),
            Mm::from_i32(10),
            Mm::from_i32(40),
            Mm::from_i32(40),
            "never-registered",
        );
        let bytes = document_to_pdf(&canvas.finish()).unwrap();
        assert_eq!(count_token(&bytes, b" Do\n"), 0);
    }

    #[test]
    fn winansi_escaping_handles_delimiters_and_latin1() {
        assert_eq!(encode_winansi("a(b)c"), "a\\(b\\)c");
        assert_eq!(encode_winansi("back\\slash"), "back\\\\slash");
        assert_eq!(encode_winansi("caf\u{E9}"), "caf\\351");
        assert_eq!(encode_winansi("\u{20B9}100"), "?100");
    }

    #[test]
    fn numbers_render_without_trailing_zeros() {
        assert_eq!(fmt_f32(12.0), "12");
        assert_eq!(fmt_f32(12.5), "12.5");
        assert_eq!(fmt_f32(12.345), "12.35"); // rounded to 2 decimals
    }
}
