use crate::error::FormPressError;
use crate::raster;
use crate::record::{Attachment, AttachmentKind, AttachmentSlot};
use tiny_skia::{LineCap, LineJoin, Paint, PathBuilder, Pixmap, Stroke, Transform};

/// Accumulates signature strokes as plain point lists. Input-device
/// handling stays outside: the capture layer feeds points in surface
/// pixels, and nothing is rasterized until [`SignaturePad::to_attachment`].
#[derive(Debug, Clone)]
pub struct SignaturePad {
    width: u32,
    height: u32,
    strokes: Vec<Vec<(f32, f32)>>,
    current: Option<Vec<(f32, f32)>>,
}

impl SignaturePad {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            strokes: Vec::new(),
            current: None,
        }
    }

    pub fn begin_stroke(&mut self) {
        self.end_stroke();
        self.current = Some(Vec::new());
    }

    /// Appends a point to the stroke in progress; starts one if the caller
    /// skipped `begin_stroke`.
    pub fn add_point(&mut self, x: f32, y: f32) {
        self.current
            .get_or_insert_with(Vec::new)
            .push((x, y));
    }

    pub fn end_stroke(&mut self) {
        if let Some(stroke) = self.current.take() {
            if !stroke.is_empty() {
                self.strokes.push(stroke);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty() && self.current.as_ref().is_none_or(|s| s.is_empty())
    }

    pub fn stroke_count(&self) -> usize {
        self.strokes.len() + usize::from(self.current.as_ref().is_some_and(|s| !s.is_empty()))
    }

    fn all_strokes(&self) -> impl Iterator<Item = &Vec<(f32, f32)>> {
        self.strokes
            .iter()
            .chain(self.current.iter().filter(|s| !s.is_empty()))
    }

    /// Rasterizes the accumulated strokes onto a white surface: black
    /// round-capped polylines, single points drawn as dots.
    pub fn render_png(&self) -> Result<Vec<u8>, FormPressError> {
        if self.is_empty() {
            return Err(FormPressError::Attachment(
                "signature pad has no strokes".to_string(),
            ));
        }
        let mut pixmap = Pixmap::new(self.width, self.height).ok_or_else(|| {
            FormPressError::Attachment(format!(
                "invalid signature surface {}x{}",
                self.width, self.height
            ))
        })?;
        pixmap.fill(tiny_skia::Color::WHITE);

        let mut paint = Paint::default();
        paint.set_color_rgba8(0, 0, 0, 255);
        paint.anti_alias = true;
        let stroke = Stroke {
            width: 2.5,
            line_cap: LineCap::Round,
            line_join: LineJoin::Round,
            ..Stroke::default()
        };

        for points in self.all_strokes() {
            let path = match points.as_slice() {
                [] => continue,
                [(x, y)] => {
                    let mut pb = PathBuilder::new();
                    pb.push_circle(*x, *y, stroke.width / 2.0);
                    pb.finish()
                }
                [(x0, y0), rest @ ..] => {
                    let mut pb = PathBuilder::new();
                    pb.move_to(*x0, *y0);
                    for (x, y) in rest {
                        pb.line_to(*x, *y);
                    }
                    pb.finish()
                }
            };
            let Some(path) = path else { continue };
            if points.len() == 1 {
                pixmap.fill_path(
                    &path,
                    &paint,
                    tiny_skia::FillRule::Winding,
                    Transform::identity(),
                    None,
                );
            } else {
                pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
            }
        }

        // The surface is fully opaque, so the premultiplied buffer is the
        // straight RGBA buffer.
        let rgba = image::RgbaImage::from_raw(self.width, self.height, pixmap.data().to_vec())
            .ok_or_else(|| {
                FormPressError::Attachment("signature pixel buffer size mismatch".to_string())
            })?;
        let mut out = Vec::new();
        rgba.write_to(
            &mut std::io::Cursor::new(&mut out),
            image::ImageFormat::Png,
        )
        .map_err(|err| FormPressError::Attachment(format!("png encode failed: {}", err)))?;
        Ok(out)
    }

    /// Save-time conversion: rasterize, resample to the fixed signature
    /// resolution, and wrap as a signature-slot bitmap attachment.
    pub fn to_attachment(&self) -> Result<Attachment, FormPressError> {
        let png = self.render_png()?;
        let jpeg = raster::resample_jpeg(
            &png,
            raster::SIGNATURE_RESAMPLE_W,
            raster::SIGNATURE_RESAMPLE_H,
            raster::RESAMPLE_JPEG_QUALITY,
        )?;
        Ok(Attachment::new(
            AttachmentSlot::Signature,
            AttachmentKind::Bitmap,
            jpeg,
        ))
    }
}
