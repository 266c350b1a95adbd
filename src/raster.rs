use crate::error::FormPressError;
use crate::types::{Mm, Rect, Size};
use image::GenericImageView;

/// Pixel resolution signatures are resampled to before embedding, keeping
/// output byte size stable regardless of the capture surface.
pub const SIGNATURE_RESAMPLE_W: u32 = 300;
pub const SIGNATURE_RESAMPLE_H: u32 = 120;
/// JPEG quality for resampled embeds (the 0.9..0.95 band, expressed 0-100).
pub const RESAMPLE_JPEG_QUALITY: u8 = 92;

/// A bitmap scaled onto its own output page: the page may be larger than
/// the nominal canvas, the image is centered, never cropped or distorted.
#[derive(Debug, Clone)]
pub struct PageEmbed {
    pub page_size: Size,
    pub rect: Rect,
    pub data: Vec<u8>,
}

/// Natural pixel dimensions of an encoded bitmap. Decoding completes before
/// any scale math runs, so measurements never race the pixel data.
pub fn image_dimensions(data: &[u8]) -> Result<(u32, u32), FormPressError> {
    let decoded = image::load_from_memory(data)
        .map_err(|err| FormPressError::Attachment(format!("image decode failed: {}", err)))?;
    Ok(decoded.dimensions())
}

/// Uniform scale so `source` fits inside `bounds` without cropping. The
/// minimum of the two axis ratios is applied to both dimensions, which may
/// scale up as well as down.
pub fn fit_within(source: Size, bounds: Size) -> Size {
    let sw = source.width.to_f32();
    let sh = source.height.to_f32();
    if sw <= 0.0 || sh <= 0.0 {
        return Size::new(Mm::ZERO, Mm::ZERO);
    }
    let scale = (bounds.width.to_f32() / sw).min(bounds.height.to_f32() / sh);
    Size::new(
        Mm::from_f32(sw * scale),
        Mm::from_f32(sh * scale),
    )
}

/// Like [`fit_within`] but never enlarges: inline embeds (profile photo,
/// signature) shrink into their box and small sources keep natural size.
pub fn fit_within_box(source: Size, bounds: Size) -> Size {
    let sw = source.width.to_f32();
    let sh = source.height.to_f32();
    if sw <= 0.0 || sh <= 0.0 {
        return Size::new(Mm::ZERO, Mm::ZERO);
    }
    let scale = (bounds.width.to_f32() / sw)
        .min(bounds.height.to_f32() / sh)
        .min(1.0);
    Size::new(
        Mm::from_f32(sw * scale),
        Mm::from_f32(sh * scale),
    )
}

/// Placement of `inner` centered within `outer` at the given origin.
pub fn centered_rect(outer: Size, inner: Size) -> Rect {
    let dx = ((outer.width - inner.width) / 2).max(Mm::ZERO);
    let dy = ((outer.height - inner.height) / 2).max(Mm::ZERO);
    Rect {
        x: dx,
        y: dy,
        width: inner.width,
        height: inner.height,
    }
}

/// Scales an attachment bitmap onto its own page. The source is measured in
/// pixels, converted at the reference DPI, and fitted to the nominal page;
/// if the scaled footprint still exceeds the nominal page on either axis,
/// the page grows to the footprint instead of cropping.
pub fn embed_as_page(data: &[u8], nominal: Size) -> Result<PageEmbed, FormPressError> {
    let (width_px, height_px) = image_dimensions(data)?;
    let natural = Size::from_px(width_px as f32, height_px as f32);
    let scaled = fit_within(natural, nominal);
    let page_size = Size::new(
        scaled.width.max(nominal.width),
        scaled.height.max(nominal.height),
    );
    Ok(PageEmbed {
        page_size,
        rect: centered_rect(page_size, scaled),
        data: data.to_vec(),
    })
}

/// Redraws the source at a bounded pixel resolution and re-encodes as JPEG
/// to normalize byte size before the final embed. Preserves aspect ratio;
/// the ratio may enlarge small sources, matching the capture pipeline.
pub fn resample_jpeg(
    data: &[u8],
    max_width_px: u32,
    max_height_px: u32,
    quality: u8,
) -> Result<Vec<u8>, FormPressError> {
    if max_width_px == 0 || max_height_px == 0 {
        return Err(FormPressError::Attachment(
            "resample target must be non-zero".to_string(),
        ));
    }
    let decoded = image::load_from_memory(data)
        .map_err(|err| FormPressError::Attachment(format!("image decode failed: {}", err)))?;
    let (w, h) = decoded.dimensions();
    let ratio = (max_width_px as f32 / w as f32).min(max_height_px as f32 / h as f32);
    let target_w = ((w as f32 * ratio).round() as u32).max(1);
    let target_h = ((h as f32 * ratio).round() as u32).max(1);

    let resized = decoded.resize_exact(target_w, target_h, image::imageops::FilterType::Triangle);
    // JPEG has no alpha channel; composite onto white like a capture canvas.
    let rgba = resized.to_rgba8();
    let mut rgb = image::RgbImage::new(target_w, target_h);
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let blend = |c: u8| -> u8 {
            let a = a as u16;
            ((c as u16 * a + 255 * (255 - a)) / 255) as u8
        };
        rgb.put_pixel(x, y, image::Rgb([blend(r), blend(g), blend(b)]));
    }

    let mut out = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut out);
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, quality);
    rgb.write_with_encoder(encoder)
        .map_err(|err| FormPressError::Attachment(format!("jpeg encode failed: {}", err)))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let mut img = image::RgbaImage::new(width, height);
        for pixel in img.pixels_mut() {
            *pixel = image::Rgba([10, 40, 200, 255]);
        }
        let mut bytes = Vec::new();
        img.write_to(
            &mut std::io::Cursor::new(&mut bytes),
            image::ImageFormat::Png,
        )
        .unwrap();
        bytes
    }

    #[test]
    fn fit_within_preserves_aspect_ratio_and_bounds() {
        let source = Size::from_px(1600.0, 900.0);
        let bounds = Size::a4();
        let scaled = fit_within(source, bounds);
        assert!(scaled.width <= bounds.width);
        assert!(scaled.height <= bounds.height);
        let src_ratio = source.width.to_f32() / source.height.to_f32();
        let out_ratio = scaled.width.to_f32() / scaled.height.to_f32();
        assert!((src_ratio - out_ratio).abs() < 0.01);
    }

    #[test]
    fn fit_within_box_never_enlarges() {
        let source = Size::from_px(40.0, 20.0);
        let bounds = Size::new(Mm::from_i32(30), Mm::from_i32(30));
        let scaled = fit_within_box(source, bounds);
        assert_eq!(scaled.width, source.width);
        assert_eq!(scaled.height, source.height);
    }

    #[test]
    fn tall_image_fills_page_height_and_centers_horizontally() {
        let data = png_bytes(100, 400);
        let embed = embed_as_page(&data, Size::a4()).unwrap();
        assert_eq!(embed.page_size, Size::a4());
        assert!((embed.rect.height.to_f32() - 297.0).abs() < 0.5);
        assert!(embed.rect.x > Mm::ZERO);
        assert_eq!(embed.rect.y, Mm::ZERO);
    }

    #[test]
    fn embedded_dimensions_never_exceed_the_page() {
        let data = png_bytes(3000, 50);
        let embed = embed_as_page(&data, Size::a4()).unwrap();
        assert!(embed.rect.width <= embed.page_size.width);
        assert!(embed.rect.height <= embed.page_size.height);
    }

    #[test]
    fn corrupt_bytes_are_an_attachment_error() {
        let err = embed_as_page(b"not an image", Size::a4()).unwrap_err();
        assert!(matches!(err, FormPressError::Attachment(_)));
    }

    #[test]
    fn resample_bounds_output_resolution() {
        let data = png_bytes(900, 900);
        let jpeg = resample_jpeg(&data, SIGNATURE_RESAMPLE_W, SIGNATURE_RESAMPLE_H, RESAMPLE_JPEG_QUALITY)
            .unwrap();
        let (w, h) = image_dimensions(&jpeg).unwrap();
        assert!(w <= SIGNATURE_RESAMPLE_W);
        assert!(h <= SIGNATURE_RESAMPLE_H);
        // Square source constrained by the shorter axis.
        assert_eq!(h, SIGNATURE_RESAMPLE_H);
        assert_eq!(w, SIGNATURE_RESAMPLE_H);
    }

    #[test]
    fn resample_output_is_jpeg() {
        let data = png_bytes(300, 100);
        let jpeg = resample_jpeg(&data, 300, 120, 92).unwrap();
        assert_eq!(&jpeg[0..2], &[0xFF, 0xD8]);
    }
}
