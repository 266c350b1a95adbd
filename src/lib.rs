mod canvas;
mod compose;
mod error;
mod layout;
mod merge;
mod metrics;
mod pdf;
mod raster;
mod record;
mod signature;
mod types;

pub use canvas::{Canvas, Command, OutputDocument, Page};
pub use compose::{FormPress, FormPressBuilder, suggested_file_name};
pub use error::FormPressError;
pub use layout::{LayoutOptions, SectionWriter, wrap_text};
pub use metrics::{Face, text_width};
pub use raster::{
    PageEmbed, RESAMPLE_JPEG_QUALITY, SIGNATURE_RESAMPLE_H, SIGNATURE_RESAMPLE_W, centered_rect,
    embed_as_page, fit_within, fit_within_box, image_dimensions, resample_jpeg,
};
pub use record::{
    Attachment, AttachmentKind, AttachmentSlot, IntakeRecord, PLACEHOLDER, field_or_placeholder,
};
pub use signature::SignaturePad;
pub use types::{Color, MM_PER_PT, MM_PER_PX, Mm, Rect, Size};
