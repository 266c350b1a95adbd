//! End-to-end receipt composition: letterhead, data sections, signature
//! block, terms page, attachment pages, then PDF serialization and merge of
//! vendored PDF attachments. Attachment failures are recoverable here: they
//! are logged and the receipt renders without the offending embed.

use crate::canvas::{Canvas, OutputDocument};
use crate::error::FormPressError;
use crate::layout::{LayoutOptions, SectionWriter};
use crate::merge;
use crate::metrics::Face;
use crate::pdf;
use crate::raster;
use crate::record::{Attachment, AttachmentKind, AttachmentSlot, IntakeRecord};
use crate::types::{Color, Mm, Rect, Size};
use std::path::Path;

const DEFAULT_NOTE: &str = "Note: Provision of the service is subject to technical \
feasibility at the installation address. Payment of registration charges does not by \
itself entitle the applicant to a connection. Charges once paid are not refundable \
except where the service cannot be provisioned. All prices are exclusive of \
applicable taxes.";

const DEFAULT_TERMS: &str = "\
1. The subscriber shall use the service for lawful purposes only and shall remain \
responsible for all traffic originating from the subscribed connection.\n\
2. The tariff plan selected above is subject to the operator's published terms and \
may be revised with thirty days notice.\n\
3. Equipment provided on a rental basis remains the property of the operator and \
must be returned in working condition on termination of the service.\n\
4. Invoices are payable within fifteen days of the invoice date. Delayed payment \
may attract suspension of the service and late payment charges.\n\
5. The operator is not liable for interruptions attributable to power failure, \
cable cuts, force majeure, or scheduled maintenance notified in advance.\n\
6. Either party may terminate the service with thirty days written notice. Charges \
accrued up to the effective date of termination remain payable.\n\
7. All disputes are subject to the jurisdiction of the courts at the city of the \
registered office of the operator.";

/// Composes intake receipts. Configure once with [`FormPressBuilder`], then
/// compose any number of records.
pub struct FormPress {
    letterhead_name: String,
    letterhead_lines: Vec<String>,
    reference_label: String,
    reference_value: String,
    reference_color: Color,
    note_text: String,
    terms_title: String,
    terms_text: String,
    footer_text: String,
    layout: LayoutOptions,
}

pub struct FormPressBuilder {
    letterhead_name: String,
    letterhead_lines: Vec<String>,
    reference_label: String,
    reference_value: String,
    reference_color: Color,
    background: Option<Color>,
    note_text: String,
    terms_title: String,
    terms_text: String,
    footer_text: String,
}

impl Default for FormPressBuilder {
    fn default() -> Self {
        Self {
            letterhead_name: "Broadband Services".to_string(),
            letterhead_lines: Vec::new(),
            reference_label: "CAF No:".to_string(),
            reference_value: "NET::ERR".to_string(),
            reference_color: Color::rgb(1.0, 0.0, 0.0),
            background: Some(Color::rgb8(204, 255, 204)),
            note_text: DEFAULT_NOTE.to_string(),
            terms_title: "TERMS & CONDITIONS".to_string(),
            terms_text: DEFAULT_TERMS.to_string(),
            footer_text: "THANK YOU".to_string(),
        }
    }
}

impl FormPressBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Organization name rendered bold at the top of the first page.
    pub fn letterhead_name(mut self, name: impl Into<String>) -> Self {
        self.letterhead_name = name.into();
        self
    }

    /// Address and contact lines rendered under the organization name.
    pub fn letterhead_line(mut self, line: impl Into<String>) -> Self {
        self.letterhead_lines.push(line.into());
        self
    }

    /// Reference tag rendered top right in the reference color. The default
    /// value is the placeholder shown until a form number is assigned.
    pub fn reference(mut self, label: impl Into<String>, value: impl Into<String>) -> Self {
        self.reference_label = label.into();
        self.reference_value = value.into();
        self
    }

    pub fn reference_color(mut self, color: Color) -> Self {
        self.reference_color = color;
        self
    }

    /// Page background for the data and terms pages. `None` leaves the
    /// paper white.
    pub fn background(mut self, color: Option<Color>) -> Self {
        self.background = color;
        self
    }

    pub fn note_text(mut self, text: impl Into<String>) -> Self {
        self.note_text = text.into();
        self
    }

    pub fn terms(mut self, title: impl Into<String>, text: impl Into<String>) -> Self {
        self.terms_title = title.into();
        self.terms_text = text.into();
        self
    }

    pub fn footer_text(mut self, text: impl Into<String>) -> Self {
        self.footer_text = text.into();
        self
    }

    pub fn build(self) -> FormPress {
        let mut layout = LayoutOptions::a4_receipt();
        layout.background = self.background;
        FormPress {
            letterhead_name: self.letterhead_name,
            letterhead_lines: self.letterhead_lines,
            reference_label: self.reference_label,
            reference_value: self.reference_value,
            reference_color: self.reference_color,
            note_text: self.note_text,
            terms_title: self.terms_title,
            terms_text: self.terms_text,
            footer_text: self.footer_text,
            layout,
        }
    }
}

impl Default for FormPress {
    fn default() -> Self {
        FormPressBuilder::default().build()
    }
}

impl FormPress {
    pub fn builder() -> FormPressBuilder {
        FormPressBuilder::default()
    }

    /// Composes the command-level document: data pages and the terms page,
    /// with inline profile/signature embeds. Document-slot attachments are
    /// appended later, at the byte level, by
    /// [`FormPress::compose_to_buffer`], so their slot order survives
    /// mixed bitmap/PDF kinds.
    pub fn compose_to_document(
        &self,
        record: &IntakeRecord,
        attachments: &[Attachment],
    ) -> Result<OutputDocument, FormPressError> {
        let mut canvas = Canvas::new(self.layout.page_size);
        let mut writer = SectionWriter::new(&mut canvas, self.layout.clone())?;
        writer.paint_background();

        self.write_letterhead(&mut writer);
        let mut y = Mm::from_i32(42);

        y = self.write_identity_section(&mut writer, record, y, attachments)?;
        writer.divider(y);
        y += Mm::from_i32(6);

        y = self.write_plan_section(&mut writer, record, y);
        writer.divider(y);
        y += Mm::from_i32(6);

        y = self.write_payment_section(&mut writer, record, y);
        writer.divider(y);
        y += Mm::from_i32(6);

        let threshold = self.layout.break_threshold;
        y = writer.maybe_break_page(y, threshold);
        y = writer.write_paragraph(
            &self.note_text,
            y,
            self.layout.margin_left,
            Mm::from_i32(190),
            9.0,
            self.layout.wrap_line_height,
        )?;
        y += Mm::from_i32(4);

        y = writer.maybe_break_page(y, threshold);
        y = self.write_signature_block(&mut writer, record, y, attachments);

        y = writer.maybe_break_page(y, threshold);
        self.write_declaration(&mut writer, record, y)?;

        self.write_terms_page(&mut writer, attachments)?;

        Ok(canvas.finish())
    }

    /// Composes and serializes, then appends document-slot attachments in
    /// slot order: everything in `Document1` before everything in
    /// `Document2`, whatever mix of bitmap and PDF kinds. A failing
    /// attachment is logged and skipped; the receipt itself is never lost
    /// to a bad upload.
    pub fn compose_to_buffer(
        &self,
        record: &IntakeRecord,
        attachments: &[Attachment],
    ) -> Result<Vec<u8>, FormPressError> {
        let document = self.compose_to_document(record, attachments)?;
        let bytes = pdf::document_to_pdf(&document)?;

        let documents = document_attachments(attachments);
        if documents.is_empty() {
            return Ok(bytes);
        }

        let mut doc = merge::load_document(&bytes)?;
        for att in documents {
            let appended = match att.kind {
                AttachmentKind::Pdf => merge::append_pdf_pages(&mut doc, &att.data),
                AttachmentKind::Bitmap => self
                    .bitmap_attachment_page(&att.data)
                    .and_then(|page| merge::append_pdf_pages(&mut doc, &page)),
            };
            match appended {
                Ok(pages) => {
                    log::debug!("merged {pages} page(s) from slot {}", att.slot.as_str());
                }
                Err(err) => {
                    log::warn!("dropping attachment in slot {}: {err}", att.slot.as_str());
                }
            }
        }
        merge::save_document(doc)
    }

    /// A bitmap document attachment as a single-page PDF, sized by the
    /// embed so the merge path treats both attachment kinds alike.
    fn bitmap_attachment_page(&self, data: &[u8]) -> Result<Vec<u8>, FormPressError> {
        let embed = raster::embed_as_page(data, self.layout.page_size)?;
        let mut canvas = Canvas::new(embed.page_size);
        let id = canvas.register_image(embed.data);
        canvas.draw_image(
            embed.rect.x,
            embed.rect.y,
            embed.rect.width,
            embed.rect.height,
            &id,
        );
        pdf::document_to_pdf(&canvas.finish())
    }

    pub fn compose_to_file(
        &self,
        record: &IntakeRecord,
        attachments: &[Attachment],
        path: impl AsRef<Path>,
    ) -> Result<(), FormPressError> {
        let bytes = self.compose_to_buffer(record, attachments)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    fn write_letterhead(&self, writer: &mut SectionWriter<'_>) {
        writer.draw_centered(&self.letterhead_name, Mm::from_i32(15), Face::HelveticaBold, 16.0);
        let mut line_y = Mm::from_i32(21);
        for line in &self.letterhead_lines {
            writer.draw_centered(line, line_y, Face::Helvetica, 10.0);
            line_y += Mm::from_i32(5);
        }

        let tag = format!("{} {}", self.reference_label, self.reference_value);
        let right = self.layout.page_size.width - self.layout.margin_right;
        writer.canvas().set_fill_color(self.reference_color);
        writer.draw_right_aligned(&tag, Mm::from_i32(15), right, Face::HelveticaBold, 10.0);
        writer.canvas().set_fill_color(Color::BLACK);

        writer.divider(Mm::from_i32(35));
    }

    fn write_identity_section(
        &self,
        writer: &mut SectionWriter<'_>,
        record: &IntakeRecord,
        y: Mm,
        attachments: &[Attachment],
    ) -> Result<Mm, FormPressError> {
        let x_label = self.layout.margin_left;
        let x_value = Mm::from_f32(57.5);

        // Profile photo box at the top right of the first page.
        if let Some(att) = slot_attachment(attachments, AttachmentSlot::ProfilePhoto) {
            let photo_box = Rect {
                x: Mm::from_i32(170),
                y: Mm::from_i32(40),
                width: Mm::from_i32(30),
                height: Mm::from_i32(30),
            };
            self.try_inline_bitmap(writer, att, photo_box);
        }

        let mut y = writer.write_section("YOUR DETAILS", y);
        y = writer.write_field("Name", record.name.as_deref(), y, x_label, x_value);
        y = writer.write_field("Company Name", record.company.as_deref(), y, x_label, x_value);
        y = writer.write_wrapped(
            "Billing Address",
            record.billing_address.as_deref(),
            y,
            x_value,
            Mm::from_i32(155),
        )?;
        y = writer.write_wrapped(
            "Installation Address",
            record.installation_address.as_deref(),
            y,
            x_value,
            Mm::from_i32(155),
        )?;
        y = writer.write_field("City", record.city.as_deref(), y, x_label, x_value);
        y = writer.write_field_pair(
            "PIN",
            record.pin.as_deref(),
            Some(("State", record.state.as_deref(), Mm::from_i32(120), Mm::from_i32(150))),
            y,
            x_label,
            x_value,
        );
        y = writer.write_field_pair(
            "Gender",
            record.gender.as_deref(),
            Some((
                "Date of Birth",
                record.dob.as_deref(),
                Mm::from_i32(120),
                Mm::from_i32(150),
            )),
            y,
            x_label,
            x_value,
        );
        y = writer.write_field_pair(
            "Mobile",
            record.mobile.as_deref(),
            Some((
                "Telephone",
                record.telephone.as_deref(),
                Mm::from_i32(120),
                Mm::from_i32(150),
            )),
            y,
            x_label,
            x_value,
        );
        y = writer.write_field("Email", record.email.as_deref(), y, x_label, x_value);
        Ok(y)
    }

    fn write_plan_section(
        &self,
        writer: &mut SectionWriter<'_>,
        record: &IntakeRecord,
        y: Mm,
    ) -> Mm {
        let x_label = self.layout.margin_left;
        let x_value = Mm::from_f32(57.5);

        let mut y = writer.write_section("YOUR PLAN PREFERENCE", y);
        y = writer.write_field("Plan Name", record.plan_name.as_deref(), y, x_label, x_value);
        y = writer.write_field("Plan ID", record.plan_id.as_deref(), y, x_label, x_value);
        y = writer.write_field(
            "Installation Charges",
            record.installation_charges.as_deref(),
            y,
            x_label,
            x_value,
        );
        y = writer.write_field(
            "Renewal Charges",
            record.renewal_charges.as_deref(),
            y,
            x_label,
            x_value,
        );
        y = writer.write_field_pair(
            "Static IPs",
            record.static_ips.as_deref(),
            Some((
                "Other Charges",
                record.other_charges.as_deref(),
                Mm::from_i32(120),
                Mm::from_i32(168),
            )),
            y,
            x_label,
            x_value,
        );
        y
    }

    fn write_payment_section(
        &self,
        writer: &mut SectionWriter<'_>,
        record: &IntakeRecord,
        y: Mm,
    ) -> Mm {
        let x_label = self.layout.margin_left;
        let x_value = Mm::from_f32(57.5);

        let mut y = writer.write_section("PAYMENT DETAILS", y);
        y = writer.write_field(
            "Payment Mode",
            record.payment_mode.as_deref(),
            y,
            x_label,
            x_value,
        );
        y = writer.write_field("Amount", record.amount.as_deref(), y, x_label, x_value);
        y = writer.write_field_pair(
            "Bank",
            record.bank.as_deref(),
            Some(("Branch", record.branch.as_deref(), Mm::from_i32(120), Mm::from_i32(140))),
            y,
            x_label,
            x_value,
        );
        y = writer.write_field_pair(
            "Cheque No",
            record.cheque_no.as_deref(),
            Some(("Dated", record.dated.as_deref(), Mm::from_i32(120), Mm::from_i32(140))),
            y,
            x_label,
            x_value,
        );
        y = writer.write_field("PAN", record.pan.as_deref(), y, x_label, x_value);
        y
    }

    fn write_signature_block(
        &self,
        writer: &mut SectionWriter<'_>,
        record: &IntakeRecord,
        y: Mm,
        attachments: &[Attachment],
    ) -> Mm {
        writer.canvas().set_font(Face::HelveticaBold);
        writer.canvas().set_font_size(10.0);
        writer
            .canvas()
            .draw_string(self.layout.margin_left, y, "Signature of Customer:");

        if let Some(att) = slot_attachment(attachments, AttachmentSlot::Signature) {
            let sig_box = Rect {
                x: Mm::from_i32(80),
                y: y - Mm::from_i32(5),
                width: Mm::from_i32(40),
                height: Mm::from_i32(20),
            };
            self.try_inline_bitmap(writer, att, sig_box);
        }

        writer.write_inline_field(
            "Place",
            record.place.as_deref(),
            y,
            Mm::from_i32(140),
            Mm::from_i32(154),
        );
        writer.write_inline_field(
            "Date",
            record.date.as_deref(),
            y + self.layout.row_height,
            Mm::from_i32(140),
            Mm::from_i32(154),
        );
        y + Mm::from_i32(22)
    }

    fn write_declaration(
        &self,
        writer: &mut SectionWriter<'_>,
        record: &IntakeRecord,
        y: Mm,
    ) -> Result<Mm, FormPressError> {
        let x_label = self.layout.margin_left;
        let x_value = Mm::from_i32(80);

        let mut y = writer.write_section("DECLARATION", y);
        y = writer.write_paragraph(
            "I/We hereby declare that the information furnished above is true to the \
             best of my/our knowledge and that the payment towards this application \
             has been made by the entity named below.",
            y,
            x_label,
            Mm::from_i32(190),
            9.0,
            self.layout.wrap_line_height,
        )?;
        y += Mm::from_i32(2);
        let fields = [
            (
                "Name of Entity Making Payment",
                record.entity_payment_name.as_deref(),
            ),
            ("Payment Details", record.entity_payment_details.as_deref()),
        ];
        for (label, value) in fields {
            let row = y;
            y = writer.write_field(label, value, y, x_label, x_value);
            // Writable rule beneath the value slot, filled in or not.
            writer.canvas().draw_line(
                x_value,
                row + Mm::from_i32(1),
                x_value + Mm::from_i32(60),
                row + Mm::from_i32(1),
            );
        }
        Ok(y)
    }

    fn write_terms_page(
        &self,
        writer: &mut SectionWriter<'_>,
        attachments: &[Attachment],
    ) -> Result<(), FormPressError> {
        let page = self.layout.page_size;
        writer.canvas().new_page(page);
        writer.paint_background();

        writer.draw_centered(&self.terms_title, Mm::from_i32(20), Face::HelveticaBold, 12.0);
        writer.write_paragraph(
            &self.terms_text,
            Mm::from_i32(28),
            self.layout.margin_left,
            Mm::from_i32(190),
            9.0,
            self.layout.wrap_line_height,
        )?;

        let sig_y = page.height - Mm::from_i32(60);
        writer.canvas().set_font(Face::HelveticaBold);
        writer.canvas().set_font_size(10.0);
        writer
            .canvas()
            .draw_string(self.layout.margin_left, sig_y, "CUSTOMER SIGNATURE:");
        if let Some(att) = slot_attachment(attachments, AttachmentSlot::Signature) {
            let sig_box = Rect {
                x: Mm::from_i32(80),
                y: sig_y - Mm::from_i32(15),
                width: Mm::from_i32(60),
                height: Mm::from_i32(20),
            };
            self.try_inline_bitmap(writer, att, sig_box);
        }

        writer.draw_centered(
            &self.footer_text,
            page.height - Mm::from_i32(20),
            Face::HelveticaBold,
            20.0,
        );
        Ok(())
    }

    /// Draws a bitmap attachment scaled down into a fixed box, centered.
    /// Decode failures and mismatched kinds downgrade to a logged skip.
    fn try_inline_bitmap(
        &self,
        writer: &mut SectionWriter<'_>,
        att: &Attachment,
        bounds: Rect,
    ) {
        if att.kind != AttachmentKind::Bitmap {
            log::warn!(
                "slot {} expects a bitmap, got {}; skipped",
                att.slot.as_str(),
                att.kind.as_str()
            );
            return;
        }
        let placed = raster::image_dimensions(&att.data).map(|(w, h)| {
            let natural = Size::from_px(w as f32, h as f32);
            let bounds_size = Size::new(bounds.width, bounds.height);
            let scaled = raster::fit_within_box(natural, bounds_size);
            let offset = raster::centered_rect(bounds_size, scaled);
            Rect {
                x: bounds.x + offset.x,
                y: bounds.y + offset.y,
                width: scaled.width,
                height: scaled.height,
            }
        });
        match placed {
            Ok(rect) => {
                let canvas = writer.canvas();
                let id = canvas.register_image(att.data.clone());
                canvas.draw_image(rect.x, rect.y, rect.width, rect.height, &id);
            }
            Err(err) => {
                log::warn!("dropping attachment in slot {}: {err}", att.slot.as_str());
            }
        }
    }
}

fn slot_attachment(attachments: &[Attachment], slot: AttachmentSlot) -> Option<&Attachment> {
    attachments.iter().find(|att| att.slot == slot)
}

/// Document-slot attachments in output order: the first slot's entries
/// before the second's, input order preserved within a slot.
fn document_attachments(attachments: &[Attachment]) -> Vec<&Attachment> {
    let mut out = Vec::new();
    for slot in [AttachmentSlot::Document1, AttachmentSlot::Document2] {
        out.extend(attachments.iter().filter(|att| att.slot == slot));
    }
    out
}

/// `<plan_id>.pdf` when the record carries a plan id, the generic name
/// otherwise.
pub fn suggested_file_name(record: &IntakeRecord) -> String {
    match record.plan_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => format!("{}.pdf", id),
        _ => "receipt.pdf".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Command;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let mut img = image::RgbaImage::new(width, height);
        for pixel in img.pixels_mut() {
            *pixel = image::Rgba([120, 120, 240, 255]);
        }
        let mut bytes = Vec::new();
        img.write_to(
            &mut std::io::Cursor::new(&mut bytes),
            image::ImageFormat::Png,
        )
        .unwrap();
        bytes
    }

    fn pdf_attachment_bytes() -> Vec<u8> {
        let mut canvas = Canvas::new(Size::a4());
        canvas.draw_string(Mm::from_i32(10), Mm::from_i32(20), "scanned document");
        pdf::document_to_pdf(&canvas.finish()).unwrap()
    }

    fn page_strings(page: &crate::canvas::Page) -> Vec<String> {
        page.commands
            .iter()
            .filter_map(|cmd| match cmd {
                Command::DrawString { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    fn placed_strings(page: &crate::canvas::Page) -> Vec<(f32, f32, String)> {
        page.commands
            .iter()
            .filter_map(|cmd| match cmd {
                Command::DrawString { x, y, text } => {
                    Some((x.to_f32(), y.to_f32(), text.clone()))
                }
                _ => None,
            })
            .collect()
    }

    fn page_width_pt(doc: &lopdf::Document, page_id: lopdf::ObjectId) -> f32 {
        let dict = doc
            .get_object(page_id)
            .and_then(lopdf::Object::as_dict)
            .unwrap();
        let media = dict
            .get(b"MediaBox")
            .and_then(lopdf::Object::as_array)
            .unwrap();
        match &media[2] {
            lopdf::Object::Integer(n) => *n as f32,
            lopdf::Object::Real(n) => *n,
            _ => 0.0,
        }
    }

    fn page_image_count(page: &crate::canvas::Page) -> usize {
        page.commands
            .iter()
            .filter(|cmd| matches!(cmd, Command::DrawImage { .. }))
            .count()
    }

    #[test]
    fn empty_record_renders_placeholders_without_error() {
        let doc = FormPress::default()
            .compose_to_document(&IntakeRecord::default(), &[])
            .unwrap();
        // Data page plus terms page.
        assert_eq!(doc.page_count(), 2);
        let strings = page_strings(&doc.pages[0]);
        assert!(strings.iter().any(|s| s == "N/A"));
        assert!(strings.iter().any(|s| s == "YOUR DETAILS"));
        assert!(strings.iter().any(|s| s == "PAYMENT DETAILS"));
        assert!(strings.iter().any(|s| s.starts_with("CAF No:")));
    }

    #[test]
    fn terms_page_carries_title_and_footer() {
        let press = FormPress::builder()
            .footer_text("THANK YOU FOR CHOOSING US")
            .build();
        let doc = press
            .compose_to_document(&IntakeRecord::default(), &[])
            .unwrap();
        let strings = page_strings(&doc.pages[1]);
        assert!(strings.iter().any(|s| s == "TERMS & CONDITIONS"));
        assert!(strings.iter().any(|s| s == "THANK YOU FOR CHOOSING US"));
    }

    #[test]
    fn populated_fields_replace_placeholders() {
        let record = IntakeRecord {
            name: Some("A. Customer".to_string()),
            plan_id: Some("PLAN-42".to_string()),
            ..IntakeRecord::default()
        };
        let doc = FormPress::default().compose_to_document(&record, &[]).unwrap();
        let strings = page_strings(&doc.pages[0]);
        assert!(strings.iter().any(|s| s == "A. Customer"));
        assert!(strings.iter().any(|s| s == "PLAN-42"));
    }

    #[test]
    fn bitmap_document_attachment_adds_one_page() {
        let att = Attachment::new(
            AttachmentSlot::Document1,
            AttachmentKind::Bitmap,
            png_bytes(400, 300),
        );
        let bytes = FormPress::default()
            .compose_to_buffer(&IntakeRecord::default(), &[att])
            .unwrap();
        let doc = lopdf::Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 3);
    }

    #[test]
    fn corrupt_bitmap_attachment_contributes_zero_pages() {
        let att = Attachment::new(
            AttachmentSlot::Document1,
            AttachmentKind::Bitmap,
            b"definitely not pixels".to_vec(),
        );
        let bytes = FormPress::default()
            .compose_to_buffer(&IntakeRecord::default(), &[att])
            .unwrap();
        let doc = lopdf::Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
    }

    #[test]
    fn mixed_kind_document_slots_keep_slot_order() {
        // Letter-sized PDF in slot 1, A4-paged bitmap in slot 2; the
        // merged output must carry the PDF page first.
        let mut canvas = Canvas::new(Size::from_pt(612.0, 792.0));
        canvas.draw_string(Mm::from_i32(10), Mm::from_i32(20), "scanned document");
        let letter_pdf = pdf::document_to_pdf(&canvas.finish()).unwrap();

        let attachments = vec![
            Attachment::new(AttachmentSlot::Document2, AttachmentKind::Bitmap, png_bytes(400, 300)),
            Attachment::new(AttachmentSlot::Document1, AttachmentKind::Pdf, letter_pdf),
        ];
        let bytes = FormPress::default()
            .compose_to_buffer(&IntakeRecord::default(), &attachments)
            .unwrap();
        let doc = lopdf::Document::load_mem(&bytes).unwrap();
        let pages: Vec<_> = doc.get_pages().values().copied().collect();
        assert_eq!(pages.len(), 4);
        assert!((page_width_pt(&doc, pages[2]) - 612.0).abs() < 1.0);
        assert!((page_width_pt(&doc, pages[3]) - 595.28).abs() < 1.0);
    }

    #[test]
    fn declaration_blanks_render_placeholder_over_a_rule() {
        let doc = FormPress::default()
            .compose_to_document(&IntakeRecord::default(), &[])
            .unwrap();
        let (page, label) = doc
            .pages
            .iter()
            .find_map(|page| {
                placed_strings(page)
                    .into_iter()
                    .find(|(_, _, t)| t == "Name of Entity Making Payment:")
                    .map(|label| (page, label))
            })
            .expect("declaration label rendered");

        let placed = placed_strings(page);
        let value = placed
            .iter()
            .find(|(x, y, _)| *y == label.1 && *x > label.0)
            .expect("value beside the label");
        assert_eq!(value.2, "N/A");
        assert!(placed.iter().all(|(_, _, t)| !t.contains("___")));

        // One writable rule just under the value slot.
        let rules = page
            .commands
            .iter()
            .filter(|cmd| match cmd {
                Command::DrawLine { x1, y1, .. } => {
                    x1.to_f32() > 70.0 && (y1.to_f32() - (label.1 + 1.0)).abs() < 0.1
                }
                _ => false,
            })
            .count();
        assert_eq!(rules, 1);
    }

    #[test]
    fn profile_photo_and_signature_draw_inline() {
        let attachments = vec![
            Attachment::new(
                AttachmentSlot::ProfilePhoto,
                AttachmentKind::Bitmap,
                png_bytes(200, 200),
            ),
            Attachment::new(
                AttachmentSlot::Signature,
                AttachmentKind::Bitmap,
                png_bytes(300, 120),
            ),
        ];
        let doc = FormPress::default()
            .compose_to_document(&IntakeRecord::default(), &attachments)
            .unwrap();
        // Photo and signature on the data page, signature again on terms.
        assert_eq!(page_image_count(&doc.pages[0]), 2);
        assert_eq!(page_image_count(&doc.pages[1]), 1);
    }

    #[test]
    fn pdf_in_a_bitmap_slot_is_skipped() {
        let att = Attachment::new(
            AttachmentSlot::Signature,
            AttachmentKind::Pdf,
            pdf_attachment_bytes(),
        );
        let doc = FormPress::default()
            .compose_to_document(&IntakeRecord::default(), &[att])
            .unwrap();
        assert_eq!(page_image_count(&doc.pages[0]), 0);
    }

    #[test]
    fn pdf_attachment_pages_are_appended_to_the_buffer() {
        let att = Attachment::new(
            AttachmentSlot::Document1,
            AttachmentKind::Pdf,
            pdf_attachment_bytes(),
        );
        let bytes = FormPress::default()
            .compose_to_buffer(&IntakeRecord::default(), &[att])
            .unwrap();
        let doc = lopdf::Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 3);
    }

    #[test]
    fn failed_pdf_attachment_leaves_the_receipt_intact() {
        let att = Attachment::new(
            AttachmentSlot::Document2,
            AttachmentKind::Pdf,
            b"%PDF-not really".to_vec(),
        );
        let bytes = FormPress::default()
            .compose_to_buffer(&IntakeRecord::default(), &[att])
            .unwrap();
        let doc = lopdf::Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
    }

    #[test]
    fn file_name_prefers_the_plan_id() {
        let record = IntakeRecord {
            plan_id: Some("FIBER-100".to_string()),
            ..IntakeRecord::default()
        };
        assert_eq!(suggested_file_name(&record), "FIBER-100.pdf");
        assert_eq!(suggested_file_name(&IntakeRecord::default()), "receipt.pdf");
    }
}
