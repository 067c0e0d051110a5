//! Shared scaffolding for printable artifacts.
//!
//! Receipts, lab reports and donation certificates are all single-page
//! A4 documents rendered with the built-in Helvetica faces via
//! `printpdf`. Callers receive raw bytes and decide where they go.

use std::io::BufWriter;

use printpdf::*;

use crate::db::DatabaseError;

/// Wrap width for body text at 9pt.
const BODY_WRAP_CHARS: usize = 80;

/// Single-page A4 document with a downward-moving text cursor.
pub struct PageWriter {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    font: IndirectFontRef,
    bold: IndirectFontRef,
    mono: IndirectFontRef,
    y: Mm,
}

impl PageWriter {
    pub fn new(title: &str) -> Result<Self, DatabaseError> {
        let (doc, page1, layer1) = PdfDocument::new(title, Mm(210.0), Mm(297.0), "Layer 1");
        let layer = doc.get_page(page1).get_layer(layer1);
        let font = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| DatabaseError::ConstraintViolation(format!("PDF font error: {e}")))?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| DatabaseError::ConstraintViolation(format!("PDF font error: {e}")))?;
        let mono = doc
            .add_builtin_font(BuiltinFont::Courier)
            .map_err(|e| DatabaseError::ConstraintViolation(format!("PDF font error: {e}")))?;

        Ok(Self {
            doc,
            layer,
            font,
            bold,
            mono,
            y: Mm(280.0),
        })
    }

    /// Document title, 14pt bold.
    pub fn heading(&mut self, text: &str) {
        self.layer.use_text(text, 14.0, Mm(20.0), self.y, &self.bold);
        self.y -= Mm(10.0);
    }

    /// Header metadata line (dates, names), 9pt.
    pub fn meta(&mut self, text: &str) {
        self.layer.use_text(text, 9.0, Mm(20.0), self.y, &self.font);
        self.y -= Mm(4.5);
    }

    /// Section label, 11pt bold.
    pub fn section(&mut self, text: &str) {
        self.layer.use_text(text, 11.0, Mm(20.0), self.y, &self.bold);
        self.y -= Mm(6.0);
    }

    /// Indented body text, wrapped at 80 characters.
    pub fn line(&mut self, text: &str) {
        for line in wrap_text(text, BODY_WRAP_CHARS) {
            self.layer.use_text(&line, 9.0, Mm(25.0), self.y, &self.font);
            self.y -= Mm(4.5);
        }
    }

    /// Emphasised line, 10pt bold.
    pub fn strong_line(&mut self, text: &str) {
        self.layer.use_text(text, 10.0, Mm(20.0), self.y, &self.bold);
        self.y -= Mm(5.0);
    }

    /// Fixed-width tabular row, 8pt Courier.
    pub fn mono_row(&mut self, text: &str) {
        self.layer.use_text(text, 8.0, Mm(25.0), self.y, &self.mono);
        self.y -= Mm(4.0);
    }

    /// Vertical whitespace.
    pub fn gap(&mut self, mm: f32) {
        self.y -= Mm(mm);
    }

    /// Serialize to PDF bytes.
    pub fn finish(self) -> Result<Vec<u8>, DatabaseError> {
        let mut buf = BufWriter::new(Vec::new());
        self.doc
            .save(&mut buf)
            .map_err(|e| DatabaseError::ConstraintViolation(format!("PDF save error: {e}")))?;
        buf.into_inner()
            .map_err(|e| DatabaseError::ConstraintViolation(format!("PDF buffer error: {e}")))
    }
}

/// Simple word-wrap helper for PDF text rendering.
pub fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.len() + word.len() + 1 > max_chars && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_writer_produces_valid_pdf() {
        let mut page = PageWriter::new("Receipt").unwrap();
        page.heading("Medicine Receipt");
        page.meta("Date: 2026-08-25");
        page.section("ITEMS:");
        page.mono_row("Paracetamol  7  50  twice_daily  after meals");
        page.gap(8.0);
        page.strong_line("Visit the dispensary desk to collect.");

        let bytes = page.finish().unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        assert!(bytes.len() > 500);
    }

    #[test]
    fn wrap_text_splits_long_lines() {
        let text = "one two three four five six seven eight nine ten";
        let lines = wrap_text(text, 20);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(line.len() <= 20);
        }
    }

    #[test]
    fn wrap_text_short_line_untouched() {
        let lines = wrap_text("short", 80);
        assert_eq!(lines, vec!["short".to_string()]);
    }

    #[test]
    fn wrap_text_empty_yields_single_blank() {
        let lines = wrap_text("", 80);
        assert_eq!(lines, vec![String::new()]);
    }

    #[test]
    fn long_body_text_wraps_without_error() {
        let mut page = PageWriter::new("Report").unwrap();
        page.line(&"word ".repeat(100));
        let bytes = page.finish().unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }
}
