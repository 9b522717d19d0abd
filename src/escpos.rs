//! Minimal ESC/POS binary command builder for thermal receipt printers.
//!
//! Generates the raw byte stream a line-mode printer consumes: literal
//! single-byte text interleaved with fixed control sequences for
//! initialization, emphasis, alignment, text sizing, paper cutting, and
//! Code39 barcode emission. The receipt formatter builds documents on top
//! of this; the transport ships the resulting bytes unmodified.

// ESC/POS command bytes
const ESC: u8 = 0x1B;
const GS: u8 = 0x1D;
const LF: u8 = 0x0A;

/// Paper width in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaperWidth {
    Mm58,
    Mm80,
}

impl PaperWidth {
    pub fn chars(self) -> usize {
        match self {
            PaperWidth::Mm58 => 32,
            PaperWidth::Mm80 => 48,
        }
    }

    pub fn from_mm(mm: i32) -> Self {
        if mm <= 58 {
            PaperWidth::Mm58
        } else {
            PaperWidth::Mm80
        }
    }
}

/// Encode a string for the printer's default single-byte code page.
///
/// ASCII passes through; anything else becomes `?`. Receipts are expected
/// to be ASCII — padding and truncation elsewhere rely on one byte per
/// printed column.
fn encode_single_byte(s: &str) -> Vec<u8> {
    s.chars()
        .map(|ch| {
            let code = ch as u32;
            if code < 0x80 {
                code as u8
            } else {
                b'?'
            }
        })
        .collect()
}

/// Builder for generating ESC/POS binary command buffers.
///
/// ```rust,ignore
/// let data = {
///     let mut b = EscPosBuilder::new();
///     b.init()
///         .center()
///         .bold(true).text("WARUNG KEBAB\n").bold(false)
///         .left()
///         .column_pair("2x Kebab Original", "Rp 40.000")
///         .feed(3)
///         .cut();
///     b.build()
/// };
/// ```
pub struct EscPosBuilder {
    buffer: Vec<u8>,
    paper: PaperWidth,
}

impl EscPosBuilder {
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(512),
            paper: PaperWidth::Mm58,
        }
    }

    pub fn with_paper(mut self, paper: PaperWidth) -> Self {
        self.paper = paper;
        self
    }

    pub fn width(&self) -> usize {
        self.paper.chars()
    }

    // -----------------------------------------------------------------------
    // Initialization
    // -----------------------------------------------------------------------

    /// ESC @ — Initialize printer, reset to defaults.
    pub fn init(&mut self) -> &mut Self {
        self.buffer.extend_from_slice(&[ESC, 0x40]);
        self
    }

    // -----------------------------------------------------------------------
    // Text formatting
    // -----------------------------------------------------------------------

    /// ESC E n — Bold on/off.
    pub fn bold(&mut self, on: bool) -> &mut Self {
        self.buffer
            .extend_from_slice(&[ESC, 0x45, if on { 1 } else { 0 }]);
        self
    }

    /// ESC - n — Underline (0=off, 1=thin, 2=thick).
    pub fn underline(&mut self, mode: u8) -> &mut Self {
        self.buffer.extend_from_slice(&[ESC, 0x2D, mode]);
        self
    }

    /// GS ! n — Set text size (width × height multiplier, 1–8 each).
    pub fn text_size(&mut self, width: u8, height: u8) -> &mut Self {
        let w = width.clamp(1, 8) - 1;
        let h = height.clamp(1, 8) - 1;
        self.buffer.extend_from_slice(&[GS, 0x21, (w << 4) | h]);
        self
    }

    /// Reset text size to 1×1.
    pub fn normal_size(&mut self) -> &mut Self {
        self.text_size(1, 1)
    }

    /// Double-height text (1×2).
    pub fn double_height(&mut self) -> &mut Self {
        self.text_size(1, 2)
    }

    // -----------------------------------------------------------------------
    // Alignment
    // -----------------------------------------------------------------------

    /// ESC a 0 — Left-align.
    pub fn left(&mut self) -> &mut Self {
        self.buffer.extend_from_slice(&[ESC, 0x61, 0]);
        self
    }

    /// ESC a 1 — Centre-align.
    pub fn center(&mut self) -> &mut Self {
        self.buffer.extend_from_slice(&[ESC, 0x61, 1]);
        self
    }

    /// ESC a 2 — Right-align.
    pub fn right(&mut self) -> &mut Self {
        self.buffer.extend_from_slice(&[ESC, 0x61, 2]);
        self
    }

    // -----------------------------------------------------------------------
    // Text output
    // -----------------------------------------------------------------------

    /// Append text in the printer's default single-byte encoding.
    pub fn text(&mut self, s: &str) -> &mut Self {
        self.buffer.extend(encode_single_byte(s));
        self
    }

    /// Append text followed by a line-feed.
    pub fn text_line(&mut self, s: &str) -> &mut Self {
        self.text(s).lf()
    }

    /// Append raw bytes (e.g. pre-encoded text).
    pub fn raw(&mut self, data: &[u8]) -> &mut Self {
        self.buffer.extend_from_slice(data);
        self
    }

    /// Append a line-feed.
    pub fn lf(&mut self) -> &mut Self {
        self.buffer.push(LF);
        self
    }

    /// Print a horizontal separator using dashes, matching paper width.
    pub fn separator(&mut self) -> &mut Self {
        let width = self.paper.chars();
        for _ in 0..width {
            self.buffer.push(b'-');
        }
        self.buffer.push(LF);
        self
    }

    /// Print a line with left-justified and right-justified columns.
    ///
    /// The left text is padded or truncated to `width - len(right) - 1`
    /// bytes, followed by a single space and the right text. Overflow is
    /// truncated, never wrapped. Lengths are byte-based on the encoded
    /// text, which matches printed columns for ASCII receipts.
    pub fn column_pair(&mut self, left: &str, right: &str) -> &mut Self {
        let width = self.paper.chars();
        let left_bytes = encode_single_byte(left);
        let right_bytes = encode_single_byte(right);
        let avail = width.saturating_sub(right_bytes.len() + 1);

        if left_bytes.len() >= avail {
            self.buffer.extend_from_slice(&left_bytes[..avail]);
        } else {
            self.buffer.extend_from_slice(&left_bytes);
            for _ in left_bytes.len()..avail {
                self.buffer.push(b' ');
            }
        }
        self.buffer.push(b' ');
        self.buffer.extend_from_slice(&right_bytes);
        self.lf()
    }

    // -----------------------------------------------------------------------
    // Feed / cut
    // -----------------------------------------------------------------------

    /// ESC d n — Feed n lines.
    pub fn feed(&mut self, lines: u8) -> &mut Self {
        self.buffer.extend_from_slice(&[ESC, 0x64, lines]);
        self
    }

    /// GS V A 16 — Partial cut with 16-dot feed.
    pub fn cut(&mut self) -> &mut Self {
        self.buffer.extend_from_slice(&[GS, 0x56, 0x41, 0x10]);
        self
    }

    /// GS V 0 — Full cut.
    pub fn full_cut(&mut self) -> &mut Self {
        self.buffer.extend_from_slice(&[GS, 0x56, 0x00]);
        self
    }

    // -----------------------------------------------------------------------
    // Barcode
    // -----------------------------------------------------------------------

    /// Print a Code39 barcode for `data` (HRI text below the bars).
    ///
    /// Emits height (`GS h`), module width (`GS w`) and text-position
    /// (`GS H`) directives followed by `GS k 4 {data} NUL`, the
    /// null-terminated Code39 form.
    pub fn barcode_code39(&mut self, data: &str) -> &mut Self {
        self.buffer.extend_from_slice(&[GS, 0x68, 80]); // height: 80 dots
        self.buffer.extend_from_slice(&[GS, 0x77, 2]); // module width: 2
        self.buffer.extend_from_slice(&[GS, 0x48, 2]); // HRI below bars
        self.buffer.extend_from_slice(&[GS, 0x6B, 4]); // Code39
        self.buffer.extend(encode_single_byte(data));
        self.buffer.push(0x00);
        self
    }

    // -----------------------------------------------------------------------
    // Build
    // -----------------------------------------------------------------------

    /// Consume the builder and return the binary ESC/POS payload.
    pub fn build(self) -> Vec<u8> {
        self.buffer
    }
}

impl Default for EscPosBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_command() {
        let data = {
            let mut b = EscPosBuilder::new();
            b.init();
            b.build()
        };
        assert_eq!(data, vec![0x1B, 0x40]);
    }

    #[test]
    fn test_bold_on_off() {
        let data = {
            let mut b = EscPosBuilder::new();
            b.bold(true).text("HI").bold(false);
            b.build()
        };
        assert_eq!(data, vec![0x1B, 0x45, 1, b'H', b'I', 0x1B, 0x45, 0]);
    }

    #[test]
    fn test_center_align() {
        let data = {
            let mut b = EscPosBuilder::new();
            b.center();
            b.build()
        };
        assert_eq!(data, vec![0x1B, 0x61, 1]);
    }

    #[test]
    fn test_cut() {
        let data = {
            let mut b = EscPosBuilder::new();
            b.cut();
            b.build()
        };
        assert_eq!(data, vec![0x1D, 0x56, 0x41, 0x10]);
    }

    #[test]
    fn test_feed() {
        let data = {
            let mut b = EscPosBuilder::new();
            b.feed(4);
            b.build()
        };
        assert_eq!(data, vec![0x1B, 0x64, 4]);
    }

    #[test]
    fn test_text_ascii_passthrough() {
        let data = {
            let mut b = EscPosBuilder::new();
            b.text("ABC\n");
            b.build()
        };
        assert_eq!(data, vec![b'A', b'B', b'C', b'\n']);
    }

    #[test]
    fn test_text_non_ascii_replaced() {
        let data = {
            let mut b = EscPosBuilder::new();
            b.text("Café");
            b.build()
        };
        assert_eq!(data, vec![b'C', b'a', b'f', b'?']);
    }

    #[test]
    fn test_text_size() {
        let data = {
            let mut b = EscPosBuilder::new();
            b.text_size(1, 2);
            b.build()
        };
        // GS ! n where n = ((1-1) << 4) | (2-1) = 0x01
        assert_eq!(data, vec![0x1D, 0x21, 0x01]);
    }

    #[test]
    fn test_separator_58mm() {
        let data = {
            let mut b = EscPosBuilder::new();
            b.separator();
            b.build()
        };
        // 32 dashes + LF
        assert_eq!(data.len(), 33);
        assert!(data[..32].iter().all(|&b| b == b'-'));
        assert_eq!(data[32], 0x0A);
    }

    #[test]
    fn test_column_pair_pads_to_width() {
        let data = {
            let mut b = EscPosBuilder::new();
            b.column_pair("2x Kebab Original", "Rp 40.000");
            b.build()
        };
        // 32 columns + LF
        assert_eq!(data.len(), 33);
        assert_eq!(&data[..17], b"2x Kebab Original");
        assert_eq!(&data[23..32], b"Rp 40.000");
        // single padding run of spaces between the columns
        assert!(data[17..23].iter().all(|&b| b == b' '));
        assert_eq!(data[32], 0x0A);
    }

    #[test]
    fn test_column_pair_truncates_long_left() {
        let data = {
            let mut b = EscPosBuilder::new();
            b.column_pair("4x Paket Kebab Jumbo Keju Mozarella", "Rp 120.000");
            b.build()
        };
        // left truncated to 32 - 10 - 1 = 21 bytes, then space, then right
        assert_eq!(data.len(), 33);
        assert_eq!(&data[..21], b"4x Paket Kebab Jumbo ");
        assert_eq!(data[21], b' ');
        assert_eq!(&data[22..32], b"Rp 120.000");
    }

    #[test]
    fn test_barcode_code39() {
        let data = {
            let mut b = EscPosBuilder::new();
            b.barcode_code39("WRG-001");
            b.build()
        };
        let mut expected = vec![
            0x1D, 0x68, 80, // height
            0x1D, 0x77, 2, // width
            0x1D, 0x48, 2, // HRI below
            0x1D, 0x6B, 4, // Code39
        ];
        expected.extend_from_slice(b"WRG-001");
        expected.push(0x00);
        assert_eq!(data, expected);
    }

    #[test]
    fn test_full_test_receipt() {
        let mut b = EscPosBuilder::new();
        b.init()
            .center()
            .bold(true)
            .text("TEST PRINT\n")
            .bold(false)
            .separator()
            .left()
            .text("Printer: Test\n")
            .text("Date: 2026-08-25\n")
            .separator()
            .text("ABCDEFGHIJKLMNOPQRSTUVWXYZ\n")
            .text("0123456789 !@#$%^&*()\n")
            .separator()
            .center()
            .text("-- End of Test --\n")
            .feed(4)
            .cut();
        let data = b.build();
        // Starts with ESC @, ends with the partial-cut command
        assert!(data.len() > 50);
        assert_eq!(&data[..2], &[0x1B, 0x40]);
        assert_eq!(&data[data.len() - 4..], &[0x1D, 0x56, 0x41, 0x10]);
    }
}
