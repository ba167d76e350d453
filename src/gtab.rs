//! gTab output: tab-delimited rows under an `@`-prefixed header block.
//!
//! The header declares the column count and the semantic index of each
//! column; there are exactly four layouts, decided once per run from
//! (mode, base mask). Rows are appended in chromosome-merge order and
//! the final coordinate sort happens after the run (see `sort`).

use crate::config::Mode;
use crate::score::PositionScore;
use crate::tab::{Result, Strand};
use std::io::Write;

/// Sentinel printed for positions with no valid score.
pub const NULL_SCORE: &str = "NULL";

/// Number of decimal places for score columns.
const SCORE_PRECISION: u32 = 3;

/// Buffered gTab writer over any sink. Formats integers with itoa and
/// scores with a fixed three-decimal rendering.
pub struct GtabWriter<W: Write> {
    writer: W,
    mode: Mode,
    use_mask: bool,
    int_buf: itoa::Buffer,
}

impl<W: Write> GtabWriter<W> {
    pub fn new(writer: W, mode: Mode, use_mask: bool) -> Self {
        Self {
            writer,
            mode,
            use_mask,
            int_buf: itoa::Buffer::new(),
        }
    }

    /// Write the header block. Must be called once, before any row.
    pub fn write_header(&mut self) -> Result<()> {
        let header = match (self.mode, self.use_mask) {
            (Mode::TrtCont, true) => {
                "@ColNum 11\n@ChrID 1\n@Strand 2\n@ChrPos 3\n@Base 4\n@N_RT 5\n@N_BD 6\n@D_RT 7\n@D_BD 8\n@Shape 9\n@ShapeNum 10\n@WindowShape 11\n"
            }
            (Mode::TrtCont, false) => {
                "@ColNum 10\n@ChrID 1\n@Strand 2\n@ChrPos 3\n@N_RT 4\n@N_BD 5\n@D_RT 6\n@D_BD 7\n@Shape 8\n@ShapeNum 9\n@WindowShape 10\n"
            }
            (Mode::Trt, true) => {
                "@ColNum 9\n@ChrID 1\n@Strand 2\n@ChrPos 3\n@Base 4\n@N_RT 5\n@N_BD 6\n@Shape 7\n@ShapeNum 8\n@WindowShape 9\n"
            }
            (Mode::Trt, false) => {
                "@ColNum 8\n@ChrID 1\n@Strand 2\n@ChrPos 3\n@N_RT 4\n@N_BD 5\n@Shape 6\n@ShapeNum 7\n@WindowShape 8\n"
            }
        };
        self.writer.write_all(header.as_bytes())?;
        Ok(())
    }

    fn write_int(&mut self, value: u64) -> Result<()> {
        let s = self.int_buf.format(value);
        self.writer.write_all(s.as_bytes())?;
        Ok(())
    }

    fn write_score(&mut self, score: Option<f64>) -> Result<()> {
        match score {
            Some(v) => {
                let scale = 10f64.powi(SCORE_PRECISION as i32);
                // +0.0 turns a rounded -0.0 back into 0.0
                let rounded = (v * scale).round() / scale + 0.0;
                let mut float_buf = ryu::Buffer::new();
                self.writer.write_all(float_buf.format(rounded).as_bytes())?;
            }
            None => self.writer.write_all(NULL_SCORE.as_bytes())?,
        }
        Ok(())
    }

    /// Write one data row. `base` must be Some exactly when the writer
    /// was built with a base mask.
    pub fn write_row(
        &mut self,
        chrom: &str,
        strand: Strand,
        entry: &PositionScore,
        base: Option<u8>,
    ) -> Result<()> {
        self.writer.write_all(chrom.as_bytes())?;
        self.writer.write_all(b"\t")?;
        self.writer.write_all(&[strand.as_char() as u8, b'\t'])?;
        self.write_int(entry.pos)?;
        if self.use_mask {
            let base = base.unwrap_or(b'N');
            self.writer.write_all(&[b'\t', base])?;
        }
        self.writer.write_all(b"\t")?;
        self.write_int(entry.n_rt)?;
        self.writer.write_all(b"\t")?;
        self.write_int(entry.n_bd)?;
        if self.mode == Mode::TrtCont {
            self.writer.write_all(b"\t")?;
            self.write_int(entry.d_rt)?;
            self.writer.write_all(b"\t")?;
            self.write_int(entry.d_bd)?;
        }
        self.writer.write_all(b"\t")?;
        self.write_score(entry.shape)?;
        self.writer.write_all(b"\t")?;
        self.write_int(entry.shape_num as u64)?;
        self.writer.write_all(b"\t")?;
        self.write_score(entry.window_shape)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(pos: u64) -> PositionScore {
        PositionScore {
            pos,
            n_rt: 7,
            n_bd: 120,
            d_rt: 3,
            d_bd: 110,
            shape: Some(1.25),
            shape_num: 40,
            window_shape: Some(1.1),
        }
    }

    fn render(mode: Mode, use_mask: bool, base: Option<u8>) -> String {
        let mut writer = GtabWriter::new(Vec::new(), mode, use_mask);
        writer.write_header().unwrap();
        writer.write_row("chr1", Strand::Plus, &entry(100), base).unwrap();
        String::from_utf8(writer.into_inner()).unwrap()
    }

    #[test]
    fn test_trt_cont_layout() {
        let out = render(Mode::TrtCont, false, None);
        assert!(out.starts_with("@ColNum 10\n"));
        assert!(out.contains("@WindowShape 10\n"));
        assert!(out.ends_with("chr1\t+\t100\t7\t120\t3\t110\t1.25\t40\t1.1\n"));
    }

    #[test]
    fn test_trt_cont_mask_layout() {
        let out = render(Mode::TrtCont, true, Some(b'A'));
        assert!(out.starts_with("@ColNum 11\n"));
        assert!(out.contains("@Base 4\n"));
        assert!(out.ends_with("chr1\t+\t100\tA\t7\t120\t3\t110\t1.25\t40\t1.1\n"));
    }

    #[test]
    fn test_trt_layout_drops_control_columns() {
        let out = render(Mode::Trt, false, None);
        assert!(out.starts_with("@ColNum 8\n"));
        assert!(!out.contains("@D_RT"));
        assert!(out.ends_with("chr1\t+\t100\t7\t120\t1.25\t40\t1.1\n"));
    }

    #[test]
    fn test_trt_mask_layout() {
        let out = render(Mode::Trt, true, Some(b'C'));
        assert!(out.starts_with("@ColNum 9\n"));
        assert!(out.ends_with("chr1\t+\t100\tC\t7\t120\t1.25\t40\t1.1\n"));
    }

    #[test]
    fn test_sentinel_rendered_as_null() {
        let mut writer = GtabWriter::new(Vec::new(), Mode::Trt, false);
        let mut e = entry(5);
        e.shape = None;
        e.window_shape = None;
        e.shape_num = 0;
        writer.write_row("chr2", Strand::Minus, &e, None).unwrap();
        let out = String::from_utf8(writer.into_inner()).unwrap();
        assert_eq!(out, "chr2\t-\t5\t7\t120\tNULL\t0\tNULL\n");
    }

    #[test]
    fn test_score_rounding() {
        let mut writer = GtabWriter::new(Vec::new(), Mode::Trt, false);
        let mut e = entry(5);
        e.shape = Some(0.123456);
        e.window_shape = Some(2.0);
        writer.write_row("chr1", Strand::Plus, &e, None).unwrap();
        let out = String::from_utf8(writer.into_inner()).unwrap();
        assert!(out.contains("\t0.123\t"));
        assert!(out.contains("\t2.0\n"));
    }

    #[test]
    fn test_tiny_negative_score_rounds_to_plain_zero() {
        // log enrichment can produce scores like -0.0001; they must
        // round to 0.0, not -0.0
        let mut writer = GtabWriter::new(Vec::new(), Mode::Trt, false);
        let mut e = entry(5);
        e.shape = Some(-0.0001);
        e.window_shape = Some(-0.4996);
        writer.write_row("chr1", Strand::Plus, &e, None).unwrap();
        let out = String::from_utf8(writer.into_inner()).unwrap();
        assert!(out.contains("\t0.0\t"));
        assert!(out.ends_with("\t-0.5\n"));
        assert!(!out.contains("-0.0\t"));
    }
}
