//! Rendering of list contents as `[a, b, c]`.

use core::fmt::{self, Display, Write};

use crate::error::{Result, internal};
use crate::ListError;

/// Writes `[a, b, c]` for the given values. An empty sequence writes `[]`.
pub(crate) fn write_sequence<'v, T, W, I>(out: &mut W, values: I) -> fmt::Result
where
    T: Display + 'v,
    W: Write,
    I: IntoIterator<Item = &'v T>,
{
    out.write_char('[')?;
    let mut values = values.into_iter();
    if let Some(first) = values.next() {
        write!(out, "{first}")?;
        for value in values {
            write!(out, ", {value}")?;
        }
    }
    out.write_char(']')
}

/// Renders `values` into `buf`, returning the written text.
///
/// Either the complete rendering fits or the call fails with
/// [`ListError::InsufficientSize`]; the buffer contents are unspecified then.
pub(crate) fn render_into<'b, 'v, T, I>(values: I, buf: &'b mut [u8]) -> Result<&'b str>
where
    T: Display + 'v,
    I: IntoIterator<Item = &'v T>,
{
    let mut writer = SliceWriter::new(buf);
    write_sequence(&mut writer, values).map_err(|_| internal("formatter failed"))?;
    let (buf, needed) = writer.finish();
    if needed > buf.len() {
        return Err(ListError::InsufficientSize {
            needed,
            available: buf.len(),
        });
    }
    core::str::from_utf8(&buf[..needed]).map_err(|_| internal("rendering split a character"))
}

/// `fmt::Write` over a fixed byte slice.
///
/// Keeps counting once the slice is full so the caller learns how many bytes
/// the whole rendering needs. A fragment that does not fit is never written
/// partially.
struct SliceWriter<'b> {
    buf: &'b mut [u8],
    written: usize,
    needed: usize,
}

impl<'b> SliceWriter<'b> {
    fn new(buf: &'b mut [u8]) -> Self {
        Self {
            buf,
            written: 0,
            needed: 0,
        }
    }

    fn finish(self) -> (&'b [u8], usize) {
        (self.buf, self.needed)
    }
}

impl Write for SliceWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.needed += s.len();
        // Once anything has been dropped the output is already unusable.
        if self.written + s.len() == self.needed {
            if let Some(dst) = self.buf.get_mut(self.written..self.written + s.len()) {
                dst.copy_from_slice(s.as_bytes());
                self.written += s.len();
            }
        }
        Ok(())
    }
}
