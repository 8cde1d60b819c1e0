use crate::compact::Compactor;
use bytes::BytesMut;
use std::borrow::Cow;
use std::io::{self, Write};
use tracing::{debug, trace, warn};

/// A write-only decorator that compacts HTML before it reaches `W`.
///
/// Writes are only buffered. The buffered text is compacted and written to
/// the inner writer when the sink is flushed or closed, once per buffered
/// segment. The sink is closed automatically when dropped, so buffered
/// text is never lost.
///
/// Only [`Write`] is implemented: reading, seeking and querying the length
/// or position are not available on a one-way transformation sink.
pub struct WhitespaceSink<W: Write> {
    inner: W,
    buffer: BytesMut,
    compactor: Compactor,
    closed: bool,
}

impl<W: Write> WhitespaceSink<W> {
    /// Creates a sink that writes compacted output to `inner`.
    pub fn new(inner: W, compactor: Compactor) -> Self {
        Self {
            inner,
            buffer: BytesMut::new(),
            compactor,
            closed: false,
        }
    }

    /// Returns a reference to the inner writer.
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Returns a mutable reference to the inner writer.
    ///
    /// Writing to it directly bypasses compaction.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    /// Returns the number of bytes waiting to be drained.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Returns whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Drains all buffered text, then flushes the inner writer.
    ///
    /// Further writes fail. Closing again is a no-op.
    pub fn close(&mut self) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.drain(true)?;
        self.inner.flush()
    }

    /// Drops the buffered text unwritten and closes the sink.
    pub(crate) fn discard(&mut self) {
        self.buffer.clear();
        self.closed = true;
    }

    /// Compacts the buffered text and writes it to the inner writer.
    ///
    /// Unless `finish` is set, an incomplete UTF-8 sequence at the end of
    /// the buffer is held back for the next write.
    fn drain(&mut self, finish: bool) -> io::Result<()> {
        let hold = if finish {
            0
        } else {
            incomplete_tail_len(&self.buffer)
        };
        let take = self.buffer.len() - hold;
        if take == 0 {
            return Ok(());
        }

        // Split before writing so a failed write can never emit it twice.
        let pending = self.buffer.split_to(take);
        let text = String::from_utf8_lossy(&pending);
        if let Cow::Owned(_) = text {
            debug!(bytes = pending.len(), "replaced invalid UTF-8 in response body");
        }

        match self.compactor.compact(&text) {
            Some(compacted) => {
                trace!(
                    buffered = pending.len(),
                    written = compacted.len(),
                    "drained whitespace sink"
                );
                self.inner.write_all(compacted.as_bytes())
            }
            None => Ok(()),
        }
    }
}

impl<W: Write> Write for WhitespaceSink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.closed {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "write to closed whitespace sink",
            ));
        }
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.drain(false)?;
        self.inner.flush()
    }
}

impl<W: Write> Drop for WhitespaceSink<W> {
    fn drop(&mut self) {
        if let Err(error) = self.close() {
            warn!(%error, "failed to drain whitespace sink on drop");
        }
    }
}

/// Returns how many trailing bytes form the start of a UTF-8 sequence
/// whose remaining bytes have not been written yet.
fn incomplete_tail_len(buf: &[u8]) -> usize {
    for back in 1..=buf.len().min(4) {
        let byte = buf[buf.len() - back];
        if byte & 0b1100_0000 != 0b1000_0000 {
            let expected = match byte {
                0xC0..=0xDF => 2,
                0xE0..=0xEF => 3,
                0xF0..=0xF7 => 4,
                _ => 1,
            };
            return if expected > back { back } else { 0 };
        }
    }
    0
}
