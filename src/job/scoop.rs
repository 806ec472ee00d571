// Input retention and pending output shared by the jobs.
//
// `Scoop` holds bytes taken from the caller's input that a job has not
// finished with. `Tube` holds produced bytes that did not fit in the
// caller's output yet.

use super::{Buffers, Stats};
use crate::error::Result;

// ---------------------------------------------------------------------------
// Scoop
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub(crate) struct Scoop {
    buf: Vec<u8>,
    start: usize,
}

impl Scoop {
    /// Retained bytes not yet consumed.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.buf[self.start..]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len() - self.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop `n` bytes from the front.
    #[inline]
    pub fn advance(&mut self, n: usize) {
        debug_assert!(n <= self.len());
        self.start += n;
        if self.start == self.buf.len() {
            self.buf.clear();
            self.start = 0;
        }
    }

    /// Pull input until `want` bytes are retained or input runs out.
    ///
    /// Never takes more than needed, so unrelated trailing input stays with
    /// the caller. Returns true if `want` bytes are now available.
    pub fn fill(&mut self, bufs: &mut Buffers<'_, '_>, want: usize, stats: &mut Stats) -> Result<bool> {
        let have = self.len();
        if have >= want {
            return Ok(true);
        }
        if self.start > 0 && self.start >= self.buf.len() / 2 {
            self.buf.drain(..self.start);
            self.start = 0;
        }
        let taken = bufs.take_in(want - have);
        if !taken.is_empty() {
            self.buf.try_reserve(taken.len())?;
            self.buf.extend_from_slice(taken);
            stats.in_bytes += taken.len() as u64;
        }
        Ok(self.len() >= want)
    }
}

// ---------------------------------------------------------------------------
// Tube
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub(crate) struct Tube {
    buf: Vec<u8>,
    pos: usize,
}

impl Tube {
    /// Bytes waiting to be written.
    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len() - self.pos
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Queue room for `additional` more bytes.
    pub fn reserve(&mut self, additional: usize) -> Result<()> {
        self.buf.try_reserve(additional)?;
        Ok(())
    }

    /// Buffer to append produced bytes to.
    #[inline]
    pub fn queue(&mut self) -> &mut Vec<u8> {
        &mut self.buf
    }

    pub fn push(&mut self, data: &[u8]) -> Result<()> {
        self.reserve(data.len())?;
        self.buf.extend_from_slice(data);
        Ok(())
    }

    /// Move as much as fits into the caller's output.
    pub fn drain(&mut self, bufs: &mut Buffers<'_, '_>, stats: &mut Stats) {
        if self.is_empty() {
            return;
        }
        let n = bufs.put_out(&self.buf[self.pos..]);
        self.pos += n;
        stats.out_bytes += n as u64;
        if self.pos == self.buf.len() {
            self.buf.clear();
            self.pos = 0;
        }
    }
}
