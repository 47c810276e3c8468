//! Primitive readers and writers for the binary layout.
//!
//! Integers are little-endian `u32`. Booleans are one byte, `0` or `1`.
//! Strings and byte arrays are a `u32` length followed by the bytes.

use crate::{DecodeError, EncodeError, PlayerId};

// ── Writer ──────────────────────────────────────────────────────

#[derive(Debug)]
pub(crate) struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub(crate) fn new(kind: u8) -> Self {
        Self { buf: vec![kind] }
    }

    pub(crate) fn u32(&mut self, v: u32) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub(crate) fn player(&mut self, id: PlayerId) -> &mut Self {
        self.u32(id.0)
    }

    pub(crate) fn bool(&mut self, v: bool) -> &mut Self {
        self.buf.push(u8::from(v));
        self
    }

    pub(crate) fn bytes(
        &mut self,
        field: &'static str,
        b: &[u8],
    ) -> Result<&mut Self, EncodeError> {
        let len = u32::try_from(b.len())
            .map_err(|_| EncodeError::FieldTooLong { field, len: b.len() })?;
        self.u32(len);
        self.buf.extend_from_slice(b);
        Ok(self)
    }

    pub(crate) fn str(
        &mut self,
        field: &'static str,
        s: &str,
    ) -> Result<&mut Self, EncodeError> {
        self.bytes(field, s.as_bytes())
    }

    pub(crate) fn finish(self) -> Vec<u8> {
        self.buf
    }
}

// ── Reader ──────────────────────────────────────────────────────

/// A cursor over one message buffer. Every read is bounds-checked and
/// reports truncation as [`DecodeError::MalformedPayload`].
#[derive(Debug)]
pub(crate) struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8], DecodeError> {
        let remaining = self.buf.len() - self.pos;
        if n > remaining {
            return Err(DecodeError::MalformedPayload(format!(
                "truncated {what}: need {n} bytes at offset {}, have {remaining}",
                self.pos
            )));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub(crate) fn u8(&mut self, what: &str) -> Result<u8, DecodeError> {
        Ok(self.take(1, what)?[0])
    }

    pub(crate) fn u32(&mut self, what: &str) -> Result<u32, DecodeError> {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(self.take(4, what)?);
        Ok(u32::from_le_bytes(raw))
    }

    pub(crate) fn player(&mut self, what: &str) -> Result<PlayerId, DecodeError> {
        self.u32(what).map(PlayerId)
    }

    pub(crate) fn bool(&mut self, what: &str) -> Result<bool, DecodeError> {
        match self.u8(what)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(DecodeError::MalformedPayload(format!(
                "invalid boolean {other} for {what}"
            ))),
        }
    }

    pub(crate) fn bytes(&mut self, what: &str) -> Result<Vec<u8>, DecodeError> {
        let len = self.u32(what)? as usize;
        Ok(self.take(len, what)?.to_vec())
    }

    pub(crate) fn string(&mut self, what: &str) -> Result<String, DecodeError> {
        String::from_utf8(self.bytes(what)?).map_err(|e| {
            DecodeError::MalformedPayload(format!("invalid UTF-8 in {what}: {e}"))
        })
    }

    /// Fails if any bytes are left over. A layout is exact: trailing data
    /// means the sender and receiver disagree about the kind.
    pub(crate) fn finish(self) -> Result<(), DecodeError> {
        let trailing = self.buf.len() - self.pos;
        if trailing > 0 {
            return Err(DecodeError::MalformedPayload(format!(
                "{trailing} trailing bytes"
            )));
        }
        Ok(())
    }
}
