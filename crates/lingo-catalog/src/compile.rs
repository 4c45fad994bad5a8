//! Compact binary catalog form.
//!
//! `compile` serializes a [`Catalog`] into a versioned little-endian blob
//! for fast loading; `decompile` reverses it. The encoding is lossless:
//! statuses, plural flags, provenance, disambiguations, and recorded unknown
//! metadata all round-trip, so re-validating a decompiled catalog yields the
//! identical diagnostic set.
//!
//! Layout: `LCAT` magic, format version byte, then the catalog body using
//! LEB128 varints for counts/lengths and length-prefixed UTF-8 strings.

use smallvec::SmallVec;

use crate::locale::LocaleId;
use crate::model::{Catalog, Context, Location, Message, TranslationStatus};

const MAGIC: &[u8; 4] = b"LCAT";
const FORMAT_VERSION: u8 = 1;

/// Decode failure for a compiled catalog blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// Input does not start with the catalog magic.
    BadMagic,
    /// Format version newer than this reader understands.
    UnsupportedVersion(u8),
    /// The blob ended mid-field.
    Truncated { offset: usize },
    /// A string field is not valid UTF-8.
    InvalidUtf8 { offset: usize },
    /// Unknown status byte.
    BadStatus { offset: usize, value: u8 },
    /// A stored locale tag failed to parse.
    BadLocale { offset: usize },
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadMagic => write!(f, "not a compiled catalog (bad magic)"),
            Self::UnsupportedVersion(v) => write!(f, "unsupported format version {v}"),
            Self::Truncated { offset } => write!(f, "truncated blob at offset {offset}"),
            Self::InvalidUtf8 { offset } => write!(f, "invalid UTF-8 at offset {offset}"),
            Self::BadStatus { offset, value } => {
                write!(f, "unknown status byte {value:#04x} at offset {offset}")
            }
            Self::BadLocale { offset } => write!(f, "unparsable locale tag at offset {offset}"),
        }
    }
}

impl std::error::Error for CompileError {}

/// Serialize a catalog into the compact binary form.
#[must_use]
pub fn compile(catalog: &Catalog) -> Vec<u8> {
    let mut out = Vec::with_capacity(256);
    out.extend_from_slice(MAGIC);
    out.push(FORMAT_VERSION);

    match &catalog.locale {
        Some(locale) => {
            out.push(1);
            write_str(&mut out, &locale.to_string());
        }
        None => out.push(0),
    }
    write_pairs(&mut out, &catalog.extra);

    write_varint(&mut out, catalog.contexts.len() as u32);
    for context in &catalog.contexts {
        write_str(&mut out, &context.name);
        write_varint(&mut out, context.messages.len() as u32);
        for message in &context.messages {
            write_message(&mut out, message);
        }
    }
    out
}

/// Decode a compiled catalog blob.
///
/// # Errors
///
/// Returns [`CompileError`] on bad magic, unknown version, truncation, or
/// corrupted fields.
pub fn decompile(blob: &[u8]) -> Result<Catalog, CompileError> {
    let mut r = Reader {
        blob,
        offset: 0,
    };
    if r.bytes(4)? != MAGIC.as_slice() {
        return Err(CompileError::BadMagic);
    }
    let version = r.byte()?;
    if version != FORMAT_VERSION {
        return Err(CompileError::UnsupportedVersion(version));
    }

    let locale = if r.byte()? != 0 {
        let at = r.offset;
        let tag = r.string()?;
        Some(LocaleId::parse(&tag).map_err(|_| CompileError::BadLocale { offset: at })?)
    } else {
        None
    };
    let extra = r.pairs()?;

    let context_count = r.varint()? as usize;
    let mut contexts = Vec::with_capacity(context_count.min(4096));
    for _ in 0..context_count {
        let name = r.string()?;
        let message_count = r.varint()? as usize;
        let mut messages = Vec::with_capacity(message_count.min(4096));
        for _ in 0..message_count {
            messages.push(r.message()?);
        }
        contexts.push(Context { name, messages });
    }
    if r.offset != blob.len() {
        return Err(CompileError::Truncated { offset: r.offset });
    }
    Ok(Catalog {
        locale,
        contexts,
        extra,
    })
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

const FLAG_PLURAL: u8 = 1;
const FLAG_DISAMBIGUATION: u8 = 2;

fn status_byte(status: TranslationStatus) -> u8 {
    match status {
        TranslationStatus::Finished => 0,
        TranslationStatus::Unfinished => 1,
        TranslationStatus::Obsolete => 2,
        TranslationStatus::Vanished => 3,
    }
}

fn write_message(out: &mut Vec<u8>, message: &Message) {
    out.push(status_byte(message.status));
    let mut flags = 0u8;
    if message.plural {
        flags |= FLAG_PLURAL;
    }
    if message.disambiguation.is_some() {
        flags |= FLAG_DISAMBIGUATION;
    }
    out.push(flags);
    write_str(out, &message.source);
    if let Some(d) = &message.disambiguation {
        write_str(out, d);
    }
    write_varint(out, message.variants.len() as u32);
    for variant in &message.variants {
        write_str(out, variant);
    }
    write_varint(out, message.locations.len() as u32);
    for location in &message.locations {
        write_str(out, &location.origin);
        write_varint(out, location.line);
    }
    write_pairs(out, &message.extra);
}

fn write_pairs(out: &mut Vec<u8>, pairs: &[(String, String)]) {
    write_varint(out, pairs.len() as u32);
    for (k, v) in pairs {
        write_str(out, k);
        write_str(out, v);
    }
}

fn write_str(out: &mut Vec<u8>, s: &str) {
    write_varint(out, s.len() as u32);
    out.extend_from_slice(s.as_bytes());
}

fn write_varint(out: &mut Vec<u8>, mut value: u32) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

struct Reader<'a> {
    blob: &'a [u8],
    offset: usize,
}

impl Reader<'_> {
    fn truncated(&self) -> CompileError {
        CompileError::Truncated {
            offset: self.offset,
        }
    }

    fn byte(&mut self) -> Result<u8, CompileError> {
        let b = *self.blob.get(self.offset).ok_or_else(|| self.truncated())?;
        self.offset += 1;
        Ok(b)
    }

    fn bytes(&mut self, n: usize) -> Result<&[u8], CompileError> {
        let end = self.offset.checked_add(n).ok_or_else(|| self.truncated())?;
        let slice = self.blob.get(self.offset..end).ok_or_else(|| self.truncated())?;
        self.offset = end;
        Ok(slice)
    }

    fn varint(&mut self) -> Result<u32, CompileError> {
        let mut value = 0u32;
        for shift in (0..35).step_by(7) {
            let byte = self.byte()?;
            value |= u32::from(byte & 0x7f) << shift.min(31);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(self.truncated())
    }

    fn string(&mut self) -> Result<String, CompileError> {
        let len = self.varint()? as usize;
        let at = self.offset;
        let bytes = self.bytes(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|_| CompileError::InvalidUtf8 { offset: at })
    }

    fn pairs(&mut self) -> Result<Vec<(String, String)>, CompileError> {
        let count = self.varint()? as usize;
        let mut pairs = Vec::with_capacity(count.min(4096));
        for _ in 0..count {
            let k = self.string()?;
            let v = self.string()?;
            pairs.push((k, v));
        }
        Ok(pairs)
    }

    fn message(&mut self) -> Result<Message, CompileError> {
        let at = self.offset;
        let status = match self.byte()? {
            0 => TranslationStatus::Finished,
            1 => TranslationStatus::Unfinished,
            2 => TranslationStatus::Obsolete,
            3 => TranslationStatus::Vanished,
            value => return Err(CompileError::BadStatus { offset: at, value }),
        };
        let flags = self.byte()?;
        let source = self.string()?;
        let disambiguation = if flags & FLAG_DISAMBIGUATION != 0 {
            Some(self.string()?)
        } else {
            None
        };
        let variant_count = self.varint()? as usize;
        let mut variants = SmallVec::with_capacity(variant_count.min(8));
        for _ in 0..variant_count {
            variants.push(self.string()?);
        }
        let location_count = self.varint()? as usize;
        let mut locations = SmallVec::with_capacity(location_count.min(8));
        for _ in 0..location_count {
            let origin = self.string()?;
            let line = self.varint()?;
            locations.push(Location { origin, line });
        }
        let extra = self.pairs()?;
        Ok(Message {
            source,
            disambiguation,
            variants,
            status,
            plural: flags & FLAG_PLURAL != 0,
            locations,
            extra,
        })
    }
}
