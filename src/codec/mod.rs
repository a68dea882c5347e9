// stringswap — Display-Time String Substitution for Legacy Win32 Applications
// Copyright (C) 2026  Martin Gehrken (IamLumae)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Native ↔ canonical text conversion.
//!
//! Narrow text always travels through UTF-16, the same way the platform API
//! does it: native bytes → UTF-16 → UTF-8 on the way in, and the reverse on
//! the way out. Every stage first probes the destination size (no output
//! buffer), allocates exactly that many destination units, then converts.

mod portable;
#[cfg(windows)]
mod win32;

pub use portable::Portable;
#[cfg(windows)]
pub use win32::Win32;

use crate::error::{DecodeError, EncodeError};

/// Code pages the engine is contracted to handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum CodePage {
    /// Japanese Shift-JIS (Windows code page 932).
    ShiftJis = 932,
    /// UTF-8 (Windows code page 65001), the canonical form.
    Utf8 = 65001,
}

impl CodePage {
    pub fn id(self) -> u32 {
        self as u32
    }

    /// Width in bytes of the character starting with `lead`.
    pub fn char_width(self, lead: u8) -> usize {
        match self {
            CodePage::ShiftJis => match lead {
                0x81..=0x9F | 0xE0..=0xFC => 2,
                _ => 1,
            },
            CodePage::Utf8 => match lead {
                0xF0..=0xF7 => 4,
                0xE0..=0xEF => 3,
                0xC0..=0xDF => 2,
                _ => 1,
            },
        }
    }

    /// Longest prefix of `bytes` that fits in `limit` without splitting a
    /// multi-byte character.
    pub fn boundary_at_most(self, bytes: &[u8], limit: usize) -> usize {
        let mut i = 0;
        while i < bytes.len() {
            let w = self.char_width(bytes[i]);
            if i + w > limit {
                break;
            }
            i += w;
        }
        i.min(bytes.len())
    }
}

/// Destination encoding of an intercepted argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Narrow `*A` APIs: single/double-byte code page units.
    Native(CodePage),
    /// Wide `*W` APIs: UTF-16 units.
    Wide,
}

/// The platform's two conversion primitives, shaped like
/// `MultiByteToWideChar` / `WideCharToMultiByte`.
///
/// With `dst == None` the call is a probe and returns the number of
/// destination units required. With a buffer it returns the units written.
/// Anything `<= 0` means the input was rejected (invalid sequence,
/// unrepresentable character, or a destination that is too small).
pub trait WideConverter: Send + Sync {
    fn to_wide(&self, code_page: CodePage, src: &[u8], dst: Option<&mut [u16]>) -> i32;
    fn from_wide(&self, code_page: CodePage, src: &[u16], dst: Option<&mut [u8]>) -> i32;
}

/// The converter matching the host: Win32 on Windows, encoding_rs elsewhere.
pub fn platform() -> &'static dyn WideConverter {
    #[cfg(windows)]
    {
        static CONVERTER: Win32 = Win32;
        &CONVERTER
    }
    #[cfg(not(windows))]
    {
        static CONVERTER: Portable = Portable;
        &CONVERTER
    }
}

/// Encoded replacement text. Both variants physically end with one
/// terminator unit; `len()` does not count it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Encoded {
    Narrow(Vec<u8>),
    Wide(Vec<u16>),
}

impl Encoded {
    /// Units before the terminator.
    pub fn len(&self) -> usize {
        match self {
            Encoded::Narrow(b) => b.len().saturating_sub(1),
            Encoded::Wide(w) => w.len().saturating_sub(1),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ── Two-stage helpers ───────────────────────────────

/// One conversion stage: probe, allocate exactly, convert.
fn stage<U: Copy + Default>(mut convert: impl FnMut(Option<&mut [U]>) -> i32) -> Option<Vec<U>> {
    let needed = usize::try_from(convert(None)).ok().filter(|&n| n > 0)?;
    let mut buf = vec![U::default(); needed];
    let written = usize::try_from(convert(Some(&mut buf))).ok().filter(|&n| n > 0)?;
    buf.truncate(written);
    Some(buf)
}

/// Decodes native bytes (terminator excluded) into canonical text.
pub fn decode(
    conv: &dyn WideConverter,
    bytes: &[u8],
    code_page: CodePage,
) -> Result<String, DecodeError> {
    if bytes.is_empty() {
        return Ok(String::new());
    }
    let wide = stage(|dst| conv.to_wide(code_page, bytes, dst))
        .ok_or(DecodeError::ToWide { code_page })?;
    let utf8 = stage(|dst| conv.from_wide(CodePage::Utf8, &wide, dst))
        .ok_or(DecodeError::FromWide)?;
    String::from_utf8(utf8).map_err(|_| DecodeError::FromWide)
}

/// Reinterprets a wide argument. Unpaired surrogates are reported, never
/// replaced.
pub fn decode_wide(units: &[u16]) -> Result<String, DecodeError> {
    let mut out = String::with_capacity(units.len());
    let mut offset = 0;
    for r in char::decode_utf16(units.iter().copied()) {
        match r {
            Ok(c) => {
                offset += c.len_utf16();
                out.push(c);
            }
            Err(_) => return Err(DecodeError::MalformedWide(offset)),
        }
    }
    Ok(out)
}

/// Encodes canonical text into native bytes, terminator appended.
pub fn encode_native(
    conv: &dyn WideConverter,
    text: &str,
    code_page: CodePage,
) -> Result<Vec<u8>, EncodeError> {
    if text.contains('\0') {
        return Err(EncodeError::InteriorNul);
    }
    if text.is_empty() {
        return Ok(vec![0]);
    }
    let wide = stage(|dst| conv.to_wide(CodePage::Utf8, text.as_bytes(), dst))
        .ok_or(EncodeError::ToWide)?;
    let mut native = stage(|dst| conv.from_wide(code_page, &wide, dst))
        .ok_or(EncodeError::Unrepresentable { code_page })?;
    native.push(0);
    Ok(native)
}

/// Encodes canonical text into UTF-16, terminator appended.
pub fn encode_wide(text: &str) -> Result<Vec<u16>, EncodeError> {
    if text.contains('\0') {
        return Err(EncodeError::InteriorNul);
    }
    let mut wide: Vec<u16> = text.encode_utf16().collect();
    wide.push(0);
    Ok(wide)
}

pub fn encode(
    conv: &dyn WideConverter,
    text: &str,
    encoding: Encoding,
) -> Result<Encoded, EncodeError> {
    match encoding {
        Encoding::Native(cp) => encode_native(conv, text, cp).map(Encoded::Narrow),
        Encoding::Wide => encode_wide(text).map(Encoded::Wide),
    }
}
