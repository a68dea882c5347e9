// stringswap — Display-Time String Substitution for Legacy Win32 Applications
// Copyright (C) 2026  Martin Gehrken (IamLumae)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The two ways a translation reaches the intercepted call.
//!
//! * In-place overwrite for arguments the caller owns and may keep using:
//!   the replacement is padded or cut to exactly the origin length and
//!   re-terminated. Nothing past `origin_len + 1` is ever touched.
//! * Substitution for arguments the callee only copies from: a fresh,
//!   engine-owned buffer replaces the pointer in the argument slot.

use crate::buffer::NativeBuffer;
use crate::codec::{self, CodePage, Encoded, Encoding, WideConverter};
use crate::error::RewriteError;

/// Padding unit for short replacements.
pub const FILLER: u8 = b' ';

/// What an in-place overwrite did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overwrite {
    /// Replacement units written.
    pub kept: usize,
    /// Filler units appended after them.
    pub padded: usize,
    /// Replacement units that did not fit and were never written.
    pub dropped: usize,
}

/// Exactly `origin_len` units of content followed by one terminator.
///
/// A double-byte character straddling the limit is dropped whole and its
/// space filled with padding.
pub fn stage_overwrite(replacement: &[u8], origin_len: usize, code_page: CodePage) -> (Vec<u8>, Overwrite) {
    let kept = code_page.boundary_at_most(replacement, origin_len);
    let mut out = Vec::with_capacity(origin_len + 1);
    out.extend_from_slice(&replacement[..kept]);
    out.resize(origin_len, FILLER);
    out.push(0);
    let info = Overwrite { kept, padded: origin_len - kept, dropped: replacement.len() - kept };
    (out, info)
}

/// Bounded in-place overwrite of a caller-owned narrow buffer.
///
/// The buffer is untouched unless the whole replacement could be staged.
pub fn overwrite_in_place(
    conv: &dyn WideConverter,
    buffer: &mut NativeBuffer<'_>,
    replacement: &str,
    code_page: CodePage,
) -> Result<Overwrite, RewriteError> {
    let encoded = codec::encode_native(conv, replacement, code_page)?;
    let body = &encoded[..encoded.len() - 1];
    let (staged, info) = stage_overwrite(body, buffer.origin_len(), code_page);
    buffer.write_bounded(&staged)?;
    Ok(info)
}

/// A replacement argument owned by the engine. Must stay alive until the
/// intercepted call has returned.
#[derive(Debug, PartialEq, Eq)]
pub enum Substitution {
    Narrow(Box<[u8]>),
    Wide(Box<[u16]>),
}

impl Substitution {
    /// Value to store into the argument slot.
    pub fn addr(&self) -> usize {
        match self {
            Substitution::Narrow(b) => b.as_ptr() as usize,
            Substitution::Wide(w) => w.as_ptr() as usize,
        }
    }

    /// Units before the terminator.
    pub fn len(&self) -> usize {
        match self {
            Substitution::Narrow(b) => b.len() - 1,
            Substitution::Wide(w) => w.len() - 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn alloc_exact<T: Copy>(units: &[T]) -> Result<Box<[T]>, RewriteError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(units.len())
        .map_err(|_| RewriteError::Allocation(std::mem::size_of_val(units)))?;
    buf.extend_from_slice(units);
    Ok(buf.into_boxed_slice())
}

/// Encodes `replacement` into a fresh buffer sized to text plus terminator.
pub fn substitute(
    conv: &dyn WideConverter,
    replacement: &str,
    encoding: Encoding,
) -> Result<Substitution, RewriteError> {
    match codec::encode(conv, replacement, encoding)? {
        Encoded::Narrow(bytes) => alloc_exact(&bytes).map(Substitution::Narrow),
        Encoded::Wide(units) => alloc_exact(&units).map(Substitution::Wide),
    }
}
