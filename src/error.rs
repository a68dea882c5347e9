// stringswap — Display-Time String Substitution for Legacy Win32 Applications
// Copyright (C) 2026  Martin Gehrken (IamLumae)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Error types for every fallible boundary of the engine.
//!
//! None of these ever reach the intercepted call: the engine turns each one
//! into "leave the original text alone" plus a log line.

use thiserror::Error;

use crate::codec::CodePage;

/// Foreign bytes are not valid text in the declared encoding.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("{code_page:?} -> UTF-16 conversion rejected the input")]
    ToWide { code_page: CodePage },
    #[error("UTF-16 -> UTF-8 conversion rejected the input")]
    FromWide,
    #[error("malformed UTF-16 code unit at index {0}")]
    MalformedWide(usize),
}

/// Canonical text cannot be represented in the destination encoding.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("UTF-8 -> UTF-16 conversion failed")]
    ToWide,
    #[error("text is not representable in {code_page:?}")]
    Unrepresentable { code_page: CodePage },
    #[error("text contains an interior NUL")]
    InteriorNul,
}

/// Terminator scan over a foreign region.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ScanError {
    #[error("null pointer")]
    Null,
    #[error("wide pointer is not 2-byte aligned")]
    Misaligned,
    #[error("no terminator within {limit} units")]
    Unterminated { limit: usize },
}

/// A rewrite strategy gave up; the original argument stays in place.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RewriteError {
    #[error("encode failed: {0}")]
    Encode(#[from] EncodeError),
    #[error("could not allocate {0} bytes for the replacement")]
    Allocation(usize),
    #[error("write of {len} units exceeds trusted capacity {capacity}")]
    Capacity { len: usize, capacity: usize },
}

/// Loading a translation table.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: expected `source<TAB>target`")]
    Malformed { line: usize },
}

/// The miss store could not record or read an entry.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("miss store lock poisoned")]
    Poisoned,
    #[error("miss writer thread: {0}")]
    Spawn(#[from] std::io::Error),
}
