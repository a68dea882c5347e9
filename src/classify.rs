// stringswap — Display-Time String Substitution for Legacy Win32 Applications
// Copyright (C) 2026  Martin Gehrken (IamLumae)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Decides whether an intercepted string is a translation candidate.

use std::sync::OnceLock;

use regex::Regex;

use crate::table::TranslationTable;

/// Which exclusion rules a dispatch slot applies before lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rules {
    pub ascii: bool,
    pub numeric_prefix: bool,
    pub path_prefix: bool,
}

impl Rules {
    pub const NONE: Rules = Rules { ascii: false, numeric_prefix: false, path_prefix: false };
    pub const ALL: Rules = Rules { ascii: true, numeric_prefix: true, path_prefix: true };
}

/// Why a string was never considered for translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusion {
    /// Pure ASCII: identifiers or already-English constants.
    Ascii,
    /// Two or three leading digits: item numbers, IDs.
    NumericPrefix,
    /// Starts with `.\`.
    PathPrefix,
    /// Not valid text in the declared encoding.
    Undecodable,
    /// Null, misaligned, or no terminator within the scan limit.
    Unreadable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification<'t> {
    Excluded(Exclusion),
    TranslatableHit(&'t str),
    TranslatableMiss,
}

fn numeric_prefix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // ASCII digits only; full-width numerals are prose.
    RE.get_or_init(|| Regex::new(r"^[0-9]{2,3}").expect("static pattern"))
}

fn path_prefix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\.\\").expect("static pattern"))
}

/// First enabled rule that rejects `text`.
pub fn exclusion(text: &str, rules: Rules) -> Option<Exclusion> {
    if rules.ascii && text.is_ascii() {
        return Some(Exclusion::Ascii);
    }
    if rules.numeric_prefix && numeric_prefix().is_match(text) {
        return Some(Exclusion::NumericPrefix);
    }
    if rules.path_prefix && path_prefix().is_match(text) {
        return Some(Exclusion::PathPrefix);
    }
    None
}

/// Exclusion rules first, exact lookup second.
pub fn classify<'t>(text: &str, rules: Rules, table: &'t TranslationTable) -> Classification<'t> {
    if let Some(reason) = exclusion(text, rules) {
        return Classification::Excluded(reason);
    }
    match table.lookup(text) {
        Some(target) => Classification::TranslatableHit(target),
        None => Classification::TranslatableMiss,
    }
}
