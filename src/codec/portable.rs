// stringswap — Display-Time String Substitution for Legacy Win32 Applications
// Copyright (C) 2026  Martin Gehrken (IamLumae)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! encoding_rs backend. Used off Windows and by the test suite.

use encoding_rs::{DecoderResult, EncoderResult, SHIFT_JIS, UTF_8};

use super::{CodePage, WideConverter};

/// Strict conversions through `encoding_rs`: malformed input and
/// unmappable characters are rejected, never replaced.
#[derive(Debug, Clone, Copy, Default)]
pub struct Portable;

fn encoding_for(code_page: CodePage) -> &'static encoding_rs::Encoding {
    match code_page {
        CodePage::ShiftJis => SHIFT_JIS,
        CodePage::Utf8 => UTF_8,
    }
}

fn to_utf16(code_page: CodePage, src: &[u8]) -> Option<Vec<u16>> {
    let mut decoder = encoding_for(code_page).new_decoder_without_bom_handling();
    let mut out = vec![0u16; decoder.max_utf16_buffer_length(src.len())?];
    let (result, _, written) = decoder.decode_to_utf16_without_replacement(src, &mut out, true);
    match result {
        DecoderResult::InputEmpty => {
            out.truncate(written);
            Some(out)
        }
        DecoderResult::OutputFull | DecoderResult::Malformed(..) => None,
    }
}

fn from_utf16(code_page: CodePage, src: &[u16]) -> Option<Vec<u8>> {
    match code_page {
        CodePage::Utf8 => String::from_utf16(src).ok().map(String::into_bytes),
        CodePage::ShiftJis => {
            let mut encoder = SHIFT_JIS.new_encoder();
            let cap = encoder.max_buffer_length_from_utf16_without_replacement(src.len())?;
            let mut out = vec![0u8; cap];
            let (result, _, written) =
                encoder.encode_from_utf16_without_replacement(src, &mut out, true);
            match result {
                EncoderResult::InputEmpty => {
                    out.truncate(written);
                    Some(out)
                }
                EncoderResult::OutputFull | EncoderResult::Unmappable(_) => None,
            }
        }
    }
}

/// Probe/convert contract shared by both directions.
fn deliver<U: Copy>(converted: Option<Vec<U>>, dst: Option<&mut [U]>) -> i32 {
    let Some(units) = converted else { return 0 };
    let Ok(count) = i32::try_from(units.len()) else { return 0 };
    match dst {
        None => count,
        Some(dst) if dst.len() >= units.len() => {
            dst[..units.len()].copy_from_slice(&units);
            count
        }
        Some(_) => 0,
    }
}

impl WideConverter for Portable {
    fn to_wide(&self, code_page: CodePage, src: &[u8], dst: Option<&mut [u16]>) -> i32 {
        deliver(to_utf16(code_page, src), dst)
    }

    fn from_wide(&self, code_page: CodePage, src: &[u16], dst: Option<&mut [u8]>) -> i32 {
        deliver(from_utf16(code_page, src), dst)
    }
}
