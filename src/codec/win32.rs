// stringswap — Display-Time String Substitution for Legacy Win32 Applications
// Copyright (C) 2026  Martin Gehrken (IamLumae)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Win32 backend: the target process's own code page tables.

use windows::core::PCSTR;
use windows::Win32::Foundation::BOOL;
use windows::Win32::Globalization::{
    MultiByteToWideChar, WideCharToMultiByte, MB_ERR_INVALID_CHARS, WC_ERR_INVALID_CHARS,
    WC_NO_BEST_FIT_CHARS,
};

use super::{CodePage, WideConverter};

#[derive(Debug, Clone, Copy, Default)]
pub struct Win32;

impl WideConverter for Win32 {
    fn to_wide(&self, code_page: CodePage, src: &[u8], dst: Option<&mut [u16]>) -> i32 {
        if src.is_empty() {
            return 0;
        }
        // SAFETY: both slices carry their own lengths; the API never reads or
        // writes past them.
        unsafe { MultiByteToWideChar(code_page.id(), MB_ERR_INVALID_CHARS, src, dst) }
    }

    fn from_wide(&self, code_page: CodePage, src: &[u16], dst: Option<&mut [u8]>) -> i32 {
        if src.is_empty() {
            return 0;
        }
        match code_page {
            // CP_UTF8 rejects lpUsedDefaultChar; invalid surrogates fail instead.
            // SAFETY: both slices carry their own lengths; no default-char
            // pointers are passed.
            CodePage::Utf8 => unsafe {
                WideCharToMultiByte(
                    code_page.id(),
                    WC_ERR_INVALID_CHARS,
                    src,
                    dst,
                    PCSTR::null(),
                    None,
                )
            },
            CodePage::ShiftJis => {
                let mut used_default = BOOL(0);
                // SAFETY: as above; `used_default` outlives the call.
                let n = unsafe {
                    WideCharToMultiByte(
                        code_page.id(),
                        WC_NO_BEST_FIT_CHARS,
                        src,
                        dst,
                        PCSTR::null(),
                        Some(&mut used_default as *mut BOOL),
                    )
                };
                // A default char means the text was not representable.
                if used_default.as_bool() { 0 } else { n }
            }
        }
    }
}
