// stringswap — Display-Time String Substitution for Legacy Win32 Applications
// Copyright (C) 2026  Martin Gehrken (IamLumae)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Which intercepted calls carry text, and how each text slot is handled.
//!
//! The table is closed and static: every supported (API, message) pair maps
//! to one `Route`, and every route lists its text-bearing argument slots
//! with the codec, exclusion rules and rewrite strategy that apply.

use std::fmt;

use crate::classify::Rules;
use crate::codec::{CodePage, Encoding};

// ── Window messages ─────────────────────────────────
pub const WM_SETTEXT: u32 = 0x000C;
pub const CB_ADDSTRING: u32 = 0x0143;
pub const CB_INSERTSTRING: u32 = 0x0144;

/// Hooked user32 entry points. The discriminant is the id used over the C
/// ABI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Api {
    SendMessageA = 1,
    SendMessageW = 2,
    SetWindowTextA = 3,
    SetWindowTextW = 4,
    MessageBoxA = 5,
}

impl Api {
    pub const ALL: [Api; 5] = [
        Api::SendMessageA,
        Api::SendMessageW,
        Api::SetWindowTextA,
        Api::SetWindowTextW,
        Api::MessageBoxA,
    ];

    pub fn from_id(id: u32) -> Option<Api> {
        Api::ALL.into_iter().find(|api| *api as u32 == id)
    }

    pub fn name(self) -> &'static str {
        match self {
            Api::SendMessageA => "SendMessageA",
            Api::SendMessageW => "SendMessageW",
            Api::SetWindowTextA => "SetWindowTextA",
            Api::SetWindowTextW => "SetWindowTextW",
            Api::MessageBoxA => "MessageBoxA",
        }
    }

    /// Argument index of the window message, for APIs that take one.
    pub fn message_arg(self) -> Option<usize> {
        match self {
            Api::SendMessageA | Api::SendMessageW => Some(1),
            Api::SetWindowTextA | Api::SetWindowTextW | Api::MessageBoxA => None,
        }
    }

    /// Number of arguments the hook must hand over.
    pub fn arity(self) -> usize {
        match self {
            Api::SendMessageA | Api::SendMessageW | Api::MessageBoxA => 4,
            Api::SetWindowTextA | Api::SetWindowTextW => 2,
        }
    }
}

impl fmt::Display for Api {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Rewrite strategy, carrying the encoding it works in. In-place rewrites
/// only exist for narrow buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Caller-owned buffer: bounded overwrite, pointer unchanged.
    InPlace(CodePage),
    /// Callee copies from the pointer: swap in an engine-owned buffer.
    Substitute(Encoding),
}

/// How one text-bearing argument is processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotPlan {
    /// Index into the call's argument slots.
    pub arg: usize,
    /// Short name used in log lines.
    pub label: &'static str,
    pub rules: Rules,
    pub strategy: Strategy,
    /// Surface misses to the reporter.
    pub report_miss: bool,
    /// Apply the configured window-title prefix rewrites before lookup.
    pub title_prefixes: bool,
}

impl SlotPlan {
    /// Encoding the argument is read (and rewritten) in.
    pub fn encoding(&self) -> Encoding {
        match self.strategy {
            Strategy::InPlace(cp) => Encoding::Native(cp),
            Strategy::Substitute(encoding) => encoding,
        }
    }
}

const SJIS: CodePage = CodePage::ShiftJis;

const NARROW_MESSAGE: [SlotPlan; 1] = [SlotPlan {
    arg: 3,
    label: "lParam",
    rules: Rules::ALL,
    strategy: Strategy::InPlace(SJIS),
    report_miss: true,
    title_prefixes: false,
}];

const WIDE_MESSAGE: [SlotPlan; 1] = [SlotPlan {
    arg: 3,
    label: "lParam",
    rules: Rules::NONE,
    strategy: Strategy::Substitute(Encoding::Wide),
    report_miss: false,
    title_prefixes: false,
}];

const NARROW_WINDOW_TEXT: [SlotPlan; 1] = [SlotPlan {
    arg: 1,
    label: "lpString",
    rules: Rules { ascii: true, numeric_prefix: false, path_prefix: true },
    strategy: Strategy::InPlace(SJIS),
    report_miss: true,
    title_prefixes: true,
}];

const WIDE_WINDOW_TEXT: [SlotPlan; 1] = [SlotPlan {
    arg: 1,
    label: "lpString",
    rules: Rules::NONE,
    strategy: Strategy::Substitute(Encoding::Wide),
    report_miss: false,
    title_prefixes: false,
}];

const MESSAGE_BOX: [SlotPlan; 2] = [
    SlotPlan {
        arg: 1,
        label: "lpText",
        rules: Rules { ascii: true, numeric_prefix: true, path_prefix: false },
        strategy: Strategy::InPlace(SJIS),
        report_miss: true,
        title_prefixes: false,
    },
    SlotPlan {
        arg: 2,
        label: "lpCaption",
        rules: Rules::ALL,
        strategy: Strategy::InPlace(SJIS),
        report_miss: true,
        title_prefixes: false,
    },
];

/// Supported (API, message) combinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// `SendMessageA` with `WM_SETTEXT` / `CB_ADDSTRING` / `CB_INSERTSTRING`.
    NarrowMessage,
    /// `SendMessageW` with the same messages.
    WideMessage,
    NarrowWindowText,
    WideWindowText,
    /// `MessageBoxA`: text and caption, evaluated independently.
    MessageBox,
}

fn is_text_message(message: u32) -> bool {
    matches!(message, WM_SETTEXT | CB_ADDSTRING | CB_INSERTSTRING)
}

impl Route {
    /// `message` is only consulted for APIs that take one.
    pub fn resolve(api: Api, message: Option<u32>) -> Option<Route> {
        match api {
            Api::SendMessageA => message.filter(|&m| is_text_message(m)).map(|_| Route::NarrowMessage),
            Api::SendMessageW => message.filter(|&m| is_text_message(m)).map(|_| Route::WideMessage),
            Api::SetWindowTextA => Some(Route::NarrowWindowText),
            Api::SetWindowTextW => Some(Route::WideWindowText),
            Api::MessageBoxA => Some(Route::MessageBox),
        }
    }

    pub fn slots(self) -> &'static [SlotPlan] {
        match self {
            Route::NarrowMessage => &NARROW_MESSAGE,
            Route::WideMessage => &WIDE_MESSAGE,
            Route::NarrowWindowText => &NARROW_WINDOW_TEXT,
            Route::WideWindowText => &WIDE_WINDOW_TEXT,
            Route::MessageBox => &MESSAGE_BOX,
        }
    }
}
