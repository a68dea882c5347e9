// stringswap — Display-Time String Substitution for Legacy Win32 Applications
// Copyright (C) 2026  Martin Gehrken (IamLumae)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Display-time string substitution for legacy Win32 applications.
//!
//! Text arguments of a handful of user32 calls are decoded from Shift-JIS
//! (or taken as UTF-16), looked up in a translation table, and rewritten
//! before the original call sees them. Nothing here may fail the call: any
//! problem lets the original text through.

pub mod buffer;
pub mod classify;
pub mod codec;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod ffi;
pub mod report;
pub mod rewrite;
pub mod table;

pub use classify::{classify, Classification, Exclusion, Rules};
pub use codec::{CodePage, Encoding, WideConverter};
pub use config::Config;
pub use dispatch::{Api, Route, SlotPlan, Strategy};
pub use engine::{Engine, InterceptedCall, Outcome};
pub use report::{LogReporter, MissRecorder, MissStore, Reporter, RingLogger};
pub use table::TranslationTable;
