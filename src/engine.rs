// stringswap — Display-Time String Substitution for Legacy Win32 Applications
// Copyright (C) 2026  Martin Gehrken (IamLumae)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The per-call pipeline: resolve route → read → decode → classify → lookup →
//! rewrite. Runs synchronously on the intercepted thread and never fails the
//! call: every problem ends as "original text goes through" plus a log line.

use std::borrow::Cow;

use log::{debug, warn};

use crate::buffer::{NativeBuffer, WideArg};
use crate::classify::{classify, Classification, Exclusion};
use crate::codec::{self, CodePage, Encoding, WideConverter};
use crate::config::Config;
use crate::dispatch::{Api, Route, SlotPlan, Strategy};
use crate::error::{RewriteError, ScanError, TableError};
use crate::report::{LogReporter, MissRecorder, Reporter};
use crate::rewrite::{self, Overwrite, Substitution};
use crate::table::TranslationTable;

/// One intercepted call: which API, and its argument slots as machine words.
///
/// Substitution buffers created while handling the call are owned here and
/// must outlive the original call; take them with [`InterceptedCall::finish`]
/// and drop them once the call has returned.
#[derive(Debug)]
pub struct InterceptedCall<'a> {
    api: Api,
    args: &'a mut [usize],
    substitutions: Vec<Substitution>,
}

impl<'a> InterceptedCall<'a> {
    pub fn new(api: Api, args: &'a mut [usize]) -> Self {
        Self { api, args, substitutions: Vec::new() }
    }

    pub fn api(&self) -> Api {
        self.api
    }

    /// Window message, for APIs that take one.
    pub fn message(&self) -> Option<u32> {
        let idx = self.api.message_arg()?;
        self.args.get(idx).map(|&m| m as u32)
    }

    pub fn args(&self) -> &[usize] {
        self.args
    }

    pub fn finish(self) -> Vec<Substitution> {
        self.substitutions
    }
}

/// What happened to one text slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Skipped(Exclusion),
    /// Translatable, but not in the table.
    Missing,
    Overwritten(Overwrite),
    /// Argument slot now points at an engine-owned buffer of `units` units.
    Substituted { units: usize },
    /// Hit, but the replacement is outside the substitution-safe subset.
    NotSubstitutable,
    Failed(RewriteError),
}

/// Everything a call needs, immutable after construction.
pub struct Engine {
    table: TranslationTable,
    config: Config,
    reporter: Box<dyn Reporter>,
    converter: &'static dyn WideConverter,
}

impl Engine {
    pub fn new(table: TranslationTable, config: Config, reporter: Box<dyn Reporter>) -> Self {
        for (source, target) in table.oversized() {
            warn!("TOO LONG: \"{source}\" -> \"{target}\"");
        }
        Self { table, config, reporter, converter: codec::platform() }
    }

    /// Loads the table from `config.table_path` and records misses next to it
    /// through a writer thread.
    pub fn from_config(config: Config) -> Result<Self, TableError> {
        let table = TranslationTable::load(&config.table_path)?;
        let reporter: Box<dyn Reporter> = match MissRecorder::open(&config.miss_db_path()) {
            Ok(store) => Box::new(store),
            Err(e) => {
                warn!("miss store unavailable, logging only: {e}");
                Box::new(LogReporter)
            }
        };
        debug!("table loaded: {} entries from {}", table.len(), config.table_path.display());
        Ok(Self::new(table, config, reporter))
    }

    pub fn with_converter(mut self, converter: &'static dyn WideConverter) -> Self {
        self.converter = converter;
        self
    }

    pub fn table(&self) -> &TranslationTable {
        &self.table
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs the pipeline for every text slot of `call`. Returns one outcome
    /// per slot of the route, or nothing when the call carries no text.
    ///
    /// # Safety
    ///
    /// Every argument slot named by the route must hold null or a pointer
    /// valid under the intercepted API's contract: readable up to its
    /// terminator and, for narrow in-place slots, writable up to it.
    pub unsafe fn on_enter(&self, call: &mut InterceptedCall<'_>) -> Vec<Outcome> {
        let Some(route) = Route::resolve(call.api, call.message()) else {
            return Vec::new();
        };
        let api = call.api;
        let mut outcomes = Vec::with_capacity(route.slots().len());
        for plan in route.slots() {
            let Some(slot) = call.args.get_mut(plan.arg) else {
                outcomes.push(Outcome::Skipped(Exclusion::Unreadable));
                continue;
            };
            let outcome = match plan.strategy {
                Strategy::InPlace(code_page) => unsafe { self.overwrite_slot(api, plan, code_page, *slot) },
                Strategy::Substitute(encoding) => {
                    match unsafe { self.substitute_slot(api, plan, encoding, *slot) } {
                        Ok(sub) => {
                            *slot = sub.addr();
                            let units = sub.len();
                            call.substitutions.push(sub);
                            Outcome::Substituted { units }
                        }
                        Err(outcome) => outcome,
                    }
                }
            };
            outcomes.push(outcome);
        }
        outcomes
    }

    // ── Strategies ──────────────────────────────────

    unsafe fn overwrite_slot(&self, api: Api, plan: &SlotPlan, code_page: CodePage, ptr: usize) -> Outcome {
        let mut buffer = match unsafe { NativeBuffer::from_raw(ptr as *mut u8, self.config.scan_limit) } {
            Ok(b) => b,
            Err(e) => return self.unreadable(api, plan, e),
        };
        let text = match codec::decode(self.converter, buffer.contents(), code_page) {
            Ok(t) => t,
            Err(e) => {
                debug!("{api} {}: skipped, {e}", plan.label);
                return Outcome::Skipped(Exclusion::Undecodable);
            }
        };
        let replacement = match self.decide(api, plan, &text) {
            Ok(r) => r,
            Err(outcome) => return outcome,
        };
        match rewrite::overwrite_in_place(self.converter, &mut buffer, &replacement, code_page) {
            Ok(info) => {
                debug!("{api} {}: \"{text}\" -> \"{replacement}\" ({info:?})", plan.label);
                Outcome::Overwritten(info)
            }
            Err(e) => self.failed(api, e),
        }
    }

    unsafe fn substitute_slot(
        &self,
        api: Api,
        plan: &SlotPlan,
        encoding: Encoding,
        ptr: usize,
    ) -> Result<Substitution, Outcome> {
        let limit = self.config.scan_limit;
        let decoded = match encoding {
            Encoding::Native(code_page) => {
                let buffer = unsafe { NativeBuffer::from_raw(ptr as *mut u8, limit) }
                    .map_err(|e| self.unreadable(api, plan, e))?;
                codec::decode(self.converter, buffer.contents(), code_page)
            }
            Encoding::Wide => {
                let arg = unsafe { WideArg::from_raw(ptr as *const u16, limit) }
                    .map_err(|e| self.unreadable(api, plan, e))?;
                codec::decode_wide(arg.units())
            }
        };
        let text = decoded.map_err(|e| {
            debug!("{api} {}: skipped, {e}", plan.label);
            Outcome::Skipped(Exclusion::Undecodable)
        })?;
        let replacement = self.decide(api, plan, &text)?;
        if !replacement.is_ascii() {
            debug!("{api} {}: \"{replacement}\" is not substitution-safe", plan.label);
            return Err(Outcome::NotSubstitutable);
        }
        rewrite::substitute(self.converter, &replacement, encoding).map_err(|e| self.failed(api, e))
    }

    // ── Decision ────────────────────────────────────

    /// Replacement text for `text`, or the outcome that ends the slot.
    fn decide<'t>(&'t self, api: Api, plan: &SlotPlan, text: &str) -> Result<Cow<'t, str>, Outcome> {
        let classification = classify(text, plan.rules, &self.table);
        match (classification, self.retitle(plan, text)) {
            (Classification::Excluded(reason), _) => Err(Outcome::Skipped(reason)),
            (_, Some(retitled)) => Ok(Cow::Owned(retitled)),
            (Classification::TranslatableHit(target), None) => Ok(Cow::Borrowed(target)),
            (Classification::TranslatableMiss, None) => {
                if plan.report_miss {
                    self.reporter.missing(api, text);
                }
                Err(Outcome::Missing)
            }
        }
    }

    /// First matching window-title prefix, swapped.
    fn retitle(&self, plan: &SlotPlan, text: &str) -> Option<String> {
        if !plan.title_prefixes {
            return None;
        }
        self.config
            .title_prefixes
            .iter()
            .find(|(from, _)| !from.is_empty() && text.starts_with(from.as_str()))
            .map(|(from, to)| format!("{to}{}", &text[from.len()..]))
    }

    fn unreadable(&self, api: Api, plan: &SlotPlan, e: ScanError) -> Outcome {
        if e != ScanError::Null {
            debug!("{api} {}: skipped, {e}", plan.label);
        }
        Outcome::Skipped(Exclusion::Unreadable)
    }

    fn failed(&self, api: Api, e: RewriteError) -> Outcome {
        self.reporter.rewrite_failed(api, &e);
        Outcome::Failed(e)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::codec::{encode_native, Portable};
    use crate::dispatch::{CB_ADDSTRING, WM_SETTEXT};

    #[derive(Default)]
    struct Recorded {
        missing: Vec<(Api, String)>,
        failed: Vec<(Api, RewriteError)>,
    }

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Recorded>>);

    impl Reporter for Recorder {
        fn missing(&self, api: Api, text: &str) {
            self.0.lock().unwrap().missing.push((api, text.to_string()));
        }
        fn rewrite_failed(&self, api: Api, error: &RewriteError) {
            self.0.lock().unwrap().failed.push((api, error.clone()));
        }
    }

    fn engine(pairs: &[(&str, &str)]) -> (Engine, Recorder) {
        let recorder = Recorder::default();
        let table = TranslationTable::from_pairs(pairs.iter().copied());
        let engine = Engine::new(table, Config::in_dir("unused"), Box::new(recorder.clone()))
            .with_converter(&Portable);
        (engine, recorder)
    }

    fn sjis(text: &str) -> Vec<u8> {
        encode_native(&Portable, text, CodePage::ShiftJis).unwrap()
    }

    fn wide(text: &str) -> Vec<u16> {
        codec::encode_wide(text).unwrap()
    }

    fn send_message_a(engine: &Engine, msg: u32, buf: &mut [u8]) -> (Vec<Outcome>, Vec<Substitution>) {
        let mut args = [0x1000, msg as usize, 0, buf.as_mut_ptr() as usize];
        let mut call = InterceptedCall::new(Api::SendMessageA, &mut args);
        let outcomes = unsafe { engine.on_enter(&mut call) };
        (outcomes, call.finish())
    }

    #[test]
    fn scenario_a_pads_to_origin_length() {
        // 10 double-byte characters = 20 units.
        let key = "アタックでダメージ時";
        let raw = sjis(key);
        assert_eq!(raw.len() - 1, 20);
        let (engine, _) = engine(&[(key, "atk hi")]);
        let mut buf = raw.clone();
        let (outcomes, subs) = send_message_a(&engine, WM_SETTEXT, &mut buf);
        assert_eq!(outcomes, vec![Outcome::Overwritten(Overwrite { kept: 6, padded: 14, dropped: 0 })]);
        assert!(subs.is_empty());
        assert_eq!(&buf[..6], b"atk hi");
        assert!(buf[6..20].iter().all(|&b| b == b' '));
        assert_eq!(buf[20], 0);
    }

    #[test]
    fn scenario_b_truncates_to_origin_length() {
        let key = "アタックでダメージ時";
        let target = "atk dmg when hit (pwr!=0)";
        assert_eq!(target.len(), 25);
        let (engine, _) = engine(&[(key, target)]);
        let mut buf = sjis(key);
        buf.extend_from_slice(&[0xEE; 8]);
        let (outcomes, _) = send_message_a(&engine, CB_ADDSTRING, &mut buf);
        assert_eq!(outcomes, vec![Outcome::Overwritten(Overwrite { kept: 20, padded: 0, dropped: 5 })]);
        assert_eq!(&buf[..20], &target.as_bytes()[..20]);
        assert_eq!(buf[20], 0);
        assert!(buf[21..].iter().all(|&b| b == 0xEE));
    }

    #[test]
    fn scenario_c_invalid_bytes_are_left_alone() {
        let (engine, rec) = engine(&[("x", "y")]);
        // Lead byte followed by an invalid trail byte.
        let mut buf = vec![0x82, 0x20, 0x81, 0x7F, 0x85, 0];
        let before = buf.clone();
        let (outcomes, _) = send_message_a(&engine, WM_SETTEXT, &mut buf);
        assert_eq!(outcomes, vec![Outcome::Skipped(Exclusion::Undecodable)]);
        assert_eq!(buf, before);
        assert!(rec.0.lock().unwrap().missing.is_empty());
    }

    #[test]
    fn scenario_d_wide_hit_substitutes() {
        let (engine, _) = engine(&[("ジャンプ", "Jump")]);
        let original = wide("ジャンプ");
        let before = original.clone();
        let orig_ptr = original.as_ptr() as usize;
        let mut args = [0x1000, orig_ptr];
        let mut call = InterceptedCall::new(Api::SetWindowTextW, &mut args);
        let outcomes = unsafe { engine.on_enter(&mut call) };
        let new_ptr = call.args()[1];
        let subs = call.finish();
        assert_eq!(outcomes, vec![Outcome::Substituted { units: 4 }]);
        assert_ne!(new_ptr, orig_ptr);
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].addr(), new_ptr);
        let arg = unsafe { WideArg::from_raw(new_ptr as *const u16, 64) }.unwrap();
        assert_eq!(codec::decode_wide(arg.units()).unwrap(), "Jump");
        assert_eq!(original, before);
    }

    #[test]
    fn wide_hit_outside_ascii_is_not_substituted() {
        let (engine, _) = engine(&[("÷", "÷")]);
        let original = wide("÷");
        let mut args = [0x1000, WM_SETTEXT as usize, 0, original.as_ptr() as usize];
        let mut call = InterceptedCall::new(Api::SendMessageW, &mut args);
        let outcomes = unsafe { engine.on_enter(&mut call) };
        assert_eq!(outcomes, vec![Outcome::NotSubstitutable]);
        assert_eq!(call.args()[3], original.as_ptr() as usize);
    }

    #[test]
    fn wide_miss_is_silent_and_malformed_is_excluded() {
        let (engine, rec) = engine(&[]);
        let missing = wide("未知");
        let mut args = [0, missing.as_ptr() as usize];
        let mut call = InterceptedCall::new(Api::SetWindowTextW, &mut args);
        assert_eq!(unsafe { engine.on_enter(&mut call) }, vec![Outcome::Missing]);
        assert!(rec.0.lock().unwrap().missing.is_empty());

        let malformed: Vec<u16> = vec![0x30A2, 0xDC00, 0];
        let mut args = [0, malformed.as_ptr() as usize];
        let mut call = InterceptedCall::new(Api::SetWindowTextW, &mut args);
        assert_eq!(unsafe { engine.on_enter(&mut call) }, vec![Outcome::Skipped(Exclusion::Undecodable)]);
    }

    #[test]
    fn narrow_miss_is_reported() {
        let (engine, rec) = engine(&[]);
        let mut buf = sjis("ワールドクリア");
        let (outcomes, _) = send_message_a(&engine, CB_ADDSTRING, &mut buf);
        assert_eq!(outcomes, vec![Outcome::Missing]);
        let rec = rec.0.lock().unwrap();
        assert_eq!(rec.missing, vec![(Api::SendMessageA, "ワールドクリア".to_string())]);
    }

    #[test]
    fn unrelated_message_is_ignored() {
        let (engine, _) = engine(&[("ジャンプ", "Jump")]);
        let mut buf = sjis("ジャンプ");
        let before = buf.clone();
        let (outcomes, _) = send_message_a(&engine, 0x0010, &mut buf);
        assert!(outcomes.is_empty());
        assert_eq!(buf, before);
    }

    #[test]
    fn excluded_strings_never_reach_lookup() {
        let (engine, rec) = engine(&[("01 敵", "01 en"), ("Hello", "Hallo")]);
        for text in ["01 敵", "Hello"] {
            let mut buf = sjis(text);
            let before = buf.clone();
            let (outcomes, _) = send_message_a(&engine, WM_SETTEXT, &mut buf);
            assert!(matches!(outcomes[..], [Outcome::Skipped(_)]));
            assert_eq!(buf, before);
        }
        assert!(rec.0.lock().unwrap().missing.is_empty());
    }

    #[test]
    fn null_argument_is_skipped() {
        let (engine, _) = engine(&[]);
        let mut args = [0, 0];
        let mut call = InterceptedCall::new(Api::SetWindowTextA, &mut args);
        assert_eq!(unsafe { engine.on_enter(&mut call) }, vec![Outcome::Skipped(Exclusion::Unreadable)]);
    }

    #[test]
    fn title_prefix_is_swapped_before_lookup() {
        let (engine, rec) = engine(&[]);
        // 10 double-byte characters + 11 single-byte = 31 units.
        let mut buf = sjis("アクションエディター4 - stage01");
        assert_eq!(buf.len(), 32);
        let mut args = [0, buf.as_mut_ptr() as usize];
        let mut call = InterceptedCall::new(Api::SetWindowTextA, &mut args);
        let outcomes = unsafe { engine.on_enter(&mut call) };
        assert!(matches!(outcomes[..], [Outcome::Overwritten(_)]));
        let expected = format!("{:<31}", "Aquedi4 - stage01");
        assert_eq!(&buf[..31], expected.as_bytes());
        assert_eq!(buf[31], 0);
        assert!(rec.0.lock().unwrap().missing.is_empty());
    }

    #[test]
    fn message_box_slots_are_independent() {
        let (engine, rec) = engine(&[("削除しますか？", "Delete?"), ("確認", "Confirm")]);
        let mut text = sjis("削除しますか？");
        let mut caption = sjis(".\\確認");
        let mut args = [0, text.as_mut_ptr() as usize, caption.as_mut_ptr() as usize, 0x40];
        let mut call = InterceptedCall::new(Api::MessageBoxA, &mut args);
        let outcomes = unsafe { engine.on_enter(&mut call) };
        assert!(matches!(outcomes[0], Outcome::Overwritten(_)));
        assert_eq!(outcomes[1], Outcome::Skipped(Exclusion::PathPrefix));
        assert!(text.starts_with(b"Delete?"));
        assert_eq!(caption, sjis(".\\確認"));
        assert!(rec.0.lock().unwrap().missing.is_empty());
    }

    #[test]
    fn unrepresentable_replacement_is_reported_and_original_kept() {
        let (engine, rec) = engine(&[("ジャンプ", "점프")]);
        let mut buf = sjis("ジャンプ");
        let before = buf.clone();
        let (outcomes, _) = send_message_a(&engine, WM_SETTEXT, &mut buf);
        assert!(matches!(outcomes[..], [Outcome::Failed(RewriteError::Encode(_))]));
        assert_eq!(buf, before);
        assert_eq!(rec.0.lock().unwrap().failed.len(), 1);
    }

    #[test]
    fn short_argument_list_is_tolerated() {
        let (engine, _) = engine(&[]);
        let mut args = [0, WM_SETTEXT as usize];
        let mut call = InterceptedCall::new(Api::SendMessageA, &mut args);
        assert_eq!(unsafe { engine.on_enter(&mut call) }, vec![Outcome::Skipped(Exclusion::Unreadable)]);
    }
}
