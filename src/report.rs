// stringswap — Display-Time String Substitution for Legacy Win32 Applications
// Copyright (C) 2026  Martin Gehrken (IamLumae)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Where misses and failures go: the `log` facade (backed by a small ring
//! buffer flushed to disk) and an optional SQLite store of untranslated
//! strings.
//!
//! Reporters run on the intercepted thread, so neither touches the disk
//! there: misses and log lines are queued to writer threads, and dropped when
//! the queue is full.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, info, warn, Level, LevelFilter, Log, Metadata, Record};
use rusqlite::{params, Connection};

use crate::config::WRITER_QUEUE;
use crate::dispatch::Api;
use crate::error::{RewriteError, StoreError};

/// Receives the two reportable events of the pipeline.
pub trait Reporter: Send + Sync {
    /// A translatable string had no table entry.
    fn missing(&self, api: Api, text: &str);
    /// A rewrite was abandoned; the original text went through.
    fn rewrite_failed(&self, api: Api, error: &RewriteError);
}

/// Reports through `log` only.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn missing(&self, api: Api, text: &str) {
        info!("TODO: \"{text}\" ({api})");
    }

    fn rewrite_failed(&self, api: Api, error: &RewriteError) {
        warn!("{api}: rewrite failed: {error}");
    }
}

fn now_ms() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as i64
}

// ── Miss store (SQLite) ─────────────────────────────

/// One untranslated string as recorded by [`MissStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissEntry {
    pub api: String,
    pub text: String,
    pub hits: i64,
    pub first_seen: i64,
    pub last_seen: i64,
}

/// Collects misses per (api, text) with a hit counter, so the table can be
/// extended by frequency. Blocking; the engine reaches it through
/// [`MissRecorder`].
pub struct MissStore {
    conn: Mutex<Connection>,
}

impl MissStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Self::from_connection(Connection::open(path)?)
    }

    pub fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA busy_timeout=100;");
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS missing (
                api        TEXT NOT NULL,
                text       TEXT NOT NULL,
                hits       INTEGER NOT NULL DEFAULT 1,
                first_seen INTEGER NOT NULL,
                last_seen  INTEGER NOT NULL,
                PRIMARY KEY (api, text)
            );
        ",
        )?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn record(&self, api: Api, text: &str) -> Result<(), StoreError> {
        self.record_at(api, text, now_ms())
    }

    /// Upserts one miss seen at `at` (ms since the epoch).
    pub fn record_at(&self, api: Api, text: &str, at: i64) -> Result<(), StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        conn.execute(
            "INSERT INTO missing(api, text, hits, first_seen, last_seen) VALUES(?1, ?2, 1, ?3, ?3) \
             ON CONFLICT(api, text) DO UPDATE SET hits = hits + 1, last_seen = excluded.last_seen",
            params![api.name(), text, at],
        )?;
        Ok(())
    }

    /// Most frequent first.
    pub fn entries(&self) -> Result<Vec<MissEntry>, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let mut stmt = conn.prepare(
            "SELECT api, text, hits, first_seen, last_seen FROM missing \
             ORDER BY hits DESC, first_seen ASC",
        )?;
        let rows = stmt.query_map([], |r| {
            Ok(MissEntry {
                api: r.get(0)?,
                text: r.get(1)?,
                hits: r.get(2)?,
                first_seen: r.get(3)?,
                last_seen: r.get(4)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

enum MissJob {
    Record { api: Api, text: String, at: i64 },
    Flush(Sender<()>),
}

/// Non-blocking front of a [`MissStore`]: logs the miss, then queues it for
/// a writer thread that owns the store.
#[derive(Clone)]
pub struct MissRecorder {
    tx: SyncSender<MissJob>,
}

impl MissRecorder {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Self::spawn(Arc::new(MissStore::open(path)?))
    }

    pub fn spawn(store: Arc<MissStore>) -> Result<Self, StoreError> {
        let (tx, rx) = mpsc::sync_channel(WRITER_QUEUE);
        thread::Builder::new()
            .name("stringswap-misses".into())
            .spawn(move || drain_misses(&store, rx))?;
        Ok(Self { tx })
    }

    /// Waits until every miss queued before this call is committed.
    pub fn flush(&self) {
        let (ack, done) = mpsc::channel();
        if self.tx.send(MissJob::Flush(ack)).is_ok() {
            let _ = done.recv();
        }
    }
}

fn drain_misses(store: &MissStore, rx: Receiver<MissJob>) {
    for job in rx {
        match job {
            MissJob::Record { api, text, at } => {
                if let Err(e) = store.record_at(api, &text, at) {
                    warn!("miss store: {e}");
                }
            }
            MissJob::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
}

impl Reporter for MissRecorder {
    fn missing(&self, api: Api, text: &str) {
        LogReporter.missing(api, text);
        let job = MissJob::Record { api, text: text.to_string(), at: now_ms() };
        if let Err(TrySendError::Full(_)) = self.tx.try_send(job) {
            debug!("miss queue full, \"{text}\" not stored");
        }
    }

    fn rewrite_failed(&self, api: Api, error: &RewriteError) {
        LogReporter.rewrite_failed(api, error);
    }
}

// ── Ring logger ─────────────────────────────────────

enum LogJob {
    Line(String),
    Flush(Sender<()>),
}

/// Keeps the last `max` lines in memory. With a path, a writer thread keeps
/// the same ring and rewrites the log file after each batch, so the file is
/// always short and current.
pub struct RingLogger {
    lines: Mutex<VecDeque<String>>,
    file: Option<SyncSender<LogJob>>,
    max: usize,
    level: LevelFilter,
}

impl RingLogger {
    pub fn new(path: Option<PathBuf>, max: usize, level: LevelFilter) -> Self {
        let file = path.and_then(|p| spawn_file_writer(p, max).ok());
        Self { lines: Mutex::new(VecDeque::with_capacity(max + 1)), file, max, level }
    }

    /// Installs a ring logger as the global `log` backend.
    pub fn install(path: PathBuf, max: usize, level: LevelFilter) -> Result<(), log::SetLoggerError> {
        log::set_boxed_logger(Box::new(Self::new(Some(path), max, level)))?;
        log::set_max_level(level);
        Ok(())
    }

    pub fn lines(&self) -> Vec<String> {
        match self.lines.lock() {
            Ok(buf) => buf.iter().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    fn format(level: Level, msg: &std::fmt::Arguments<'_>) -> String {
        let ts = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
        let secs = ts.as_secs();
        let h = (secs / 3600) % 24;
        let m = (secs / 60) % 60;
        let s = secs % 60;
        format!("[{:02}:{:02}:{:02}.{:03}] {:<5} {}", h, m, s, ts.subsec_millis(), level, msg)
    }
}

fn push_bounded(ring: &mut VecDeque<String>, line: String, max: usize) {
    ring.push_back(line);
    while ring.len() > max {
        ring.pop_front();
    }
}

fn spawn_file_writer(path: PathBuf, max: usize) -> std::io::Result<SyncSender<LogJob>> {
    let (tx, rx) = mpsc::sync_channel(WRITER_QUEUE);
    thread::Builder::new()
        .name("stringswap-log".into())
        .spawn(move || drain_lines(&path, max, rx))?;
    Ok(tx)
}

fn drain_lines(path: &Path, max: usize, rx: Receiver<LogJob>) {
    let mut ring = VecDeque::with_capacity(max + 1);
    while let Ok(first) = rx.recv() {
        let mut acks = Vec::new();
        let mut dirty = false;
        // Whatever queued up meanwhile goes out in the same rewrite.
        for job in std::iter::once(first).chain(rx.try_iter()) {
            match job {
                LogJob::Line(line) => {
                    push_bounded(&mut ring, line, max);
                    dirty = true;
                }
                LogJob::Flush(ack) => acks.push(ack),
            }
        }
        if dirty {
            let content: String = ring.iter().map(|l: &String| l.as_str()).collect::<Vec<_>>().join("\n") + "\n";
            let _ = fs::write(path, content);
        }
        for ack in acks {
            let _ = ack.send(());
        }
    }
}

impl Log for RingLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = Self::format(record.level(), record.args());
        if let Some(tx) = &self.file {
            let _ = tx.try_send(LogJob::Line(line.clone()));
        }
        if let Ok(mut guard) = self.lines.lock() {
            push_bounded(&mut guard, line, self.max);
        }
    }

    /// Waits until the file reflects every line logged before this call.
    fn flush(&self) {
        let Some(tx) = &self.file else { return };
        let (ack, done) = mpsc::channel();
        if tx.send(LogJob::Flush(ack)).is_ok() {
            let _ = done.recv();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{encode_native, CodePage, Portable};
    use crate::config::Config;
    use crate::dispatch::CB_ADDSTRING;
    use crate::engine::{Engine, InterceptedCall, Outcome};
    use crate::table::TranslationTable;

    fn emit(logger: &RingLogger, level: Level, n: usize) {
        logger.log(&Record::builder().args(format_args!("line {n}")).level(level).build());
    }

    fn memory_store() -> Arc<MissStore> {
        Arc::new(MissStore::from_connection(Connection::open_in_memory().unwrap()).unwrap())
    }

    #[test]
    fn ring_keeps_last_lines() {
        let logger = RingLogger::new(None, 3, LevelFilter::Info);
        for n in 0..5 {
            emit(&logger, Level::Info, n);
        }
        let lines = logger.lines();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with("line 2"));
        assert!(lines[2].ends_with("line 4"));
    }

    #[test]
    fn ring_filters_by_level() {
        let logger = RingLogger::new(None, 10, LevelFilter::Info);
        emit(&logger, Level::Debug, 0);
        emit(&logger, Level::Warn, 1);
        let lines = logger.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("WARN"));
    }

    #[test]
    fn ring_file_holds_last_lines_after_flush() {
        let path = std::env::temp_dir().join(format!("stringswap-ring-{}.log", std::process::id()));
        let logger = RingLogger::new(Some(path.clone()), 2, LevelFilter::Trace);
        for n in 5..8 {
            emit(&logger, Level::Info, n);
        }
        logger.flush();
        let content = fs::read_to_string(&path).unwrap();
        let _ = fs::remove_file(&path);
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("line 6"));
        assert!(lines[1].ends_with("line 7"));
    }

    #[test]
    fn miss_store_counts_hits() {
        let store = memory_store();
        store.record(Api::SendMessageA, "ジェム").unwrap();
        store.record(Api::SendMessageA, "ジェム").unwrap();
        store.record(Api::MessageBoxA, "ジェム").unwrap();
        store.record(Api::SetWindowTextA, "ステージ").unwrap();
        let entries = store.entries().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].api, "SendMessageA");
        assert_eq!(entries[0].text, "ジェム");
        assert_eq!(entries[0].hits, 2);
        assert!(entries[0].last_seen >= entries[0].first_seen);
    }

    #[test]
    fn recorder_commits_on_writer_thread() {
        let store = memory_store();
        let recorder = MissRecorder::spawn(Arc::clone(&store)).unwrap();
        let reporter: &dyn Reporter = &recorder;
        reporter.missing(Api::SetWindowTextA, "未翻訳");
        recorder.flush();
        assert_eq!(store.entries().unwrap()[0].text, "未翻訳");
    }

    #[test]
    fn misses_do_not_wait_for_the_store() {
        let store = memory_store();
        let recorder = MissRecorder::spawn(Arc::clone(&store)).unwrap();
        let engine = Engine::new(TranslationTable::new(), Config::in_dir("unused"), Box::new(recorder.clone()))
            .with_converter(&Portable);

        // With the connection held, any commit on the calling thread would
        // deadlock here.
        let held = store.conn.lock().unwrap();
        for _ in 0..50 {
            let mut item = encode_native(&Portable, "ワールド", CodePage::ShiftJis).unwrap();
            let mut args = [0, CB_ADDSTRING as usize, 0, item.as_mut_ptr() as usize];
            let mut call = InterceptedCall::new(Api::SendMessageA, &mut args);
            assert_eq!(unsafe { engine.on_enter(&mut call) }, vec![Outcome::Missing]);
        }
        drop(held);

        recorder.flush();
        let entries = store.entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].hits, 50);
    }
}
