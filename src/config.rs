// stringswap — Display-Time String Substitution for Legacy Win32 Applications
// Copyright (C) 2026  Martin Gehrken (IamLumae)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::path::{Path, PathBuf};

// ── Files ───────────────────────────────────────────
pub const DATA_DIR: &str = "stringswap";              // next to the target exe
pub const TABLE_FILE: &str = "translations.db";       // source → target
pub const MISS_DB_FILE: &str = "missing.db";          // untranslated strings, for curation
pub const LOG_FILE: &str = "stringswap.log";

// ── Limits ──────────────────────────────────────────
pub const LOG_MAX: usize = 100;                       // ring buffer lines kept on disk
pub const DEFAULT_SCAN_LIMIT: usize = 32 * 1024;      // units scanned for a terminator
pub const WRITER_QUEUE: usize = 1024;                 // pending misses/log lines before drops

// ── Environment overrides ───────────────────────────
pub const ENV_DIR: &str = "STRINGSWAP_DIR";
pub const ENV_TABLE: &str = "STRINGSWAP_TABLE";
pub const ENV_SCAN_LIMIT: &str = "STRINGSWAP_SCAN_LIMIT";

/// Window titles get their product name swapped even when the rest of the
/// title (file name, dirty marker) is not in the table.
pub const DEFAULT_TITLE_PREFIXES: &[(&str, &str)] = &[("アクションエディター4", "Aquedi4")];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub table_path: PathBuf,
    pub scan_limit: usize,
    pub title_prefixes: Vec<(String, String)>,
}

impl Default for Config {
    fn default() -> Self {
        Self::in_dir(DATA_DIR)
    }
}

impl Config {
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let data_dir = dir.as_ref().to_path_buf();
        Self {
            table_path: data_dir.join(TABLE_FILE),
            data_dir,
            scan_limit: DEFAULT_SCAN_LIMIT,
            title_prefixes: DEFAULT_TITLE_PREFIXES
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
        }
    }

    /// Defaults, then `STRINGSWAP_*` overrides.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = match var(ENV_DIR) {
            Some(dir) if !dir.is_empty() => Self::in_dir(dir),
            _ => Self::default(),
        };
        if let Some(table) = var(ENV_TABLE).filter(|t| !t.is_empty()) {
            cfg.table_path = PathBuf::from(table);
        }
        if let Some(limit) = var(ENV_SCAN_LIMIT).and_then(|v| v.parse::<usize>().ok()) {
            if limit > 0 {
                cfg.scan_limit = limit;
            }
        }
        cfg
    }

    pub fn miss_db_path(&self) -> PathBuf {
        self.data_dir.join(MISS_DB_FILE)
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join(LOG_FILE)
    }
}
