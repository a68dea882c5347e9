// stringswap — Display-Time String Substitution for Legacy Win32 Applications
// Copyright (C) 2026  Martin Gehrken (IamLumae)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The translation table: canonical source text → canonical target text.
//!
//! Loaded once at startup and never mutated afterwards. Lookup is an exact
//! key match; no trimming, case folding or normalization.

use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

use rusqlite::{params, Connection, OpenFlags};

use crate::error::TableError;

#[derive(Debug, Clone, Default)]
pub struct TranslationTable {
    entries: HashMap<String, String>,
}

impl TranslationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let entries = pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        Self { entries }
    }

    /// Later inserts of the same key win.
    pub fn insert(&mut self, source: impl Into<String>, target: impl Into<String>) {
        self.entries.insert(source.into(), target.into());
    }

    pub fn lookup(&self, text: &str) -> Option<&str> {
        self.entries.get(text).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Entries whose target is more than twice as long as the source, in
    /// characters. Most call sites rewrite in place, so these get truncated.
    pub fn oversized(&self) -> Vec<(&str, &str)> {
        let mut out: Vec<_> = self
            .iter()
            .filter(|(k, v)| v.chars().count() > k.chars().count() * 2)
            .collect();
        out.sort_unstable();
        out
    }

    // ── Loaders ─────────────────────────────────────

    /// `.tsv`/`.txt` files are read as TSV, everything else as SQLite.
    pub fn load(path: &Path) -> Result<Self, TableError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("tsv") | Some("txt") => {
                let file = std::fs::File::open(path)?;
                Self::load_tsv(std::io::BufReader::new(file))
            }
            _ => Self::load_sqlite(path),
        }
    }

    /// One `source<TAB>target` pair per line. Blank lines and lines starting
    /// with `#` are skipped.
    pub fn load_tsv<R: BufRead>(reader: R) -> Result<Self, TableError> {
        let mut table = Self::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.strip_suffix('\r').unwrap_or(&line);
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            let (source, target) =
                line.split_once('\t').ok_or(TableError::Malformed { line: idx + 1 })?;
            if source.is_empty() {
                return Err(TableError::Malformed { line: idx + 1 });
            }
            table.insert(source, target);
        }
        Ok(table)
    }

    /// Opens read-only; a missing file is an error, never created.
    pub fn load_sqlite(path: &Path) -> Result<Self, TableError> {
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        Self::read_sqlite(&conn)
    }

    pub fn read_sqlite(conn: &Connection) -> Result<Self, TableError> {
        let mut stmt = conn.prepare("SELECT source, target FROM translations")?;
        let rows = stmt.query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))?;
        let mut table = Self::new();
        for row in rows {
            let (source, target) = row?;
            table.insert(source, target);
        }
        Ok(table)
    }

    /// Replaces the `translations` table in `conn` with this table.
    pub fn write_sqlite(&self, conn: &mut Connection) -> Result<(), TableError> {
        init_schema(conn)?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM translations", [])?;
        {
            let mut stmt = tx.prepare("INSERT INTO translations(source, target) VALUES(?1, ?2)")?;
            for (source, target) in self.iter() {
                stmt.execute(params![source, target])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    // Rollback journal: read-only openers cannot set up WAL shared memory.
    let _ = conn.execute_batch("PRAGMA journal_mode=DELETE;");
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS translations (
            source TEXT PRIMARY KEY,
            target TEXT NOT NULL
        );
    ",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_exact() {
        let table = TranslationTable::from_pairs([("ショット", "Shot"), ("ショットA", "Shot A")]);
        assert_eq!(table.lookup("ショット"), Some("Shot"));
        assert_eq!(table.lookup("ショット "), None);
        assert_eq!(table.lookup(" ショット"), None);
        assert_eq!(table.lookup("ショッ"), None);
        // Full-width Ａ differs by one code point.
        assert_eq!(table.lookup("ショットＡ"), None);
    }

    #[test]
    fn oversized_flags_long_targets() {
        let table = TranslationTable::from_pairs([("白", "Wh"), ("黒", "Black"), ("削除", "Del")]);
        assert_eq!(table.oversized(), vec![("黒", "Black")]);
    }

    #[test]
    fn tsv_skips_comments_and_blank_lines() {
        let src = "# header\n\nジャンプ\tJump\r\n削除\tDel\n削除\tDelete\n";
        let table = TranslationTable::load_tsv(src.as_bytes()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.lookup("ジャンプ"), Some("Jump"));
        assert_eq!(table.lookup("削除"), Some("Delete"));
    }

    #[test]
    fn tsv_without_tab_is_malformed() {
        let err = TranslationTable::load_tsv("ok\tfine\nbroken line\n".as_bytes()).unwrap_err();
        assert!(matches!(err, TableError::Malformed { line: 2 }));
    }

    #[test]
    fn missing_sqlite_table_is_not_created() {
        let path = std::env::temp_dir().join(format!("stringswap-absent-{}.db", std::process::id()));
        let _ = std::fs::remove_file(&path);
        let err = TranslationTable::load(&path).unwrap_err();
        assert!(matches!(err, TableError::Sqlite(_)));
        assert!(!path.exists());
    }

    #[test]
    fn sqlite_file_loads_read_only() {
        let path = std::env::temp_dir().join(format!("stringswap-table-{}.db", std::process::id()));
        let _ = std::fs::remove_file(&path);
        let table = TranslationTable::from_pairs([("確認", "OK?")]);
        table.write_sqlite(&mut Connection::open(&path).unwrap()).unwrap();
        let loaded = TranslationTable::load(&path);
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded.unwrap().lookup("確認"), Some("OK?"));
    }

    #[test]
    fn sqlite_round_trip() {
        let table = TranslationTable::from_pairs([("表示", "Show"), ("非表示", "Hide")]);
        let mut conn = Connection::open_in_memory().unwrap();
        table.write_sqlite(&mut conn).unwrap();
        let back = TranslationTable::read_sqlite(&conn).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back.lookup("非表示"), Some("Hide"));
    }
}
