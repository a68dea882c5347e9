// stringswap — Display-Time String Substitution for Legacy Win32 Applications
// Copyright (C) 2026  Martin Gehrken (IamLumae)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Curation tool for translation tables and recorded misses.

use std::fs::File;
use std::io::{BufReader, Write};
use std::path::Path;
use std::process::ExitCode;

use rusqlite::Connection;
use stringswap::{MissStore, TranslationTable};

const USAGE: &str = "\
usage:
  stringswap check <table.db|table.tsv>    load a table, list entries too long to fit
  stringswap misses <missing.db>           list untranslated strings, most frequent first
  stringswap import <table.tsv> <table.db> write a TSV table into SQLite";

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn check(path: &Path, out: &mut impl Write) -> CliResult {
    let table = TranslationTable::load(path)?;
    writeln!(out, "{} entries in {}", table.len(), path.display())?;
    for (source, target) in table.oversized() {
        writeln!(out, "TOO LONG: \"{source}\" -> \"{target}\"")?;
    }
    Ok(())
}

fn misses(path: &Path, out: &mut impl Write) -> CliResult {
    let store = MissStore::open(path)?;
    for entry in store.entries()? {
        writeln!(out, "{}\t{}\t{}", entry.hits, entry.api, entry.text)?;
    }
    Ok(())
}

fn import(tsv: &Path, db: &Path, out: &mut impl Write) -> CliResult {
    let table = TranslationTable::load_tsv(BufReader::new(File::open(tsv)?))?;
    let mut conn = Connection::open(db)?;
    table.write_sqlite(&mut conn)?;
    writeln!(out, "imported {} entries into {}", table.len(), db.display())?;
    Ok(())
}

fn run(args: &[String], out: &mut impl Write) -> Option<CliResult> {
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    match args.as_slice() {
        ["check", table] => Some(check(Path::new(table), out)),
        ["misses", db] => Some(misses(Path::new(db), out)),
        ["import", tsv, db] => Some(import(Path::new(tsv), Path::new(db), out)),
        _ => None,
    }
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut stdout = std::io::stdout().lock();
    match run(&args, &mut stdout) {
        Some(Ok(())) => ExitCode::SUCCESS,
        Some(Err(e)) => {
            eprintln!("stringswap: {e}");
            ExitCode::FAILURE
        }
        None => {
            eprintln!("{USAGE}");
            ExitCode::from(2)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn unknown_command_prints_usage() {
        let mut out = Vec::new();
        assert!(run(&strings(&["frobnicate"]), &mut out).is_none());
        assert!(run(&strings(&[]), &mut out).is_none());
        assert!(run(&strings(&["import", "only-one"]), &mut out).is_none());
    }

    #[test]
    fn import_then_check() {
        let dir = std::env::temp_dir().join(format!("stringswap-cli-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let tsv = dir.join("jp.tsv");
        let db = dir.join("jp.db");
        std::fs::write(&tsv, "# jp -> en\nジャンプ\tJump\n黒\tBlack\n").unwrap();

        let mut out = Vec::new();
        let args = strings(&["import", tsv.to_str().unwrap(), db.to_str().unwrap()]);
        run(&args, &mut out).unwrap().unwrap();
        let mut report = Vec::new();
        run(&strings(&["check", db.to_str().unwrap()]), &mut report).unwrap().unwrap();
        let report = String::from_utf8(report).unwrap();

        let _ = std::fs::remove_dir_all(&dir);
        assert!(String::from_utf8(out).unwrap().starts_with("imported 2 entries"));
        assert!(report.starts_with("2 entries"));
        assert!(report.contains("TOO LONG: \"黒\" -> \"Black\""));
    }

    #[test]
    fn misses_lists_by_frequency() {
        let dir = std::env::temp_dir().join(format!("stringswap-misses-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let db = dir.join("missing.db");
        {
            let store = MissStore::open(&db).unwrap();
            store.record(stringswap::Api::SetWindowTextA, "ステージ").unwrap();
            store.record(stringswap::Api::SendMessageA, "ジェム").unwrap();
            store.record(stringswap::Api::SendMessageA, "ジェム").unwrap();
        }
        let mut out = Vec::new();
        run(&strings(&["misses", db.to_str().unwrap()]), &mut out).unwrap().unwrap();
        let _ = std::fs::remove_dir_all(&dir);
        let out = String::from_utf8(out).unwrap();
        assert_eq!(out.lines().next(), Some("2\tSendMessageA\tジェム"));
        assert_eq!(out.lines().count(), 2);
    }
}
