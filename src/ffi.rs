// stringswap — Display-Time String Substitution for Legacy Win32 Applications
// Copyright (C) 2026  Martin Gehrken (IamLumae)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! C ABI for the hooking layer that runs inside the target process.
//!
//! The hook calls `stringswap_on_enter` with the intercepted arguments as an
//! array of machine words before forwarding the call, and
//! `stringswap_on_leave` with the returned guard after the original call
//! has returned. No panic crosses this boundary.

use std::ffi::{c_char, CStr};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering::SeqCst};
use std::sync::{Mutex, OnceLock};

use log::{error, info, LevelFilter};

use crate::config::{Config, LOG_MAX};
use crate::dispatch::Api;
use crate::engine::{Engine, InterceptedCall};
use crate::report::RingLogger;
use crate::rewrite::Substitution;

static ENGINE: OnceLock<Engine> = OnceLock::new();
static INIT_LOCK: Mutex<()> = Mutex::new(());
static ENGINES_BUILT: AtomicUsize = AtomicUsize::new(0);

pub const INIT_OK: i32 = 0;
pub const INIT_BAD_PATH: i32 = 1;
pub const INIT_TABLE_FAILED: i32 = 2;
pub const INIT_PANICKED: i32 = 3;

/// Keeps substitution buffers alive for the duration of one original call.
#[derive(Debug)]
pub struct CallGuard {
    substitutions: Vec<Substitution>,
}

impl CallGuard {
    pub fn substitutions(&self) -> &[Substitution] {
        &self.substitutions
    }
}

fn init(config: Config) -> i32 {
    // Held across the whole build so concurrent callers load the table once.
    let _guard = INIT_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if ENGINE.get().is_some() {
        return INIT_OK;
    }
    let _ = std::fs::create_dir_all(&config.data_dir);
    let _ = RingLogger::install(config.log_path(), LOG_MAX, LevelFilter::Info);
    info!("=== stringswap START === table: {}", config.table_path.display());
    match Engine::from_config(config) {
        Ok(engine) => {
            info!("{} translations loaded", engine.table().len());
            ENGINES_BUILT.fetch_add(1, SeqCst);
            let _ = ENGINE.set(engine);
            INIT_OK
        }
        Err(e) => {
            error!("table load failed: {e}");
            INIT_TABLE_FAILED
        }
    }
}

/// Builds the process-wide engine once. `data_dir` may be null, in which case
/// the `STRINGSWAP_*` environment and defaults apply. Later calls are no-ops.
///
/// # Safety
///
/// `data_dir` is null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn stringswap_init(data_dir: *const c_char) -> i32 {
    let config = if data_dir.is_null() {
        Config::from_env()
    } else {
        match unsafe { CStr::from_ptr(data_dir) }.to_str() {
            Ok(dir) => Config::in_dir(PathBuf::from(dir)),
            Err(_) => return INIT_BAD_PATH,
        }
    };
    catch_unwind(AssertUnwindSafe(|| init(config))).unwrap_or(INIT_PANICKED)
}

/// Runs the pipeline on `args[..arg_count]`, rewriting text arguments in
/// place or swapping their slots for engine-owned buffers. Returns the guard
/// owning those buffers, or null when nothing was substituted.
///
/// # Safety
///
/// `args` points at `arg_count` writable words holding the intercepted
/// arguments, which must satisfy the contract of the API named by `api`.
#[no_mangle]
pub unsafe extern "C" fn stringswap_on_enter(api: u32, args: *mut usize, arg_count: usize) -> *mut CallGuard {
    let (Some(engine), Some(api)) = (ENGINE.get(), Api::from_id(api)) else {
        return std::ptr::null_mut();
    };
    if args.is_null() || arg_count == 0 {
        return std::ptr::null_mut();
    }
    let args = unsafe { std::slice::from_raw_parts_mut(args, arg_count) };
    unsafe { enter(engine, api, args) }
}

unsafe fn enter(engine: &Engine, api: Api, args: &mut [usize]) -> *mut CallGuard {
    let run = AssertUnwindSafe(|| {
        let mut call = InterceptedCall::new(api, args);
        let _ = unsafe { engine.on_enter(&mut call) };
        call.finish()
    });
    match catch_unwind(run) {
        Ok(substitutions) if !substitutions.is_empty() => {
            Box::into_raw(Box::new(CallGuard { substitutions }))
        }
        Ok(_) => std::ptr::null_mut(),
        Err(_) => {
            error!("{api}: pipeline panicked, call forwarded unchanged");
            std::ptr::null_mut()
        }
    }
}

/// Releases a guard returned by [`stringswap_on_enter`]. Null is ignored.
///
/// # Safety
///
/// `guard` is null or came from `stringswap_on_enter` and was not released
/// before; the original call has returned.
#[no_mangle]
pub unsafe extern "C" fn stringswap_on_leave(guard: *mut CallGuard) {
    if !guard.is_null() {
        drop(unsafe { Box::from_raw(guard) });
    }
}
