// stringswap — Display-Time String Substitution for Legacy Win32 Applications
// Copyright (C) 2026  Martin Gehrken (IamLumae)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Bounded views over foreign, caller-owned string arguments.
//!
//! The only capacity the engine can trust for a foreign buffer is what it
//! measured itself: the units up to the terminator, plus the terminator.
//! `NativeBuffer::write_bounded` is the single place where foreign memory is
//! written, and it refuses anything longer than that.

use std::marker::PhantomData;
use std::ptr::NonNull;

use crate::error::{RewriteError, ScanError};

/// Forward scan for a zero unit, giving up after `limit` units.
///
/// # Safety
///
/// `ptr` must be readable for every unit up to the first terminator or
/// `limit`, whichever comes first.
unsafe fn scan_terminator<T: Copy + Default + PartialEq>(
    ptr: *const T,
    limit: usize,
) -> Result<usize, ScanError> {
    for i in 0..limit {
        if unsafe { ptr.add(i).read() } == T::default() {
            return Ok(i);
        }
    }
    Err(ScanError::Unterminated { limit })
}

// ── Narrow (A) arguments ────────────────────────────

/// A narrow, NUL-terminated argument owned by the intercepted caller.
#[derive(Debug)]
pub struct NativeBuffer<'a> {
    ptr: NonNull<u8>,
    origin_len: usize,
    _borrow: PhantomData<&'a mut [u8]>,
}

impl<'a> NativeBuffer<'a> {
    /// Measures a raw argument.
    ///
    /// # Safety
    ///
    /// `ptr` is null or readable up to its terminator (or `limit` bytes), and
    /// the `origin_len + 1` bytes found that way stay writable and unaliased
    /// for `'a`.
    pub unsafe fn from_raw(ptr: *mut u8, limit: usize) -> Result<Self, ScanError> {
        let ptr = NonNull::new(ptr).ok_or(ScanError::Null)?;
        let origin_len = unsafe { scan_terminator(ptr.as_ptr().cast_const(), limit)? };
        Ok(Self { ptr, origin_len, _borrow: PhantomData })
    }

    /// Safe constructor over owned memory; the terminator must be inside the
    /// slice.
    pub fn from_slice(buf: &'a mut [u8]) -> Result<Self, ScanError> {
        let origin_len = buf
            .iter()
            .position(|&b| b == 0)
            .ok_or(ScanError::Unterminated { limit: buf.len() })?;
        let ptr = NonNull::from(&mut *buf).cast::<u8>();
        Ok(Self { ptr, origin_len, _borrow: PhantomData })
    }

    /// Units before the terminator, measured before any rewrite.
    pub fn origin_len(&self) -> usize {
        self.origin_len
    }

    /// Content plus terminator. Never more.
    pub fn capacity(&self) -> usize {
        self.origin_len + 1
    }

    pub fn contents(&self) -> &[u8] {
        // SAFETY: `origin_len` bytes were read by the scan and are borrowed for 'a.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.origin_len) }
    }

    pub fn addr(&self) -> usize {
        self.ptr.as_ptr() as usize
    }

    /// Copies `data` to the start of the buffer.
    pub fn write_bounded(&mut self, data: &[u8]) -> Result<(), RewriteError> {
        if data.len() > self.capacity() {
            return Err(RewriteError::Capacity { len: data.len(), capacity: self.capacity() });
        }
        // SAFETY: `data.len() <= origin_len + 1`, the region the constructor
        // established as writable. `data` is core-owned and cannot overlap.
        unsafe { std::ptr::copy_nonoverlapping(data.as_ptr(), self.ptr.as_ptr(), data.len()) };
        Ok(())
    }
}

// ── Wide (W) arguments ──────────────────────────────

/// A wide, NUL-terminated argument. The engine only ever reads these;
/// rewrites go through substitution.
#[derive(Debug, Clone, Copy)]
pub struct WideArg<'a> {
    ptr: NonNull<u16>,
    len: usize,
    _borrow: PhantomData<&'a [u16]>,
}

impl<'a> WideArg<'a> {
    /// # Safety
    ///
    /// `ptr` is null or readable up to its terminator (or `limit` units) and
    /// unchanged for `'a`.
    pub unsafe fn from_raw(ptr: *const u16, limit: usize) -> Result<Self, ScanError> {
        let ptr = NonNull::new(ptr.cast_mut()).ok_or(ScanError::Null)?;
        if ptr.as_ptr().align_offset(std::mem::align_of::<u16>()) != 0 {
            return Err(ScanError::Misaligned);
        }
        let len = unsafe { scan_terminator(ptr.as_ptr().cast_const(), limit)? };
        Ok(Self { ptr, len, _borrow: PhantomData })
    }

    pub fn from_slice(buf: &'a [u16]) -> Result<Self, ScanError> {
        let len = buf
            .iter()
            .position(|&u| u == 0)
            .ok_or(ScanError::Unterminated { limit: buf.len() })?;
        let ptr = NonNull::from(buf).cast::<u16>();
        Ok(Self { ptr, len, _borrow: PhantomData })
    }

    pub fn units(&self) -> &'a [u16] {
        // SAFETY: `len` units were read by the scan and are borrowed for 'a.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
