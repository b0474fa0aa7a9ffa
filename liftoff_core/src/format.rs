// Copyright 2026 the Liftoff Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pixel formats and the `IN_FORMATS` plane table.
//!
//! Planes that support explicit modifiers publish an `IN_FORMATS` blob laid
//! out as `struct drm_format_modifier_blob`: a 24-byte header, an array of
//! fourcc codes, and an array of 24-byte modifier records. Each record covers
//! a window of 64 consecutive entries of the format array (starting at
//! `offset`) and sets bit `i` when format `offset + i` supports the modifier.

use alloc::vec::Vec;

/// Builds a DRM fourcc code from its four characters.
#[must_use]
pub const fn fourcc(code: [u8; 4]) -> u32 {
    u32::from_le_bytes(code)
}

/// `DRM_FORMAT_XRGB8888`.
pub const XRGB8888: u32 = fourcc(*b"XR24");
/// `DRM_FORMAT_ARGB8888`.
pub const ARGB8888: u32 = fourcc(*b"AR24");
/// `DRM_FORMAT_NV12`.
pub const NV12: u32 = fourcc(*b"NV12");

/// `DRM_FORMAT_MOD_LINEAR`.
pub const MOD_LINEAR: u64 = 0;
/// `DRM_FORMAT_MOD_INVALID`.
pub const MOD_INVALID: u64 = 0x00ff_ffff_ffff_ffff;

const HEADER_LEN: usize = 24;
const MODIFIER_RECORD_LEN: usize = 24;
const WINDOW: usize = 64;

/// One modifier record of the table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ModifierEntry {
    /// Bit `i` marks format `offset + i` as supported.
    pub formats: u64,
    /// First format index covered by `formats`.
    pub offset: u32,
    /// The modifier.
    pub modifier: u64,
}

/// Decoded `IN_FORMATS` table of a plane.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FormatModifierTable {
    formats: Vec<u32>,
    modifiers: Vec<ModifierEntry>,
}

impl FormatModifierTable {
    /// Decodes a kernel `drm_format_modifier_blob`.
    ///
    /// Returns `None` if the blob is truncated or its offsets point outside
    /// of it.
    #[must_use]
    pub fn from_blob(blob: &[u8]) -> Option<Self> {
        if blob.len() < HEADER_LEN {
            return None;
        }
        let count_formats = read_u32(blob, 8)? as usize;
        let formats_offset = read_u32(blob, 12)? as usize;
        let count_modifiers = read_u32(blob, 16)? as usize;
        let modifiers_offset = read_u32(blob, 20)? as usize;

        let mut formats = Vec::with_capacity(count_formats);
        for i in 0..count_formats {
            formats.push(read_u32(blob, formats_offset.checked_add(i * 4)?)?);
        }

        let mut modifiers = Vec::with_capacity(count_modifiers);
        for i in 0..count_modifiers {
            let at = modifiers_offset.checked_add(i * MODIFIER_RECORD_LEN)?;
            modifiers.push(ModifierEntry {
                formats: read_u64(blob, at)?,
                offset: read_u32(blob, at + 8)?,
                // 4 bytes of padding
                modifier: read_u64(blob, at + 16)?,
            });
        }

        Some(Self { formats, modifiers })
    }

    /// Builds a table from `(format, modifier)` pairs.
    #[must_use]
    pub fn from_pairs(pairs: impl IntoIterator<Item = (u32, u64)>) -> Self {
        let mut table = Self::default();
        for (format, modifier) in pairs {
            let idx = match table.formats.iter().position(|f| *f == format) {
                Some(idx) => idx,
                None => {
                    table.formats.push(format);
                    table.formats.len() - 1
                }
            };
            let window = idx / WINDOW * WINDOW;
            let offset = u32::try_from(window).unwrap_or(u32::MAX);
            let bit = 1_u64 << (idx - window);
            match table
                .modifiers
                .iter_mut()
                .find(|m| m.modifier == modifier && m.offset == offset)
            {
                Some(entry) => entry.formats |= bit,
                None => table.modifiers.push(ModifierEntry {
                    formats: bit,
                    offset,
                    modifier,
                }),
            }
        }
        table
    }

    /// Fourcc codes listed by the table.
    #[must_use]
    pub fn formats(&self) -> &[u32] {
        &self.formats
    }

    /// Modifier records.
    #[must_use]
    pub fn modifiers(&self) -> &[ModifierEntry] {
        &self.modifiers
    }

    /// Whether the plane can scan out `format` with `modifier`.
    #[must_use]
    pub fn supports(&self, format: u32, modifier: u64) -> bool {
        let Some(idx) = self.formats.iter().position(|f| *f == format) else {
            return false;
        };
        self.modifiers.iter().any(|entry| {
            let start = entry.offset as usize;
            entry.modifier == modifier
                && (start..start + WINDOW).contains(&idx)
                && entry.formats & (1 << (idx - start)) != 0
        })
    }
}

fn read_u32(blob: &[u8], at: usize) -> Option<u32> {
    let bytes = blob.get(at..at.checked_add(4)?)?;
    Some(u32::from_ne_bytes(bytes.try_into().ok()?))
}

fn read_u64(blob: &[u8], at: usize) -> Option<u64> {
    let bytes = blob.get(at..at.checked_add(8)?)?;
    Some(u64::from_ne_bytes(bytes.try_into().ok()?))
}
