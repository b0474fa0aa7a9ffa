// Copyright 2026 the Liftoff Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layer property bag.
//!
//! Layers carry an open-ended set of KMS property values keyed by name. Each
//! entry also remembers the value it had when the layer was last marked
//! clean, which is what the reuse fast path compares against.
//!
//! A handful of well-known names ([`CoreProperty`]) are looked up on every
//! frame; [`PropertyBag`] keeps a fixed-size side table mapping them to their
//! slot so those lookups are O(1). The side table is kept consistent across
//! insertions and swap-removals.

use alloc::string::String;
use alloc::vec::Vec;

/// Well-known property names with an O(1) lookup path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CoreProperty {
    /// `FB_ID`
    FbId,
    /// `CRTC_ID`
    CrtcId,
    /// `CRTC_X`
    CrtcX,
    /// `CRTC_Y`
    CrtcY,
    /// `CRTC_W`
    CrtcW,
    /// `CRTC_H`
    CrtcH,
    /// `SRC_X`
    SrcX,
    /// `SRC_Y`
    SrcY,
    /// `SRC_W`
    SrcW,
    /// `SRC_H`
    SrcH,
    /// `zpos`
    Zpos,
    /// `alpha`
    Alpha,
    /// `rotation`
    Rotation,
}

impl CoreProperty {
    /// Number of core properties.
    pub const COUNT: usize = 13;

    /// Every core property, in index order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::FbId,
        Self::CrtcId,
        Self::CrtcX,
        Self::CrtcY,
        Self::CrtcW,
        Self::CrtcH,
        Self::SrcX,
        Self::SrcY,
        Self::SrcW,
        Self::SrcH,
        Self::Zpos,
        Self::Alpha,
        Self::Rotation,
    ];

    /// The kernel property name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::FbId => "FB_ID",
            Self::CrtcId => "CRTC_ID",
            Self::CrtcX => "CRTC_X",
            Self::CrtcY => "CRTC_Y",
            Self::CrtcW => "CRTC_W",
            Self::CrtcH => "CRTC_H",
            Self::SrcX => "SRC_X",
            Self::SrcY => "SRC_Y",
            Self::SrcW => "SRC_W",
            Self::SrcH => "SRC_H",
            Self::Zpos => "zpos",
            Self::Alpha => "alpha",
            Self::Rotation => "rotation",
        }
    }

    /// Looks a name up among the core properties.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }

    /// Position in [`ALL`](Self::ALL).
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// One entry of a [`PropertyBag`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Property {
    name: String,
    core: Option<CoreProperty>,
    value: u64,
    prev_value: u64,
}

impl Property {
    /// Property name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The matching core property, if the name is a well-known one.
    #[must_use]
    pub fn core(&self) -> Option<CoreProperty> {
        self.core
    }

    /// Current value.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.value
    }

    /// Value at the last [`PropertyBag::mark_clean`].
    ///
    /// Zero for properties added since then.
    #[must_use]
    pub fn prev_value(&self) -> u64 {
        self.prev_value
    }

    /// Whether the value moved since the last clean mark.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.value != self.prev_value
    }
}

/// Ordered name→value store with previous-value tracking.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PropertyBag {
    props: Vec<Property>,
    core: [Option<usize>; CoreProperty::COUNT],
}

impl PropertyBag {
    /// Creates an empty bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks a property up by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Property> {
        match CoreProperty::from_name(name) {
            Some(core) => self.core(core),
            None => self.props.iter().find(|p| p.name == name),
        }
    }

    /// Looks a well-known property up through the side table.
    #[inline]
    #[must_use]
    pub fn core(&self, prop: CoreProperty) -> Option<&Property> {
        self.core[prop.index()].map(|slot| &self.props[slot])
    }

    /// Current value of a well-known property.
    #[inline]
    #[must_use]
    pub fn core_value(&self, prop: CoreProperty) -> Option<u64> {
        self.core(prop).map(Property::value)
    }

    /// Sets a property, adding it if missing.
    ///
    /// Returns `true` if the property was newly added.
    pub fn set(&mut self, name: &str, value: u64) -> bool {
        let core = CoreProperty::from_name(name);
        let slot = match core {
            Some(core) => self.core[core.index()],
            None => self.props.iter().position(|p| p.name == name),
        };
        if let Some(slot) = slot {
            self.props[slot].value = value;
            return false;
        }

        if let Some(core) = core {
            self.core[core.index()] = Some(self.props.len());
        }
        self.props.push(Property {
            name: name.into(),
            core,
            value,
            prev_value: 0,
        });
        true
    }

    /// Removes a property by swapping the last entry into its slot.
    ///
    /// Returns `true` if the property existed.
    pub fn remove(&mut self, name: &str) -> bool {
        let Some(slot) = self.props.iter().position(|p| p.name == name) else {
            return false;
        };
        let removed = self.props.swap_remove(slot);
        if let Some(core) = removed.core {
            self.core[core.index()] = None;
        }
        if let Some(moved) = self.props.get(slot).and_then(|p| p.core) {
            self.core[moved.index()] = Some(slot);
        }
        true
    }

    /// Snapshots every current value as the previous value.
    pub fn mark_clean(&mut self) {
        for prop in &mut self.props {
            prop.prev_value = prop.value;
        }
    }

    /// Iterates over properties in storage order.
    pub fn iter(&self) -> impl Iterator<Item = &Property> + '_ {
        self.props.iter()
    }

    /// Number of properties.
    #[must_use]
    pub fn len(&self) -> usize {
        self.props.len()
    }

    /// Whether the bag holds no property.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }
}
