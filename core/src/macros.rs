use crate::error::{Error, Result};
use std::collections::BTreeMap;

pub const MIN_SLOT: u8 = 1;
pub const MAX_SLOT: u8 = 9;

pub fn validate_slot(slot: u8) -> Result<()> {
    if (MIN_SLOT..=MAX_SLOT).contains(&slot) {
        Ok(())
    } else {
        Err(Error::InvalidMacroSlot(slot))
    }
}

/// Numbered slots pinned to values, independent of history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroRegistry {
    slots: BTreeMap<u8, String>,
    enabled: bool,
}

impl Default for MacroRegistry {
    fn default() -> Self {
        Self {
            slots: BTreeMap::new(),
            enabled: true,
        }
    }
}

impl MacroRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_slots(slots: BTreeMap<u8, String>, enabled: bool) -> Self {
        let slots = slots
            .into_iter()
            .filter(|(slot, value)| validate_slot(*slot).is_ok() && !value.is_empty())
            .collect();
        Self { slots, enabled }
    }

    /// Last writer wins.
    pub fn assign(&mut self, slot: u8, value: impl Into<String>) -> Result<()> {
        validate_slot(slot)?;
        self.slots.insert(slot, value.into());
        Ok(())
    }

    /// Empty when the slot is unset, out of range, or macros are disabled.
    pub fn resolve(&self, slot: u8) -> Option<&str> {
        if !self.enabled {
            return None;
        }
        self.slots.get(&slot).map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Stored mapping regardless of the enabled flag, for listings.
    pub fn slots(&self) -> &BTreeMap<u8, String> {
        &self.slots
    }
}
