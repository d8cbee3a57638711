//! Named world-state bit editing (NPC alive/dead, bonfire unlocks).
//!
//! Entities are looked up in an external [`EntityCatalog`]; each entity is
//! a list of bit definitions relative to the record's anchor pattern. The
//! whole definition list is resolved and bounds-checked before the first
//! bit is written, so a bad catalog entry can never leave an entity half
//! applied.

use crate::catalog::EntityCatalog;
use crate::character::{Character, RecordError};
use crate::pattern;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlagError {
    #[error("Entity {0:?} not found in catalog")]
    EntityNotFound(String),

    #[error("Anchor pattern not found in character record")]
    AnchorNotFound,

    #[error("Offset for entity {name:?} out of bounds (anchor {anchor:#x}, relative {relative:#x}, record {len:#x} bytes)")]
    OffsetOutOfBounds {
        name: String,
        anchor: usize,
        relative: i64,
        len: usize,
    },

    #[error(transparent)]
    Record(#[from] RecordError),
}

/// Applies catalog-defined bit flips to one character record.
pub struct FlagEditor<'a> {
    character: &'a mut Character,
    catalog: &'a EntityCatalog,
    find_anchor: fn(&[u8]) -> Option<usize>,
}

impl<'a> FlagEditor<'a> {
    /// Editor for remastered-format records.
    pub fn dsr(character: &'a mut Character, catalog: &'a EntityCatalog) -> Self {
        FlagEditor {
            character,
            catalog,
            find_anchor: pattern::find_dsr_anchor,
        }
    }

    /// Editor for archive-format records.
    pub fn bnd4(character: &'a mut Character, catalog: &'a EntityCatalog) -> Self {
        FlagEditor {
            character,
            catalog,
            find_anchor: pattern::find_bnd4_anchor,
        }
    }

    /// Resolve every bit of `name` to an absolute (offset, bit, value)
    /// triple, fully bounds-checked.
    fn resolve(&self, name: &str, state: bool) -> Result<Vec<(usize, u8, bool)>, FlagError> {
        let entity = self
            .catalog
            .get(name)
            .ok_or_else(|| FlagError::EntityNotFound(name.to_string()))?;

        let anchor =
            (self.find_anchor)(self.character.as_bytes()).ok_or(FlagError::AnchorNotFound)?;

        let len = self.character.len();
        let mut writes = Vec::with_capacity(entity.bits.len());
        for entry in &entity.bits {
            let offset = pattern::resolve(anchor, entry.offset, len).ok_or_else(|| {
                FlagError::OffsetOutOfBounds {
                    name: name.to_string(),
                    anchor,
                    relative: entry.offset,
                    len,
                }
            })?;
            let value = if entry.reverse { !state } else { state };
            writes.push((offset, entry.bit, value));
        }

        Ok(writes)
    }

    /// Set a named entity's state. All bits are applied or none are.
    pub fn set_state(&mut self, name: &str, state: bool) -> Result<(), FlagError> {
        for (offset, bit, value) in self.resolve(name, state)? {
            self.character.set_bit(offset, bit, value)?;
        }
        Ok(())
    }

    /// Read a named entity's state: true when every defined bit encodes
    /// the "set" state (reverse flags honored).
    pub fn get_state(&self, name: &str) -> Result<bool, FlagError> {
        for (offset, bit, expected) in self.resolve(name, true)? {
            if self.character.get_bit(offset, bit)? != expected {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
