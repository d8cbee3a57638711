//! Archive-format inventory codec.
//!
//! Items are 16-byte records starting at anchor+0x9C. The record itself
//! carries no upgrade field: weapon identifiers fold infusion and upgrade
//! into their low decimal digits, so decoding goes through the item
//! catalog to recover the base identifier. Inserting a record requires
//! two consecutive empty slots and ticks a pair of running counters the
//! game uses for item signatures.

use crate::catalog::{ItemCatalog, ItemEntry, ItemKind};
use crate::character::{Character, RecordError};
use crate::pattern;
use thiserror::Error;

pub const ITEM_SIZE: usize = 16;
pub const MAX_SLOTS: usize = 300;

/// Inventory region begins here, relative to the record anchor.
const INVENTORY_RELATIVE: i64 = 0x9C;
/// Paired insertion counters, incremented together once per new record.
const COUNTER1_RELATIVE: i64 = 0x94;
const COUNTER2_RELATIVE: i64 = 0x96;

/// Trailing signature bytes inside a record. No deterministic formula is
/// known; they are written as zero and the game fills them on next load.
const SIGNATURE_OFFSET: usize = 14;

/// Observed empty-slot garbage prefix left behind by the game.
const GARBAGE_PREFIX: [u8; 8] = [0x00, 0x00, 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF];

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("Inventory slot {slot} out of range (0..{MAX_SLOTS})")]
    SlotOutOfRange { slot: usize },

    #[error("Anchor pattern not found in character record")]
    AnchorNotFound,

    #[error(transparent)]
    Record(#[from] RecordError),
}

/// Category separator byte stored at record offset 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemSeparator {
    Weapons = 0x80,
    Armor = 0x90,
    Rings = 0xA0,
    Goods = 0xB0,
}

impl ItemSeparator {
    pub fn for_kind(kind: ItemKind) -> ItemSeparator {
        match kind {
            ItemKind::Weapon => ItemSeparator::Weapons,
            ItemKind::Armor => ItemSeparator::Armor,
            ItemKind::Ring => ItemSeparator::Rings,
            _ => ItemSeparator::Goods,
        }
    }

    pub fn from_byte(value: u8) -> Option<ItemSeparator> {
        use ItemSeparator::*;
        [Weapons, Armor, Rings, Goods]
            .into_iter()
            .find(|&s| s as u8 == value)
    }

    /// Catalog category numeric for this separator.
    pub fn category(self) -> u32 {
        match self {
            ItemSeparator::Weapons => 0,
            ItemSeparator::Armor => 1,
            ItemSeparator::Rings => 2,
            ItemSeparator::Goods => 4,
        }
    }
}

/// Weapon modifier folded into the identifier's hundreds digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemInfusion {
    Standard = 0,
    Heavy = 1,
    Sharp = 2,
    Refined = 3,
    Simple = 4,
    Crystal = 5,
    Fire = 6,
    Chaos = 7,
    Lightning = 8,
    Deep = 9,
    Dark = 10,
    Poison = 11,
    Blood = 12,
    Raw = 13,
    Blessed = 14,
    Hollow = 15,
}

impl ItemInfusion {
    pub fn from_index(value: u32) -> Option<ItemInfusion> {
        use ItemInfusion::*;
        [
            Standard, Heavy, Sharp, Refined, Simple, Crystal, Fire, Chaos, Lightning, Deep, Dark,
            Poison, Blood, Raw, Blessed, Hollow,
        ]
        .into_iter()
        .find(|&i| i as u32 == value)
    }
}

/// Fold infusion and upgrade into a base identifier.
pub fn encode_item_id(base: u32, infusion: ItemInfusion, upgrade: u32) -> u32 {
    base + infusion as u32 * 100 + upgrade
}

/// One 16-byte inventory record, detached from the character buffer.
#[derive(Clone)]
pub struct InventoryItem {
    data: [u8; ITEM_SIZE],
    pub slot: usize,
}

impl InventoryItem {
    pub fn from_bytes(bytes: &[u8], slot: usize) -> Self {
        let mut data = [0u8; ITEM_SIZE];
        let take = bytes.len().min(ITEM_SIZE);
        data[..take].copy_from_slice(&bytes[..take]);
        InventoryItem { data, slot }
    }

    /// Canonical empty record.
    pub fn empty(slot: usize) -> Self {
        InventoryItem {
            data: [0u8; ITEM_SIZE],
            slot,
        }
    }

    pub fn as_bytes(&self) -> &[u8; ITEM_SIZE] {
        &self.data
    }

    pub fn separator(&self) -> u8 {
        self.data[3]
    }

    pub fn set_separator(&mut self, value: u8) {
        self.data[3] = value;
    }

    pub fn item_id(&self) -> u32 {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&self.data[4..8]);
        u32::from_le_bytes(bytes)
    }

    pub fn set_item_id(&mut self, value: u32) {
        self.data[4..8].copy_from_slice(&value.to_le_bytes());
    }

    pub fn quantity(&self) -> u8 {
        self.data[8]
    }

    pub fn set_quantity(&mut self, value: u8) {
        self.data[8] = value;
    }

    pub fn clear_signature(&mut self) {
        self.data[SIGNATURE_OFFSET] = 0;
        self.data[SIGNATURE_OFFSET + 1] = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.data.iter().all(|&b| b == 0x00)
            || self.data.iter().all(|&b| b == 0xFF)
            || self.data[..8] == GARBAGE_PREFIX
            || self.quantity() == 0
    }
}

/// A decoded record: catalog entry plus the modifiers recovered from the
/// identifier arithmetic.
pub struct DecodedItem<'a> {
    pub entry: &'a ItemEntry,
    pub infusion: ItemInfusion,
    pub upgrade: u32,
}

/// Inventory view over one archive character record.
pub struct Inventory<'a> {
    character: &'a mut Character,
    catalog: &'a ItemCatalog,
}

impl<'a> Inventory<'a> {
    pub fn new(character: &'a mut Character, catalog: &'a ItemCatalog) -> Self {
        Inventory { character, catalog }
    }

    fn anchor(&self) -> Result<usize, InventoryError> {
        pattern::find_bnd4_anchor(self.character.as_bytes()).ok_or(InventoryError::AnchorNotFound)
    }

    fn relative_offset(&self, relative: i64) -> Result<usize, InventoryError> {
        let anchor = self.anchor()?;
        let len = self.character.len();
        pattern::resolve(anchor, relative, len)
            .ok_or(RecordError::OffsetOutOfBounds { offset: anchor, len }.into())
    }

    fn slot_offset(&self, slot: usize) -> Result<usize, InventoryError> {
        if slot >= MAX_SLOTS {
            return Err(InventoryError::SlotOutOfRange { slot });
        }
        self.relative_offset(INVENTORY_RELATIVE + (slot * ITEM_SIZE) as i64)
    }

    pub fn read_slot(&self, slot: usize) -> Result<InventoryItem, InventoryError> {
        let offset = self.slot_offset(slot)?;
        let bytes = self.character.get_span(offset, ITEM_SIZE)?;
        Ok(InventoryItem::from_bytes(bytes, slot))
    }

    pub fn write_slot(&mut self, slot: usize, item: &InventoryItem) -> Result<(), InventoryError> {
        let offset = self.slot_offset(slot)?;
        self.character.set_span(offset, item.as_bytes())?;
        Ok(())
    }

    /// Every non-empty record, in slot order.
    pub fn items(&self) -> Vec<InventoryItem> {
        (0..MAX_SLOTS)
            .filter_map(|slot| self.read_slot(slot).ok())
            .filter(|item| !item.is_empty())
            .collect()
    }

    /// Recover catalog entry, infusion, and upgrade from a stored record.
    ///
    /// The identifier's low digits were shifted by the modifier
    /// arithmetic, so the base is found by catalog search rather than by
    /// trusting the arithmetic alone.
    pub fn decode(&self, item: &InventoryItem) -> Option<DecodedItem<'_>> {
        let separator = ItemSeparator::from_byte(item.separator())?;
        let entry = self
            .catalog
            .find_base_for(separator.category(), item.item_id())?;

        let residue = item.item_id() - entry.id;
        let infusion = ItemInfusion::from_index(residue / 100)?;
        Some(DecodedItem {
            entry,
            infusion,
            upgrade: residue % 100,
        })
    }

    /// First slot index whose record *and* successor are both empty. The
    /// format rejects inserts into a lone gap, so a single empty slot is
    /// never usable.
    pub fn find_next_available_slot(&self) -> Result<Option<usize>, InventoryError> {
        let mut previous_empty = false;
        for slot in 0..MAX_SLOTS {
            let empty = self.read_slot(slot)?.is_empty();
            if previous_empty && empty {
                return Ok(Some(slot - 1));
            }
            previous_empty = empty;
        }
        Ok(None)
    }

    /// Paired insertion counters.
    pub fn counters(&self) -> Result<(u16, u16), InventoryError> {
        let first = self.character.get_u16(self.relative_offset(COUNTER1_RELATIVE)?)?;
        let second = self.character.get_u16(self.relative_offset(COUNTER2_RELATIVE)?)?;
        Ok((first, second))
    }

    fn bump_counters(&mut self) -> Result<(), InventoryError> {
        let (first, second) = self.counters()?;
        let first_offset = self.relative_offset(COUNTER1_RELATIVE)?;
        let second_offset = self.relative_offset(COUNTER2_RELATIVE)?;
        self.character.set_u16(first_offset, first.wrapping_add(1))?;
        self.character.set_u16(second_offset, second.wrapping_add(1))?;
        Ok(())
    }

    fn find_stack(&self, stored_id: u32, separator: ItemSeparator) -> Option<InventoryItem> {
        self.items().into_iter().find(|item| {
            item.item_id() == stored_id && item.separator() == separator as u8
        })
    }

    /// Insertion point honoring the two-consecutive-empty guard: the
    /// caller's explicit target when its pair is free, otherwise the next
    /// available pair.
    fn insertion_slot(&self, target: Option<usize>) -> Result<Option<usize>, InventoryError> {
        match target {
            None => self.find_next_available_slot(),
            Some(slot) => {
                if slot + 1 >= MAX_SLOTS {
                    return Err(InventoryError::SlotOutOfRange { slot });
                }
                let pair_free =
                    self.read_slot(slot)?.is_empty() && self.read_slot(slot + 1)?.is_empty();
                Ok(pair_free.then_some(slot))
            }
        }
    }

    /// Add an item. Stackable goods merge into an existing stack (clamped
    /// to max stack) without touching the counters; a genuinely new
    /// record needs a two-slot gap and ticks both counters exactly once.
    /// Returns the slot written, or `None` when no gap is left.
    pub fn add_item(
        &mut self,
        entry: &ItemEntry,
        quantity: u8,
        upgrade: u32,
        infusion: ItemInfusion,
        target_slot: Option<usize>,
    ) -> Result<Option<usize>, InventoryError> {
        let separator = ItemSeparator::for_kind(entry.kind);
        let stored_id = if entry.kind == ItemKind::Weapon {
            encode_item_id(entry.id, infusion, upgrade)
        } else {
            entry.id
        };

        let max_stack = entry.max_stack.min(u8::MAX as u32) as u8;

        if target_slot.is_none() && !entry.kind.is_equipment() && entry.max_stack > 1 {
            if let Some(mut stack) = self.find_stack(stored_id, separator) {
                let merged = stack.quantity().saturating_add(quantity).min(max_stack);
                stack.set_quantity(merged);
                let slot = stack.slot;
                self.write_slot(slot, &stack)?;
                return Ok(Some(slot));
            }
        }

        let Some(slot) = self.insertion_slot(target_slot)? else {
            return Ok(None);
        };

        let mut fresh = InventoryItem::empty(slot);
        fresh.set_separator(separator as u8);
        fresh.set_item_id(stored_id);
        fresh.set_quantity(quantity.min(max_stack));
        fresh.clear_signature();

        self.write_slot(slot, &fresh)?;
        self.bump_counters()?;
        Ok(Some(slot))
    }

    /// Overwrite a slot with the canonical empty pattern.
    pub fn delete_slot(&mut self, slot: usize) -> Result<(), InventoryError> {
        self.write_slot(slot, &InventoryItem::empty(slot))
    }
}
