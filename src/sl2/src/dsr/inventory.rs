//! Remastered inventory codec.
//!
//! Items live in 2048 fixed 28-byte records starting at 0x370. Upgrade
//! level and infusion are not separate fields: they are folded into the
//! item identifier as `base + infusion*100 + upgrade`, except for a few
//! item families that predate that scheme and must be matched by range
//! before the general rule applies.

use crate::catalog::{ItemCatalog, ItemEntry, ItemKind};
use crate::character::{Character, RecordError};
use thiserror::Error;

pub const INVENTORY_START: usize = 0x370;
pub const ITEM_SIZE: usize = 28;
pub const MAX_SLOTS: usize = 2048;

/// Key items occupy the first 64 slots; everything else starts after.
const KEY_SLOT_END: usize = 64;

/// High-water mark the game uses to bound its inventory scan.
const ITEMS_NUMBER_OFFSET: usize = 0xE370;
/// Highest weapon upgrade carried, used for matchmaking.
const WEAPON_LEVEL_OFFSET: usize = 0x179;

/// Ascended pyromancy flame, always matchmaking level 15.
const ASCENDED_FLAME_BASE_ID: u32 = 0x145320;

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("Inventory slot {slot} out of range (0..{MAX_SLOTS})")]
    SlotOutOfRange { slot: usize },

    #[error("Item {0:?} cannot be infused")]
    NotInfusable(String),

    #[error("Item {0:?} cannot be upgraded")]
    NotUpgradable(String),

    #[error("Item {name:?} cannot be upgraded beyond +{max} (requested +{requested})")]
    UpgradeTooHigh {
        name: String,
        max: u32,
        requested: u32,
    },

    #[error("Item {name:?} stacks to at most {max} (requested {requested})")]
    StackTooLarge {
        name: String,
        max: u32,
        requested: u32,
    },

    #[error(transparent)]
    Record(#[from] RecordError),
}

/// Weapon/armor modifier folded into the item identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemInfusion {
    Standard = 0,
    Crystal = 1,
    Lightning = 2,
    Raw = 3,
    Magic = 4,
    Enchanted = 5,
    Divine = 6,
    Occult = 7,
    Fire = 8,
    Chaos = 9,
}

impl ItemInfusion {
    pub fn from_index(value: u32) -> Option<ItemInfusion> {
        use ItemInfusion::*;
        [
            Standard, Crystal, Lightning, Raw, Magic, Enchanted, Divine, Occult, Fire, Chaos,
        ]
        .into_iter()
        .find(|&i| i as u32 == value)
    }

    /// Infusion paths shorten the upgrade track.
    pub fn max_upgrade_for(self, base_max: u32) -> u32 {
        match self {
            ItemInfusion::Standard => base_max,
            ItemInfusion::Magic | ItemInfusion::Divine | ItemInfusion::Fire => base_max.min(10),
            _ => base_max.min(5),
        }
    }
}

/// Category numeric stored in the record's leading word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemCategory {
    WeaponsShields = 0,
    Armor = 1,
    Rings = 2,
    Consumables = 4,
}

/// One 28-byte inventory record, detached from the character buffer.
///
/// Word layout: category (stored x16, big-endian), identifier, quantity,
/// order, exists flag, durability, reserved (always written as zero).
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

    pub fn empty(slot: usize) -> Self {
        let mut item = InventoryItem {
            data: [0xFF; ITEM_SIZE],
            slot,
        };
        item.set_exists(0);
        item.set_reserved(0);
        item
    }

    pub fn as_bytes(&self) -> &[u8; ITEM_SIZE] {
        &self.data
    }

    fn read_u32(&self, offset: usize) -> u32 {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&self.data[offset..offset + 4]);
        u32::from_le_bytes(bytes)
    }

    fn write_u32(&mut self, offset: usize, value: u32) {
        self.data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    /// Category word: the numeric category times 16, big-endian.
    pub fn category_raw(&self) -> u32 {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&self.data[..4]);
        u32::from_be_bytes(bytes) / 16
    }

    pub fn set_category_raw(&mut self, value: u32) {
        self.data[..4].copy_from_slice(&(value * 16).to_be_bytes());
    }

    pub fn item_id(&self) -> u32 {
        self.read_u32(4)
    }

    pub fn set_item_id(&mut self, value: u32) {
        self.write_u32(4, value);
    }

    pub fn quantity(&self) -> u32 {
        self.read_u32(8)
    }

    pub fn set_quantity(&mut self, value: u32) {
        self.write_u32(8, value);
    }

    pub fn order(&self) -> u32 {
        self.read_u32(12)
    }

    pub fn set_order(&mut self, value: u32) {
        self.write_u32(12, value);
    }

    pub fn exists(&self) -> u32 {
        self.read_u32(16)
    }

    pub fn set_exists(&mut self, value: u32) {
        self.write_u32(16, value);
    }

    pub fn durability(&self) -> u32 {
        self.read_u32(20)
    }

    pub fn set_durability(&mut self, value: u32) {
        self.write_u32(20, value);
    }

    pub fn reserved(&self) -> u32 {
        self.read_u32(24)
    }

    pub fn set_reserved(&mut self, value: u32) {
        self.write_u32(24, value);
    }

    pub fn is_empty(&self) -> bool {
        self.data.iter().all(|&b| b == 0xFF)
            || self.data.iter().all(|&b| b == 0x00)
            || self.exists() == 0
    }

    fn has_encoded_modifiers(&self) -> bool {
        // Only weapons/shields and armor fold upgrade data into the id.
        self.category_raw() == 0 || self.category_raw() == 1
    }

    /// Base identifier with upgrade/infusion arithmetic stripped.
    ///
    /// The range matchers are format quirks and must run before the
    /// general rule; they are not derivable from it.
    pub fn base_item_id(&self) -> u32 {
        let id = self.item_id();

        if !self.has_encoded_modifiers() {
            return id;
        }

        if (1330000..1332000).contains(&id) {
            return 1330000;
        }
        if (1332000..=1332500).contains(&id) {
            return 1332000;
        }
        if (311000..=312705).contains(&id) {
            return 311000;
        }

        let without_upgrade = id - (id % 100);
        without_upgrade - (without_upgrade % 1000)
    }

    pub fn upgrade_level(&self) -> u32 {
        let id = self.item_id();

        if !self.has_encoded_modifiers() {
            return 0;
        }

        if (1330000..1332000).contains(&id) {
            return (id - 1330000) / 100;
        }
        if (1332000..=1332500).contains(&id) {
            return (id - 1332000) / 100;
        }

        id % 100
    }

    pub fn set_upgrade_level(&mut self, level: u32) {
        match self.base_item_id() {
            1330000 => self.set_item_id(1330000 + level * 100),
            1332000 => self.set_item_id(1332000 + level * 100),
            311000 => self.set_item_id(311000 + level),
            base => {
                let infusion = self.infusion() as u32 * 100;
                self.set_item_id(base + infusion + level);
            }
        }
    }

    pub fn infusion(&self) -> ItemInfusion {
        let id = self.item_id();

        if self.category_raw() != 0 {
            return ItemInfusion::Standard;
        }
        if (1330000..=1332500).contains(&id) || (311000..=312705).contains(&id) {
            return ItemInfusion::Standard;
        }

        let without_upgrade = id - (id % 100);
        ItemInfusion::from_index((without_upgrade % 1000) / 100).unwrap_or(ItemInfusion::Standard)
    }

    pub fn set_infusion(&mut self, infusion: ItemInfusion) {
        let id = self.item_id();
        // Range-encoded families have no infusion digit to write.
        if (1330000..=1332500).contains(&id) || (311000..=312705).contains(&id) {
            return;
        }

        let base = self.base_item_id();
        let upgrade = self.upgrade_level();
        self.set_item_id(base + infusion as u32 * 100 + upgrade);
    }
}

/// Inventory view over one character record.
pub struct Inventory<'a> {
    character: &'a mut Character,
    catalog: &'a ItemCatalog,
}

impl<'a> Inventory<'a> {
    pub fn new(character: &'a mut Character, catalog: &'a ItemCatalog) -> Self {
        Inventory { character, catalog }
    }

    fn slot_offset(slot: usize) -> Result<usize, InventoryError> {
        if slot >= MAX_SLOTS {
            return Err(InventoryError::SlotOutOfRange { slot });
        }
        Ok(INVENTORY_START + slot * ITEM_SIZE)
    }

    pub fn read_slot(&self, slot: usize) -> Result<InventoryItem, InventoryError> {
        let offset = Self::slot_offset(slot)?;
        let bytes = self.character.get_span(offset, ITEM_SIZE)?;
        Ok(InventoryItem::from_bytes(bytes, slot))
    }

    pub fn write_slot(&mut self, slot: usize, item: &InventoryItem) -> Result<(), InventoryError> {
        let offset = Self::slot_offset(slot)?;
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

    /// Catalog entry for a stored record, matching by stripped base id.
    pub fn item_info(&self, item: &InventoryItem) -> Option<&ItemEntry> {
        self.catalog.find(item.category_raw(), item.base_item_id())
    }

    fn slot_range(kind: ItemKind) -> std::ops::Range<usize> {
        if kind == ItemKind::Key {
            0..KEY_SLOT_END
        } else {
            KEY_SLOT_END..MAX_SLOTS
        }
    }

    fn find_existing(
        &self,
        entry: &ItemEntry,
        upgrade: u32,
        infusion: ItemInfusion,
    ) -> Option<InventoryItem> {
        for slot in Self::slot_range(entry.kind) {
            let Ok(item) = self.read_slot(slot) else {
                break;
            };
            if item.is_empty() {
                continue;
            }
            if item.base_item_id() == entry.id
                && item.category_raw() == entry.category
                && item.upgrade_level() == upgrade
                && item.infusion() == infusion
            {
                return Some(item);
            }
        }
        None
    }

    fn validate(
        &self,
        entry: &ItemEntry,
        quantity: u32,
        upgrade: u32,
        infusion: ItemInfusion,
    ) -> Result<(), InventoryError> {
        if infusion != ItemInfusion::Standard && entry.can_infuse == Some(false) {
            return Err(InventoryError::NotInfusable(entry.name.clone()));
        }

        if upgrade > 0 {
            let Some(base_max) = entry.max_upgrade else {
                return Err(InventoryError::NotUpgradable(entry.name.clone()));
            };
            let max = if entry.id == ASCENDED_FLAME_BASE_ID {
                5
            } else {
                infusion.max_upgrade_for(base_max)
            };
            if upgrade > max {
                return Err(InventoryError::UpgradeTooHigh {
                    name: entry.name.clone(),
                    max,
                    requested: upgrade,
                });
            }
        }

        if quantity > entry.max_stack {
            return Err(InventoryError::StackTooLarge {
                name: entry.name.clone(),
                max: entry.max_stack,
                requested: quantity,
            });
        }

        Ok(())
    }

    /// The slot a new record will land in: the caller's explicit target
    /// when it is free, otherwise the first empty slot of the item's
    /// range.
    fn insertion_slot(
        &self,
        entry: &ItemEntry,
        target: Option<usize>,
    ) -> Result<Option<usize>, InventoryError> {
        if let Some(slot) = target {
            if slot >= MAX_SLOTS {
                return Err(InventoryError::SlotOutOfRange { slot });
            }
            return Ok(self.read_slot(slot)?.is_empty().then_some(slot));
        }

        for slot in Self::slot_range(entry.kind) {
            let Ok(item) = self.read_slot(slot) else {
                break;
            };
            if item.is_empty() {
                return Ok(Some(slot));
            }
        }
        Ok(None)
    }

    /// Add an item, merging into an existing stack when the catalog says
    /// it stacks and it is not equipment. Returns the slot written, or
    /// `None` when every eligible slot (or the explicit target) is
    /// occupied.
    pub fn add_item(
        &mut self,
        entry: &ItemEntry,
        quantity: u32,
        upgrade: u32,
        infusion: ItemInfusion,
        target_slot: Option<usize>,
    ) -> Result<Option<usize>, InventoryError> {
        self.validate(entry, quantity, upgrade, infusion)?;

        if target_slot.is_none() && !entry.kind.is_equipment() && entry.max_stack > 1 {
            if let Some(mut existing) = self.find_existing(entry, upgrade, infusion) {
                let merged = (existing.quantity() + quantity).min(entry.max_stack);
                existing.set_quantity(merged);
                let slot = existing.slot;
                self.write_slot(slot, &existing)?;
                self.bump_items_number(slot)?;
                return Ok(Some(slot));
            }
        }

        if let Some(slot) = self.insertion_slot(entry, target_slot)? {
            let mut fresh = InventoryItem::from_bytes(&[0u8; ITEM_SIZE], slot);
            fresh.set_category_raw(entry.category);
            fresh.set_item_id(entry.id);
            fresh.set_quantity(quantity.min(entry.max_stack));
            fresh.set_order(slot as u32);
            fresh.set_exists(1);

            let mut durability = entry.durability.unwrap_or(0);
            if infusion == ItemInfusion::Crystal {
                durability /= 10;
            }
            fresh.set_durability(durability);
            fresh.set_reserved(0);
            fresh.set_upgrade_level(upgrade);
            fresh.set_infusion(infusion);

            self.write_slot(slot, &fresh)?;
            self.bump_items_number(slot)?;
            return Ok(Some(slot));
        }

        Ok(None)
    }

    /// Overwrite a slot with the canonical empty pattern.
    pub fn delete_slot(&mut self, slot: usize) -> Result<(), InventoryError> {
        self.write_slot(slot, &InventoryItem::empty(slot))
    }

    /// Remove the first record matching a catalog entry. Returns the
    /// cleared slot, or `None` when the item is not carried.
    pub fn remove_item(&mut self, entry: &ItemEntry) -> Result<Option<usize>, InventoryError> {
        for item in self.items() {
            if item.category_raw() == entry.category && item.base_item_id() == entry.id {
                let slot = item.slot;
                self.delete_slot(slot)?;
                return Ok(Some(slot));
            }
        }
        Ok(None)
    }

    /// High-water mark of the occupied slot range.
    pub fn items_number(&self) -> Result<u32, InventoryError> {
        Ok(self.character.get_u32(ITEMS_NUMBER_OFFSET)?)
    }

    fn bump_items_number(&mut self, slot: usize) -> Result<(), InventoryError> {
        let current = self.items_number()?;
        if slot as u32 > current {
            self.character.set_u32(ITEMS_NUMBER_OFFSET, slot as u32)?;
        }
        Ok(())
    }

    /// Matchmaking weapon level byte.
    pub fn weapon_level(&self) -> Result<u8, InventoryError> {
        Ok(self.character.get_byte(WEAPON_LEVEL_OFFSET)?)
    }

    pub fn set_weapon_level(&mut self, level: u8) -> Result<(), InventoryError> {
        Ok(self.character.set_byte(WEAPON_LEVEL_OFFSET, level)?)
    }

    /// Effective matchmaking level of one weapon record.
    pub fn effective_weapon_level(&self, item: &InventoryItem) -> u32 {
        let Some(entry) = self.item_info(item) else {
            return 0;
        };
        if entry.kind != ItemKind::Weapon {
            return 0;
        }
        let Some(base_max) = entry.max_upgrade else {
            return 0;
        };

        if item.base_item_id() == ASCENDED_FLAME_BASE_ID {
            return 15;
        }
        if base_max == 5 {
            return 5 + item.upgrade_level() * 2;
        }

        let upgrade = item.upgrade_level();
        match item.infusion().max_upgrade_for(base_max) {
            15 => upgrade,
            5 => 10 + upgrade,
            10 => 5 + upgrade,
            _ => upgrade,
        }
    }

    /// Recompute the weapon-level byte from the carried weapons.
    pub fn calibrate_weapon_level(&mut self) -> Result<u8, InventoryError> {
        let best = self
            .items()
            .iter()
            .map(|item| self.effective_weapon_level(item))
            .max()
            .unwrap_or(0)
            .min(u8::MAX as u32) as u8;

        self.set_weapon_level(best)?;
        Ok(best)
    }

    /// Equipped gear: read the slot index stored for one equipment
    /// position, `None` when nothing is equipped there.
    pub fn equipped(&self, slot: EquipSlot) -> Result<Option<u32>, InventoryError> {
        let value = self.character.get_u32(slot.index_offset())?;
        Ok((value != u32::MAX).then_some(value))
    }

    /// Point an equipment position at an inventory slot (or clear it).
    ///
    /// The record keeps a mirror of the equipped item's identifier next
    /// to the index; both are written together.
    pub fn set_equipped(
        &mut self,
        slot: EquipSlot,
        inventory_slot: Option<u32>,
    ) -> Result<(), InventoryError> {
        match inventory_slot {
            None => {
                self.character.set_u32(slot.index_offset(), u32::MAX)?;
                self.character.set_u32(slot.mirror_offset(), u32::MAX)?;
            }
            Some(index) => {
                let item = self.read_slot(index as usize)?;
                self.character.set_u32(slot.index_offset(), index)?;
                self.character.set_u32(slot.mirror_offset(), item.item_id())?;
            }
        }
        Ok(())
    }
}

/// Equipment positions and their paired index/identifier offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EquipSlot {
    LeftHand1,
    LeftHand2,
    RightHand1,
    RightHand2,
    Helm,
    Armor,
    Gauntlets,
    Legs,
    Ring1,
    Ring2,
}

impl EquipSlot {
    fn index_offset(self) -> usize {
        match self {
            EquipSlot::LeftHand1 => 0x2A8,
            EquipSlot::RightHand1 => 0x2AC,
            EquipSlot::LeftHand2 => 0x2B0,
            EquipSlot::RightHand2 => 0x2B4,
            EquipSlot::Helm => 0x2C8,
            EquipSlot::Armor => 0x2CC,
            EquipSlot::Gauntlets => 0x2D0,
            EquipSlot::Legs => 0x2D4,
            EquipSlot::Ring1 => 0x2DC,
            EquipSlot::Ring2 => 0x2E0,
        }
    }

    fn mirror_offset(self) -> usize {
        match self {
            EquipSlot::LeftHand1 => 0x314,
            EquipSlot::RightHand1 => 0x318,
            EquipSlot::LeftHand2 => 0x31C,
            EquipSlot::RightHand2 => 0x320,
            EquipSlot::Helm => 0x334,
            EquipSlot::Armor => 0x338,
            EquipSlot::Gauntlets => 0x33C,
            EquipSlot::Legs => 0x340,
            EquipSlot::Ring1 => 0x348,
            EquipSlot::Ring2 => 0x34C,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> ItemCatalog {
        ItemCatalog::from_json(
            r#"{
            "weapon_items": [
                {"Type": "0x00000000", "Id": "0x000C9954", "MaxStackCount": 1,
                 "Category": "Swords", "Name": "Longsword",
                 "MaxUpgrade": 15, "CanInfuse": true, "Durability": 200},
                {"Type": "0x00000000", "Id": "0x00145320", "MaxStackCount": 1,
                 "Category": "Flames", "Name": "Pyromancy Flame (Ascended)",
                 "MaxUpgrade": 5, "CanInfuse": false}
            ],
            "ring_items": [
                {"Type": "0x20000000", "Id": "0x000186A0", "MaxStackCount": 1,
                 "Category": "Rings", "Name": "Havel's Ring"}
            ],
            "consumable_items": [
                {"Type": "0x40000000", "Id": "0x0000010C", "MaxStackCount": 99,
                 "Category": "Consumables", "Name": "Green Blossom"}
            ],
            "key_items": [
                {"Type": "0x40000000", "Id": "0x000007D3", "MaxStackCount": 1,
                 "Category": "Key Items", "Name": "Master Key"}
            ]
        }"#,
        )
        .unwrap()
    }

    fn character() -> Character {
        Character::new(vec![0u8; 0x20000], 0)
    }

    #[test]
    fn test_id_arithmetic_general_rule() {
        for infusion_idx in 0..10u32 {
            for upgrade in [0u32, 1, 5, 15] {
                let infusion = ItemInfusion::from_index(infusion_idx).unwrap();
                let mut item = InventoryItem::from_bytes(&[0; ITEM_SIZE], 0);
                item.set_category_raw(0);
                item.set_item_id(826000);
                item.set_infusion(infusion);
                item.set_upgrade_level(upgrade);

                assert_eq!(item.item_id(), 826000 + infusion_idx * 100 + upgrade);
                assert_eq!(item.base_item_id(), 826000);
                assert_eq!(item.infusion(), infusion);
                assert_eq!(item.upgrade_level(), upgrade);
            }
        }
    }

    #[test]
    fn test_id_arithmetic_special_ranges() {
        // +100 per level, no infusion digit
        let mut flame = InventoryItem::from_bytes(&[0; ITEM_SIZE], 0);
        flame.set_category_raw(0);
        flame.set_item_id(1330000);
        flame.set_upgrade_level(7);
        assert_eq!(flame.item_id(), 1330700);
        assert_eq!(flame.base_item_id(), 1330000);
        assert_eq!(flame.upgrade_level(), 7);
        assert_eq!(flame.infusion(), ItemInfusion::Standard);

        let mut ascended = InventoryItem::from_bytes(&[0; ITEM_SIZE], 0);
        ascended.set_category_raw(0);
        ascended.set_item_id(1332000);
        ascended.set_upgrade_level(3);
        assert_eq!(ascended.item_id(), 1332300);
        assert_eq!(ascended.base_item_id(), 1332000);

        // +1 per level family
        let mut arrow = InventoryItem::from_bytes(&[0; ITEM_SIZE], 0);
        arrow.set_category_raw(0);
        arrow.set_item_id(311000);
        arrow.set_upgrade_level(5);
        assert_eq!(arrow.item_id(), 311005);
        assert_eq!(arrow.base_item_id(), 311000);
        assert_eq!(arrow.upgrade_level(), 5);

        // infusion writes are ignored for range-encoded families
        arrow.set_infusion(ItemInfusion::Chaos);
        assert_eq!(arrow.item_id(), 311005);
    }

    #[test]
    fn test_category_word_stored_times_sixteen() {
        let mut item = InventoryItem::from_bytes(&[0; ITEM_SIZE], 0);
        item.set_category_raw(4);
        assert_eq!(item.as_bytes()[..4], [0x00, 0x00, 0x00, 0x40]);
        assert_eq!(item.category_raw(), 4);
    }

    #[test]
    fn test_add_item_writes_record() {
        let catalog = catalog();
        let mut ch = character();
        let mut inv = Inventory::new(&mut ch, &catalog);

        let sword = catalog.find_by_name("Longsword").unwrap();
        let slot = inv
            .add_item(sword, 1, 5, ItemInfusion::Lightning, None)
            .unwrap()
            .unwrap();
        assert_eq!(slot, KEY_SLOT_END); // first general slot

        let item = inv.read_slot(slot).unwrap();
        assert!(!item.is_empty());
        assert_eq!(item.base_item_id(), 0x000C_9954);
        assert_eq!(item.upgrade_level(), 5);
        assert_eq!(item.infusion(), ItemInfusion::Lightning);
        assert_eq!(item.exists(), 1);
        assert_eq!(item.order(), slot as u32);
        assert_eq!(item.durability(), 200);

        assert_eq!(inv.items_number().unwrap(), slot as u32);
    }

    #[test]
    fn test_add_item_merges_stacks() {
        let catalog = catalog();
        let mut ch = character();
        let mut inv = Inventory::new(&mut ch, &catalog);

        let blossom = catalog.find_by_name("Green Blossom").unwrap();
        let first = inv
            .add_item(blossom, 10, 0, ItemInfusion::Standard, None)
            .unwrap()
            .unwrap();
        let second = inv
            .add_item(blossom, 95, 0, ItemInfusion::Standard, None)
            .unwrap()
            .unwrap();

        assert_eq!(first, second);
        // merged and clamped to the max stack
        assert_eq!(inv.read_slot(first).unwrap().quantity(), 99);
    }

    #[test]
    fn test_add_item_explicit_target_slot() {
        let catalog = catalog();
        let mut ch = character();
        let mut inv = Inventory::new(&mut ch, &catalog);

        let sword = catalog.find_by_name("Longsword").unwrap();
        let slot = inv
            .add_item(sword, 1, 0, ItemInfusion::Standard, Some(200))
            .unwrap();
        assert_eq!(slot, Some(200));

        // an occupied target is not overwritten
        let blocked = inv
            .add_item(sword, 1, 0, ItemInfusion::Standard, Some(200))
            .unwrap();
        assert_eq!(blocked, None);
    }

    #[test]
    fn test_key_items_use_leading_slots() {
        let catalog = catalog();
        let mut ch = character();
        let mut inv = Inventory::new(&mut ch, &catalog);

        let key = catalog.find_by_name("Master Key").unwrap();
        let slot = inv
            .add_item(key, 1, 0, ItemInfusion::Standard, None)
            .unwrap()
            .unwrap();
        assert!(slot < KEY_SLOT_END);
    }

    #[test]
    fn test_add_item_validation() {
        let catalog = catalog();
        let mut ch = character();
        let mut inv = Inventory::new(&mut ch, &catalog);

        let flame = catalog.find_by_name("Pyromancy Flame (Ascended)").unwrap();
        assert!(matches!(
            inv.add_item(flame, 1, 0, ItemInfusion::Fire, None),
            Err(InventoryError::NotInfusable(_))
        ));
        assert!(matches!(
            inv.add_item(flame, 1, 6, ItemInfusion::Standard, None),
            Err(InventoryError::UpgradeTooHigh { max: 5, .. })
        ));

        let ring = catalog.find_by_name("Havel's Ring").unwrap();
        assert!(matches!(
            inv.add_item(ring, 2, 0, ItemInfusion::Standard, None),
            Err(InventoryError::StackTooLarge { .. })
        ));

        let sword = catalog.find_by_name("Longsword").unwrap();
        assert!(matches!(
            inv.add_item(sword, 1, 10, ItemInfusion::Crystal, None),
            Err(InventoryError::UpgradeTooHigh { max: 5, .. })
        ));
    }

    #[test]
    fn test_delete_writes_canonical_empty_pattern() {
        let catalog = catalog();
        let mut ch = character();
        let mut inv = Inventory::new(&mut ch, &catalog);

        let sword = catalog.find_by_name("Longsword").unwrap();
        let slot = inv
            .add_item(sword, 1, 0, ItemInfusion::Standard, None)
            .unwrap()
            .unwrap();
        inv.delete_slot(slot).unwrap();

        let item = inv.read_slot(slot).unwrap();
        assert!(item.is_empty());
        assert_eq!(item.exists(), 0);
        assert_eq!(item.reserved(), 0);
        assert_eq!(item.as_bytes()[..4], [0xFF; 4]);
    }

    #[test]
    fn test_slot_bounds() {
        let catalog = catalog();
        let mut ch = character();
        let inv = Inventory::new(&mut ch, &catalog);
        assert!(matches!(
            inv.read_slot(MAX_SLOTS),
            Err(InventoryError::SlotOutOfRange { .. })
        ));
    }

    #[test]
    fn test_weapon_level_calibration() {
        let catalog = catalog();
        let mut ch = character();
        let mut inv = Inventory::new(&mut ch, &catalog);

        let sword = catalog.find_by_name("Longsword").unwrap();
        inv.add_item(sword, 1, 4, ItemInfusion::Standard, None).unwrap();
        // crystal caps the track at 5, so +3 crystal sits in the 10..15 band
        inv.add_item(sword, 1, 3, ItemInfusion::Crystal, None).unwrap();

        assert_eq!(inv.calibrate_weapon_level().unwrap(), 13);
        assert_eq!(inv.weapon_level().unwrap(), 13);
    }

    #[test]
    fn test_equipment_mirror_pairs() {
        let catalog = catalog();
        let mut ch = character();
        let mut inv = Inventory::new(&mut ch, &catalog);

        let sword = catalog.find_by_name("Longsword").unwrap();
        let slot = inv
            .add_item(sword, 1, 0, ItemInfusion::Standard, None)
            .unwrap()
            .unwrap();

        inv.set_equipped(EquipSlot::RightHand1, Some(slot as u32)).unwrap();
        assert_eq!(inv.equipped(EquipSlot::RightHand1).unwrap(), Some(slot as u32));

        let item_id = inv.read_slot(slot).unwrap().item_id();
        assert_eq!(inv.character.get_u32(0x318).unwrap(), item_id);

        inv.set_equipped(EquipSlot::RightHand1, None).unwrap();
        assert_eq!(inv.equipped(EquipSlot::RightHand1).unwrap(), None);
        assert_eq!(inv.character.get_u32(0x2AC).unwrap(), u32::MAX);
    }
}
