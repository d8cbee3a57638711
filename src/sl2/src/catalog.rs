//! External item and entity catalogs.
//!
//! Both catalogs are plain JSON data shipped next to the binary, not
//! compiled-in tables: the item catalog lists every known item with its
//! stacking/upgrade rules, the entity catalog maps named world state (an
//! NPC's alive flag, a bonfire's warp flag) to bit positions relative to
//! the record anchor. Catalogs are loaded once and passed by reference
//! into the codec components.

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to parse catalog JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Bad hex identifier in catalog: {0:?}")]
    BadIdentifier(String),
}

fn parse_hex(value: &str) -> Result<u32, CatalogError> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    u32::from_str_radix(digits, 16).map_err(|_| CatalogError::BadIdentifier(value.to_string()))
}

/// Which catalog collection an item came from. Determines slot placement
/// and stacking behavior in the inventory codecs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Weapon,
    Ring,
    Armor,
    Consumable,
    Soul,
    Upgrade,
    Key,
    Spell,
    Usable,
    Ammunition,
    Material,
    Magic,
    Special,
}

impl ItemKind {
    /// Equipment never merges into stacks.
    pub fn is_equipment(self) -> bool {
        matches!(self, ItemKind::Weapon | ItemKind::Armor | ItemKind::Ring)
    }
}

/// One catalog item with its decoded identifiers.
#[derive(Debug, Clone)]
pub struct ItemEntry {
    pub kind: ItemKind,
    /// Category numeric (raw catalog type / 0x10000000).
    pub category: u32,
    /// Base identifier, before infusion/upgrade arithmetic.
    pub id: u32,
    pub name: String,
    pub max_stack: u32,
    pub max_upgrade: Option<u32>,
    pub can_infuse: Option<bool>,
    pub durability: Option<u32>,
}

#[derive(Deserialize)]
struct RawItem {
    #[serde(rename = "Type")]
    type_hex: String,
    #[serde(rename = "Id")]
    id_hex: String,
    #[serde(rename = "MaxStackCount")]
    max_stack: u32,
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "MaxUpgrade")]
    max_upgrade: Option<u32>,
    #[serde(rename = "CanInfuse")]
    can_infuse: Option<bool>,
    #[serde(rename = "Durability")]
    durability: Option<u32>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawItemCatalog {
    weapon_items: Vec<RawItem>,
    ring_items: Vec<RawItem>,
    armor_items: Vec<RawItem>,
    consumable_items: Vec<RawItem>,
    soul_items: Vec<RawItem>,
    upgrade_items: Vec<RawItem>,
    key_items: Vec<RawItem>,
    spell_items: Vec<RawItem>,
    usable_items: Vec<RawItem>,
    ammunition_items: Vec<RawItem>,
    material_items: Vec<RawItem>,
    magic_items: Vec<RawItem>,
    specials: Vec<RawItem>,
}

/// The full item catalog, flattened with per-collection kind tags.
pub struct ItemCatalog {
    items: Vec<ItemEntry>,
}

impl ItemCatalog {
    pub fn from_json(text: &str) -> Result<Self, CatalogError> {
        let raw: RawItemCatalog = serde_json::from_str(text)?;

        let collections = [
            (ItemKind::Weapon, raw.weapon_items),
            (ItemKind::Ring, raw.ring_items),
            (ItemKind::Armor, raw.armor_items),
            (ItemKind::Consumable, raw.consumable_items),
            (ItemKind::Soul, raw.soul_items),
            (ItemKind::Upgrade, raw.upgrade_items),
            (ItemKind::Key, raw.key_items),
            (ItemKind::Spell, raw.spell_items),
            (ItemKind::Usable, raw.usable_items),
            (ItemKind::Ammunition, raw.ammunition_items),
            (ItemKind::Material, raw.material_items),
            (ItemKind::Magic, raw.magic_items),
            (ItemKind::Special, raw.specials),
        ];

        let mut items = Vec::new();
        for (kind, raw_items) in collections {
            for raw_item in raw_items {
                items.push(ItemEntry {
                    kind,
                    category: parse_hex(&raw_item.type_hex)? / 0x1000_0000,
                    id: parse_hex(&raw_item.id_hex)?,
                    name: raw_item.name,
                    max_stack: raw_item.max_stack,
                    max_upgrade: raw_item.max_upgrade,
                    can_infuse: raw_item.can_infuse,
                    durability: raw_item.durability,
                });
            }
        }

        Ok(ItemCatalog { items })
    }

    pub fn iter(&self) -> impl Iterator<Item = &ItemEntry> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Exact lookup by category and base identifier.
    pub fn find(&self, category: u32, id: u32) -> Option<&ItemEntry> {
        self.items
            .iter()
            .find(|item| item.category == category && item.id == id)
    }

    /// Lookup by base identifier alone (first collection wins, matching
    /// the original editor's behavior when no category is given).
    pub fn find_by_id(&self, id: u32) -> Option<&ItemEntry> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&ItemEntry> {
        self.items.iter().find(|item| item.name == name)
    }

    /// Recover the catalog entry for a stored identifier whose low decimal
    /// digits were shifted by infusion/upgrade arithmetic: the entry whose
    /// base id sits within the residue band below the stored id (infusion
    /// indices reach 15, upgrades 99, so the band is 1600 wide).
    pub fn find_base_for(&self, category: u32, stored_id: u32) -> Option<&ItemEntry> {
        self.items.iter().find(|item| {
            item.category == category && item.id <= stored_id && stored_id - item.id < 1600
        })
    }
}

/// One bit definition for a named entity.
#[derive(Debug, Clone)]
pub struct BitEntry {
    /// Offset relative to the record anchor.
    pub offset: i64,
    pub bit: u8,
    /// When set, the stored bit is the inverse of the entity state.
    pub reverse: bool,
}

/// A named piece of world state and the bits that encode it.
#[derive(Debug, Clone)]
pub struct Entity {
    pub name: String,
    pub bits: Vec<BitEntry>,
}

#[derive(Deserialize)]
struct RawBitEntry {
    offset: String,
    bit: u8,
    #[serde(default)]
    reverse: bool,
}

#[derive(Deserialize)]
struct RawEntity {
    name: String,
    bits: Vec<RawBitEntry>,
}

#[derive(Deserialize)]
struct RawEntityCatalog {
    #[serde(alias = "npcs")]
    entities: Vec<RawEntity>,
}

/// Name -> bit definitions, loaded from JSON.
pub struct EntityCatalog {
    entities: Vec<Entity>,
}

impl EntityCatalog {
    pub fn from_json(text: &str) -> Result<Self, CatalogError> {
        let raw: RawEntityCatalog = serde_json::from_str(text)?;

        let mut entities = Vec::with_capacity(raw.entities.len());
        for raw_entity in raw.entities {
            let mut bits = Vec::with_capacity(raw_entity.bits.len());
            for raw_bit in raw_entity.bits {
                bits.push(BitEntry {
                    offset: i64::from(parse_hex(&raw_bit.offset)?),
                    bit: raw_bit.bit,
                    reverse: raw_bit.reverse,
                });
            }
            entities.push(Entity {
                name: raw_entity.name,
                bits,
            });
        }

        Ok(EntityCatalog { entities })
    }

    pub fn get(&self, name: &str) -> Option<&Entity> {
        self.entities.iter().find(|entity| entity.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ITEMS_JSON: &str = r#"{
        "weapon_items": [
            {"Type": "0x00000000", "Id": "0x0012D687", "MaxStackCount": 1,
             "Category": "Swords", "Name": "Longsword",
             "MaxUpgrade": 15, "CanInfuse": true, "Durability": 200}
        ],
        "consumable_items": [
            {"Type": "0x40000000", "Id": "0x0000010C", "MaxStackCount": 99,
             "Category": "Consumables", "Name": "Green Blossom"}
        ]
    }"#;

    #[test]
    fn test_item_catalog_parses_hex_and_kinds() {
        let catalog = ItemCatalog::from_json(ITEMS_JSON).unwrap();
        assert_eq!(catalog.len(), 2);

        let sword = catalog.find(0, 0x0012_D687).unwrap();
        assert_eq!(sword.kind, ItemKind::Weapon);
        assert_eq!(sword.name, "Longsword");
        assert_eq!(sword.max_upgrade, Some(15));

        let blossom = catalog.find(4, 0x10C).unwrap();
        assert_eq!(blossom.kind, ItemKind::Consumable);
        assert_eq!(blossom.max_stack, 99);
        assert!(!blossom.kind.is_equipment());
    }

    #[test]
    fn test_base_recovery_band() {
        let catalog = ItemCatalog::from_json(ITEMS_JSON).unwrap();
        let id = 0x0012_D687 + 305; // infusion 3, upgrade 5
        let entry = catalog.find_base_for(0, id).unwrap();
        assert_eq!(entry.id, 0x0012_D687);
        assert!(catalog.find_base_for(0, 0x0012_D687 + 1600).is_none());
    }

    #[test]
    fn test_bad_identifier() {
        let bad = r#"{"weapon_items": [{"Type": "0xZZ", "Id": "0x1",
            "MaxStackCount": 1, "Category": "x", "Name": "x"}]}"#;
        assert!(matches!(
            ItemCatalog::from_json(bad),
            Err(CatalogError::BadIdentifier(_))
        ));
    }

    #[test]
    fn test_entity_catalog_accepts_npcs_alias() {
        let json = r#"{"npcs": [
            {"name": "Andre of Astora",
             "bits": [{"offset": "0x76", "bit": 3, "reverse": true},
                      {"offset": "0x77", "bit": 0}]}
        ]}"#;

        let catalog = EntityCatalog::from_json(json).unwrap();
        let andre = catalog.get("Andre of Astora").unwrap();
        assert_eq!(andre.bits.len(), 2);
        assert_eq!(andre.bits[0].offset, 0x76);
        assert!(andre.bits[0].reverse);
        assert!(!andre.bits[1].reverse);
        assert!(catalog.get("Nobody").is_none());
    }
}
