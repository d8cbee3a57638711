//! Typed accessors over a remastered character record.
//!
//! Offsets here are absolute: the remastered format keeps its stat block
//! at fixed positions. Only the world-flag region (bonfires, NPC state)
//! shifts and goes through the anchor pattern.

use super::SaveError;
use crate::character::{Character, RecordError};
use crate::pattern;

/// Souls cap enforced by the game UI.
pub const MAX_SOULS: u32 = 999_999_999;
/// Per-stat cap.
pub const MAX_STAT: u8 = 99;

const NAME_OFFSET: usize = 0x108;
/// The record stores the name twice; both regions must stay in sync.
const NAME_MIRROR_OFFSET: usize = 0x18C;
const NAME_REGION: usize = 64;

const HP_CURRENT_OFFSET: usize = 0x78;
const HP_MAX_OFFSET: usize = 0x7C;
const STAMINA_OFFSET: usize = 0x98;
const HUMANITY_OFFSET: usize = 0xE4;
const LEVEL_OFFSET: usize = 0xF0;
const SOULS_OFFSET: usize = 0xF4;
const CLASS_OFFSET: usize = 0x12E;
const COVENANT_OFFSET: usize = 0x173;

/// Bonfire warp unlock bytes, relative to the record anchor.
const BONFIRE_RELATIVE: [i64; 3] = [0x6B, 0x6C, 0x6D];
const WARP_FLAG_RELATIVE: i64 = 0xAE;
/// Values that unlock every warpable bonfire.
const BONFIRE_UNLOCK: [u8; 3] = [0xF0, 0xFF, 0xFF];
const WARP_FLAG_UNLOCK: u8 = 0x22;

/// Leveling stats, each a single byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stat {
    Vitality,
    Attunement,
    Endurance,
    Strength,
    Dexterity,
    Resistance,
    Intelligence,
    Faith,
}

impl Stat {
    pub const ALL: [Stat; 8] = [
        Stat::Vitality,
        Stat::Attunement,
        Stat::Endurance,
        Stat::Strength,
        Stat::Dexterity,
        Stat::Resistance,
        Stat::Intelligence,
        Stat::Faith,
    ];

    fn offset(self) -> usize {
        match self {
            Stat::Vitality => 0xC0,
            Stat::Attunement => 0xC4,
            Stat::Endurance => 0xC8,
            Stat::Strength => 0xCC,
            Stat::Dexterity => 0xD0,
            Stat::Resistance => 0xD4,
            Stat::Intelligence => 0xD8,
            Stat::Faith => 0xDC,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Stat::Vitality => "VIT",
            Stat::Attunement => "ATN",
            Stat::Endurance => "END",
            Stat::Strength => "STR",
            Stat::Dexterity => "DEX",
            Stat::Resistance => "RES",
            Stat::Intelligence => "INT",
            Stat::Faith => "FTH",
        }
    }

    pub fn from_name(name: &str) -> Option<Stat> {
        Stat::ALL.iter().copied().find(|s| s.name() == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerClass {
    Warrior = 0,
    Knight = 1,
    Wanderer = 2,
    Thief = 3,
    Bandit = 4,
    Hunter = 5,
    Sorcerer = 6,
    Pyromancer = 7,
    Cleric = 8,
    Deprived = 9,
}

impl PlayerClass {
    pub fn from_byte(value: u8) -> Option<PlayerClass> {
        use PlayerClass::*;
        [
            Warrior, Knight, Wanderer, Thief, Bandit, Hunter, Sorcerer, Pyromancer, Cleric,
            Deprived,
        ]
        .into_iter()
        .find(|&c| c as u8 == value)
    }
}

/// Stat-level view over one character record.
pub struct StatsEditor<'a> {
    character: &'a mut Character,
}

impl<'a> StatsEditor<'a> {
    pub fn new(character: &'a mut Character) -> Self {
        StatsEditor { character }
    }

    pub fn name(&self) -> Result<String, RecordError> {
        self.character.read_utf16(NAME_OFFSET, NAME_REGION)
    }

    /// Writes both name regions; the game reads one in-world and the
    /// other on the load screen.
    pub fn set_name(&mut self, name: &str) -> Result<(), RecordError> {
        self.character.write_utf16(NAME_OFFSET, name, NAME_REGION)?;
        self.character.write_utf16(NAME_MIRROR_OFFSET, name, NAME_REGION)
    }

    pub fn level(&self) -> Result<u16, RecordError> {
        self.character.get_u16(LEVEL_OFFSET)
    }

    pub fn set_level(&mut self, level: u16) -> Result<(), RecordError> {
        self.character.set_u16(LEVEL_OFFSET, level)
    }

    pub fn souls(&self) -> Result<u32, RecordError> {
        self.character.get_u32(SOULS_OFFSET)
    }

    /// Clamps to [`MAX_SOULS`] instead of wrapping.
    pub fn set_souls(&mut self, souls: u32) -> Result<(), RecordError> {
        self.character.set_u32(SOULS_OFFSET, souls.min(MAX_SOULS))
    }

    pub fn humanity(&self) -> Result<u8, RecordError> {
        self.character.get_byte(HUMANITY_OFFSET)
    }

    pub fn set_humanity(&mut self, value: u8) -> Result<(), RecordError> {
        self.character.set_byte(HUMANITY_OFFSET, value)
    }

    pub fn hp(&self) -> Result<u16, RecordError> {
        self.character.get_u16(HP_CURRENT_OFFSET)
    }

    /// Sets max and current HP together so the change is visible without
    /// resting; the two preceding bytes hold a regen divisor the original
    /// editor pins to 10.
    pub fn set_hp(&mut self, value: u16) -> Result<(), RecordError> {
        self.character.set_u16(HP_MAX_OFFSET, value)?;
        self.character.set_u16(HP_CURRENT_OFFSET, value)?;
        self.character.set_byte(HP_CURRENT_OFFSET - 4, 10)?;
        self.character.set_byte(HP_CURRENT_OFFSET - 3, 10)
    }

    pub fn stamina(&self) -> Result<u8, RecordError> {
        self.character.get_byte(STAMINA_OFFSET)
    }

    pub fn set_stamina(&mut self, value: u8) -> Result<(), RecordError> {
        self.character.set_byte(STAMINA_OFFSET, value)
    }

    pub fn stat(&self, stat: Stat) -> Result<u8, RecordError> {
        self.character.get_byte(stat.offset())
    }

    /// Raw stat write, clamped to [`MAX_STAT`]. Recomputing derived HP or
    /// stamina from the new value is the caller's responsibility.
    pub fn set_stat(&mut self, stat: Stat, value: u8) -> Result<(), RecordError> {
        self.character.set_byte(stat.offset(), value.min(MAX_STAT))
    }

    pub fn class(&self) -> Result<Option<PlayerClass>, RecordError> {
        Ok(PlayerClass::from_byte(self.character.get_byte(CLASS_OFFSET)?))
    }

    pub fn set_class(&mut self, class: PlayerClass) -> Result<(), RecordError> {
        self.character.set_byte(CLASS_OFFSET, class as u8)
    }

    pub fn covenant(&self) -> Result<u8, RecordError> {
        self.character.get_byte(COVENANT_OFFSET)
    }

    pub fn set_covenant(&mut self, covenant: u8) -> Result<(), RecordError> {
        self.character.set_byte(COVENANT_OFFSET, covenant)
    }

    fn bonfire_offsets(&self) -> Result<([usize; 3], usize), SaveError> {
        let anchor =
            pattern::find_dsr_anchor(self.character.as_bytes()).ok_or(SaveError::AnchorNotFound)?;
        let len = self.character.len();

        let mut offsets = [0usize; 3];
        for (slot, relative) in BONFIRE_RELATIVE.iter().enumerate() {
            offsets[slot] = pattern::resolve(anchor, *relative, len)
                .ok_or(RecordError::OffsetOutOfBounds { offset: anchor, len })?;
        }
        let warp = pattern::resolve(anchor, WARP_FLAG_RELATIVE, len)
            .ok_or(RecordError::OffsetOutOfBounds { offset: anchor, len })?;

        Ok((offsets, warp))
    }

    /// Unlock warping to every warpable bonfire.
    pub fn unlock_warp_bonfires(&mut self) -> Result<(), SaveError> {
        let (offsets, warp) = self.bonfire_offsets()?;
        for (offset, value) in offsets.into_iter().zip(BONFIRE_UNLOCK) {
            self.character.set_byte(offset, value)?;
        }
        self.character.set_byte(warp, WARP_FLAG_UNLOCK)?;
        Ok(())
    }

    pub fn warp_bonfires_unlocked(&self) -> Result<bool, SaveError> {
        let (offsets, warp) = self.bonfire_offsets()?;
        for (offset, expected) in offsets.into_iter().zip(BONFIRE_UNLOCK) {
            if self.character.get_byte(offset)? != expected {
                return Ok(false);
            }
        }
        Ok(self.character.get_byte(warp)? == WARP_FLAG_UNLOCK)
    }
}
