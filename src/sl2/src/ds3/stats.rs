//! Typed accessors over an archive-format character record.
//!
//! Nothing here sits at an absolute offset: the stat block moved across
//! game patches, so every field is addressed relative to the record's
//! 32-byte anchor signature. The anchor is re-resolved on each access —
//! a drifted layout then fails loudly instead of writing through a stale
//! base into the wrong bytes.

use super::SaveError;
use crate::character::{Character, RecordError};
use crate::pattern;

pub const MAX_SOULS: u32 = 999_999_999;
pub const MAX_LEVEL: u16 = 802;
pub const MAX_STAT: u8 = 99;
pub const MAX_HP: u32 = 9999;
pub const MAX_FP: u32 = 999;
pub const MAX_STAMINA: u32 = 999;
pub const MAX_NG_CYCLE: u8 = 7;

const SOULS_RELATIVE: i64 = -0xDC;
const LEVEL_RELATIVE: i64 = -0xE0;
const HP_RELATIVE: i64 = -0x130;
const FP_RELATIVE: i64 = -0x124;
const STAMINA_RELATIVE: i64 = -0x114;
const NG_CYCLE_RELATIVE: i64 = -0x6;
const ESTUS_MAX_RELATIVE: i64 = -0x4E;
const ASHEN_ESTUS_MAX_RELATIVE: i64 = -0x4D;
const CLASS_RELATIVE: i64 = -0xA2;

/// Leveling stats, each a single byte at an anchor-relative offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stat {
    Vigor,
    Attunement,
    Endurance,
    Vitality,
    Strength,
    Dexterity,
    Intelligence,
    Faith,
    Luck,
}

impl Stat {
    pub const ALL: [Stat; 9] = [
        Stat::Vigor,
        Stat::Attunement,
        Stat::Endurance,
        Stat::Vitality,
        Stat::Strength,
        Stat::Dexterity,
        Stat::Intelligence,
        Stat::Faith,
        Stat::Luck,
    ];

    fn relative(self) -> i64 {
        match self {
            Stat::Vigor => -0x10C,
            Stat::Attunement => -0x108,
            Stat::Endurance => -0x104,
            Stat::Vitality => -0xE4,
            Stat::Strength => -0x100,
            Stat::Dexterity => -0xFC,
            Stat::Intelligence => -0xF8,
            Stat::Faith => -0xF4,
            Stat::Luck => -0xF0,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Stat::Vigor => "VIG",
            Stat::Attunement => "ATN",
            Stat::Endurance => "END",
            Stat::Vitality => "VIT",
            Stat::Strength => "STR",
            Stat::Dexterity => "DEX",
            Stat::Intelligence => "INT",
            Stat::Faith => "FTH",
            Stat::Luck => "LCK",
        }
    }

    pub fn from_name(name: &str) -> Option<Stat> {
        Stat::ALL.iter().copied().find(|s| s.name() == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerClass {
    Knight = 0,
    Mercenary = 1,
    Warrior = 2,
    Herald = 3,
    Thief = 4,
    Assassin = 5,
    Sorcerer = 6,
    Pyromancer = 7,
    Cleric = 8,
    Deprived = 9,
}

impl PlayerClass {
    pub fn from_byte(value: u8) -> Option<PlayerClass> {
        use PlayerClass::*;
        [
            Knight, Mercenary, Warrior, Herald, Thief, Assassin, Sorcerer, Pyromancer, Cleric,
            Deprived,
        ]
        .into_iter()
        .find(|&c| c as u8 == value)
    }
}

/// Stat-level view over one archive character record.
pub struct StatsEditor<'a> {
    character: &'a mut Character,
}

impl<'a> StatsEditor<'a> {
    pub fn new(character: &'a mut Character) -> Self {
        StatsEditor { character }
    }

    fn offset(&self, relative: i64) -> Result<usize, SaveError> {
        let anchor =
            pattern::find_bnd4_anchor(self.character.as_bytes()).ok_or(SaveError::AnchorNotFound)?;
        let len = self.character.len();
        pattern::resolve(anchor, relative, len).ok_or(SaveError::Record(
            RecordError::OffsetOutOfBounds { offset: anchor, len },
        ))
    }

    pub fn level(&self) -> Result<u16, SaveError> {
        Ok(self.character.get_u16(self.offset(LEVEL_RELATIVE)?)?)
    }

    pub fn set_level(&mut self, level: u16) -> Result<(), SaveError> {
        let offset = self.offset(LEVEL_RELATIVE)?;
        Ok(self.character.set_u16(offset, level.clamp(1, MAX_LEVEL))?)
    }

    pub fn souls(&self) -> Result<u32, SaveError> {
        Ok(self.character.get_u32(self.offset(SOULS_RELATIVE)?)?)
    }

    pub fn set_souls(&mut self, souls: u32) -> Result<(), SaveError> {
        let offset = self.offset(SOULS_RELATIVE)?;
        Ok(self.character.set_u32(offset, souls.min(MAX_SOULS))?)
    }

    pub fn stat(&self, stat: Stat) -> Result<u8, SaveError> {
        Ok(self.character.get_byte(self.offset(stat.relative())?)?)
    }

    pub fn set_stat(&mut self, stat: Stat, value: u8) -> Result<(), SaveError> {
        let offset = self.offset(stat.relative())?;
        Ok(self.character.set_byte(offset, value.min(MAX_STAT))?)
    }

    pub fn hp(&self) -> Result<u32, SaveError> {
        Ok(self.character.get_u32(self.offset(HP_RELATIVE)?)?)
    }

    pub fn set_hp(&mut self, value: u32) -> Result<(), SaveError> {
        let offset = self.offset(HP_RELATIVE)?;
        Ok(self.character.set_u32(offset, value.min(MAX_HP))?)
    }

    pub fn fp(&self) -> Result<u32, SaveError> {
        Ok(self.character.get_u32(self.offset(FP_RELATIVE)?)?)
    }

    pub fn set_fp(&mut self, value: u32) -> Result<(), SaveError> {
        let offset = self.offset(FP_RELATIVE)?;
        Ok(self.character.set_u32(offset, value.min(MAX_FP))?)
    }

    pub fn stamina(&self) -> Result<u32, SaveError> {
        Ok(self.character.get_u32(self.offset(STAMINA_RELATIVE)?)?)
    }

    pub fn set_stamina(&mut self, value: u32) -> Result<(), SaveError> {
        let offset = self.offset(STAMINA_RELATIVE)?;
        Ok(self.character.set_u32(offset, value.min(MAX_STAMINA))?)
    }

    pub fn estus_max(&self) -> Result<u8, SaveError> {
        Ok(self.character.get_byte(self.offset(ESTUS_MAX_RELATIVE)?)?)
    }

    pub fn set_estus_max(&mut self, value: u8) -> Result<(), SaveError> {
        let offset = self.offset(ESTUS_MAX_RELATIVE)?;
        Ok(self.character.set_byte(offset, value)?)
    }

    pub fn ashen_estus_max(&self) -> Result<u8, SaveError> {
        Ok(self
            .character
            .get_byte(self.offset(ASHEN_ESTUS_MAX_RELATIVE)?)?)
    }

    pub fn set_ashen_estus_max(&mut self, value: u8) -> Result<(), SaveError> {
        let offset = self.offset(ASHEN_ESTUS_MAX_RELATIVE)?;
        Ok(self.character.set_byte(offset, value)?)
    }

    pub fn ng_cycle(&self) -> Result<u8, SaveError> {
        Ok(self.character.get_byte(self.offset(NG_CYCLE_RELATIVE)?)?)
    }

    pub fn set_ng_cycle(&mut self, value: u8) -> Result<(), SaveError> {
        let offset = self.offset(NG_CYCLE_RELATIVE)?;
        Ok(self.character.set_byte(offset, value.min(MAX_NG_CYCLE))?)
    }

    pub fn class(&self) -> Result<Option<PlayerClass>, SaveError> {
        let byte = self.character.get_byte(self.offset(CLASS_RELATIVE)?)?;
        Ok(PlayerClass::from_byte(byte))
    }

    pub fn set_class(&mut self, class: PlayerClass) -> Result<(), SaveError> {
        let offset = self.offset(CLASS_RELATIVE)?;
        Ok(self.character.set_byte(offset, class as u8)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::BND4_PATTERN;

    const ANCHOR: usize = 0x400;

    fn character() -> Character {
        let mut data = vec![0u8; 0x2000];
        data[ANCHOR..ANCHOR + BND4_PATTERN.len()].copy_from_slice(&BND4_PATTERN);
        Character::new(data, 0)
    }

    #[test]
    fn test_fields_resolve_against_anchor() {
        let mut ch = character();
        let mut stats = StatsEditor::new(&mut ch);

        stats.set_souls(123_456).unwrap();
        stats.set_level(120).unwrap();
        stats.set_stat(Stat::Vigor, 40).unwrap();

        assert_eq!(ch.get_u32(ANCHOR - 0xDC).unwrap(), 123_456);
        assert_eq!(ch.get_u16(ANCHOR - 0xE0).unwrap(), 120);
        assert_eq!(ch.get_byte(ANCHOR - 0x10C).unwrap(), 40);
    }

    #[test]
    fn test_clamps() {
        let mut ch = character();
        let mut stats = StatsEditor::new(&mut ch);

        stats.set_souls(u32::MAX).unwrap();
        assert_eq!(stats.souls().unwrap(), MAX_SOULS);

        stats.set_level(0).unwrap();
        assert_eq!(stats.level().unwrap(), 1);
        stats.set_level(u16::MAX).unwrap();
        assert_eq!(stats.level().unwrap(), MAX_LEVEL);

        stats.set_stat(Stat::Luck, 250).unwrap();
        assert_eq!(stats.stat(Stat::Luck).unwrap(), MAX_STAT);

        stats.set_hp(100_000).unwrap();
        assert_eq!(stats.hp().unwrap(), MAX_HP);

        stats.set_ng_cycle(9).unwrap();
        assert_eq!(stats.ng_cycle().unwrap(), MAX_NG_CYCLE);
    }

    #[test]
    fn test_missing_anchor_fails() {
        let mut ch = Character::new(vec![0u8; 0x2000], 0);
        let result = StatsEditor::new(&mut ch).set_souls(1);
        assert!(matches!(result, Err(SaveError::AnchorNotFound)));
    }

    #[test]
    fn test_anchor_reresolved_after_layout_shift() {
        let mut ch = character();
        StatsEditor::new(&mut ch).set_souls(777).unwrap();

        // move the signature: the old location no longer matches
        let mut shifted = ch.as_bytes().to_vec();
        shifted.copy_within(ANCHOR..ANCHOR + BND4_PATTERN.len(), ANCHOR + 0x100);
        shifted[ANCHOR..ANCHOR + 4].fill(0);
        let mut moved = Character::new(shifted, 0);

        let mut stats = StatsEditor::new(&mut moved);
        stats.set_souls(888).unwrap();
        assert_eq!(moved.get_u32(ANCHOR + 0x100 - 0xDC).unwrap(), 888);
    }

    #[test]
    fn test_class_roundtrip() {
        let mut ch = character();
        let mut stats = StatsEditor::new(&mut ch);
        stats.set_class(PlayerClass::Herald).unwrap();
        assert_eq!(stats.class().unwrap(), Some(PlayerClass::Herald));
    }
}
