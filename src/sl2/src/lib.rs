//! # sl2
//!
//! Dark Souls save editor library - SL2 container parsing, encryption,
//! and slot editing.
//!
//! This library provides functionality to:
//! - Parse and re-export both SL2 container formats: the flat remastered
//!   layout (`dsr`) and the BND4 archive layout (`ds3`)
//! - Decrypt and re-encrypt per-slot character records (AES-128-CBC with
//!   MD5 integrity tags)
//! - Edit character stats, names, and world flags through bounds-checked
//!   accessors
//! - Encode and decode inventory items, including the arithmetic
//!   upgrade/infusion identifier scheme
//! - Copy, export, import, and repair character slots
//!
//! ## Example
//!
//! ```no_run
//! use std::fs;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let bytes = fs::read("DRAKS0005.sl2")?;
//! let mut save = sl2::dsr::SaveFile::load(bytes)?;
//!
//! // Query and modify a character slot
//! let character = save.character_mut(0)?;
//! let mut stats = sl2::dsr::StatsEditor::new(character);
//! println!("Name: {}", stats.name()?);
//! println!("Souls: {}", stats.souls()?);
//!
//! stats.set_souls(999_999)?;
//! stats.set_name("Chosen Undead")?;
//!
//! // Re-encrypt and write back
//! fs::write("DRAKS0005.sl2", save.export()?)?;
//! # Ok(())
//! # }
//! ```

pub mod backup;
pub mod catalog;
pub mod character;
pub mod crypto;
pub mod ds3;
pub mod dsr;
pub mod flags;
pub mod pattern;

// Re-export commonly used items
pub use backup::{restore_backup, smart_backup, update_after_edit, BackupError};
pub use catalog::{CatalogError, EntityCatalog, ItemCatalog, ItemEntry, ItemKind};
pub use character::{Character, RecordError};
pub use crypto::{decrypt_cbc, encrypt_cbc, md5_digest, CryptoError};
pub use flags::{FlagEditor, FlagError};
