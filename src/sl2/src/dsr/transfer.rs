//! Slot transfer: copy, duplicate, raw export/import, template repair.
//!
//! Every operation that fills a slot must keep the technical metadata
//! slot consistent: the 400-byte load-menu block and the occupied flag
//! travel with the character record, or the in-game load menu shows stale
//! data until the slot is next entered. Raw import is the deliberate
//! exception: it sets only the occupied flag and leaves the menu block
//! stale.

use super::{
    SaveError, SaveFile, CHARACTER_SLOTS, METADATA_BLOCK_OFFSET, METADATA_BLOCK_SIZE,
    OCCUPIED_FLAG_OFFSET, SLOT_PAYLOAD_SIZE,
};

/// Leading record range holding the character data proper (stats, name,
/// inventory); the tail is world/structure state the template supplies.
const REPAIR_PRESERVE_LEN: usize = 0x1E470;

fn check_character_slot(slot: usize) -> Result<(), SaveError> {
    if slot >= CHARACTER_SLOTS {
        return Err(SaveError::SlotOutOfRange {
            slot,
            max: CHARACTER_SLOTS,
        });
    }
    Ok(())
}

/// Copy the metadata block for one slot pairing and mark the destination
/// occupied.
fn copy_metadata_block(
    dest: &mut SaveFile,
    block: Vec<u8>,
    dest_slot: usize,
) -> Result<(), SaveError> {
    let metadata = dest.metadata_mut();
    metadata.set_span(METADATA_BLOCK_OFFSET + METADATA_BLOCK_SIZE * dest_slot, &block)?;
    metadata.set_byte(OCCUPIED_FLAG_OFFSET + dest_slot, 1)?;
    Ok(())
}

fn read_metadata_block(save: &SaveFile, slot: usize) -> Result<Vec<u8>, SaveError> {
    Ok(save
        .metadata()
        .get_span(METADATA_BLOCK_OFFSET + METADATA_BLOCK_SIZE * slot, METADATA_BLOCK_SIZE)?
        .to_vec())
}

/// Copy a character slot between two saves: record bytes, load-menu
/// block, and occupied flag together.
pub fn copy_slot(
    source: &SaveFile,
    dest: &mut SaveFile,
    source_slot: usize,
    dest_slot: usize,
) -> Result<(), SaveError> {
    check_character_slot(source_slot)?;
    check_character_slot(dest_slot)?;

    if source.is_slot_empty(source_slot)? {
        return Err(SaveError::EmptySlot(source_slot));
    }

    let record = source.character(source_slot)?.as_bytes().to_vec();
    let block = read_metadata_block(source, source_slot)?;

    dest.replace_character(dest_slot, record)?;
    copy_metadata_block(dest, block, dest_slot)
}

/// Copy a character slot within one save.
pub fn duplicate_slot(
    save: &mut SaveFile,
    source_slot: usize,
    dest_slot: usize,
) -> Result<(), SaveError> {
    check_character_slot(source_slot)?;
    check_character_slot(dest_slot)?;

    if save.is_slot_empty(source_slot)? {
        return Err(SaveError::EmptySlot(source_slot));
    }

    let record = save.character(source_slot)?.as_bytes().to_vec();
    let block = read_metadata_block(save, source_slot)?;

    save.replace_character(dest_slot, record)?;
    copy_metadata_block(save, block, dest_slot)
}

/// Serialize one slot's decrypted record for out-of-band transfer.
pub fn export_slot(save: &SaveFile, slot: usize) -> Result<Vec<u8>, SaveError> {
    check_character_slot(slot)?;
    Ok(save.character(slot)?.as_bytes().to_vec())
}

/// Install raw record bytes into a slot.
///
/// Sets only the occupied flag; the 400-byte load-menu block is left
/// stale on purpose and refreshes when the slot is next entered in-game.
pub fn import_slot(dest: &mut SaveFile, record: Vec<u8>, dest_slot: usize) -> Result<(), SaveError> {
    check_character_slot(dest_slot)?;

    if record.len() != SLOT_PAYLOAD_SIZE {
        return Err(SaveError::SizeMismatch {
            slot: dest_slot,
            expected: SLOT_PAYLOAD_SIZE,
            actual: record.len(),
        });
    }

    dest.replace_character(dest_slot, record)?;
    dest.metadata_mut().set_byte(OCCUPIED_FLAG_OFFSET + dest_slot, 1)?;
    Ok(())
}

/// Repair a structurally corrupted slot against a known-good template.
///
/// Foreign or malformed saves often carry intact character data inside a
/// broken record structure. The fix: snapshot the user slot and the
/// technical metadata slot, stamp the template's slot 0 over the user
/// slot, put the metadata snapshot back untouched, then lay the leading
/// [`REPAIR_PRESERVE_LEN`] bytes of the user snapshot over the fresh
/// structure.
pub fn repair_slot(
    template: &SaveFile,
    user: &mut SaveFile,
    user_slot: usize,
) -> Result<(), SaveError> {
    check_character_slot(user_slot)?;

    if user.is_slot_empty(user_slot)? {
        return Err(SaveError::EmptySlot(user_slot));
    }

    let record_snapshot = user.character(user_slot)?.as_bytes().to_vec();
    let metadata_snapshot = user.metadata().as_bytes().to_vec();

    copy_slot(template, user, 0, user_slot)?;

    let metadata_len = user.metadata().len();
    user.metadata_mut()
        .set_span(0, &metadata_snapshot[..metadata_snapshot.len().min(metadata_len)])?;

    let preserve = REPAIR_PRESERVE_LEN.min(record_snapshot.len());
    user.character_mut(user_slot)?
        .set_span(0, &record_snapshot[..preserve])?;

    Ok(())
}
