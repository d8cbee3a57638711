//! Command implementations.

use crate::config::Config;
use crate::file_io;
use crate::{Game, SetArgs};
use anyhow::{bail, Context, Result};
use sl2::catalog::{EntityCatalog, ItemCatalog};
use std::fs;
use std::path::{Path, PathBuf};

/// Sniff the container format from its leading bytes.
pub fn detect_game(bytes: &[u8], requested: Option<Game>) -> Game {
    if let Some(game) = requested {
        return game;
    }
    if bytes.starts_with(&sl2::ds3::MAGIC) {
        Game::Ds3
    } else {
        Game::Dsr
    }
}

/// Write an edited container back, snapshotting the target first when
/// editing in place with auto-backup enabled.
fn commit(input: &Path, output: Option<&Path>, data: &[u8], config: &Config) -> Result<()> {
    match output {
        Some(path) => {
            file_io::write_output(Some(path), data)?;
            println!("Wrote {}", path.display());
        }
        None => {
            if config.auto_backup() {
                if sl2::smart_backup(input).context("Failed to create backup")? {
                    println!("Backup written to {}", sl2::backup::backup_path(input).display());
                }
            }
            fs::write(input, data).with_context(|| format!("Failed to write {}", input.display()))?;
            if config.auto_backup() {
                sl2::update_after_edit(input)?;
            }
            println!("Updated {}", input.display());
        }
    }
    Ok(())
}

fn items_catalog(config: &Config, flag: Option<&Path>) -> Result<ItemCatalog> {
    let path = flag
        .map(Path::to_path_buf)
        .or_else(|| config.items_catalog.clone())
        .context("No item catalog given; pass --items or run `sl2 configure --items-catalog`")?;
    let text = file_io::read_text(&path)?;
    Ok(ItemCatalog::from_json(&text)?)
}

fn entity_catalog(config: &Config, flag: Option<&Path>) -> Result<EntityCatalog> {
    let path = flag
        .map(Path::to_path_buf)
        .or_else(|| config.entity_catalog.clone())
        .context("No entity catalog given; pass --entities or run `sl2 configure --entity-catalog`")?;
    let text = file_io::read_text(&path)?;
    Ok(EntityCatalog::from_json(&text)?)
}

pub fn info(input: &Path, game: Option<Game>) -> Result<()> {
    let bytes = file_io::read_input(Some(input))?;

    match detect_game(&bytes, game) {
        Game::Dsr => {
            let mut save = sl2::dsr::SaveFile::load(bytes)?;
            println!("Format: remastered flat container");
            for slot in 0..sl2::dsr::CHARACTER_SLOTS {
                if save.is_slot_empty(slot)? {
                    println!("  slot {slot}: (empty)");
                    continue;
                }
                let ch = save.character_mut(slot)?;
                let mut stats = sl2::dsr::StatsEditor::new(ch);
                println!(
                    "  slot {slot}: {} (level {}, {} souls)",
                    stats.name()?,
                    stats.level()?,
                    stats.souls()?
                );
            }
        }
        Game::Ds3 => {
            let mut save = sl2::ds3::SaveFile::load(bytes)?;
            println!("Format: BND4 archive, {} entries", save.entry_count());
            let failures: Vec<usize> = save.load_failures().map(|(slot, _)| slot).collect();
            for slot in 0..save.entry_count() {
                if failures.contains(&slot) {
                    println!("  slot {slot}: (failed to load)");
                    continue;
                }
                if save.is_slot_empty(slot)? {
                    println!("  slot {slot}: (empty)");
                    continue;
                }
                let ch = save.character_mut(slot)?;
                let mut stats = sl2::ds3::StatsEditor::new(ch);
                match (stats.level(), stats.souls()) {
                    (Ok(level), Ok(souls)) => {
                        println!("  slot {slot}: level {level}, {souls} souls")
                    }
                    _ => println!("  slot {slot}: (no character anchor)"),
                }
            }
            for (slot, error) in save.load_failures() {
                eprintln!("warning: slot {slot}: {error}");
            }
        }
    }

    Ok(())
}

fn parse_assignment(text: &str) -> Result<(&str, u8)> {
    let (name, value) = text
        .split_once('=')
        .with_context(|| format!("Bad stat assignment {text:?}, expected NAME=VALUE"))?;
    Ok((name, value.parse()?))
}

pub fn set(args: SetArgs, config: &Config) -> Result<()> {
    let bytes = file_io::read_input(Some(&args.input))?;

    let exported = match detect_game(&bytes, args.game) {
        Game::Dsr => {
            let mut save = sl2::dsr::SaveFile::load(bytes)?;
            let ch = save.character_mut(args.slot)?;
            let mut stats = sl2::dsr::StatsEditor::new(ch);

            if let Some(name) = &args.name {
                stats.set_name(name)?;
            }
            if let Some(souls) = args.souls {
                stats.set_souls(souls)?;
            }
            if let Some(level) = args.level {
                stats.set_level(level)?;
            }
            if let Some(hp) = args.hp {
                stats.set_hp(hp.min(u16::MAX as u32) as u16)?;
            }
            for assignment in &args.stat {
                let (name, value) = parse_assignment(assignment)?;
                let stat = sl2::dsr::Stat::from_name(name)
                    .with_context(|| format!("Unknown stat {name:?}"))?;
                stats.set_stat(stat, value)?;
            }
            save.export()?
        }
        Game::Ds3 => {
            let mut save = sl2::ds3::SaveFile::load(bytes)?;
            let ch = save.character_mut(args.slot)?;
            let mut stats = sl2::ds3::StatsEditor::new(ch);

            if args.name.is_some() {
                bail!("The archive format has no editable name field");
            }
            if let Some(souls) = args.souls {
                stats.set_souls(souls)?;
            }
            if let Some(level) = args.level {
                stats.set_level(level)?;
            }
            if let Some(hp) = args.hp {
                stats.set_hp(hp)?;
            }
            for assignment in &args.stat {
                let (name, value) = parse_assignment(assignment)?;
                let stat = sl2::ds3::Stat::from_name(name)
                    .with_context(|| format!("Unknown stat {name:?}"))?;
                stats.set_stat(stat, value)?;
            }
            save.export()?
        }
    };

    commit(&args.input, args.output.as_deref(), &exported, config)
}

pub fn items(
    input: &Path,
    slot: usize,
    catalog_path: Option<&Path>,
    game: Option<Game>,
    config: &Config,
) -> Result<()> {
    let bytes = file_io::read_input(Some(input))?;
    let catalog = items_catalog(config, catalog_path)?;

    match detect_game(&bytes, game) {
        Game::Dsr => {
            let mut save = sl2::dsr::SaveFile::load(bytes)?;
            let ch = save.character_mut(slot)?;
            let inventory = sl2::dsr::Inventory::new(ch, &catalog);
            for item in inventory.items() {
                let label = inventory
                    .item_info(&item)
                    .map(|entry| entry.name.clone())
                    .unwrap_or_else(|| format!("Unknown (id {:#x})", item.item_id()));
                let upgrade = item.upgrade_level();
                let suffix = if upgrade > 0 {
                    format!(" +{upgrade}")
                } else {
                    String::new()
                };
                println!(
                    "  [{:4}] {label}{suffix} x{}",
                    item.slot,
                    item.quantity()
                );
            }
        }
        Game::Ds3 => {
            let mut save = sl2::ds3::SaveFile::load(bytes)?;
            let ch = save.character_mut(slot)?;
            let inventory = sl2::ds3::Inventory::new(ch, &catalog);
            for item in inventory.items() {
                match inventory.decode(&item) {
                    Some(decoded) => {
                        let suffix = if decoded.upgrade > 0 {
                            format!(" +{}", decoded.upgrade)
                        } else {
                            String::new()
                        };
                        println!(
                            "  [{:4}] {}{suffix} ({:?}) x{}",
                            item.slot,
                            decoded.entry.name,
                            decoded.infusion,
                            item.quantity()
                        );
                    }
                    None => println!(
                        "  [{:4}] Unknown (id {:#x}, sep {:#x}) x{}",
                        item.slot,
                        item.item_id(),
                        item.separator(),
                        item.quantity()
                    ),
                }
            }
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn add_item(
    input: &Path,
    output: Option<&Path>,
    slot: usize,
    catalog_path: Option<&Path>,
    item_name: &str,
    quantity: u32,
    upgrade: u32,
    infusion: u32,
    game: Option<Game>,
    config: &Config,
) -> Result<()> {
    let bytes = file_io::read_input(Some(input))?;
    let catalog = items_catalog(config, catalog_path)?;
    let entry = catalog
        .find_by_name(item_name)
        .with_context(|| format!("Item {item_name:?} not found in catalog"))?;

    let exported = match detect_game(&bytes, game) {
        Game::Dsr => {
            let mut save = sl2::dsr::SaveFile::load(bytes)?;
            let ch = save.character_mut(slot)?;
            let infusion = sl2::dsr::ItemInfusion::from_index(infusion)
                .context("Infusion index out of range for the remastered format (0-9)")?;
            let mut inventory = sl2::dsr::Inventory::new(ch, &catalog);
            match inventory.add_item(entry, quantity, upgrade, infusion, None)? {
                Some(written) => println!("Added {item_name:?} to inventory slot {written}"),
                None => bail!("Inventory is full"),
            }
            save.export()?
        }
        Game::Ds3 => {
            let mut save = sl2::ds3::SaveFile::load(bytes)?;
            let ch = save.character_mut(slot)?;
            let infusion = sl2::ds3::ItemInfusion::from_index(infusion)
                .context("Infusion index out of range for the archive format (0-15)")?;
            let mut inventory = sl2::ds3::Inventory::new(ch, &catalog);
            match inventory.add_item(entry, quantity.min(255) as u8, upgrade, infusion, None)? {
                Some(written) => println!("Added {item_name:?} to inventory slot {written}"),
                None => bail!("No free slot pair in inventory"),
            }
            save.export()?
        }
    };

    commit(input, output, &exported, config)
}

pub fn delete_item(
    input: &Path,
    output: Option<&Path>,
    slot: usize,
    item_slot: usize,
    game: Option<Game>,
    config: &Config,
) -> Result<()> {
    let bytes = file_io::read_input(Some(input))?;
    // deletion never consults the catalog
    let empty_catalog = ItemCatalog::from_json("{}")?;

    let exported = match detect_game(&bytes, game) {
        Game::Dsr => {
            let mut save = sl2::dsr::SaveFile::load(bytes)?;
            let ch = save.character_mut(slot)?;
            sl2::dsr::Inventory::new(ch, &empty_catalog).delete_slot(item_slot)?;
            save.export()?
        }
        Game::Ds3 => {
            let mut save = sl2::ds3::SaveFile::load(bytes)?;
            let ch = save.character_mut(slot)?;
            sl2::ds3::Inventory::new(ch, &empty_catalog).delete_slot(item_slot)?;
            save.export()?
        }
    };

    println!("Cleared inventory slot {item_slot}");
    commit(input, output, &exported, config)
}

#[allow(clippy::too_many_arguments)]
pub fn entity(
    input: &Path,
    output: Option<&Path>,
    slot: usize,
    catalog_path: Option<&Path>,
    name: &str,
    alive: bool,
    game: Option<Game>,
    config: &Config,
) -> Result<()> {
    let bytes = file_io::read_input(Some(input))?;
    let catalog = entity_catalog(config, catalog_path)?;

    let exported = match detect_game(&bytes, game) {
        Game::Dsr => {
            let mut save = sl2::dsr::SaveFile::load(bytes)?;
            let ch = save.character_mut(slot)?;
            sl2::FlagEditor::dsr(ch, &catalog).set_state(name, alive)?;
            save.export()?
        }
        Game::Ds3 => {
            let mut save = sl2::ds3::SaveFile::load(bytes)?;
            let ch = save.character_mut(slot)?;
            sl2::FlagEditor::bnd4(ch, &catalog).set_state(name, alive)?;
            save.export()?
        }
    };

    println!(
        "{name:?} is now {}",
        if alive { "alive" } else { "dead" }
    );
    commit(input, output, &exported, config)
}

pub fn copy_slot(
    source: &Path,
    dest: &Path,
    source_slot: usize,
    dest_slot: usize,
    output: Option<&Path>,
    config: &Config,
) -> Result<()> {
    let source_save = sl2::dsr::SaveFile::load(file_io::read_input(Some(source))?)?;

    let exported = if source == dest {
        let mut save = sl2::dsr::SaveFile::load(file_io::read_input(Some(dest))?)?;
        sl2::dsr::duplicate_slot(&mut save, source_slot, dest_slot)?;
        save.export()?
    } else {
        let mut dest_save = sl2::dsr::SaveFile::load(file_io::read_input(Some(dest))?)?;
        sl2::dsr::copy_slot(&source_save, &mut dest_save, source_slot, dest_slot)?;
        dest_save.export()?
    };

    println!("Copied slot {source_slot} -> {dest_slot}");
    commit(dest, output, &exported, config)
}

pub fn export_slot(input: &Path, slot: usize, output: Option<&Path>) -> Result<()> {
    let save = sl2::dsr::SaveFile::load(file_io::read_input(Some(input))?)?;
    let record = sl2::dsr::export_slot(&save, slot)?;
    file_io::write_output(output, &record)
}

pub fn import_slot(
    input: &Path,
    output: Option<&Path>,
    slot: usize,
    record_path: &Path,
    config: &Config,
) -> Result<()> {
    let mut save = sl2::dsr::SaveFile::load(file_io::read_input(Some(input))?)?;
    let record = file_io::read_input(Some(record_path))?;
    sl2::dsr::import_slot(&mut save, record, slot)?;

    let exported = save.export()?;
    println!("Imported slot {slot} (load-menu metadata refreshes in-game)");
    commit(input, output, &exported, config)
}

pub fn repair(
    template: &Path,
    input: &Path,
    output: Option<&Path>,
    slot: usize,
    config: &Config,
) -> Result<()> {
    let template_save = sl2::dsr::SaveFile::load(file_io::read_input(Some(template))?)?;
    let mut user_save = sl2::dsr::SaveFile::load(file_io::read_input(Some(input))?)?;

    sl2::dsr::repair_slot(&template_save, &mut user_save, slot)?;

    let exported = user_save.export()?;
    println!("Repaired slot {slot} against template slot 0");
    commit(input, output, &exported, config)
}

pub fn configure(
    show: bool,
    items_catalog: Option<PathBuf>,
    entity_catalog: Option<PathBuf>,
    auto_backup: Option<bool>,
) -> Result<()> {
    let mut config = Config::load()?;

    if show {
        println!("items_catalog  = {:?}", config.items_catalog);
        println!("entity_catalog = {:?}", config.entity_catalog);
        println!("auto_backup    = {}", config.auto_backup());
        return Ok(());
    }

    if let Some(path) = items_catalog {
        config.items_catalog = Some(path);
    }
    if let Some(path) = entity_catalog {
        config.entity_catalog = Some(path);
    }
    if let Some(enabled) = auto_backup {
        config.auto_backup = Some(enabled);
    }

    config.save()?;
    println!("Configuration saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_game_by_magic() {
        assert_eq!(detect_game(b"BND4\x00\x00", None), Game::Ds3);
        assert_eq!(detect_game(&[0u8; 16], None), Game::Dsr);
        // explicit flag wins over the sniff
        assert_eq!(detect_game(b"BND4", Some(Game::Dsr)), Game::Dsr);
    }

    #[test]
    fn test_parse_assignment() {
        assert_eq!(parse_assignment("STR=40").unwrap(), ("STR", 40));
        assert!(parse_assignment("STR").is_err());
        assert!(parse_assignment("STR=many").is_err());
    }
}
