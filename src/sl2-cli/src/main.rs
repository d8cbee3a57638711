mod commands;
mod config;
mod file_io;

use clap::{Parser, Subcommand, ValueEnum};
use config::Config;
use std::path::PathBuf;

/// Which container format to assume. Detected from the file magic when
/// not given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Game {
    /// Remastered flat container (DRAKS0005.sl2)
    Dsr,
    /// BND4 archive container (DS30000.sl2)
    Ds3,
}

#[derive(Parser)]
#[command(name = "sl2")]
#[command(about = "Dark Souls Save Editor", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
pub struct SetArgs {
    /// Path to .sl2 save file
    #[arg(short, long)]
    pub input: PathBuf,

    /// Write to this path instead of editing in place
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Character slot index
    #[arg(short, long)]
    pub slot: usize,

    /// Container format (detected from the file when omitted)
    #[arg(long)]
    pub game: Option<Game>,

    /// Character name (remastered format only)
    #[arg(long)]
    pub name: Option<String>,

    /// Soul count (clamped to the format maximum)
    #[arg(long)]
    pub souls: Option<u32>,

    /// Character level
    #[arg(long)]
    pub level: Option<u16>,

    /// Hit points
    #[arg(long)]
    pub hp: Option<u32>,

    /// Stat assignments like STR=40 (repeatable)
    #[arg(long)]
    pub stat: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the character slots in a save file
    Info {
        /// Path to .sl2 save file
        #[arg(short, long)]
        input: PathBuf,

        /// Container format (detected from the file when omitted)
        #[arg(long)]
        game: Option<Game>,
    },

    /// Set character values (souls, level, stats, name)
    Set(SetArgs),

    /// List a character's inventory
    Items {
        /// Path to .sl2 save file
        #[arg(short, long)]
        input: PathBuf,

        /// Character slot index
        #[arg(short, long)]
        slot: usize,

        /// Item catalog JSON (defaults to the configured path)
        #[arg(long)]
        items: Option<PathBuf>,

        /// Container format (detected from the file when omitted)
        #[arg(long)]
        game: Option<Game>,
    },

    /// Add an item to a character's inventory
    AddItem {
        /// Path to .sl2 save file
        #[arg(short, long)]
        input: PathBuf,

        /// Write to this path instead of editing in place
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Character slot index
        #[arg(short, long)]
        slot: usize,

        /// Item catalog JSON (defaults to the configured path)
        #[arg(long)]
        items: Option<PathBuf>,

        /// Item display name as listed in the catalog
        name: String,

        /// Quantity (clamped to the item's max stack)
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,

        /// Upgrade level
        #[arg(short, long, default_value_t = 0)]
        upgrade: u32,

        /// Infusion index
        #[arg(long, default_value_t = 0)]
        infusion: u32,

        /// Container format (detected from the file when omitted)
        #[arg(long)]
        game: Option<Game>,
    },

    /// Clear one inventory slot
    DeleteItem {
        /// Path to .sl2 save file
        #[arg(short, long)]
        input: PathBuf,

        /// Write to this path instead of editing in place
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Character slot index
        #[arg(short, long)]
        slot: usize,

        /// Inventory slot to clear
        item_slot: usize,

        /// Container format (detected from the file when omitted)
        #[arg(long)]
        game: Option<Game>,
    },

    /// Flip a named world flag (revive/kill an NPC, unlock state)
    Entity {
        /// Path to .sl2 save file
        #[arg(short, long)]
        input: PathBuf,

        /// Write to this path instead of editing in place
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Character slot index
        #[arg(short, long)]
        slot: usize,

        /// Entity catalog JSON (defaults to the configured path)
        #[arg(long)]
        entities: Option<PathBuf>,

        /// Entity name as listed in the catalog
        name: String,

        /// Set the entity alive (default sets it dead)
        #[arg(long, conflicts_with = "dead")]
        alive: bool,

        /// Set the entity dead
        #[arg(long)]
        dead: bool,

        /// Container format (detected from the file when omitted)
        #[arg(long)]
        game: Option<Game>,
    },

    /// Copy a character slot between saves (remastered format)
    CopySlot {
        /// Source .sl2 save file
        #[arg(long)]
        source: PathBuf,

        /// Destination .sl2 save file (may equal the source)
        #[arg(long)]
        dest: PathBuf,

        /// Slot to copy from
        #[arg(long)]
        from: usize,

        /// Slot to copy into
        #[arg(long)]
        to: usize,

        /// Write to this path instead of editing the destination in place
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Export one slot's decrypted record (remastered format)
    ExportSlot {
        /// Path to .sl2 save file
        #[arg(short, long)]
        input: PathBuf,

        /// Character slot index
        #[arg(short, long)]
        slot: usize,

        /// Path for the record blob (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import a slot record blob (remastered format)
    ImportSlot {
        /// Path to .sl2 save file
        #[arg(short, long)]
        input: PathBuf,

        /// Write to this path instead of editing in place
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Character slot index to replace
        #[arg(short, long)]
        slot: usize,

        /// Record blob produced by export-slot
        record: PathBuf,
    },

    /// Repair a corrupted slot using a known-good template save
    Repair {
        /// Known-good template save (slot 0 is used)
        #[arg(long)]
        template: PathBuf,

        /// Save file to repair
        #[arg(short, long)]
        input: PathBuf,

        /// Write to this path instead of editing in place
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Slot to repair
        #[arg(short, long)]
        slot: usize,
    },

    /// Configure default settings
    Configure {
        /// Show current configuration
        #[arg(long)]
        show: bool,

        /// Set the default item catalog path
        #[arg(long)]
        items_catalog: Option<PathBuf>,

        /// Set the default entity catalog path
        #[arg(long)]
        entity_catalog: Option<PathBuf>,

        /// Enable or disable automatic backups
        #[arg(long)]
        auto_backup: Option<bool>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Info { input, game } => commands::info(&input, game),
        Commands::Set(args) => commands::set(args, &config),
        Commands::Items {
            input,
            slot,
            items,
            game,
        } => commands::items(&input, slot, items.as_deref(), game, &config),
        Commands::AddItem {
            input,
            output,
            slot,
            items,
            name,
            quantity,
            upgrade,
            infusion,
            game,
        } => commands::add_item(
            &input,
            output.as_deref(),
            slot,
            items.as_deref(),
            &name,
            quantity,
            upgrade,
            infusion,
            game,
            &config,
        ),
        Commands::DeleteItem {
            input,
            output,
            slot,
            item_slot,
            game,
        } => commands::delete_item(&input, output.as_deref(), slot, item_slot, game, &config),
        Commands::Entity {
            input,
            output,
            slot,
            entities,
            name,
            alive,
            dead,
            game,
        } => {
            let state = match (alive, dead) {
                (true, false) => true,
                (false, true) => false,
                _ => anyhow::bail!("Pass exactly one of --alive or --dead"),
            };
            commands::entity(
                &input,
                output.as_deref(),
                slot,
                entities.as_deref(),
                &name,
                state,
                game,
                &config,
            )
        }
        Commands::CopySlot {
            source,
            dest,
            from,
            to,
            output,
        } => commands::copy_slot(&source, &dest, from, to, output.as_deref(), &config),
        Commands::ExportSlot {
            input,
            slot,
            output,
        } => commands::export_slot(&input, slot, output.as_deref()),
        Commands::ImportSlot {
            input,
            output,
            slot,
            record,
        } => commands::import_slot(&input, output.as_deref(), slot, &record, &config),
        Commands::Repair {
            template,
            input,
            output,
            slot,
        } => commands::repair(&template, &input, output.as_deref(), slot, &config),
        Commands::Configure {
            show,
            items_catalog,
            entity_catalog,
            auto_backup,
        } => commands::configure(show, items_catalog, entity_catalog, auto_backup),
    }
}
