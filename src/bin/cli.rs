//! tdbstore CLI
//!
//! Runs store operations against a flash image file.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tdbstore::{Config, CreateFlags, FileBlockDevice, TdbError, TdbStore};
use tracing_subscriber::{fmt, EnvFilter};

/// tdbstore CLI
#[derive(Parser, Debug)]
#[command(name = "tdbstore-cli")]
#[command(about = "Inspect and modify a tdbstore flash image")]
#[command(version)]
struct Args {
    /// Flash image file (created erased if missing)
    #[arg(short, long, default_value = "./tdbstore.img")]
    image: PathBuf,

    /// Image size in bytes, used when creating the image
    #[arg(short, long, default_value = "65536")]
    size: u64,

    /// Erase unit size in bytes
    #[arg(short, long, default_value = "4096")]
    erase_size: u64,

    /// Program unit size in bytes
    #[arg(short, long, default_value = "8")]
    program_size: u64,

    /// Log engine activity to stderr
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Set {
        /// The key to set
        key: String,

        /// The value to set
        value: String,

        /// Refuse any later set or remove of this key
        #[arg(long)]
        write_once: bool,
    },

    /// Show size and flags of a key
    Info {
        /// The key to inspect
        key: String,
    },

    /// Remove a key
    Rm {
        /// The key to remove
        key: String,
    },

    /// List keys
    Ls {
        /// Only keys starting with this prefix
        #[arg(default_value = "")]
        prefix: String,
    },

    /// Erase every key and the reserved data
    Reset,

    /// Write the one-time reserved data
    ReservedSet {
        /// Data to store (at most 64 bytes)
        value: String,
    },

    /// Read the reserved data
    ReservedGet,

    /// Show engine bookkeeping
    Stats,
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize tracing/logging
    let default_filter = if args.verbose { "info,tdbstore=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), TdbError> {
    tracing::debug!("tdbstore CLI v{}", tdbstore::VERSION);
    tracing::debug!("Image: {}", args.image.display());

    let device = FileBlockDevice::open(&args.image, args.size, args.erase_size, args.program_size)
        .map_err(TdbError::read)?;
    let store = TdbStore::new(device, Config::default())?;
    store.init()?;

    match args.command {
        Commands::Get { key } => {
            let value = store.get_vec(&key)?;
            println!("{}", String::from_utf8_lossy(&value));
        }

        Commands::Set { key, value, write_once } => {
            let flags = if write_once {
                CreateFlags::WRITE_ONCE
            } else {
                CreateFlags::empty()
            };
            store.set(&key, value.as_bytes(), flags)?;
            println!("OK");
        }

        Commands::Info { key } => {
            let info = store.get_info(&key)?;
            let write_once = info.flags.contains(CreateFlags::WRITE_ONCE);
            println!("size: {}", info.size);
            println!("write_once: {}", write_once);
        }

        Commands::Rm { key } => {
            store.remove(&key)?;
            println!("OK");
        }

        Commands::Ls { prefix } => {
            for key in store.iterator_open(&prefix)? {
                println!("{}", key?);
            }
        }

        Commands::Reset => {
            store.reset()?;
            println!("OK");
        }

        Commands::ReservedSet { value } => {
            store.reserved_data_set(value.as_bytes())?;
            println!("OK");
        }

        Commands::ReservedGet => {
            let mut buf = [0u8; tdbstore::area::RESERVED_AREA_SIZE];
            let n = store.reserved_data_get(&mut buf)?;
            println!("{}", String::from_utf8_lossy(&buf[..n]));
        }

        Commands::Stats => {
            let stats = store.stats()?;
            println!("keys: {}", stats.num_keys);
            println!("active area: {}", stats.active_area);
            println!("version: {}", stats.version);
            println!("free space offset: {}", stats.free_space_offset);
            println!("area size: {}", stats.area_size);
        }
    }

    store.deinit()
}
