use caf::commands::check::run_check;
use caf::commands::dump::write_dump;
use caf::commands::nest::nest_group;
use caf::commands::stats::write_stats;
use caf::commands::update::update_all_contained_ends;
use caf::model::NetDisk;
use clap::Parser;
use log::info;
use std::io::{self, BufWriter, Write};

/// Common options shared between all commands
#[derive(Parser, Debug)]
struct CommonOpts {
    /// Path to the net disk file.
    #[clap(short = 'd', long, value_parser)]
    disk: String,

    /// Verbosity level (0 = error, 1 = info, 2 = debug)
    #[clap(short, long, default_value = "0")]
    verbose: u8,
}

/// Command-line tool for inspecting and maintaining net disks.
#[derive(Parser, Debug)]
#[command(author, version, about, disable_help_subcommand = true)]
enum Args {
    /// Print object counts over all nets
    Stats {
        #[clap(flatten)]
        common: CommonOpts,
    },
    /// Validate the model invariants of every net
    Check {
        #[clap(flatten)]
        common: CommonOpts,
    },
    /// Give a leaf group a nested net and save the disk
    Nest {
        #[clap(flatten)]
        common: CommonOpts,

        /// Name of the group to nest
        #[clap(short = 'g', long, value_parser)]
        group: u64,

        /// Name of the net owning the group (searched for when omitted)
        #[clap(short = 'n', long, value_parser)]
        net: Option<u64>,
    },
    /// Resync non-leaf groups with their nested nets and save the disk
    Update {
        #[clap(flatten)]
        common: CommonOpts,
    },
    /// Print the net hierarchy
    Dump {
        #[clap(flatten)]
        common: CommonOpts,
    },
}

fn main() -> io::Result<()> {
    let args = Args::parse();

    match args {
        Args::Stats { common } => {
            let disk = initialize_disk(&common)?;
            let mut out = BufWriter::new(io::stdout().lock());
            write_stats(&disk, &mut out)?;
            out.flush()?;
        }
        Args::Check { common } => {
            let disk = initialize_disk(&common)?;
            let mut out = BufWriter::new(io::stdout().lock());
            run_check(&disk, &mut out)?;
            out.flush()?;
        }
        Args::Nest { common, group, net } => {
            let mut disk = initialize_disk(&common)?;
            let nested = nest_group(&mut disk, net, group)?;
            disk.save(&common.disk)?;
            println!("{}", nested);
        }
        Args::Update { common } => {
            let mut disk = initialize_disk(&common)?;
            let added = update_all_contained_ends(&mut disk)?;
            disk.save(&common.disk)?;
            info!("Added {} ends to non-leaf groups", added);
            println!("{}", added);
        }
        Args::Dump { common } => {
            let disk = initialize_disk(&common)?;
            let mut out = BufWriter::new(io::stdout().lock());
            write_dump(&disk, &mut out)?;
            out.flush()?;
        }
    }

    Ok(())
}

fn initialize_disk(common: &CommonOpts) -> io::Result<NetDisk> {
    // Initialize logger based on verbosity
    env_logger::Builder::new()
        .filter_level(match common.verbose {
            0 => log::LevelFilter::Error,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .init();

    Ok(NetDisk::load(&common.disk)?)
}
