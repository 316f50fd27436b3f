//! CLI command implementations
//!
//! Each subcommand has its own module with:
//! - Args struct for command-line arguments
//! - `run()` function to execute the command

use crate::app::AppContext;
use crate::cli::Commands;
use crate::error::Result;

pub mod load;
pub mod pack;
pub mod scan;
pub mod unpack;
pub mod verify;

pub fn run(ctx: &AppContext, command: &Commands) -> Result<()> {
    match command {
        Commands::Pack(args) => pack::run(ctx, args),
        Commands::Unpack(args) => unpack::run(ctx, args),
        Commands::Verify(args) => verify::run(ctx, args),
        Commands::Scan(args) => scan::run(ctx, args),
        Commands::Load(args) => load::run(ctx, args),
    }
}
