use std::path::PathBuf;

use clap::Parser;

use crate::{config::MountConfig, MountResult};

use super::styles;

//-------------------------------------------------------------------------------------------------
// Types
//-------------------------------------------------------------------------------------------------

/// magicmount - Compose module overlays onto the system partitions
#[derive(Debug, Parser)]
#[command(name = "magicmount", author, about, version, styles=styles::styles())]
pub struct MagicmountArgs {
    /// The subcommand to run
    #[command(subcommand)]
    pub subcommand: MagicmountSubcommand,

    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory containing the modules
    #[arg(long, global = true)]
    pub module_dir: Option<PathBuf>,

    /// Root of the real filesystem to mount onto
    #[arg(long, global = true)]
    pub root_dir: Option<PathBuf>,

    /// Staging area for rebuilt directories
    #[arg(long, global = true)]
    pub work_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available subcommands
#[derive(Debug, Parser)]
pub enum MagicmountSubcommand {
    /// Merge all enabled modules and mount them
    #[command(name = "mount")]
    Mount {
        /// Run in a new private mount namespace
        #[arg(long)]
        unshare: bool,

        /// Log the mounts instead of performing them
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the merged module tree without mounting anything
    #[command(name = "tree")]
    Tree,

    /// List the installed modules and their state
    #[command(name = "modules")]
    Modules,
}

//-------------------------------------------------------------------------------------------------
// Methods
//-------------------------------------------------------------------------------------------------

impl MagicmountArgs {
    /// Loads the configuration file, if any, and applies the command-line overrides to it.
    pub fn load_config(&self) -> MountResult<MountConfig> {
        let mut config = match &self.config {
            Some(path) => MountConfig::load(path)?,
            None => MountConfig::default(),
        };

        if let Some(module_dir) = &self.module_dir {
            config.set_module_dir(module_dir);
        }

        if let Some(root_dir) = &self.root_dir {
            config.set_root_dir(root_dir);
        }

        if let Some(work_dir) = &self.work_dir {
            config.set_work_dir(work_dir);
        }

        Ok(config)
    }
}

//-------------------------------------------------------------------------------------------------
// Tests
//-------------------------------------------------------------------------------------------------
