use clap::Parser;
use magicmount::{
    cli::{AnsiStyles, MagicmountArgs, MagicmountSubcommand},
    config::MountConfig,
    modules,
    mount::{self, DryRunMounter},
    tree::TreeBuilder,
};
use nix::sched::{unshare, CloneFlags};
use tracing_subscriber::EnvFilter;

//--------------------------------------------------------------------------------------------------
// Functions: main
//--------------------------------------------------------------------------------------------------

fn main() -> anyhow::Result<()> {
    let args = MagicmountArgs::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = args.load_config()?;
    match args.subcommand {
        MagicmountSubcommand::Mount { unshare, dry_run } => {
            mount_subcommand(&config, unshare, dry_run)?
        }
        MagicmountSubcommand::Tree => tree_subcommand(&config)?,
        MagicmountSubcommand::Modules => modules_subcommand(&config)?,
    }

    Ok(())
}

//--------------------------------------------------------------------------------------------------
// Functions: Handlers
//--------------------------------------------------------------------------------------------------

fn mount_subcommand(
    config: &MountConfig,
    new_namespace: bool,
    dry_run: bool,
) -> anyhow::Result<()> {
    if new_namespace {
        unshare(CloneFlags::CLONE_NEWNS)?;
        tracing::info!("running in a new mount namespace");
    }

    if dry_run {
        let mounter = DryRunMounter::new();
        mount::compose_and_mount_with(config, &mounter)?;
        for op in mounter.ops() {
            println!("{}", op);
        }
    } else {
        mount::compose_and_mount(config)?;
    }

    Ok(())
}

fn tree_subcommand(config: &MountConfig) -> anyhow::Result<()> {
    match TreeBuilder::new(config).build()? {
        Some(root) => print!("{}", root.render()),
        None => println!("{}", "no modules to mount".error()),
    }

    Ok(())
}

fn modules_subcommand(config: &MountConfig) -> anyhow::Result<()> {
    let modules = modules::enumerate_modules(config)?;
    if modules.is_empty() {
        println!(
            "{}",
            format!("no modules in {}", config.get_module_dir().display()).error()
        );
        return Ok(());
    }

    for module in modules {
        let state = if *module.get_disabled() {
            "disabled"
        } else if *module.get_skip_mount() {
            "skip_mount"
        } else if module.get_system_dir().is_none() {
            "no system"
        } else {
            "enabled"
        };

        println!(
            "{} {}",
            module.get_name().to_string_lossy().header(),
            state.placeholder()
        );
    }

    Ok(())
}
