// Entrypoint for the uploader.
// - Parses options, sets up logging and the workspace, then hands over to
//   the interactive menu.
// - Returns `anyhow::Result` so startup failures print with context.

use anyhow::Context;
use litematic_uploader::{
    config::ConfigStore,
    git::{Gateway, GitCli},
    layout::Workspace,
    ui::{main_menu, App},
    upload::Uploader,
};
use std::ffi::OsString;
use std::path::PathBuf;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(
    about = "Publish litematic schematics and preview images to a git repository. Files are named after a base name plus the selected tags, then committed and pushed."
)]
struct Opt {
    #[structopt(
        long,
        parse(from_os_str),
        help = "directory holding files/, config.json and the hidden .repo checkout (defaults to the current directory)"
    )]
    base_dir: Option<PathBuf>,

    #[structopt(
        long = "git",
        default_value = "git",
        parse(from_os_str),
        help = "path to the git command"
    )]
    git_command: OsString,

    #[structopt(
        long,
        help = "a git option passed as `git -c <option>` to every invocation, e.g. user.name=Builder"
    )]
    git_option: Vec<String>,

    #[structopt(long, help = "type file paths instead of opening file dialogs")]
    no_dialog: bool,
}

fn main() -> anyhow::Result<()> {
    let opt = Opt::from_args();

    // Logging goes to stderr; RUST_LOG overrides the default level.
    let _logger = flexi_logger::Logger::try_with_env_or_str("info")?.start()?;

    let base = match opt.base_dir {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to determine current directory")?,
    };
    let workspace = Workspace::new(base);
    workspace
        .prepare()
        .with_context(|| format!("Failed to prepare {}", workspace.base().display()))?;

    let store = ConfigStore::new(workspace.config_path());
    let config = store.load().context("Failed to load config")?;

    let checkout = workspace.checkout_dir();
    let git = GitCli::new(opt.git_command, &checkout).with_global_options(opt.git_option);
    let uploader = Uploader::new(Gateway::new(git, checkout));

    log::info!("workspace at {}", workspace.base().display());
    main_menu(App::new(store, config, uploader, !opt.no_dialog))?;
    Ok(())
}
