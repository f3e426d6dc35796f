// UI layer: an interactive form built on `dialoguer`. It collects the
// upload request, edits the tag vocabulary and repository settings, and
// hands uploads to the workflow in `upload`.

use crate::config::{Config, ConfigStore};
use crate::git::GitCli;
use crate::upload::{Remote, Stage, UploadRequest, Uploader};
use anyhow::{Context, Result};
use crossterm::style::Stylize;
use dialoguer::{Confirm, Input, MultiSelect, Password, Select};
use indicatif::{ProgressBar, ProgressStyle};
use rfd::FileDialog;
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Input collected from the user between uploads. The repository fields
/// survive a reset, everything else is cleared after a successful upload.
#[derive(Debug, Clone, Default)]
pub struct Form {
    pub name: String,
    pub litematics: Vec<PathBuf>,
    pub image: Option<PathBuf>,
    pub selected_tags: HashSet<String>,
    pub repo: String,
    pub token: String,
}

impl Form {
    /// Start with the repository fields filled from the saved config.
    pub fn from_config(config: &Config) -> Self {
        Form {
            repo: config.repo.clone(),
            token: config.token.clone(),
            ..Form::default()
        }
    }

    pub fn reset(&mut self) {
        self.name.clear();
        self.litematics.clear();
        self.image = None;
        self.selected_tags.clear();
    }

    /// Short summary of the current file selection.
    pub fn file_hint(&self) -> String {
        let mut parts = Vec::new();
        if !self.litematics.is_empty() {
            parts.push(format!("{} litematic", self.litematics.len()));
        }
        if self.image.is_some() {
            parts.push("image selected".to_string());
        }
        if parts.is_empty() {
            "no files selected".to_string()
        } else {
            parts.join(" / ")
        }
    }

    /// Build the request, listing tags in vocabulary order.
    pub fn to_request(&self, vocabulary: &[String]) -> UploadRequest {
        UploadRequest {
            base_name: self.name.trim().to_string(),
            selected_tags: vocabulary
                .iter()
                .filter(|t| self.selected_tags.contains(*t))
                .cloned()
                .collect(),
            litematic_files: self.litematics.clone(),
            image: self.image.clone(),
        }
    }

    pub fn remote(&self) -> Remote {
        Remote {
            url: self.repo.trim().to_string(),
            token: self.token.trim().to_string(),
        }
    }
}

/// Status line shown above the menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ready,
    Working(Stage),
    Done,
    Failed,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Ready => write!(f, "{}", "Ready".blue()),
            Status::Working(stage) => write!(f, "{}", stage.to_string().yellow()),
            Status::Done => write!(f, "{}", "Done".green()),
            Status::Failed => write!(f, "{}", "Failed".red()),
        }
    }
}

/// Everything the interactive session works on.
pub struct App {
    store: ConfigStore,
    config: Config,
    form: Form,
    uploader: Uploader<GitCli>,
    status: Status,
    use_dialogs: bool,
}

impl App {
    pub fn new(
        store: ConfigStore,
        config: Config,
        uploader: Uploader<GitCli>,
        use_dialogs: bool,
    ) -> Self {
        let form = Form::from_config(&config);
        App {
            store,
            config,
            form,
            uploader,
            status: Status::Ready,
            use_dialogs,
        }
    }
}

/// Main interactive menu. Runs until the user picks "Exit".
pub fn main_menu(mut app: App) -> Result<()> {
    loop {
        println!();
        println!(
            "{} {}   {} {}   {} {}",
            "Status:".bold(),
            app.status,
            "Name:".bold(),
            if app.form.name.is_empty() { "-" } else { app.form.name.as_str() },
            "Files:".bold(),
            app.form.file_hint()
        );

        let items = vec![
            "Select litematic files",
            "Select image (optional)",
            "Set name",
            "Choose tags",
            "Add tag",
            "Repository settings",
            "Upload",
            "Exit",
        ];
        let selection = Select::new().items(&items).default(0).interact()?;
        match selection {
            0 => pick_litematics(&mut app)?,
            1 => pick_image(&mut app)?,
            2 => {
                app.form.name = Input::new()
                    .with_prompt("Base name")
                    .with_initial_text(app.form.name.clone())
                    .allow_empty(true)
                    .interact_text()?;
            }
            3 => choose_tags(&mut app)?,
            4 => add_tag(&mut app)?,
            5 => repository_settings(&mut app)?,
            6 => handle_upload(&mut app)?,
            7 => break,
            _ => {}
        }
    }
    Ok(())
}

fn start_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Paths typed by hand, separated by `;`.
fn parse_paths(input: &str) -> Vec<PathBuf> {
    input
        .split(';')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .collect()
}

fn pick_litematics(app: &mut App) -> Result<()> {
    app.form.litematics = if app.use_dialogs {
        FileDialog::new()
            .set_title("Select litematic files")
            .add_filter("Litematic", &["litematic"])
            .set_directory(start_dir())
            .pick_files()
            .unwrap_or_default()
    } else {
        let typed: String = Input::new()
            .with_prompt("Litematic file paths (separate with ';')")
            .allow_empty(true)
            .interact_text()?;
        parse_paths(&typed)
    };
    Ok(())
}

fn pick_image(app: &mut App) -> Result<()> {
    app.form.image = if app.use_dialogs {
        FileDialog::new()
            .set_title("Select image")
            .add_filter("Image", &["png"])
            .set_directory(start_dir())
            .pick_file()
    } else {
        let typed: String = Input::new()
            .with_prompt("Image path (empty for none)")
            .allow_empty(true)
            .interact_text()?;
        parse_paths(&typed).into_iter().next()
    };
    Ok(())
}

fn choose_tags(app: &mut App) -> Result<()> {
    if app.config.tags.is_empty() {
        println!("No tags yet, add one first.");
        return Ok(());
    }
    let checked: Vec<bool> = app
        .config
        .tags
        .iter()
        .map(|t| app.form.selected_tags.contains(t))
        .collect();
    // `MultiSelect` toggles with space and confirms with Enter.
    let chosen = MultiSelect::new()
        .with_prompt("Tags")
        .items(&app.config.tags)
        .defaults(&checked)
        .interact()?;
    app.form.selected_tags = chosen
        .into_iter()
        .map(|i| app.config.tags[i].clone())
        .collect();
    Ok(())
}

fn add_tag(app: &mut App) -> Result<()> {
    let tag: String = Input::new()
        .with_prompt("New tag")
        .allow_empty(true)
        .interact_text()?;
    if app.config.add_tag(&tag) {
        app.store.save(&app.config).context("Failed to save config")?;
        println!("Tag added.");
    }
    Ok(())
}

fn repository_settings(app: &mut App) -> Result<()> {
    let repo: String = Input::new()
        .with_prompt("Repository HTTPS URL")
        .with_initial_text(app.form.repo.clone())
        .allow_empty(true)
        .interact_text()?;
    // `Password` hides input; an empty answer keeps the current token.
    let token = Password::new()
        .with_prompt("Access token (empty keeps the current one)")
        .allow_empty_password(true)
        .interact()?;

    app.form.repo = repo.trim().to_string();
    if !token.trim().is_empty() {
        app.form.token = token.trim().to_string();
    }
    app.config.repo = app.form.repo.clone();
    app.config.token = app.form.token.clone();
    app.store.save(&app.config).context("Failed to save config")?;
    println!("Configuration saved.");
    Ok(())
}

fn handle_upload(app: &mut App) -> Result<()> {
    if app.form.litematics.len() > 1 {
        let proceed = Confirm::new()
            .with_prompt(format!(
                "{} litematic files are selected but all get the same name, so only the last one is kept. Continue?",
                app.form.litematics.len()
            ))
            .default(false)
            .interact()?;
        if !proceed {
            return Ok(());
        }
    }

    let request = app.form.to_request(&app.config.tags);
    let remote = app.form.remote();

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(100));

    let status = &mut app.status;
    let result = app.uploader.upload(&request, &remote, |stage| {
        spinner.set_message(stage.to_string());
        *status = Status::Working(stage);
    });
    spinner.finish_and_clear();

    match result {
        Ok(outcome) => {
            app.status = Status::Done;
            if outcome.committed {
                println!("{} {}", "Upload complete:".green(), outcome.name);
            } else {
                println!("Nothing changed for {}, skipped commit.", outcome.name);
            }
            app.form.reset();
        }
        Err(e) => {
            if let Status::Working(stage) = app.status {
                log::debug!("upload failed during: {}", stage);
            }
            app.status = Status::Failed;
            println!("{} {}", "Upload failed:".red(), e);
        }
    }
    Ok(())
}
