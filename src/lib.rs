pub mod application;
pub mod domain;
pub mod infrastructure;

use application::commands::{
    activate_license_impl, add_group_impl, calendar_impl, clear_license_impl, delete_group_impl,
    delete_range_impl, license_status_impl, open_plan_impl, paint_range_impl, rename_group_impl,
    reset_plan_impl, share_url_impl, show_plan_impl, toggle_date_impl, update_settings_impl,
    AppState, SettingsUpdate,
};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

const LOG_FILTER_ENV: &str = "POCKETCAL_LOG";

/// Plan a year at a glance and share it as a single URL.
#[derive(Debug, Parser)]
#[command(name = "pocketcal", version)]
pub struct Cli {
    /// Workspace holding config/, state/ and logs/ (defaults to the current directory)
    #[arg(long, global = true, value_name = "DIR")]
    workspace: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Replace the current plan with one decoded from a share URL or fragment
    Open {
        #[arg(allow_hyphen_values = true)]
        input: String,
    },
    /// Print the current plan as JSON
    Show,
    /// Print the share URL of the current plan
    Url,
    /// Start over with the default plan
    Reset,
    /// List the visible days and the groups covering each
    Calendar {
        /// Only list days covered by at least one group
        #[arg(long)]
        covered: bool,
    },
    /// Manage event groups (addressed by 1-based position)
    Group {
        #[command(subcommand)]
        action: GroupAction,
    },
    /// Select or unselect a single day
    Toggle {
        date: String,
        /// Group position; defaults to the first group
        #[arg(long)]
        group: Option<usize>,
    },
    /// Add the inclusive span between two days
    Paint {
        anchor: String,
        pointer: String,
        #[arg(long)]
        group: Option<usize>,
        /// Discard the group's other ranges first
        #[arg(long)]
        replace: bool,
    },
    /// Remove an exact stored range
    Unpaint {
        start: String,
        end: String,
        #[arg(long)]
        group: Option<usize>,
    },
    /// Change the first month shown and display toggles
    Settings {
        #[arg(long, value_name = "YYYY-MM-DD")]
        start: Option<String>,
        #[arg(long, value_name = "BOOL")]
        weekends: Option<bool>,
        #[arg(long, value_name = "BOOL")]
        show_today: Option<bool>,
    },
    /// Manage the Pro license
    License {
        #[command(subcommand)]
        action: LicenseAction,
    },
}

#[derive(Debug, Subcommand)]
enum GroupAction {
    Add { name: String },
    Rename { position: usize, name: String },
    Delete { position: usize },
}

#[derive(Debug, Subcommand)]
enum LicenseAction {
    /// Store and validate a license key
    Activate { key: String },
    /// Show the stored license, revalidating it when due
    Status,
    /// Forget the stored license
    Clear,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn to_json<T: Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|error| error.to_string())
}

async fn dispatch(state: &AppState, command: Command) -> Result<String, String> {
    match command {
        Command::Open { input } => {
            to_json(&open_plan_impl(state, input).map_err(|error| state.command_error("open_plan", &error))?)
        }
        Command::Show => to_json(&show_plan_impl(state).map_err(|error| state.command_error("show_plan", &error))?),
        Command::Url => share_url_impl(state).map_err(|error| state.command_error("share_url", &error)),
        Command::Reset => {
            to_json(&reset_plan_impl(state).map_err(|error| state.command_error("reset_plan", &error))?)
        }
        Command::Calendar { covered } => to_json(
            &calendar_impl(state, covered).map_err(|error| state.command_error("calendar", &error))?,
        ),
        Command::Group { action } => match action {
            GroupAction::Add { name } => to_json(
                &add_group_impl(state, name).map_err(|error| state.command_error("add_group", &error))?,
            ),
            GroupAction::Rename { position, name } => to_json(
                &rename_group_impl(state, position, name)
                    .map_err(|error| state.command_error("rename_group", &error))?,
            ),
            GroupAction::Delete { position } => to_json(
                &delete_group_impl(state, position).map_err(|error| state.command_error("delete_group", &error))?,
            ),
        },
        Command::Toggle { date, group } => to_json(
            &toggle_date_impl(state, group, date).map_err(|error| state.command_error("toggle_date", &error))?,
        ),
        Command::Paint {
            anchor,
            pointer,
            group,
            replace,
        } => to_json(
            &paint_range_impl(state, group, anchor, pointer, replace)
                .map_err(|error| state.command_error("paint_range", &error))?,
        ),
        Command::Unpaint { start, end, group } => to_json(
            &delete_range_impl(state, group, start, end)
                .map_err(|error| state.command_error("delete_range", &error))?,
        ),
        Command::Settings {
            start,
            weekends,
            show_today,
        } => {
            let update = SettingsUpdate {
                start_date: start,
                include_weekends: weekends,
                show_today,
            };
            to_json(&update_settings_impl(state, update).map_err(|error| state.command_error("update_settings", &error))?)
        }
        Command::License { action } => match action {
            LicenseAction::Activate { key } => to_json(
                &activate_license_impl(state, key)
                    .await
                    .map_err(|error| state.command_error("activate_license", &error))?,
            ),
            LicenseAction::Status => to_json(
                &license_status_impl(state)
                    .await
                    .map_err(|error| state.command_error("license_status", &error))?,
            ),
            LicenseAction::Clear => to_json(
                &clear_license_impl(state).map_err(|error| state.command_error("clear_license", &error))?,
            ),
        },
    }
}

pub fn run() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let workspace_root = match cli.workspace.map(Ok).unwrap_or_else(std::env::current_dir) {
        Ok(path) => path,
        Err(error) => {
            eprintln!("error: cannot resolve workspace: {error}");
            return ExitCode::FAILURE;
        }
    };
    let state = match AppState::new(workspace_root) {
        Ok(state) => state,
        Err(error) => {
            eprintln!("error: failed to initialize workspace: {error}");
            return ExitCode::FAILURE;
        }
    };
    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            eprintln!("error: failed to start async runtime: {error}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(dispatch(&state, cli.command)) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}
