use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use heritage_catalog::api::ArtifactQuery;
use heritage_catalog::app::{AcceptItems, App, FixedResolutions, ProgressSinkKind};
use heritage_catalog::artifact_editor::{ArtifactEdit, ArtifactForm};
use heritage_catalog::config::{ClientConfig, ConfigLoader};
use heritage_catalog::domain::{RequestStatus, Resolution};
use heritage_catalog::error::CatalogError;
use heritage_catalog::http::CatalogHttpClient;
use heritage_catalog::output::{HumanOutput, JsonOutput, OutputMode, StderrProgress};
use heritage_catalog::request_panel::RequestForm;
use heritage_catalog::storage::{LocalStorage, TOKEN_KEY};
use heritage_catalog::tui::{self, Browser, Tui};

#[derive(Parser)]
#[command(name = "catalog")]
#[command(about = "Browse a museum artifact catalog, request downloads and manage collections")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    non_interactive: bool,

    /// Path to a JSON config file (defaults to ./catalog.json when present).
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Open the interactive catalog browser")]
    Browse(FilterArgs),
    #[command(about = "List or inspect catalog artifacts")]
    Artifacts {
        #[command(subcommand)]
        command: ArtifactsCommand,
    },
    #[command(about = "Manage the download selection")]
    Selection {
        #[command(subcommand)]
        command: SelectionCommand,
    },
    #[command(about = "Download the selected artifacts (requires login)")]
    Download(DownloadArgs),
    #[command(about = "Request the selected artifacts as an anonymous visitor")]
    Request(RequestArgs),
    #[command(about = "Upload a spreadsheet and archive of new artifacts")]
    BulkLoad(BulkLoadArgs),
    #[command(about = "Review download requests (administrators)")]
    Requests {
        #[command(subcommand)]
        command: RequestsCommand,
    },
    #[command(about = "Show the number of pending download requests")]
    Notifications,
    #[command(about = "Log in and store the session token")]
    Login(LoginArgs),
    #[command(about = "Forget the stored session token")]
    Logout,
    #[command(about = "Recover a forgotten password")]
    Password {
        #[command(subcommand)]
        command: PasswordCommand,
    },
}

#[derive(Args, Clone, Default)]
struct FilterArgs {
    #[arg(long)]
    query: Option<String>,
    #[arg(long)]
    culture: Option<String>,
    #[arg(long)]
    shape: Option<String>,
    #[arg(long = "tag")]
    tags: Vec<String>,
    #[arg(long)]
    page: Option<u32>,
}

impl From<FilterArgs> for ArtifactQuery {
    fn from(args: FilterArgs) -> Self {
        ArtifactQuery {
            query: args.query,
            culture: args.culture,
            shape: args.shape,
            tags: args.tags,
            page: args.page,
        }
    }
}

#[derive(Subcommand)]
enum ArtifactsCommand {
    #[command(about = "List one page of artifacts")]
    List(FilterArgs),
    #[command(about = "Show one artifact")]
    Show { id: u64 },
    #[command(about = "Create an artifact (staff)")]
    Add(ArtifactAddArgs),
    #[command(about = "Edit an artifact (staff)")]
    Edit(ArtifactEditArgs),
}

#[derive(Args)]
struct MediaArgs {
    /// Thumbnail image to upload.
    #[arg(long)]
    thumbnail: Option<PathBuf>,
    /// 3D model object file.
    #[arg(long)]
    object: Option<PathBuf>,
    #[arg(long)]
    material: Option<PathBuf>,
    #[arg(long)]
    texture: Option<PathBuf>,
    /// Additional image to upload; repeatable.
    #[arg(long = "image")]
    images: Vec<PathBuf>,
}

#[derive(Args)]
struct ArtifactAddArgs {
    #[arg(long)]
    description: String,
    #[arg(long)]
    shape: Option<u64>,
    #[arg(long)]
    culture: Option<u64>,
    /// Tag ids, comma separated.
    #[arg(long = "tag", value_delimiter = ',')]
    tags: Vec<u64>,
    #[command(flatten)]
    media: MediaArgs,
}

#[derive(Args)]
struct ArtifactEditArgs {
    id: u64,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    shape: Option<u64>,
    #[arg(long)]
    culture: Option<u64>,
    /// Replaces the tag ids, comma separated.
    #[arg(long = "tag", value_delimiter = ',')]
    tags: Option<Vec<u64>>,
    #[arg(long)]
    drop_thumbnail: bool,
    /// Stored image file name to remove; repeatable.
    #[arg(long = "drop-image")]
    drop_images: Vec<String>,
    #[command(flatten)]
    media: MediaArgs,
}

#[derive(Subcommand)]
enum SelectionCommand {
    #[command(about = "Show the selected artifacts")]
    List,
    #[command(about = "Add an artifact, or remove it if already selected")]
    Toggle { id: u64 },
    #[command(about = "Remove an artifact from the selection")]
    Remove { id: u64 },
    #[command(about = "Empty the selection")]
    Clear,
}

#[derive(Args)]
struct DownloadArgs {
    /// Directory to save the archive in (defaults to the configured download dir).
    #[arg(long)]
    dir: Option<PathBuf>,
}

#[derive(Args)]
struct RequestArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    rut: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    repeat_email: Option<String>,
    /// Institution id or name.
    #[arg(long)]
    institution: String,
    #[arg(long, default_value = "")]
    comments: String,
}

#[derive(Args)]
struct BulkLoadArgs {
    spreadsheet: PathBuf,
    archive: PathBuf,
    /// Resolution for one possible duplicate, as `<new artifact id>=<replace|keep|new>`.
    #[arg(long = "resolve", value_parser = parse_resolve_flag)]
    resolve: Vec<(u64, Resolution)>,
    /// Resolution for every remaining duplicate, or `cancel`.
    #[arg(long)]
    on_duplicate: Option<String>,
}

#[derive(Subcommand)]
enum RequestsCommand {
    #[command(about = "List download requests")]
    List {
        #[arg(long)]
        status: Option<RequestStatus>,
    },
    #[command(about = "Show one download request")]
    Show { id: u64 },
    #[command(about = "Accept some or all items of a pending request")]
    Accept {
        id: u64,
        /// Item ids to accept; the rest are rejected.
        #[arg(long, value_delimiter = ',', conflicts_with = "all")]
        items: Vec<u64>,
        #[arg(long)]
        all: bool,
        #[arg(long)]
        comment: Option<String>,
    },
    #[command(about = "Reject every item of a pending request")]
    Reject {
        id: u64,
        #[arg(long)]
        comment: String,
    },
}

#[derive(Args)]
struct LoginArgs {
    #[arg(long)]
    username: String,
    /// Falls back to the CATALOG_PASSWORD environment variable.
    #[arg(long)]
    password: Option<String>,
}

#[derive(Subcommand)]
enum PasswordCommand {
    #[command(about = "Send a password reset email")]
    Reset { email: String },
    #[command(about = "Set a new password from a reset link")]
    Confirm {
        uidb64: String,
        token: String,
        #[arg(long)]
        new_password: String,
    },
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<CatalogError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &CatalogError) -> u8 {
    if error.is_validation() {
        return 2;
    }
    match error {
        CatalogError::ArtifactNotFound(_)
        | CatalogError::MissingFile(_)
        | CatalogError::ConfigRead(_)
        | CatalogError::InvalidResolution(_)
        | CatalogError::UnknownMatch(_)
        | CatalogError::UnknownRequestItem { .. } => 2,
        CatalogError::Http(_) | CatalogError::Status { .. } | CatalogError::Decode(_) => 3,
        _ => 1,
    }
}

fn parse_resolve_flag(value: &str) -> Result<(u64, Resolution), CatalogError> {
    let (id, resolution) = value
        .split_once('=')
        .ok_or_else(|| CatalogError::InvalidResolution(value.to_string()))?;
    let id = id
        .trim()
        .parse::<u64>()
        .map_err(|_| CatalogError::InvalidResolution(value.to_string()))?;
    Ok((id, resolution.parse()?))
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    let config = ConfigLoader::resolve(cli.config.as_deref())?;
    let storage = LocalStorage::new_with_root(config.storage_dir.clone());
    let app = build_app(&config, storage)?;

    match cli.command {
        Some(command) => run_command(command, app, &config, output_mode),
        None => match output_mode {
            OutputMode::Interactive => run_command(
                Commands::Browse(FilterArgs::default()),
                app,
                &config,
                output_mode,
            ),
            OutputMode::NonInteractive => Err(miette::Report::msg(
                "command required (try `catalog --help`)",
            )),
        },
    }
}

fn build_app(
    config: &ClientConfig,
    storage: LocalStorage,
) -> miette::Result<App<CatalogHttpClient>> {
    let token = match &config.token {
        Some(token) => Some(token.clone()),
        None => storage
            .get_item(TOKEN_KEY)?
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty()),
    };
    let authenticated = token.is_some();
    let client = CatalogHttpClient::new(config, token)?;
    Ok(App::new(
        client,
        storage,
        config.download_dir.clone().into_std_path_buf(),
        authenticated,
    ))
}

fn run_command(
    command: Commands,
    app: App<CatalogHttpClient>,
    config: &ClientConfig,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let json = matches!(output_mode, OutputMode::NonInteractive);
    match command {
        Commands::Browse(filters) => {
            if json {
                return Err(miette::Report::msg("browse needs an interactive terminal"));
            }
            let mut store = app.selection();
            Browser::new(
                app.api(),
                &mut store,
                app.is_authenticated(),
                config.download_dir.clone().into_std_path_buf(),
                filters.into(),
            )
            .run()
        }
        Commands::Artifacts { command } => match command {
            ArtifactsCommand::List(filters) => {
                if json {
                    let page = app.list_artifacts(filters.into(), &JsonOutput)?;
                    JsonOutput::print(&page).into_diagnostic()
                } else {
                    let page = app
                        .list_artifacts(filters.into(), &StderrProgress)?;
                    HumanOutput::print_page(&page);
                    Ok(())
                }
            }
            ArtifactsCommand::Show { id } => {
                if json {
                    let info = app.show_artifact(id, &JsonOutput)?;
                    JsonOutput::print(&info).into_diagnostic()
                } else {
                    let info = app.show_artifact(id, &StderrProgress)?;
                    HumanOutput::print_artifact(&info);
                    Ok(())
                }
            }
            ArtifactsCommand::Add(args) => {
                let form = ArtifactForm {
                    description: args.description,
                    shape: args.shape,
                    culture: args.culture,
                    tags: args.tags,
                    new_thumbnail: args.media.thumbnail,
                    new_object: args.media.object,
                    new_material: args.media.material,
                    new_texture: args.media.texture,
                    new_images: args.media.images,
                    ..ArtifactForm::default()
                };
                if json {
                    let saved = app.create_artifact(&form, &JsonOutput)?;
                    return JsonOutput::print(&saved).into_diagnostic();
                }
                let mut tui = Tui::new(ProgressSinkKind::Upload);
                let saved = tui.run(move |sink| app.create_artifact(&form, sink))?;
                HumanOutput::print_saved(&saved);
                Ok(())
            }
            ArtifactsCommand::Edit(args) => {
                let id = args.id;
                let edit = ArtifactEdit {
                    description: args.description,
                    shape: args.shape,
                    culture: args.culture,
                    tags: args.tags,
                    drop_thumbnail: args.drop_thumbnail,
                    drop_images: args.drop_images,
                    new_thumbnail: args.media.thumbnail,
                    new_object: args.media.object,
                    new_material: args.media.material,
                    new_texture: args.media.texture,
                    new_images: args.media.images,
                };
                if json {
                    let saved = app.edit_artifact(id, edit, &JsonOutput)?;
                    return JsonOutput::print(&saved).into_diagnostic();
                }
                let mut tui = Tui::new(ProgressSinkKind::Upload);
                let saved = tui.run(move |sink| app.edit_artifact(id, edit, sink))?;
                HumanOutput::print_saved(&saved);
                Ok(())
            }
        },
        Commands::Selection { command } => run_selection(command, &app, json),
        Commands::Download(args) => {
            if json {
                let result = app
                    .download(args.dir.as_deref(), &JsonOutput)?;
                return JsonOutput::print(&result).into_diagnostic();
            }
            let mut tui = Tui::new(ProgressSinkKind::Download);
            let dir = args.dir;
            let result = tui.run(move |sink| app.download(dir.as_deref(), sink))?;
            HumanOutput::print_download(&result);
            Ok(())
        }
        Commands::Request(args) => {
            let form = RequestForm {
                full_name: args.name,
                rut: args.rut,
                email: args.email,
                repeat_email: args.repeat_email,
                institution: args.institution,
                comments: args.comments,
            };
            if json {
                let receipt = app.submit_request(&form, &JsonOutput)?;
                return JsonOutput::print(&receipt).into_diagnostic();
            }
            let mut tui = Tui::new(ProgressSinkKind::Request);
            let receipt = tui.run(move |sink| app.submit_request(&form, sink))?;
            HumanOutput::print_request(&receipt);
            Ok(())
        }
        Commands::BulkLoad(args) => run_bulk_load(args, app, json),
        Commands::Requests { command } => run_requests(command, app, json),
        Commands::Notifications => {
            let result = app.notifications()?;
            if json {
                JsonOutput::print(&result).into_diagnostic()
            } else {
                HumanOutput::print_notifications(&result);
                Ok(())
            }
        }
        Commands::Login(args) => {
            let password = match args.password {
                Some(password) => password,
                None => std::env::var("CATALOG_PASSWORD")
                    .map_err(|_| CatalogError::MissingField("password"))?,
            };
            let result = app.login(&args.username, &password)?;
            if json {
                JsonOutput::print(&result).into_diagnostic()
            } else {
                HumanOutput::print_message("logged in");
                Ok(())
            }
        }
        Commands::Logout => {
            let result = app.logout()?;
            if json {
                JsonOutput::print(&result).into_diagnostic()
            } else {
                HumanOutput::print_message("logged out");
                Ok(())
            }
        }
        Commands::Password { command } => {
            let result = match command {
                PasswordCommand::Reset { email } => app.password_reset(&email),
                PasswordCommand::Confirm {
                    uidb64,
                    token,
                    new_password,
                } => app.password_confirm(&uidb64, &token, &new_password),
            }?;
            if json {
                JsonOutput::print(&result).into_diagnostic()
            } else {
                HumanOutput::print_message(&result.message);
                Ok(())
            }
        }
    }
}

fn run_selection(
    command: SelectionCommand,
    app: &App<CatalogHttpClient>,
    json: bool,
) -> miette::Result<()> {
    match command {
        SelectionCommand::List => {
            let result = app.selection_list();
            if json {
                JsonOutput::print(&result).into_diagnostic()
            } else {
                HumanOutput::print_selection(&result);
                Ok(())
            }
        }
        SelectionCommand::Toggle { id } => {
            let change = if json {
                app.selection_toggle(id, &JsonOutput)
            } else {
                app.selection_toggle(id, &StderrProgress)
            }?;
            if json {
                JsonOutput::print(&change).into_diagnostic()
            } else {
                HumanOutput::print_selection_change(&change);
                Ok(())
            }
        }
        SelectionCommand::Remove { id } => {
            let change = app.selection_remove(id)?;
            if json {
                JsonOutput::print(&change).into_diagnostic()
            } else {
                HumanOutput::print_selection_change(&change);
                Ok(())
            }
        }
        SelectionCommand::Clear => {
            if json {
                let result = app.selection_clear()?;
                return JsonOutput::print(&result).into_diagnostic();
            }
            if !tui::confirm("Clear the download selection?")? {
                return Ok(());
            }
            let result = app.selection_clear()?;
            HumanOutput::print_selection(&result);
            Ok(())
        }
    }
}

fn run_bulk_load(
    args: BulkLoadArgs,
    app: App<CatalogHttpClient>,
    json: bool,
) -> miette::Result<()> {
    let BulkLoadArgs {
        spreadsheet,
        archive,
        resolve,
        on_duplicate,
    } = args;
    let mut fixed = FixedResolutions {
        per_artifact: resolve.into_iter().collect::<HashMap<_, _>>(),
        ..FixedResolutions::default()
    };
    match on_duplicate.as_deref().map(str::trim) {
        Some("cancel") => fixed.cancel = true,
        Some(value) => fixed.fallback = Some(value.parse()?),
        None => {}
    }

    if json {
        let result = app.bulk_load(
            &spreadsheet,
            &archive,
            |review| fixed.decide(review),
            &JsonOutput,
        )?;
        return JsonOutput::print(&result).into_diagnostic();
    }

    let has_flags = !fixed.per_artifact.is_empty() || fixed.fallback.is_some() || fixed.cancel;
    let result = if has_flags {
        let mut tui = Tui::new(ProgressSinkKind::BulkLoad);
        tui.run(move |sink| {
            app.bulk_load(&spreadsheet, &archive, |review| fixed.decide(review), sink)
        })?
    } else {
        // The picker owns the terminal, so progress goes to stderr here.
        let mut picker_error = None;
        let result = app.bulk_load(
            &spreadsheet,
            &archive,
            |review| match tui::pick_resolutions(review) {
                Ok(decision) => decision,
                Err(err) => {
                    picker_error = Some(err);
                    None
                }
            },
            &StderrProgress,
        );
        if let Some(err) = picker_error {
            return Err(err);
        }
        result?
    };
    HumanOutput::print_bulk_load(&result);
    Ok(())
}

fn run_requests(
    command: RequestsCommand,
    app: App<CatalogHttpClient>,
    json: bool,
) -> miette::Result<()> {
    match command {
        RequestsCommand::List { status } => {
            let result = if json {
                app.requests(status, &JsonOutput)
            } else {
                app.requests(status, &StderrProgress)
            }?;
            if json {
                JsonOutput::print(&result).into_diagnostic()
            } else {
                HumanOutput::print_requests(&result);
                Ok(())
            }
        }
        RequestsCommand::Show { id } => {
            let info = if json {
                app.request_detail(id, &JsonOutput)
            } else {
                app.request_detail(id, &StderrProgress)
            }?;
            if json {
                JsonOutput::print(&info).into_diagnostic()
            } else {
                HumanOutput::print_request_detail(&info);
                Ok(())
            }
        }
        RequestsCommand::Accept {
            id,
            items,
            all,
            comment,
        } => {
            let selection = if all {
                AcceptItems::All
            } else {
                AcceptItems::Only(items)
            };
            if json {
                let info = app
                    .accept_request(id, selection, comment.as_deref(), &JsonOutput)?;
                return JsonOutput::print(&info).into_diagnostic();
            }
            let mut tui = Tui::new(ProgressSinkKind::Triage);
            let info = tui.run(move |sink| {
                app.accept_request(id, selection, comment.as_deref(), sink)
            })?;
            HumanOutput::print_request_detail(&info);
            Ok(())
        }
        RequestsCommand::Reject { id, comment } => {
            if json {
                let info = app
                    .reject_request(id, &comment, &JsonOutput)?;
                return JsonOutput::print(&info).into_diagnostic();
            }
            if !tui::confirm(&format!("Reject every item of request #{id}?"))? {
                return Ok(());
            }
            let mut tui = Tui::new(ProgressSinkKind::Triage);
            let info = tui.run(move |sink| app.reject_request(id, &comment, sink))?;
            HumanOutput::print_request_detail(&info);
            Ok(())
        }
    }
}
