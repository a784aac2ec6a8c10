use anyhow::{Context, Result};
use chrono::{NaiveDate, Weekday};
use chrono_tz::Tz;
use clap::{Parser, Subcommand, ValueEnum};
use std::sync::Arc;
use taskflow_core::{
    classify, next_due_date, parse_day, today_in_zone, CompletionContext, EventBus, TaskId,
    TaskLifecycle, TaskStore, ViewTag,
};
use taskflow_sync::{CountSynchronizer, Invalidations, LiveChannel, RestClient, WsConnector};
use tracing::{debug, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;
mod render;
mod state;

use config::Config;

#[derive(Parser, Debug)]
#[command(
    name = "taskflow",
    version,
    long_version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("TASKFLOW_BUILD_SHA"), ")"),
    about = "Task lifecycle and live view counts"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage ~/.taskflow/config.toml
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Pull the per-view task counts once
    Counts {
        /// Day to count for (YYYY-MM-DD); defaults to today in the configured timezone
        #[arg(long)]
        today: Option<String>,
    },

    /// Follow the live count channel and print every snapshot until Ctrl-C
    Watch,

    /// Show which views a task belongs to
    Views {
        task_id: TaskId,
        #[arg(long)]
        today: Option<String>,
    },

    /// Complete a task from a view (repeating tasks roll their due date instead)
    Complete {
        task_id: TaskId,
        /// View the task was completed from
        #[arg(long, value_enum)]
        view: Option<ViewArg>,
        /// Project the task was completed from
        #[arg(long)]
        project: Option<i64>,
        #[arg(long)]
        today: Option<String>,
    },

    /// Undo a completion; the task stays in its Completed section
    Uncomplete { task_id: TaskId },

    /// Move a completed task into the activity log
    Archive { task_id: TaskId },

    /// Print the next due date for a recurrence ("every day", "every week", ...)
    NextDue { date: String, frequency: String },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write the default config if none exists
    Init,
    /// Print the effective config
    Show,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ViewArg {
    Inbox,
    Today,
    Upcoming,
}

impl From<ViewArg> for ViewTag {
    fn from(v: ViewArg) -> Self {
        match v {
            ViewArg::Inbox => ViewTag::Inbox,
            ViewArg::Today => ViewTag::Today,
            ViewArg::Upcoming => ViewTag::Upcoming,
        }
    }
}

/// Resolved settings plus the REST client shared by every subcommand.
struct App {
    cfg: Config,
    tz: Tz,
    week_start: Weekday,
    rest: Arc<RestClient>,
}

impl App {
    fn new(cfg: Config) -> Result<Self> {
        let tz = cfg.timezone()?;
        let week_start = cfg.week_start()?;
        let rest = RestClient::new(&cfg.server.base_url, cfg.timeout())
            .with_context(|| format!("[server] base_url {}", cfg.server.base_url))?;
        Ok(Self {
            cfg,
            tz,
            week_start,
            rest: Arc::new(rest),
        })
    }

    /// `--today` override, else the calendar day in the configured zone.
    fn today(&self, arg: Option<&str>) -> Result<NaiveDate> {
        match arg {
            Some(s) => Ok(parse_day(s)?),
            None => Ok(today_in_zone(self.tz)),
        }
    }

    fn lifecycle(&self) -> TaskLifecycle<RestClient> {
        TaskLifecycle::new(self.rest.clone(), Arc::new(EventBus::new()))
    }

    fn counts(&self) -> CountSynchronizer {
        CountSynchronizer::new(self.rest.clone())
    }
}

fn init_tracing(cfg: &Config) {
    // RUST_LOG wins; then the config file; then "warn".
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|raw| EnvFilter::try_new(raw.trim()).ok())
        .or_else(|| EnvFilter::try_new(cfg.log.filter.trim()).ok())
        .unwrap_or_else(|| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config()?;
    init_tracing(&cfg);

    match cli.command {
        Command::Config { command } => match command {
            ConfigCommand::Init => config::init_config()?,
            ConfigCommand::Show => {
                println!("# {}", config::config_path()?.display());
                print!("{}", toml::to_string_pretty(&cfg).context("serialize config")?);
            }
        },

        Command::NextDue { date, frequency } => {
            let next = next_due_date(parse_day(&date)?, &frequency)?;
            println!("{next}");
        }

        Command::Counts { today } => {
            let app = App::new(cfg)?;
            let today = app.today(today.as_deref())?;
            let counts = app.counts().refresh(today).await.context("fetch counts")?;
            println!("{}", render::counts(&counts));
        }

        Command::Watch => watch(&App::new(cfg)?).await?,

        Command::Views { task_id, today } => {
            let app = App::new(cfg)?;
            let today = app.today(today.as_deref())?;
            let task = app.rest.get_task(task_id).await?;
            println!("{}", render::task_line(&task));
            for view in classify(&task, today, app.week_start) {
                println!("  {}", render::view_label(view));
            }
        }

        Command::Complete { task_id, view, project, today } => {
            let app = App::new(cfg)?;
            let today = app.today(today.as_deref())?;
            let context = CompletionContext {
                view: view.map(ViewTag::from),
                project_id: project,
            };
            let lifecycle = app.lifecycle();
            let counts = app.counts();
            let (_sub, mut inv) = counts.attach(lifecycle.bus());

            let outcome = lifecycle.complete(task_id, context, today).await?;
            println!("{}", render::outcome(&outcome));
            refresh_after_change(&counts, &mut inv, today).await;
        }

        Command::Uncomplete { task_id } => {
            let app = App::new(cfg)?;
            let lifecycle = app.lifecycle();
            let counts = app.counts();
            let (_sub, mut inv) = counts.attach(lifecycle.bus());

            let task = lifecycle.uncomplete(task_id).await?;
            println!("{}", render::task_line(&task));
            refresh_after_change(&counts, &mut inv, app.today(None)?).await;
        }

        Command::Archive { task_id } => {
            let app = App::new(cfg)?;
            let lifecycle = app.lifecycle();
            let counts = app.counts();
            let (_sub, mut inv) = counts.attach(lifecycle.bus());

            let task = lifecycle.archive(task_id).await?;
            println!("{}", render::task_line(&task));
            refresh_after_change(&counts, &mut inv, app.today(None)?).await;
        }
    }

    Ok(())
}

/// One pull per pending invalidation, then print the latest aggregate.
async fn refresh_after_change(
    counts: &CountSynchronizer,
    inv: &mut Invalidations,
    today: NaiveDate,
) {
    let mut pulled = false;
    while let Some(kind) = inv.try_next() {
        debug!(?kind, "refreshing counts after change");
        pulled |= counts.refresh(today).await.is_ok();
    }
    if pulled {
        if let Some(c) = counts.counts() {
            println!("{}", render::counts(&c));
        }
    }
}

async fn watch(app: &App) -> Result<()> {
    let counts = Arc::new(app.counts());
    let mut updates = counts.subscribe();

    let tz = app.tz;
    if let Err(e) = counts.refresh(today_in_zone(tz)).await {
        warn!(error = %e, "initial count pull failed; waiting for the live channel");
    }

    let connector = WsConnector::new(&app.cfg.server.live_url)
        .with_context(|| format!("[server] live_url {}", app.cfg.server.live_url))?;
    let channel = LiveChannel::spawn(
        Arc::new(connector),
        counts.clone(),
        move || today_in_zone(tz),
        app.cfg.reconnect_delay(),
    );

    if let Some(c) = counts.counts() {
        println!("{}", render::counts(&c));
    }

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                if let Some(c) = snapshot.counts {
                    println!("{}", render::counts(&c));
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    channel.shutdown().await;
    Ok(())
}
