//! mpol-dash - Music Police dashboard from the terminal
//!
//! Each subcommand drives the same control layer the dashboard uses:
//! notifications print to stderr as they appear, results print to stdout.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use mpol_common::api::{AnalysisId, ExportRequest, Priority, ReportFilter};
use mpol_common::config::ConfigResolver;
use mpol_common::events::{DashEvent, EventBus, NotificationLevel, PlaybackState};
use mpol_common::human_time::format_clock;
use mpol_dash::dashboard::{RulesView, SettingsView, StatsView};
use mpol_dash::results::{ListBody, ListView};
use mpol_dash::rules::{CategoryToggle, RuleCategory};
use mpol_dash::upload::{SelectedFile, SelectionOrigin, SubmitOptions};
use mpol_dash::{DashboardController, Section, SectionView};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for mpol-dash
#[derive(Parser, Debug)]
#[command(name = "mpol-dash")]
#[command(about = "Music Police compliance dashboard")]
#[command(version)]
struct Args {
    /// Backend API base URL
    #[arg(long, global = true, env = "MPOL_BACKEND_URL")]
    backend_url: Option<String>,

    /// Bootstrap TOML configuration file
    #[arg(long, global = true, env = "MPOL_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Dashboard statistics and recent analyses
    Stats,

    /// List analyses
    List {
        /// Filter by filename or id
        #[arg(long)]
        search: Option<String>,
        /// Paginated view of all analyses instead of the recent preview
        #[arg(long)]
        all: bool,
        /// Page to show with --all
        #[arg(long, default_value_t = 1)]
        page: usize,
    },

    /// Upload audio files for analysis and follow them to completion
    Upload {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Lyrics sent with every file
        #[arg(long)]
        lyrics: Option<String>,
        #[arg(long, default_value = "normal")]
        priority: Priority,
    },

    /// Play the audio of an analysis
    Play { id: i64 },

    /// Show or change compliance rules
    Rules {
        /// Categories to switch on
        /// (copyright, bias_detection, explicit_content, hate_speech, bias:<group>)
        #[arg(long, value_delimiter = ',')]
        enable: Vec<String>,
        /// Categories to switch off
        #[arg(long, value_delimiter = ',')]
        disable: Vec<String>,
    },

    /// Show or change system settings
    Settings {
        #[arg(long)]
        default_priority: Option<Priority>,
        #[arg(long)]
        auto_delete_days: Option<u32>,
    },

    /// Reports
    Report {
        #[command(subcommand)]
        kind: ReportKind,
    },

    /// Show or replace the lyrics of an analysis
    Lyrics {
        id: i64,
        /// New lyrics text
        #[arg(long)]
        set: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum ReportKind {
    Summary {
        #[arg(long)]
        start_date: Option<String>,
        #[arg(long)]
        end_date: Option<String>,
    },
    Trends,
    Export {
        #[arg(long, default_value = "compliance_summary")]
        report_type: String,
        #[arg(long, default_value = "pdf")]
        format: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = ConfigResolver::new()
        .with_backend_url(args.backend_url.clone())
        .with_config_path(args.config.clone())
        .resolve();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!(
        "Starting mpol-dash v{} against {}",
        env!("CARGO_PKG_VERSION"),
        config.backend_url
    );

    let events = EventBus::default();
    let printer = tokio::spawn(print_notifications(events.subscribe()));
    let dashboard = mpol_dash::connect(&config, events).context("Failed to set up backend client")?;
    let pump = dashboard.spawn_event_pump();

    let outcome = run(&dashboard, args.command).await;

    dashboard.shutdown();
    if let Err(e) = pump.await {
        warn!(error = %e, "Event pump did not shut down cleanly");
    }
    printer.abort();
    outcome
}

async fn run(dashboard: &DashboardController, command: Command) -> Result<()> {
    match command {
        Command::Stats => {
            if let SectionView::Dashboard { stats, recent } =
                dashboard.navigate(Section::Dashboard).await
            {
                print_stats(&stats);
                println!();
                print_list(&recent);
            }
        }

        Command::List { search, all, page } => {
            let section = if all { Section::Analyses } else { Section::Dashboard };
            let mut view = match dashboard.navigate(section).await {
                SectionView::Dashboard { recent, .. } => recent,
                SectionView::Analyses { list } => list,
                _ => dashboard.list_view(),
            };
            if let Some(term) = search {
                view = dashboard.search(&term);
            }
            for _ in 1..page {
                match dashboard.change_page(1) {
                    Some(next) => view = next,
                    None => break,
                }
            }
            print_list(&view);
        }

        Command::Upload { files, lyrics, priority } => {
            let mut selected = Vec::with_capacity(files.len());
            for path in &files {
                selected.push(
                    SelectedFile::from_path(path)
                        .await
                        .with_context(|| format!("Cannot read {}", path.display()))?,
                );
            }
            let added = dashboard.add_files(selected, SelectionOrigin::Picker);
            if added.accepted.is_empty() {
                bail!("No supported audio files given");
            }

            let report = dashboard
                .submit_uploads(SubmitOptions { lyrics, priority })
                .await?;
            let names: std::collections::HashMap<_, _> = dashboard
                .queue()
                .items()
                .into_iter()
                .map(|f| (f.id, f.display_name))
                .collect();

            let task_ids: std::collections::HashMap<_, _> = report
                .started
                .iter()
                .map(|t| (t.file_id, t.task_id.clone()))
                .collect();
            let submitted = task_ids.len();

            for (file_id, error) in &report.failed {
                println!("{:<40} upload failed: {}", name_of(&names, file_id), error);
            }
            let outcomes = tokio::select! {
                outcomes = report.wait_all() => outcomes,
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted; cancelling task tracking");
                    return Ok(());
                }
            };
            let mut unfinished = 0;
            for (file_id, outcome) in outcomes {
                let task_id = task_ids.get(&file_id).map(String::as_str).unwrap_or_default();
                match mpol_dash::Error::from_task_outcome(task_id, &outcome) {
                    Some(e) => {
                        unfinished += 1;
                        println!("{:<40} {}", name_of(&names, &file_id), e);
                    }
                    None => println!("{:<40} {:?}", name_of(&names, &file_id), outcome),
                }
            }
            if unfinished > 0 {
                bail!("{unfinished} of {submitted} analyses did not complete");
            }
        }

        Command::Play { id } => play(dashboard, AnalysisId(id)).await?,

        Command::Rules { enable, disable } => {
            let RulesView { mut form, origin } = dashboard.load_rules().await;
            if enable.is_empty() && disable.is_empty() {
                if origin.is_fallback() {
                    println!("(defaults - backend unavailable)");
                }
                for toggle in form.toggles() {
                    println!("[{}] {}", if toggle.enabled { "x" } else { " " }, toggle.category);
                }
                return Ok(());
            }

            let mut toggles = Vec::new();
            for (names, enabled) in [(enable, true), (disable, false)] {
                for name in names {
                    let category = RuleCategory::parse(&name)
                        .with_context(|| format!("Unknown rule category: {name}"))?;
                    toggles.push(CategoryToggle { category, enabled });
                }
            }
            form.apply(toggles);
            dashboard.save_rules(&form).await?;
        }

        Command::Settings { default_priority, auto_delete_days } => {
            let SettingsView { mut settings, origin } = dashboard.load_settings().await;
            if default_priority.is_none() && auto_delete_days.is_none() {
                println!("source: {origin:?}");
                println!("{}", serde_json::to_string_pretty(&settings)?);
                return Ok(());
            }
            if let Some(priority) = default_priority {
                settings.default_priority = priority;
            }
            if let Some(days) = auto_delete_days {
                settings.auto_delete_days = days;
            }
            dashboard.save_settings(&settings).await?;
        }

        Command::Report { kind } => match kind {
            ReportKind::Summary { start_date, end_date } => {
                let filter = ReportFilter {
                    start_date,
                    end_date,
                    ..ReportFilter::default()
                };
                let reports = dashboard.load_reports(&filter).await;
                println!("{}", serde_json::to_string_pretty(&reports.summary)?);
            }
            ReportKind::Trends => {
                let reports = dashboard.load_reports(&ReportFilter::default()).await;
                let trends = reports.trends;
                for (i, label) in trends.labels.iter().enumerate() {
                    println!(
                        "{label}  analyses {:>4}  avg score {:>5.2}  issues {:>4}",
                        trends.analysis_counts.get(i).copied().unwrap_or(0),
                        trends.average_scores.get(i).copied().unwrap_or(0.0),
                        trends.issue_counts.get(i).copied().unwrap_or(0),
                    );
                }
            }
            ReportKind::Export { report_type, format } => {
                let response = dashboard
                    .export_report(&ExportRequest {
                        report_type,
                        format,
                        ..ExportRequest::default()
                    })
                    .await?;
                println!("{}", response.download_url.unwrap_or_default());
            }
        },

        Command::Lyrics { id, set } => match set {
            Some(text) => dashboard.update_lyrics(AnalysisId(id), &text).await?,
            None => {
                let lyrics = dashboard.lyrics(AnalysisId(id)).await?;
                println!("{}", lyrics.lyrics);
            }
        },
    }
    Ok(())
}

/// Play until the session ends, fails or Ctrl+C
async fn play(dashboard: &DashboardController, id: AnalysisId) -> Result<()> {
    let mut rx = dashboard.events().subscribe();
    dashboard.play(id);

    loop {
        let event = tokio::select! {
            event = rx.recv() => event,
            _ = tokio::signal::ctrl_c() => {
                dashboard.stop_playback();
                return Ok(());
            }
        };
        match event {
            Ok(DashEvent::PlaybackProgress { position_seconds, duration_seconds, .. }) => {
                eprint!(
                    "\r{} / {}",
                    format_clock(position_seconds),
                    format_clock(duration_seconds)
                );
            }
            Ok(DashEvent::PlaybackStateChanged { new_state, .. }) => {
                debug!(%new_state, "Playback state");
                if new_state == PlaybackState::Stopped {
                    eprintln!();
                    return match dashboard.player().last_failure() {
                        Some(kind) => Err(mpol_dash::Error::Playback(kind).into()),
                        None => Ok(()),
                    };
                }
            }
            Ok(_) | Err(RecvError::Lagged(_)) => {}
            Err(RecvError::Closed) => return Ok(()),
        }
    }
}

async fn print_notifications(mut rx: tokio::sync::broadcast::Receiver<DashEvent>) {
    loop {
        match rx.recv().await {
            Ok(DashEvent::NotificationShown { level, message, .. }) => {
                let tag = match level {
                    NotificationLevel::Info => "info",
                    NotificationLevel::Success => "ok",
                    NotificationLevel::Warning => "warning",
                    NotificationLevel::Error => "error",
                };
                eprintln!("[{tag}] {message}");
            }
            Ok(_) | Err(RecvError::Lagged(_)) => {}
            Err(RecvError::Closed) => break,
        }
    }
}

fn name_of(names: &std::collections::HashMap<uuid::Uuid, String>, id: &uuid::Uuid) -> String {
    names.get(id).cloned().unwrap_or_else(|| id.to_string())
}

fn print_stats(stats: &StatsView) {
    if let Some(banner) = stats.banner {
        println!("{banner}");
    }
    if stats.empty {
        println!("No analyses yet. Upload an audio file to get started.");
        return;
    }
    println!("Total analyses:   {}", stats.total_analyses);
    println!("Recent analyses:  {}", stats.recent_analyses);
    println!(
        "Compliance:       copyright {:.1}%  bias {:.1}%  content {:.1}%",
        stats.scores.copyright, stats.scores.bias, stats.scores.content_filter
    );
}

fn print_list(view: &ListView) {
    if let Some(banner) = view.banner {
        println!("{banner}");
    }
    println!("{}", view.count_label);
    match &view.body {
        ListBody::Empty { message } => println!("{message}"),
        ListBody::Rows { rows } => {
            for row in rows {
                println!(
                    "{}{:>6}  {:<40} {:>5}  {:>2} issues  {}",
                    if row.now_playing { "> " } else { "  " },
                    row.id,
                    row.filename,
                    row.score_label,
                    row.issues_count,
                    row.created_at
                );
            }
        }
    }
    if let Some(p) = view.pagination {
        println!("page {} of {}", p.page, p.total_pages);
    }
}
