//! Command-line surface: `run`, `analyze`, `stats`.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use page_analyzer::{capture, PageAnalyzer};
use telemetry::EventSink;

use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::session::Session;

#[derive(Parser)]
#[command(
    name = "applyflow",
    version,
    about = "Adaptive ATS application form filling",
    long_about = None
)]
pub struct Cli {
    /// Optional settings file (YAML).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the full application workflow against a job URL.
    Run {
        url: String,
        /// Candidate profile YAML.
        #[arg(long)]
        profile: Option<PathBuf>,
        /// Actually click the submit button at the end.
        #[arg(long)]
        submit: bool,
        /// Run the browser with a visible window.
        #[arg(long)]
        headed: bool,
    },
    /// Analyze a page and print the classification without filling.
    Analyze {
        url: String,
        /// Save a screenshot of the analyzed page.
        #[arg(long)]
        screenshot: bool,
    },
    /// Show error statistics aggregated from past session logs.
    Stats,
}

pub async fn execute(cli: Cli) -> anyhow::Result<()> {
    let mut settings = match &cli.config {
        Some(path) => Settings::load(path).context("loading settings")?,
        None => Settings::default(),
    };
    settings = settings.with_env();

    match cli.command {
        Command::Run {
            url,
            profile,
            submit,
            headed,
        } => {
            if let Some(profile) = profile {
                settings.paths.profile = profile;
            }
            settings.workflow.submit = submit;
            if headed {
                settings.browser.headless = false;
            }
            run_workflow(settings, &url).await
        }
        Command::Analyze { url, screenshot } => analyze_page(settings, &url, screenshot).await,
        Command::Stats => show_stats(settings),
    }
}

async fn run_workflow(settings: Settings, url: &str) -> anyhow::Result<()> {
    let session = Session::bootstrap(settings)?;
    let driver = session.launch_driver().await?;

    let report = Orchestrator::new(&session, &driver).run(url).await;
    driver.shutdown().await;

    println!("{}", serde_json::to_string_pretty(&report)?);
    println!();
    println!(
        "{}: {}/{} fields filled ({:.0}%), state {:?}, artifacts in {}",
        if report.success { "SUCCESS" } else { "FAILED" },
        report.filled_fields,
        report.total_fields,
        report.success_rate * 100.0,
        report.final_state,
        report.artifacts_dir.display(),
    );
    if report.submit_found && !report.submit_clicked {
        println!("submit button found but not clicked (pass --submit to enable)");
    }
    Ok(())
}

async fn analyze_page(settings: Settings, url: &str, screenshot: bool) -> anyhow::Result<()> {
    let session = Session::bootstrap(settings)?;
    let driver = session.launch_driver().await?;

    driver.goto(url).await?;
    let page = capture(&driver).await;
    let analyzer = PageAnalyzer::new(session.provider.as_ref());
    let analysis = analyzer.analyze(&page).await;

    println!("page:       {}", analysis.url);
    println!("title:      {}", analysis.title);
    println!("kind:       {:?} ({:.2})", analysis.page_kind, analysis.confidence);
    println!("forms:      {}", analysis.form_count);
    println!("apply btn:  {}", analysis.has_apply_button);
    println!("reasoning:  {}", analysis.reasoning);
    for (i, cta) in analysis.cta_candidates.iter().enumerate() {
        println!(
            "cta[{}]:     '{}' {} ({:.2}, priority {})",
            i, cta.text, cta.selector, cta.confidence, cta.priority_score
        );
    }
    println!(
        "action:     {:?} ({:.2}) - {}",
        analysis.recommended_action.kind,
        analysis.recommended_action.confidence,
        analysis.recommended_action.reasoning
    );

    if screenshot {
        let path = session.sink.screenshot_path("analyze");
        driver.screenshot(&path).await?;
        println!("screenshot: {}", path.display());
    }
    driver.shutdown().await;
    Ok(())
}

fn show_stats(settings: Settings) -> anyhow::Result<()> {
    let runs_dir = &settings.paths.runs_dir;
    let mut total = 0usize;
    let mut by_kind = std::collections::BTreeMap::<String, usize>::new();

    if runs_dir.exists() {
        for entry in std::fs::read_dir(runs_dir)? {
            let path = entry?.path().join("errors.jsonl");
            let stats = EventSink::statistics_for(&path);
            total += stats.total_errors;
            for (kind, count) in stats.by_kind {
                *by_kind.entry(kind).or_insert(0) += count;
            }
        }
    }

    println!("total errors: {total}");
    for (kind, count) in by_kind {
        println!("  {kind}: {count}");
    }
    if total == 0 {
        println!("no errors recorded");
    }
    Ok(())
}
