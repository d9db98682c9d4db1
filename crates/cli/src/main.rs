mod cli;

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::Parser;
use engine::{
    Command, Engine, EngineBridge, EngineConfig, Event, Probe, ProjectStore, normalize_pcm_peaks,
    parse_command_with,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cli::{Cli, CliCommand};

fn main() -> Result<ExitCode> {
    init_tracing();
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        CliCommand::New { path, force } => new_project(&path, force),
        CliCommand::Check { project } => check_project(&project),
        CliCommand::Parse {
            probe,
            peaks,
            pcm,
            text,
        } => parse_text(&probe, peaks.as_deref(), pcm, &text.join(" "), &config),
        CliCommand::Run {
            project,
            script,
            save,
        } => run_script(project.as_deref(), &script, save.as_deref(), config),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(cli: &Cli) -> Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };
    if let Some(threshold) = cli.silence_threshold {
        config.silence_threshold = threshold;
    }
    if let Some(leave_ms) = cli.leave_ms {
        config.default_leave_ms = leave_ms;
    }
    if let Err(reason) = config.validate() {
        bail!("invalid engine config: {reason}");
    }
    Ok(config)
}

fn new_project(path: &Path, force: bool) -> Result<ExitCode> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    let mut store = ProjectStore::default();
    store.save_to_file(path)?;
    info!(path = %path.display(), "project created");
    Ok(ExitCode::SUCCESS)
}

fn check_project(path: &Path) -> Result<ExitCode> {
    let mut store = ProjectStore::default();
    let report = store.load_from_file(path)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    if report.is_clean() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(2))
    }
}

fn parse_text(
    probe_path: &Path,
    peaks_path: Option<&Path>,
    pcm: bool,
    text: &str,
    config: &EngineConfig,
) -> Result<ExitCode> {
    let probe: Probe = read_json(probe_path)?;
    let peaks: Vec<f32> = match (peaks_path, pcm) {
        (None, _) => Vec::new(),
        (Some(path), true) => normalize_pcm_peaks(&read_json::<Vec<i16>>(path)?),
        (Some(path), false) => read_json(path)?,
    };

    match parse_command_with(text, &probe, &peaks, config) {
        Some(ranges) => {
            println!("{}", serde_json::to_string(&ranges)?);
            Ok(ExitCode::SUCCESS)
        }
        None => {
            warn!(%text, "command not recognized");
            Ok(ExitCode::from(2))
        }
    }
}

fn run_script(
    project: Option<&Path>,
    script: &Path,
    save: Option<&Path>,
    config: EngineConfig,
) -> Result<ExitCode> {
    let raw = std::fs::read_to_string(script)
        .with_context(|| format!("read script {}", script.display()))?;
    let mut commands = Vec::new();
    if let Some(path) = project {
        commands.push(Command::Load {
            path: path.to_path_buf(),
        });
    }
    for (index, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let command: Command = serde_json::from_str(line)
            .with_context(|| format!("{}:{}: invalid command", script.display(), index + 1))?;
        commands.push(command);
    }
    if let Some(path) = save {
        commands.push(Command::Save {
            path: path.to_path_buf(),
        });
    }

    let bridge = EngineBridge::spawn(Engine::new(config));
    let mut rejected = 0usize;
    for command in commands {
        for event in bridge.dispatch(command)? {
            if matches!(event, Event::Rejected(_)) {
                rejected += 1;
            }
            println!("{}", serde_json::to_string(&event)?);
        }
    }
    let engine = bridge.shutdown()?;
    info!(
        clips = engine.store().project().clips.len(),
        accepted_cuts = engine.store().accepted_cuts().len(),
        rejected,
        "script finished"
    );

    Ok(if rejected == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))
}
