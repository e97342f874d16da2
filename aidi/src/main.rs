//! `aidi`: multi-agent data model translation.
//!
//! Reads `aidi.toml`, renders the task prompt from the data folder, and lets
//! the worker roster write, run, and validate a translation program in the
//! code folder.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use aidi::agents::{StdinInput, Team, assemble};
use aidi::context::RunContext;
use aidi::exit_codes;
use aidi::io::cache::{CACHE_SEED, CachedCompletion, ResponseCache};
use aidi::io::code_exec::LocalCodeExecutor;
use aidi::io::completion::{Completion, OpenAiClient};
use aidi::io::config::{AppConfig, DEFAULT_CONFIG_PATH, load_config};
use aidi::io::program::{rename_latest_program, run_latest_program, save_generated_data};
use aidi::io::prompt::PromptSet;
use aidi::io::transcript::{RunMeta, duration_ms, write_transcript};
use aidi::io::translation_data::TranslationData;
use aidi::orchestrator::{Orchestrator, RunOutcome};
use aidi::validate::{SchemaValidationTool, ValidationMethod, validate_target_data};
use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use tracing::warn;

#[derive(Parser)]
#[command(
    name = "aidi",
    version,
    about = "Multi-agent translation of source data models into target data models"
)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the conversation and save the generated target data.
    Run {
        /// Use this file as the task prompt instead of rendering the template.
        #[arg(long)]
        task_file: Option<PathBuf>,
    },
    /// Run the latest program and compare its output with the reference data.
    Validate {
        #[arg(long, value_enum, default_value_t = ValidationMethod::Structural)]
        method: ValidationMethod,
    },
    /// Run the latest program and write `generated_target_data.json`.
    Generate,
    /// Rename the latest program to `program_generated_by_AI.py`.
    Rename,
    /// Print the rendered task prompt.
    Prompt,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::ERROR);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    aidi::logging::init(&config.logging)?;
    match cli.command {
        Command::Run { task_file } => cmd_run(&config, task_file.as_deref()),
        Command::Validate { method } => cmd_validate(&config, method),
        Command::Generate => cmd_generate(&config),
        Command::Rename => cmd_rename(&config),
        Command::Prompt => cmd_prompt(&config),
    }
}

fn render_prompt(config: &AppConfig, data: &TranslationData) -> Result<String> {
    PromptSet::from_config(&config.prompt).render_task(data, &config.prompt.prompt_components)
}

fn cmd_run(config: &AppConfig, task_file: Option<&Path>) -> Result<i32> {
    config.ensure_code_folder()?;
    let service = config.resolve_service()?;
    let data = TranslationData::load(&config.data.data_folder);
    let prompts = PromptSet::from_config(&config.prompt);
    let task = match task_file {
        Some(path) => fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?,
        None => prompts.render_task(&data, &config.prompt.prompt_components)?,
    };

    let client = OpenAiClient::new(&service)?;
    let cache = if config.group_chat.cache_chat {
        ResponseCache::open(&config.cache_dir(), CACHE_SEED)?
    } else {
        None
    };
    let cached;
    let completion: &dyn Completion = match &cache {
        Some(cache) => {
            cached = CachedCompletion::new(&client, cache, service.model.as_str());
            &cached
        }
        None => &client,
    };

    let executor = LocalCodeExecutor::new(
        &config.code.code_folder,
        config.code.python.as_str(),
        config.code.output_limit_bytes,
    );
    let tool = SchemaValidationTool::new(&config.code, &data.target_schema);
    let profile = config.profile();
    let workers = assemble(
        profile,
        Team {
            completion,
            executor: &executor,
            validation_tool: &tool,
            human: &StdinInput,
            prompts: &prompts,
            structured_mode: service.structured_mode,
            admin_input: config.group_chat.admin_input,
            code_timeout: Duration::from_secs(config.code.timeout_secs),
            send_introductions: config.group_chat.send_introductions,
        },
    );
    let orchestrator = Orchestrator::new(
        profile,
        config.group_chat.max_round,
        config.group_chat.fallback,
        workers,
    )?;

    let ctx = RunContext::generate();
    let started_at = Local::now();
    let start = Instant::now();
    let outcome = orchestrator.run(&task, &ctx)?;
    let meta = RunMeta {
        run_id: ctx.run_id.clone(),
        profile: profile.as_str().to_string(),
        model: Some(service.model.clone()),
        stop: outcome.stop,
        verdict: outcome.verdict,
        rounds: outcome.session.round(),
        started_at: Some(started_at.to_rfc3339()),
        ended_at: Some(Local::now().to_rfc3339()),
        duration_ms: Some(duration_ms(start.elapsed())),
    };
    let paths = write_transcript(&config.state_dir(), &meta, outcome.session.messages())?;

    println!("run_id: {}", ctx.run_id);
    println!("stop: {}", outcome.stop.as_str());
    println!(
        "verdict: {}",
        outcome.verdict.map_or("none", |verdict| verdict.as_str())
    );
    println!("transcript: {}", paths.messages_path.display());

    save_after_run(config, &outcome);
    Ok(if outcome.is_valid() {
        exit_codes::OK
    } else {
        exit_codes::NOT_CONVERGED
    })
}

/// Best effort: a run that never produced a working program has nothing to save.
fn save_after_run(config: &AppConfig, outcome: &RunOutcome) {
    match generate(config) {
        Ok(path) => println!("generated: {}", path.display()),
        Err(err) => warn!(err = %format!("{err:#}"), valid = outcome.is_valid(), "no generated data saved"),
    }
}

fn generate(config: &AppConfig) -> Result<PathBuf> {
    let data = run_latest_program(
        &config.code.code_folder,
        &config.code.python,
        Duration::from_secs(config.code.timeout_secs),
        config.code.output_limit_bytes,
    )?;
    save_generated_data(&config.code.code_folder, &data)
}

fn cmd_validate(config: &AppConfig, method: ValidationMethod) -> Result<i32> {
    let report = validate_target_data(config, method)?;
    for line in report.lines() {
        println!("{line}");
    }
    Ok(if report.is_valid() {
        exit_codes::OK
    } else {
        exit_codes::INVALID
    })
}

fn cmd_generate(config: &AppConfig) -> Result<i32> {
    let path = generate(config)?;
    println!("{}", path.display());
    Ok(exit_codes::OK)
}

fn cmd_rename(config: &AppConfig) -> Result<i32> {
    let path = rename_latest_program(&config.code.code_folder)?;
    println!("{}", path.display());
    Ok(exit_codes::OK)
}

fn cmd_prompt(config: &AppConfig) -> Result<i32> {
    let data = TranslationData::load(&config.data.data_folder);
    println!("{}", render_prompt(config, &data)?);
    Ok(exit_codes::OK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_run_with_task_file() {
        let cli = Cli::parse_from(["aidi", "run", "--task-file", "task.txt"]);
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));
        assert!(matches!(cli.command, Command::Run { task_file: Some(ref path) } if path == Path::new("task.txt")));
    }

    #[test]
    fn parse_validate_method() {
        let cli = Cli::parse_from(["aidi", "validate", "--method", "schema", "--config", "alt.toml"]);
        assert_eq!(cli.config, PathBuf::from("alt.toml"));
        assert!(matches!(
            cli.command,
            Command::Validate {
                method: ValidationMethod::Schema
            }
        ));
    }

    #[test]
    fn validate_defaults_to_structural() {
        let cli = Cli::parse_from(["aidi", "validate"]);
        assert!(matches!(
            cli.command,
            Command::Validate {
                method: ValidationMethod::Structural
            }
        ));
    }
}
