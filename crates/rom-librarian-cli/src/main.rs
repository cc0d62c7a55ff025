mod commands;
mod logging;
mod progress;

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::process;

use anyhow::{anyhow, Context};
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands, CompareArgs, ScanArgs};
use dotenv::dotenv;
use progress::CliReporter;
use rom_librarian_core::{
    execute_deletions, report, AppConfig, CancelToken, CompareMode, CompareOptions,
    DeletionPlan, ScanEngine, ScanRequest, ScanScope, SelectionParams, Strategy,
};
use tracing::{error, info, warn};

fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let _guard = logging::init_logger();

    let config = match rom_librarian_core::config::load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let args = Cli::parse();

    let outcome = match args.command {
        Some(Commands::Scan(scan)) => run_scan(&config, scan),
        Some(Commands::Compare(compare)) => run_compare(&config, compare),
        Some(Commands::Identify { path }) => {
            let mut engine = ScanEngine::new(config);
            let identity = engine
                .compute_identity(&path)
                .with_context(|| format!("hashing {}", path.display()))?;
            println!("{}  {}", "CRC32".bold(), identity.crc32_hex());
            println!("{}    {}", "MD5".bold(), identity.md5_hex());
            println!("{}   {}", "SHA1".bold(), identity.sha1_hex());
            engine.flush_cache().context("saving identity cache")
        }
        Some(Commands::CacheStats) => {
            let engine = ScanEngine::new(config);
            let cache = engine.cache();
            match cache.path() {
                Some(path) => info!("Identity cache: {}", path.display()),
                None => info!("Identity cache is not persisted"),
            }
            info!("{} entries", format!("{}", cache.len()).cyan());
            Ok(())
        }
        Some(Commands::ClearCache) => {
            match prompt_confirm(
                "Are you SURE you want to delete every cached identity?",
                Some(false),
            ) {
                Ok(true) => {
                    let mut engine = ScanEngine::new(config);
                    let removed = engine.cache().len();
                    engine.cache_mut().clear();
                    engine.flush_cache().context("saving identity cache")?;
                    println!("Removed {} cache entries", removed);
                    Ok(())
                }
                _ => process::exit(0),
            }
        }
        Some(Commands::PruneCache) => {
            let mut engine = ScanEngine::new(config);
            let pruned = engine.cache_mut().prune_missing();
            engine.flush_cache().context("saving identity cache")?;
            info!(
                "Pruned {} stale entries, {} remain",
                format!("{}", pruned).yellow(),
                engine.cache().len()
            );
            Ok(())
        }
        Some(Commands::PrintConfig) => {
            let rendered = toml::to_string_pretty(&config).context("rendering configuration")?;
            println!("{}", rendered);
            Ok(())
        }
        None => {
            let _ = Cli::command().print_long_help();
            Ok(())
        }
    };

    if let Err(err) = outcome {
        error!("Error: {:#}", err);
        process::exit(1);
    }

    Ok(())
}

fn scope_for(config: &AppConfig, args: &ScanArgs) -> anyhow::Result<ScanScope> {
    if args.library {
        if config.library_roots.is_empty() {
            return Err(anyhow!("no library_roots configured"));
        }
        return Ok(ScanScope::Library(
            config.library_roots.iter().map(Into::into).collect(),
        ));
    }
    let path = args
        .path
        .clone()
        .ok_or_else(|| anyhow!("a folder is required unless --library is given"))?;
    if args.folder_only {
        Ok(ScanScope::FolderOnly(path))
    } else {
        Ok(ScanScope::Recursive(path))
    }
}

fn run_scan(config: &AppConfig, args: ScanArgs) -> anyhow::Result<()> {
    let strategy: Strategy = args.strategy.parse().map_err(|e: String| anyhow!(e))?;
    let scope = scope_for(config, &args)?;
    let request = ScanRequest::new(scope, strategy).with_params(SelectionParams {
        region_order: config.region_order.clone(),
    });

    let mut engine = ScanEngine::new(config.clone());
    let reporter = CliReporter::new();
    let result = engine
        .scan_for_duplicates(&request, &reporter, &CancelToken::new())
        .context("scan failed")?;

    println!();
    info!(
        "Enumerate: {}, Hash: {}",
        format!("{:.2}s", result.enumerate_duration.as_secs_f64()).green(),
        format!("{:.2}s", result.hash_duration.as_secs_f64()).green(),
    );
    info!(
        "{} files scanned, {} hashed, {} cache hits",
        result.files_scanned, result.files_hashed, result.cache_hits,
    );
    info!(
        "{} duplicate groups, {} files with duplicates, {} bytes wasted",
        format!("{}", result.groups.len()).red(),
        format!("{}", result.duplicate_files()).red(),
        format!("{}", result.wasted_bytes).red(),
    );
    if result.groups_requiring_input() > 0 {
        info!(
            "{} groups have no keeper (strategy '{}')",
            format!("{}", result.groups_requiring_input()).yellow(),
            strategy,
        );
    }
    for err in &result.errors {
        warn!("{}", err);
    }
    if let Some(warning) = &result.cache_warning {
        warn!("{}", warning.yellow());
    }

    for (index, group) in result.groups.iter().enumerate() {
        let title = group
            .canonical_name
            .clone()
            .unwrap_or_else(|| group.identity.crc32_hex());
        println!("{} {}", format!("[{}]", index + 1).cyan(), title.bold());
        for member in &group.members {
            let marker = if member.keep { "keep".green() } else { "    ".normal() };
            println!("    {} {}", marker, member.record.path.display());
        }
    }

    if let Some(path) = &args.export {
        let rows = report::export_duplicate_report(&result.groups, path)
            .with_context(|| format!("writing {}", path.display()))?;
        info!("Wrote {} rows to {}", rows, path.display());
    }

    if args.delete {
        let assume_yes = args.yes;
        let outcome = execute_deletions(&result.groups, |plan: &DeletionPlan| {
            if assume_yes {
                return true;
            }
            let prompt = format!(
                "Delete {} files ({} bytes)?",
                plan.len(),
                plan.total_bytes()
            );
            prompt_confirm(&prompt, Some(false)).unwrap_or(false)
        });
        if outcome.confirmed {
            info!(
                "Deleted {} files, {} already gone, {} failed",
                format!("{}", outcome.deleted.len()).red(),
                outcome.missing.len(),
                outcome.errors.len(),
            );
        }
        if outcome.undecided_groups > 0 {
            info!("{} groups were left untouched without a keeper", outcome.undecided_groups);
        }
        for err in &outcome.errors {
            warn!("{}", err);
        }
    }

    Ok(())
}

fn run_compare(config: &AppConfig, args: CompareArgs) -> anyhow::Result<()> {
    let options = CompareOptions {
        mode: if args.deep {
            CompareMode::Deep
        } else {
            CompareMode::Quick
        },
        normalization: config.name_normalization(),
        verify: args.verify,
    };

    let mut engine = ScanEngine::new(config.clone());
    let reporter = CliReporter::new();
    let result = engine
        .compare_collections(&args.a, &args.b, &options, &reporter, &CancelToken::new())
        .context("compare failed")?;

    println!();
    for record in &result.only_in_a {
        println!("{} {}", "A only".yellow(), record.path.display());
    }
    for record in &result.only_in_b {
        println!("{} {}", "B only".yellow(), record.path.display());
    }
    for entry in &result.mismatched {
        println!("{} {}", "differs".red(), entry.key);
    }
    info!(
        "{} only in A, {} only in B, {} in both, {} mismatched",
        format!("{}", result.only_in_a.len()).yellow(),
        format!("{}", result.only_in_b.len()).yellow(),
        format!("{}", result.in_both.len()).green(),
        format!("{}", result.mismatched.len()).red(),
    );
    for err in &result.errors {
        warn!("{}", err);
    }

    if let Some(path) = &args.export {
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        let rows = report::write_comparison_report(&result, BufWriter::new(file))
            .with_context(|| format!("writing {}", path.display()))?;
        info!("Wrote {} rows to {}", rows, path.display());
    }

    Ok(())
}

fn prompt_confirm(prompt: &str, default: Option<bool>) -> io::Result<bool> {
    let mut input = String::new();

    loop {
        input.clear();

        match default {
            Some(true) => print!("{} (Y/n): ", prompt),
            Some(false) | None => print!("{} (y/N): ", prompt),
        }
        io::stdout().flush()?;

        io::stdin().read_line(&mut input)?;

        match input.trim().to_uppercase().as_str() {
            "Y" => return Ok(true),
            "N" => return Ok(false),
            "" => match default {
                Some(default) => return Ok(default),
                None => continue,
            },
            _ => continue,
        }
    }
}
