use clap::Parser;
use ollama_export::adapters::{BarProgress, LogProgress, OllamaApiLister, OllamaCliLister};
use ollama_export::domain::model::ModelOutcome;
use ollama_export::domain::ports::{ModelLister, ProgressSink};
use ollama_export::utils::error::ErrorSeverity;
use ollama_export::utils::{logger, validation::Validate};
use ollama_export::{CliConfig, ExportError, ExportOrchestrator, ListingSource, RunSummary};
use std::io::IsTerminal;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    if cli.json_logs {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }
    tracing::info!("Starting ollama-export");

    let (config, selectors) = match cli.resolve() {
        Ok(resolved) => resolved,
        Err(e) => exit_with(&e),
    };
    if let Err(e) = config.validate() {
        exit_with(&e);
    }
    tracing::debug!("Export config: {:?}", config);
    tracing::debug!("OLLAMA_BASE_DIR: {}", config.base_dir.display());
    tracing::debug!("OUTPUT_DIR: {}", config.output_dir.display());

    let lister: Box<dyn ModelLister> = match config.listing.source {
        ListingSource::Cli => Box::new(OllamaCliLister::new(config.listing.program.clone())),
        ListingSource::Api => Box::new(OllamaApiLister::new(config.listing.host.clone())),
    };
    let progress: Box<dyn ProgressSink> =
        if cli.verbose || cli.json_logs || !std::io::stderr().is_terminal() {
            Box::new(LogProgress)
        } else {
            Box::new(BarProgress::new())
        };

    let orchestrator = ExportOrchestrator::new(config, lister, progress);
    let summary = match orchestrator.run(selectors).await {
        Ok(summary) => summary,
        Err(e) => exit_with(&e),
    };

    print_summary(&summary);

    let exit_code = summary.exit_code();
    if exit_code > 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}

fn exit_with(e: &ExportError) -> ! {
    tracing::error!(
        "❌ Export failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

    let exit_code = match e.severity() {
        ErrorSeverity::Low | ErrorSeverity::High => 1,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code);
}

fn print_summary(summary: &RunSummary) {
    println!("===================================================");
    for outcome in &summary.outcomes {
        match outcome {
            ModelOutcome::Exported(result) if result.is_exported() => println!(
                "✅ {}: {} blobs copied, {} failed ({} bytes)",
                result.model_ref, result.copied_count, result.failed_count, result.bytes_copied
            ),
            ModelOutcome::Exported(result) => println!(
                "❌ {}: manifest copied but no blobs ({} failed)",
                result.model_ref, result.failed_count
            ),
            ModelOutcome::Planned {
                model_ref,
                blobs,
                missing,
            } => println!("🔍 {}: {} blobs planned, {} missing", model_ref, blobs, missing),
            ModelOutcome::Failed {
                model_ref,
                stage,
                reason,
            } => println!("❌ {}: failed at {} ({})", model_ref, stage, reason),
        }
    }

    if summary.exported_results().next().is_some() {
        println!(
            "📊 {}/{} models exported, {} blobs copied, {} failed",
            summary.succeeded(),
            summary.outcomes.len(),
            summary.total_copied(),
            summary.total_failed()
        );
    }

    if summary.blob_tree_empty {
        println!("⚠️ WARNING: no blobs were exported");
    }

    for archive in &summary.archives {
        println!("📁 Export completed: {}", archive.display());
    }

    if let Some(archive) = summary.archives.first() {
        let name = archive
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        println!("To import on the destination system:");
        println!("1. Extract into the Ollama home: tar -xzvf {} -C ~/.ollama", name);
        println!("   (the archive holds a 'models/' directory with manifests and blobs)");
        println!("2. For a container: docker cp ~/.ollama/models/. [ollama-container]:/root/.ollama/models/");
        println!("3. Check the models are listed: ollama ls");
    }
    println!("===================================================");
}
