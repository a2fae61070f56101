//! `ica`: lists the sample incidents, prints one as JSON, or walks a sample through the whole
//! capture workflow against the in-memory backend.

use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;

use ica_core::sample::{sample_incident, sample_incidents};
use ica_core::{
    CaptureWorkflow, CoreConfig, ExportSection, MemoryBackend, NonEmptyText, Phase, Role, Session,
    ValidationRules,
};

#[derive(Parser)]
#[command(name = "ica")]
#[command(about = "Incident capture workflow CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the sample incidents
    Samples,
    /// Print one sample incident as JSON
    Sample {
        /// Scenario number (1-based)
        #[arg(long, default_value_t = 1)]
        scenario: usize,
        /// Reporter name to put in the metadata
        #[arg(long, default_value = "Sample Reporter")]
        reporter: String,
    },
    /// Run the whole capture workflow for a sample incident against the in-memory backend
    Walkthrough {
        /// Scenario number (1-based)
        #[arg(long, default_value_t = 1)]
        scenario: usize,
        /// Reporter name for the session
        #[arg(long, default_value = "Sample Reporter")]
        reporter: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Samples) => {
            for (idx, sample) in sample_incidents().iter().enumerate() {
                println!(
                    "{}: {} at {} ({} hours ago)",
                    idx + 1,
                    sample.participant_name,
                    sample.location,
                    sample.hours_ago
                );
            }
        }
        Some(Commands::Sample { scenario, reporter }) => {
            let sample = sample_incident(scenario)?;
            let metadata = sample.metadata(NonEmptyText::new(&reporter)?, chrono::Utc::now())?;
            let out = serde_json::json!({
                "scenario": scenario,
                "metadata": metadata,
                "narrative": sample.phases(),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Some(Commands::Walkthrough { scenario, reporter }) => {
            walkthrough(scenario, reporter).await?;
        }
        None => {
            println!("Use 'ica --help' for commands");
        }
    }

    Ok(())
}

async fn walkthrough(scenario: usize, reporter: String) -> Result<(), Box<dyn std::error::Error>> {
    let cfg = Arc::new(CoreConfig::new(
        Duration::from_millis(200),
        Duration::from_millis(200),
        ValidationRules::default(),
    )?);
    let backend = Arc::new(MemoryBackend::new(cfg.clone()));
    let session = Session::resolve(NonEmptyText::new(&reporter)?, Role::Developer);
    let mut capture = CaptureWorkflow::new(cfg, backend, session);

    let id = capture.apply_sample(scenario).await?;
    println!("Created incident {id}");
    println!("-> {}", capture.advance().await?);

    for phase in Phase::ALL {
        let generated = capture.generate_questions(phase, false).await?;
        println!(
            "{}: {} questions{}",
            phase.label(),
            generated.questions.len(),
            if generated.cached { " (cached)" } else { "" }
        );
        let filled = capture.fill_mock_answers(phase)?;
        println!("   filled {filled} mock answers");
        println!("-> {}", capture.advance().await?);
    }

    capture.generate_enhancement().await?;
    println!("Enhanced narrative generated");
    println!("-> {}", capture.advance().await?);

    let report = capture.completion().await?;
    println!("Checklist complete: {}", report.all_complete);
    for missing in &report.missing_requirements {
        println!("   missing: {missing}");
    }

    let (artifact, download) = capture.export_pdf(&ExportSection::ALL).await?;
    println!("Exported {} ({})", artifact.filename, download.url);

    let receipt = capture.submit().await?;
    println!(
        "Submitted for analysis: handoff {} at {}",
        receipt.handoff_id,
        receipt.submitted_at.to_rfc3339()
    );
    Ok(())
}
