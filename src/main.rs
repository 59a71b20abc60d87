use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use ans_transfer::config::{Cli, Operation, TransferConfig};
use ans_transfer::{AnsValidator, ChangeReporter, ContentTransformer, HttpArcClient, SchemaValidator, TransferPipeline};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Tokens may come from a .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_json);

    let config = TransferConfig::from_cli(&cli).context("invalid configuration")?;

    let mut validator = AnsValidator::new();
    if let Some(path) = &config.ans_schema {
        let schema = SchemaValidator::from_file(path)
            .with_context(|| format!("failed to load ANS schema from {}", path.display()))?;
        validator = validator.with_schema(schema);
    }

    let client = HttpArcClient::new().with_source_website(config.session.source_website.clone());
    let transformer = ContentTransformer::with_default_rules().with_validator(validator);
    let mut pipeline = TransferPipeline::new(client, config.session.clone()).with_transformer(transformer);
    let reporter = ChangeReporter::new().with_format(config.report_format);

    tracing::info!(
        source_org = %config.session.source_org,
        target_org = %config.session.target_org,
        target_environment = ?config.session.target_environment(),
        operation = ?config.operation,
        "starting transfer"
    );

    match &config.operation {
        Operation::One { content_type, id } => {
            let (document, report) = pipeline
                .transform_one(*content_type, id)
                .await
                .with_context(|| format!("failed to transfer {content_type} {id}"))?;
            println!("{}", reporter.format_report(&report)?);
            if config.session.dry_run {
                println!("\n=== Transformed Document ===");
                println!("{}", serde_json::to_string_pretty(&document)?);
            }
        }
        Operation::All { content_type } => {
            let report = pipeline
                .transform_all(*content_type)
                .await
                .with_context(|| format!("bulk transfer of {content_type} stopped"))?;
            println!("{}", reporter.format_bulk_report(&report)?);
            if report.counts.failed > 0 {
                anyhow::bail!("{} of {} items failed", report.counts.failed, report.counts.total);
            }
        }
    }

    Ok(())
}

/// Logs go to stderr so reports on stdout stay machine-readable.
fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
