use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use regex::Regex;
use thiserror::Error;

use crate::content_type::ContentType;
use crate::report::ReportFormat;
use crate::session::TransformSession;

/// Organization ids: `org` for production, `sandbox.org` for its sandbox.
const ORG_ID_PATTERN: &str = r"^(sandbox\.)?[A-Za-z0-9][A-Za-z0-9_-]*$";

#[derive(Parser, Debug)]
#[command(name = "ans-transfer")]
#[command(about = "Move ANS content between publishing organizations, or from production into a sandbox")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub transfer: TransferArgs,

    /// Report rendering
    #[arg(long, value_enum, default_value_t = OutputFormat::Console, global = true)]
    pub report_format: OutputFormat,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Transform a single object
    One {
        /// Content type (story, video, gallery, image, author, redirect, lightbox, collection)
        #[arg(long = "type", value_name = "TYPE")]
        content_type: String,

        /// Source object id (the redirect path for redirects)
        #[arg(long)]
        id: String,
    },
    /// Transform every object of a bulk type (author, redirect)
    All {
        #[arg(long = "type", value_name = "TYPE")]
        content_type: String,
    },
}

#[derive(Args, Debug, Clone)]
pub struct TransferArgs {
    /// Source organization id
    #[arg(long, global = true, default_value = "")]
    pub from_org: String,

    /// Target organization id
    #[arg(long, global = true)]
    pub to_org: Option<String>,

    /// Target the sandbox of the source organization
    #[arg(long, global = true)]
    pub to_sandbox: bool,

    /// Source organization bearer token
    #[arg(long, env = "ANS_FROM_TOKEN", hide_env_values = true, global = true)]
    pub from_token: Option<String>,

    /// Target organization bearer token
    #[arg(long, env = "ANS_TO_TOKEN", hide_env_values = true, global = true)]
    pub to_token: Option<String>,

    /// Source website, for the redirect scan and for copying story redirects
    #[arg(long, global = true)]
    pub source_website: Option<String>,

    /// Target website id
    #[arg(long, global = true)]
    pub to_website: Option<String>,

    /// Target section path (e.g. /news); replaces every source section
    #[arg(long, global = true)]
    pub to_section: Option<String>,

    /// Transform and report without creating or submitting anything
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Stop a bulk run after this many items
    #[arg(long, value_name = "N", global = true)]
    pub max_iterations: Option<usize>,

    /// URL fragment marking video redirects, e.g. /video
    #[arg(long, global = true)]
    pub video_url_marker: Option<String>,

    /// URL fragment marking gallery redirects, e.g. /gallery
    #[arg(long, global = true)]
    pub gallery_url_marker: Option<String>,

    /// Patch a moved image into galleries already moved in this run
    #[arg(long, global = true)]
    pub patch_dependent_galleries: bool,

    /// JSON schema the transformed document is checked against
    #[arg(long, value_name = "FILE", global = true)]
    pub ans_schema: Option<PathBuf>,

    /// Fail instead of warning when validation fails
    #[arg(long, global = true)]
    pub strict: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Console,
    Json,
    Yaml,
}

impl From<OutputFormat> for ReportFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Console => ReportFormat::Console,
            OutputFormat::Json => ReportFormat::Json,
            OutputFormat::Yaml => ReportFormat::Yaml,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("--from-org is required")]
    MissingSourceOrg,

    #[error("give exactly one of --to-org or --to-sandbox")]
    AmbiguousTarget,

    #[error("invalid organization id: {0}")]
    InvalidOrg(String),

    #[error("{0} token missing: pass --{0}-token or set ANS_{1}_TOKEN")]
    MissingToken(&'static str, &'static str),

    #[error("{0} needs a target website (--to-website)")]
    MissingWebsite(ContentType),

    #[error("redirects need --source-website to be looked up in the source org")]
    MissingSourceWebsite,

    #[error("unknown content type: {0}")]
    InvalidContentType(String),

    #[error("{0} has no bulk variant; use `one`")]
    NotBulk(ContentType),

    #[error("--max-iterations must be at least 1")]
    InvalidLimit,

    #[error("invalid pattern: {0}")]
    Pattern(String),
}

/// What to run
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    One { content_type: ContentType, id: String },
    All { content_type: ContentType },
}

impl Operation {
    pub fn content_type(&self) -> ContentType {
        match self {
            Operation::One { content_type, .. } | Operation::All { content_type } => *content_type,
        }
    }
}

/// Validated driver configuration
#[derive(Debug, Clone)]
pub struct TransferConfig {
    pub session: TransformSession,
    pub operation: Operation,
    pub report_format: ReportFormat,
    pub ans_schema: Option<PathBuf>,
}

impl TransferConfig {
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let args = &cli.transfer;
        let operation = parse_operation(&cli.command)?;
        let content_type = operation.content_type();

        let from_org = args.from_org.trim();
        if from_org.is_empty() {
            return Err(ConfigError::MissingSourceOrg);
        }
        validate_org(from_org)?;

        let session = match (&args.to_org, args.to_sandbox) {
            (Some(to_org), false) => {
                validate_org(to_org)?;
                TransformSession::new(from_org, to_org.trim())
            }
            (None, true) => TransformSession::to_sandbox(from_org),
            _ => return Err(ConfigError::AmbiguousTarget),
        };

        let from_token = non_empty(&args.from_token).ok_or(ConfigError::MissingToken("from", "FROM"))?;
        let to_token = non_empty(&args.to_token).ok_or(ConfigError::MissingToken("to", "TO"))?;

        let needs_website = content_type.needs_placement() || content_type == ContentType::Redirect;
        let to_website = non_empty(&args.to_website);
        if needs_website && to_website.is_none() {
            return Err(ConfigError::MissingWebsite(content_type));
        }
        let source_website = non_empty(&args.source_website);
        if content_type == ContentType::Redirect && source_website.is_none() {
            return Err(ConfigError::MissingSourceWebsite);
        }
        if args.max_iterations == Some(0) {
            return Err(ConfigError::InvalidLimit);
        }

        let mut session = session
            .with_tokens(from_token, to_token)
            .with_dry_run(args.dry_run)
            .with_strict(args.strict)
            .with_dependent_gallery_patching(args.patch_dependent_galleries)
            .with_redirect_markers(args.video_url_marker.clone(), args.gallery_url_marker.clone());
        if let Some(website) = source_website {
            session = session.with_source_website(website);
        }
        if let Some(website) = to_website {
            session = session.with_website(website);
        }
        if let Some(section) = non_empty(&args.to_section) {
            session = session.with_section(section);
        }
        if let Some(max) = args.max_iterations {
            session = session.with_max_iterations(max);
        }

        Ok(Self {
            session,
            operation,
            report_format: cli.report_format.into(),
            ans_schema: args.ans_schema.clone(),
        })
    }
}

fn parse_operation(command: &Command) -> Result<Operation, ConfigError> {
    let parse = |raw: &str| {
        raw.parse::<ContentType>()
            .map_err(|_| ConfigError::InvalidContentType(raw.to_string()))
    };
    match command {
        Command::One { content_type, id } => Ok(Operation::One {
            content_type: parse(content_type)?,
            id: id.clone(),
        }),
        Command::All { content_type } => {
            let content_type = parse(content_type)?;
            if !content_type.supports_bulk() {
                return Err(ConfigError::NotBulk(content_type));
            }
            Ok(Operation::All { content_type })
        }
    }
}

fn validate_org(org: &str) -> Result<(), ConfigError> {
    let re = Regex::new(ORG_ID_PATTERN).map_err(|e| ConfigError::Pattern(e.to_string()))?;
    if !re.is_match(org.trim()) {
        return Err(ConfigError::InvalidOrg(org.to_string()));
    }
    Ok(())
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
