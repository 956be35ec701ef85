//! Beacon CLI - incident routing and participant resolution
//!
//! Run `beacon --help` for usage information.

use beacon::auth::issue_token;
use beacon::config::{self, Config, LogFormat};
use beacon::router::{Recommendation, RoutingRequest};
use beacon::Session;
use clap::{Args, Parser, Subcommand};
use http::{HeaderMap, HeaderName, HeaderValue};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(
    name = "beacon",
    about = "Routes incidents to the documents, responders and teams that belong on them",
    version
)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Inspect registered plugins
    Plugins {
        #[command(subcommand)]
        command: PluginCommands,
    },

    /// Match routing rules against an incident without resolving contacts
    Route {
        #[command(flatten)]
        request: RequestArgs,

        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Match routing rules and resolve service contacts into individuals
    Resolve {
        #[command(flatten)]
        request: RequestArgs,

        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Manage stored individuals
    Individuals {
        #[command(subcommand)]
        command: IndividualCommands,
    },

    /// Manage bearer tokens for the basic provider
    Token {
        #[command(subcommand)]
        command: TokenCommands,
    },

    /// Run an authentication provider against request headers
    Whoami {
        /// Request header (can be repeated: -H "Authorization: Bearer ...")
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,

        /// Provider slug (defaults to auth.provider)
        #[arg(short, long)]
        provider: Option<String>,
    },
}

#[derive(Subcommand)]
enum PluginCommands {
    /// List registered plugins
    List {
        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,
    },
}

#[derive(Subcommand)]
enum IndividualCommands {
    /// List stored individuals
    List {
        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,
    },
}

#[derive(Subcommand)]
enum TokenCommands {
    /// Issue a token for an email address
    Issue {
        /// Email claim of the token
        #[arg(short, long)]
        email: String,

        /// Token lifetime in minutes
        #[arg(long, default_value = "60")]
        ttl_minutes: i64,
    },
}

#[derive(Args)]
struct RequestArgs {
    /// Incident description
    #[arg(short, long, default_value = "")]
    text: String,

    /// Incident type (can be repeated)
    #[arg(long = "type")]
    incident_types: Vec<String>,

    /// Incident priority (can be repeated)
    #[arg(long = "priority")]
    incident_priorities: Vec<String>,

    /// Extra match term (can be repeated)
    #[arg(long = "term")]
    terms: Vec<String>,

    /// Full request as JSON (or @filename), instead of the flags above
    #[arg(long, conflicts_with_all = ["text", "incident_types", "incident_priorities", "terms"])]
    json: Option<String>,
}

impl RequestArgs {
    async fn into_request(self) -> Result<RoutingRequest, Box<dyn std::error::Error>> {
        if let Some(json) = self.json {
            let json = match json.strip_prefix('@') {
                Some(path) => tokio::fs::read_to_string(path).await?,
                None => json,
            };
            return Ok(RoutingRequest::from_json(&json)?);
        }

        let mut builder = RoutingRequest::builder().text(self.text).terms(self.terms);
        for incident_type in self.incident_types {
            builder = builder.incident_type(incident_type);
        }
        for priority in self.incident_priorities {
            builder = builder.incident_priority(priority);
        }
        Ok(builder.build()?)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration
    let config = if let Some(config_path) = &cli.config {
        Config::load(config_path).await?
    } else {
        let default_path = Config::default_path();
        if default_path.exists() {
            Config::load(&default_path).await?
        } else {
            Config::default().with_env_overrides(|key| std::env::var(key).ok())
        }
    };

    // Setup logging
    let log_level = match cli.verbose {
        0 => config.logging.level.parse().unwrap_or(Level::INFO),
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::from_default_env().add_directive(log_level.into());

    match config.logging.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init(),
    }

    // Execute command
    match cli.command {
        Commands::Init { force } => {
            init_config(cli.config, force).await?;
        }
        Commands::Plugins { command } => match command {
            PluginCommands::List { format } => {
                list_plugins(config, format).await?;
            }
        },
        Commands::Route { request, format } => {
            route(config, request.into_request().await?, format).await?;
        }
        Commands::Resolve { request, format } => {
            resolve(config, request.into_request().await?, format).await?;
        }
        Commands::Individuals { command } => match command {
            IndividualCommands::List { format } => {
                list_individuals(config, format).await?;
            }
        },
        Commands::Token { command } => match command {
            TokenCommands::Issue { email, ttl_minutes } => {
                issue(config, email, ttl_minutes)?;
            }
        },
        Commands::Whoami { headers, provider } => {
            whoami(config, headers, provider).await?;
        }
    }

    Ok(())
}

/// Initialize configuration
async fn init_config(path: Option<PathBuf>, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = path.unwrap_or_else(Config::default_path);

    if config_path.exists() && !force {
        return Err(format!(
            "Configuration already exists at {}. Use --force to overwrite.",
            config_path.display()
        )
        .into());
    }

    // Create config directory
    if let Some(parent) = config_path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    tokio::fs::write(&config_path, config::template()).await?;
    println!("Configuration written to {}", config_path.display());

    Ok(())
}

/// List registered plugins
async fn list_plugins(config: Config, format: String) -> Result<(), Box<dyn std::error::Error>> {
    let session = Session::from_config(&config).await?;
    let plugins = session.plugins.list();

    match format.as_str() {
        "json" => {
            let json = serde_json::to_string_pretty(&plugins)?;
            println!("{}", json);
        }
        _ => {
            println!(
                "{:<40} {:<32} {:<10} {:<24} {:<10} {}",
                "TITLE", "SLUG", "VERSION", "TYPE", "AUTHOR", "DESCRIPTION"
            );
            println!("{}", "-".repeat(130));
            for plugin in plugins {
                println!(
                    "{:<40} {:<32} {:<10} {:<24} {:<10} {}",
                    plugin.title,
                    plugin.slug,
                    plugin.version,
                    plugin.plugin_type.to_string(),
                    plugin.author,
                    plugin.description.as_deref().unwrap_or("-")
                );
            }
        }
    }

    Ok(())
}

/// Match rules and print the recommendation skeleton
async fn route(
    config: Config,
    request: RoutingRequest,
    format: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let session = Session::from_config(&config).await?;

    if format == "json" {
        let recommendation = session.routes.recommend(&request);
        println!("{}", serde_json::to_string_pretty(&recommendation)?);
        return Ok(());
    }

    let matches = session.routes.matches(&request);
    if matches.is_empty() {
        println!("No routing rules matched");
        return Ok(());
    }

    println!("{:<30} {}", "RULE", "SCORE");
    println!("{}", "-".repeat(40));
    for m in &matches {
        println!("{:<30} {}", m.rule.name, m.score);
    }
    println!();

    print_recommendation(&session.routes.recommend(&request));
    Ok(())
}

/// Match rules, resolve service contacts and persist individuals
async fn resolve(
    config: Config,
    request: RoutingRequest,
    format: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let session = Session::from_config(&config).await?;
    let recommendation = session.routes.recommend(&request);
    let resolved = session.resolver().resolve(recommendation).await?;

    info!(
        individuals = resolved.individual_contacts.len(),
        "Resolved recommendation"
    );

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&resolved)?),
        _ => {
            if resolved.is_empty() {
                println!("No routing rules matched");
            } else {
                print_recommendation(&resolved);
            }
        }
    }

    Ok(())
}

fn print_recommendation(recommendation: &Recommendation) {
    if !recommendation.documents.is_empty() {
        println!("Documents:");
        for document in &recommendation.documents {
            println!("  {:<30} {}", document.name, document.weblink);
        }
    }

    if !recommendation.service_contacts.is_empty() {
        println!("Service contacts:");
        for contact in &recommendation.service_contacts {
            println!("  {}", contact);
        }
    }

    if !recommendation.individual_contacts.is_empty() {
        println!("Individuals:");
        for individual in &recommendation.individual_contacts {
            println!("  {:<36} {}", individual.id, individual.email);
        }
    }

    if !recommendation.team_contacts.is_empty() {
        println!("Teams:");
        for team in &recommendation.team_contacts {
            println!("  {:<30} {}", team.name, team.email);
        }
    }
}

/// List stored individuals
async fn list_individuals(config: Config, format: String) -> Result<(), Box<dyn std::error::Error>> {
    let session = Session::from_config(&config).await?;
    let individuals = session.store.list().await?;

    if individuals.is_empty() {
        println!("No individuals stored");
        return Ok(());
    }

    match format.as_str() {
        "json" => {
            let json = serde_json::to_string_pretty(&individuals)?;
            println!("{}", json);
        }
        _ => {
            println!("{:<36} {:<32} {}", "ID", "EMAIL", "CREATED");
            println!("{}", "-".repeat(90));
            for individual in individuals {
                println!(
                    "{:<36} {:<32} {}",
                    individual.id,
                    individual.email,
                    individual.created_at.format("%Y-%m-%d %H:%M:%S UTC")
                );
            }
        }
    }

    Ok(())
}

/// Issue a basic provider token
fn issue(config: Config, email: String, ttl_minutes: i64) -> Result<(), Box<dyn std::error::Error>> {
    let secret = config.auth.jwt_secret.as_ref().ok_or_else(|| {
        format!(
            "No JWT secret configured. Set auth.jwt_secret or {}.",
            config::ENV_JWT_SECRET
        )
    })?;

    let token = issue_token(&email, secret, token_ttl(ttl_minutes)?)?;
    println!("{}", token);

    Ok(())
}

fn token_ttl(minutes: i64) -> Result<chrono::Duration, String> {
    if minutes <= 0 {
        return Err(format!("Token lifetime must be positive, got {} minutes", minutes));
    }
    chrono::Duration::try_minutes(minutes)
        .ok_or_else(|| format!("Token lifetime of {} minutes is out of range", minutes))
}

/// Run an authentication provider against the given headers
async fn whoami(
    config: Config,
    headers: Vec<String>,
    provider: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let session = Session::from_config(&config).await?;
    let slug = provider.unwrap_or_else(|| config.auth.provider.clone());
    let provider = session.plugins.authentication(&slug)?;

    let mut header_map = HeaderMap::new();
    for header in headers {
        let (name, value) = header
            .split_once(':')
            .ok_or_else(|| format!("Invalid header '{}', expected NAME:VALUE", header))?;
        header_map.append(
            HeaderName::from_bytes(name.trim().as_bytes())?,
            HeaderValue::from_str(value.trim())?,
        );
    }

    match provider.get_current_user(&header_map).await {
        Ok(Some(email)) => println!("{}", email),
        Ok(None) => println!("No credentials presented"),
        Err(e) => return Err(format!("{} (HTTP {})", e, e.status_code()).into()),
    }

    Ok(())
}
