//! `fuel-soap` command line client.
//!
//! Run with: `fuel-soap --access-token <token> describe Email`

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fuel_soap::{
    build_envelope, verbs, ClientConfig, FilterExpression, Node, RetrieveArgs, RetrieveOptions,
    SoapClient, StaticTokenProvider,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Ad-hoc calls against the Marketing Cloud SOAP API.
///
/// Responses are printed to stdout as JSON; logs go to stderr.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (YAML)
    #[arg(short, long, default_value = "fuel-soap.yaml")]
    config: PathBuf,

    /// OAuth access token
    #[arg(short, long, env = "FUEL_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// Tenant-specific SOAP base URL, e.g. "https://<subdomain>.soap.marketingcloudapis.com"
    #[arg(long, env = "FUEL_SOAP_INSTANCE_URL")]
    instance_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Describe an object type
    Describe {
        object_type: String,
    },

    /// Retrieve objects of a type
    Retrieve {
        object_type: String,

        /// Comma-separated properties (defaults to Client,ID,ObjectID)
        #[arg(short, long, value_delimiter = ',')]
        properties: Vec<String>,

        /// Filter as JSON, e.g. '{"leftOperand":"Name","operator":"equals","rightOperand":"x"}'
        #[arg(short, long)]
        filter: Option<String>,

        /// RequestID of a MoreDataAvailable response to continue from
        #[arg(long)]
        continue_request: Option<String>,

        /// Query every account of the enterprise
        #[arg(long)]
        query_all_accounts: bool,
    },

    /// Print the envelope of a Retrieve request without sending it
    Envelope {
        object_type: String,

        #[arg(short, long, value_delimiter = ',')]
        properties: Vec<String>,

        #[arg(short, long)]
        filter: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = args.log_level.parse().unwrap_or(Level::WARN);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let config = if args.config.exists() {
        let content = tokio::fs::read_to_string(&args.config)
            .await
            .context("Failed to read config file")?;
        ClientConfig::from_yaml(&content).context("Failed to parse config file")?
    } else {
        info!("Config file not found, using defaults");
        ClientConfig::default()
    };

    info!(endpoint = %config.endpoint, "Configuration loaded");

    let (request, offline) = match args.command {
        Command::Describe { object_type } => (verbs::build_describe(&object_type), false),
        Command::Retrieve {
            object_type,
            properties,
            filter,
            continue_request,
            query_all_accounts,
        } => {
            let retrieve = retrieve_args(properties, filter, continue_request, query_all_accounts)?;
            (verbs::build_retrieve(&object_type, retrieve), false)
        }
        Command::Envelope {
            object_type,
            properties,
            filter,
        } => {
            let retrieve = retrieve_args(properties, filter, None, false)?;
            (verbs::build_retrieve(&object_type, retrieve), true)
        }
    };

    if offline {
        let token = args.access_token.unwrap_or_default();
        let xml = build_envelope(Some(&request.body), &token).context("Failed to build envelope")?;
        println!("{}", xml);
        return Ok(());
    }

    let token = args
        .access_token
        .context("An access token is required (--access-token or FUEL_ACCESS_TOKEN)")?;
    let mut provider = StaticTokenProvider::new(token);
    if let Some(url) = args.instance_url {
        provider = provider.with_instance_url(url);
    }
    let client = SoapClient::new(config, Arc::new(provider)).context("Failed to create client")?;

    info!(action = %request.action, "Sending request");
    let response = client
        .soap_request(request)
        .await
        .context("SOAP request failed")?;

    println!(
        "{}",
        serde_json::to_string_pretty(&response.body).context("Failed to encode response")?
    );

    Ok(())
}

fn retrieve_args(
    properties: Vec<String>,
    filter: Option<String>,
    continue_request: Option<String>,
    query_all_accounts: bool,
) -> Result<RetrieveArgs> {
    let filter = filter
        .map(|raw| serde_json::from_str::<FilterExpression>(&raw))
        .transpose()
        .context("Failed to parse filter")?;

    if filter.is_none() && continue_request.is_none() && !query_all_accounts {
        return Ok(if properties.is_empty() {
            RetrieveArgs::Defaults
        } else {
            RetrieveArgs::Single(Node::from(properties))
        });
    }

    let properties = if properties.is_empty() {
        Node::from(verbs::DEFAULT_RETRIEVE_PROPERTIES.to_vec())
    } else {
        Node::from(properties)
    };
    let options = RetrieveOptions {
        filter,
        continue_request,
        query_all_accounts,
        ..Default::default()
    };
    Ok(RetrieveArgs::Full(properties, options))
}
