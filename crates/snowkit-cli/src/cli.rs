//! snowkit CLI: smoke tests for warehouse configuration and connectivity.
//!
//! - `config`: show the resolved connection parameters, secrets masked
//! - `ping`: open a session and report whether it is live
//! - `query`: run a statement and print the result as a table

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use comfy_table::{ContentArrangement, Table as ComfyTable, presets::UTF8_FULL};
use snowkit::logging::{self, LoggingConfig};
use snowkit::{
    CacheStrategy, ConfigInput, ConfigResolver, Connection, EnvSource, OutputFormat, QueryOutput,
    QueryParams, ReadOptions, SecretsStore, Snowkit, Value,
};

#[derive(Parser)]
#[command(name = "snowkit")]
#[command(about = "Check snowkit configuration and run ad-hoc queries", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Secrets file to read instead of the default locations
    #[arg(long, global = true, env = "SNOWKIT_SECRETS_FILE")]
    secrets: Option<PathBuf>,

    /// More log output on stderr (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the resolved connection parameters
    Config,
    /// Open a session and check it is live
    Ping,
    /// Run a statement and print the result
    Query {
        /// SQL text; bind named parameters with `:name`
        sql: String,
        /// Bind parameter as NAME=VALUE (repeatable)
        #[arg(long = "param", short = 'p', value_parser = parse_param)]
        params: Vec<(String, Value)>,
        /// Print positional rows without column names
        #[arg(long, default_value_t = false)]
        raw: bool,
        /// Run the statement this many times; repeats are served from the cache
        #[arg(long, default_value_t = 1)]
        repeat: usize,
        /// Cache entry lifetime in seconds
        #[arg(long)]
        ttl: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let _guard = logging::init(LoggingConfig::verbosity(cli.verbose))
        .context("failed to initialize logging")?;

    let resolver = match &cli.secrets {
        Some(path) => ConfigResolver::new(SecretsStore::from_path(path)?, EnvSource::from_process()),
        None => ConfigResolver::from_environment()?,
    };

    let format = match &cli.command {
        Commands::Query { raw: true, .. } => OutputFormat::Rows,
        _ => OutputFormat::Table,
    };
    let kit = Snowkit::builder()
        .resolver(resolver)
        .cache(CacheStrategy::in_memory())
        .output_format(format)
        .build()?;

    let result = run_cli(&cli, &kit).await;
    if let Err(e) = kit.shutdown().await {
        tracing::warn!(error = %e, "failed to close sessions");
    }
    result
}

async fn run_cli(cli: &Cli, kit: &Snowkit) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Config => {
            let config = kit.resolve(ConfigInput::None)?;
            let mut table = new_table(vec!["parameter".to_string(), "value".to_string()]);
            for (key, value) in config.redacted_params() {
                table.add_row(vec![key, display_json(&value)]);
            }
            println!("{table}");
            println!("fingerprint: {}", config.fingerprint());
        }
        Commands::Ping => {
            let conn = kit.connect(ConfigInput::None).await?;
            let live = conn.is_live()?;
            println!("driver: {}", conn.driver_name());
            println!("live: {}", live);
            if !live {
                anyhow::bail!("session is not live");
            }
        }
        Commands::Query {
            sql,
            params,
            raw: _,
            repeat,
            ttl,
        } => {
            let mut bind = QueryParams::new();
            for (name, value) in params {
                bind.insert(name.clone(), value.clone());
            }
            let mut options = ReadOptions::default();
            if let Some(ttl) = ttl {
                options = options.ttl(Duration::from_secs(*ttl));
            }

            let mut last = None;
            for _ in 0..(*repeat).max(1) {
                let result = kit.read_table(sql, Some(&bind), options.clone()).await?;
                last = result.into_output();
            }
            let output = last.context("query produced no output")?;
            println!("{}", render_output(&output));
            println!("({} rows)", output.row_count());
        }
    }
    Ok(())
}

fn new_table(header: Vec<String>) -> ComfyTable {
    let mut table = ComfyTable::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn render_output(output: &QueryOutput) -> ComfyTable {
    match output {
        QueryOutput::Table(data) => {
            let mut table = new_table(data.column_names());
            for row in &data.rows {
                table.add_row(row.values.iter().map(display_value).collect::<Vec<_>>());
            }
            table
        }
        QueryOutput::Rows(rows) => {
            let width = rows.first().map_or(0, Vec::len);
            let mut table = new_table((0..width).map(|i| i.to_string()).collect());
            for row in rows {
                table.add_row(row.iter().map(display_value).collect::<Vec<_>>());
            }
            table
        }
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        other => other.to_string(),
    }
}

fn display_json(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `NAME=VALUE`; the value is read as an integer, float, boolean or `null`
/// before falling back to text
fn parse_param(raw: &str) -> Result<(String, Value), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("parameter name missing in '{}'", raw));
    }

    let value = if let Ok(i) = value.parse::<i64>() {
        Value::Int64(i)
    } else if let Ok(f) = value.parse::<f64>() {
        Value::Float64(f)
    } else {
        match value {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            "null" => Value::Null,
            text => Value::String(text.to_string()),
        }
    };
    Ok((name.to_string(), value))
}
