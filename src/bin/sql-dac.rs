use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use serde_json::{Value, json};
use sql_dac::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    Table,
    Set,
    Scalar,
    NonQuery,
    Reader,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Category {
    Db,
    Generic,
    System,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Run one command through the sql-dac façade and print JSON")]
struct Args {
    /// JSON file with a `dac` section; overrides --provider and --connection.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, value_enum, default_value = "sqlite")]
    provider: DatabaseType,
    /// Connection string or `SQLite` path.
    #[arg(long)]
    connection: Option<String>,
    #[arg(long)]
    sql: String,
    #[arg(long, value_enum, default_value = "text")]
    kind: CommandKind,
    /// `name=value`; integers, floats, booleans and `null` are recognized.
    #[arg(long = "param", value_parser = parse_param)]
    params: Vec<Parameter>,
    #[arg(long, default_value_t = 0)]
    start: usize,
    #[arg(long, default_value_t = 0)]
    max: usize,
    #[arg(long, value_enum, default_value = "table")]
    mode: Mode,
    /// Failure category to swallow instead of raising.
    #[arg(long, value_enum)]
    suppress: Vec<Category>,
    #[arg(long)]
    timeout_ms: Option<u64>,
}

fn parse_param(raw: &str) -> Result<Parameter, String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got `{raw}`"))?;
    let value = if value.eq_ignore_ascii_case("null") {
        RowValues::Null
    } else if let Ok(int) = value.parse::<i64>() {
        RowValues::Int(int)
    } else if let Ok(float) = value.parse::<f64>() {
        RowValues::Float(float)
    } else if let Ok(flag) = value.parse::<bool>() {
        RowValues::Bool(flag)
    } else {
        RowValues::Text(value.to_string())
    };
    Ok(Parameter::new(name, value))
}

fn options(args: &Args) -> ExecOptions {
    let mut policy = ExecutionPolicy::RAISE_ALL;
    for category in &args.suppress {
        policy = match category {
            Category::Db => policy.throw_db(false),
            Category::Generic => policy.throw_generic(false),
            Category::System => policy.throw_system(false),
        };
    }
    let options = ExecOptions::with_policy(policy);
    match args.timeout_ms {
        Some(ms) => options.timeout(Duration::from_millis(ms)),
        None => options,
    }
}

fn drain(mut reader: DataReader) -> Result<Value, serde_json::Error> {
    let mut sets = Vec::new();
    loop {
        let mut rows = Vec::new();
        while reader.read() {
            if let Some(row) = reader.current_row() {
                rows.push(serde_json::to_value(row)?);
            }
        }
        let columns: Vec<&str> = reader.columns().iter().map(|c| c.name.as_str()).collect();
        sets.push(json!({ "columns": columns, "rows": rows }));
        if !reader.next_result() {
            break;
        }
    }
    Ok(json!({ "recordsAffected": reader.records_affected(), "results": sets }))
}

async fn run(args: Args) -> Result<Value, Box<dyn std::error::Error>> {
    let config = match (&args.config, &args.connection) {
        (Some(path), _) => DacConfig::from_file(path)?,
        (None, Some(connection)) => DacConfig::new(args.provider, connection.clone()),
        (None, None) => return Err("either --config or --connection is required".into()),
    };
    let db = Database::from_config(&config).await?;
    info!(provider = ?config.provider, mode = ?args.mode, "running command");

    let command = SqlCommand::new(args.sql.clone(), args.kind)
        .params(args.params.clone())
        .window(args.start, args.max);
    let options = options(&args);

    let value = match args.mode {
        Mode::Table => serde_json::to_value(db.get_data_table(&command, &options).await?)?,
        Mode::Set => serde_json::to_value(db.get_data_set(&command, &options).await?)?,
        Mode::Scalar => serde_json::to_value(db.execute_scalar(&command, &options).await?)?,
        Mode::NonQuery => json!({
            "rowsAffected": db.execute_non_query(&command, &options).await?
        }),
        Mode::Reader => drain(db.execute_reader(&command, &options).await?)?,
    };
    Ok(value)
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(value) => match serde_json::to_string_pretty(&value) {
            Ok(text) => {
                println!("{text}");
                ExitCode::SUCCESS
            }
            Err(err) => {
                eprintln!("failed to render output: {err}");
                ExitCode::FAILURE
            }
        },
        Err(err) => {
            eprintln!("error: {err}");
            let mut source = err.source();
            while let Some(cause) = source {
                eprintln!("  caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}
