use clap::{Parser, Subcommand};
use caraway::cli::{self, CliError, EvalOptions, SqlOptions};
use caraway::ResponseSpec;
use std::fs;
use std::io::{self, Read};

#[derive(Parser)]
#[command(name = "caraway")]
#[command(about = "Caraway - a schema-aware filter query engine for JSON documents")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a query against a JSON data structure
    Eval {
        /// The query payload, as JSON
        query: String,

        /// Path to the annotated JSON Schema
        #[arg(short, long)]
        schema: String,

        /// Path to the JSON data structure (reads from stdin if not provided)
        #[arg(short, long)]
        data: Option<String>,

        /// Evaluate with elevated (internal) access
        #[arg(long)]
        internal: bool,

        /// Result shape: boolean, count, or items
        #[arg(short, long, default_value = "boolean")]
        response: String,

        /// Pretty-print the output
        #[arg(short, long)]
        pretty: bool,
    },

    /// Compile a query into parameterized PostgreSQL
    Sql {
        /// The query payload, as JSON
        query: String,

        /// Path to the annotated JSON Schema
        #[arg(short, long)]
        schema: String,

        /// Compile with elevated (internal) access
        #[arg(long)]
        internal: bool,

        /// Pretty-print the output
        #[arg(short, long)]
        pretty: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Eval {
            query,
            schema,
            data,
            internal,
            response,
            pretty,
        } => run_eval(query, schema, data, internal, response, pretty),
        Commands::Sql {
            query,
            schema,
            internal,
            pretty,
        } => run_sql(query, schema, internal, pretty),
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn run_eval(
    query: String,
    schema_path: String,
    data_path: Option<String>,
    internal: bool,
    response: String,
    pretty: bool,
) -> Result<(), CliError> {
    let data = match data_path {
        Some(path) => fs::read_to_string(path)?,
        None if !atty::is(atty::Stream::Stdin) => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
        None => return Err(CliError::NoData),
    };

    let response = ResponseSpec::from_name(&response)
        .ok_or_else(|| CliError::UnknownResponseSpec(response.clone()))?;

    let options = EvalOptions {
        query,
        schema: fs::read_to_string(schema_path)?,
        data,
        internal,
        response,
    };

    print_json(&cli::execute_eval(&options)?, pretty);
    Ok(())
}

fn run_sql(
    query: String,
    schema_path: String,
    internal: bool,
    pretty: bool,
) -> Result<(), CliError> {
    let options = SqlOptions {
        query,
        schema: fs::read_to_string(schema_path)?,
        internal,
    };

    print_json(&cli::execute_sql(&options)?, pretty);
    Ok(())
}

fn print_json(value: &serde_json::Value, pretty: bool) {
    let json = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .unwrap();
    println!("{}", json);
}
