use std::process::ExitCode;
use tablekit::{config, Database, Result, Value};
use tracing::{error, info};

const USAGE: &str = "Usage: tablekit [--config FILE] DB [tables | schema [TABLE] | columns TABLE | get TABLE PK...]";

/// Parses a primary-key argument: integers stay integers, anything else is text.
fn parse_pk(arg: &str) -> Value {
    arg.parse::<i64>()
        .map(Value::Integer)
        .unwrap_or_else(|_| Value::from(arg))
}

fn run(args: &[String]) -> Result<()> {
    let mut args = args.iter().map(String::as_str).peekable();

    let mut config = if args.peek() == Some(&"--config") {
        args.next();
        let path = args
            .next()
            .ok_or_else(|| tablekit::TablekitError::Config("--config needs a file".to_string()))?;
        config::load_config(path)?
    } else {
        config::load_default_config()?
    };

    if let Some(path) = args.next() {
        config.database.path = Some(path.to_string());
    }

    let db = Database::from_config(&config)?;
    info!("Opened {}", db);

    match args.next().unwrap_or("tables") {
        "tables" => {
            for name in db.table_names()? {
                println!("{}", name);
            }
        }
        "schema" => match args.next() {
            Some(table) => println!("{};", db.schema(table)?),
            None => println!("{}", db.full_schema()?),
        },
        "columns" => {
            let table = db.table(args.next().unwrap_or_default())?;
            for column in table.schema().columns() {
                println!(
                    "{}\t{}\t{}{}",
                    column.name,
                    column.declared_type,
                    if column.nullable { "NULL" } else { "NOT NULL" },
                    if column.primary_key { "\tPK" } else { "" }
                );
            }
        }
        "get" => {
            let table = db.table(args.next().unwrap_or_default())?;
            let pk: Vec<Value> = args.map(parse_pk).collect();
            match table.get(&pk)? {
                Some(row) => println!(
                    "{}",
                    serde_json::to_string_pretty(&row)
                        .map_err(|e| tablekit::TablekitError::Conversion(e.to_string()))?
                ),
                None => println!("null"),
            }
        }
        other => {
            return Err(tablekit::TablekitError::Config(format!(
                "unknown command '{}'\n{}",
                other, USAGE
            )))
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    // Initialize the logging system using tracing subscriber
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("{}", USAGE);
        return ExitCode::SUCCESS;
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("tablekit: {}", e);
            ExitCode::FAILURE
        }
    }
}
