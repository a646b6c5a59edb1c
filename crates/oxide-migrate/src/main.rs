//! oxide-migrate CLI
//!
//! Command-line tool for converging and inspecting entity tables.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use oxide_sql_core::{Connection, Dialect, MySqlDialect, SqlValue, SqliteDialect, TableNames};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use oxide_migrate::prelude::*;

/// Self-converging migrations for oxide-sql entity stores.
#[derive(Parser)]
#[command(name = "oxide-migrate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database URL (`mysql://...` or `sqlite:...`).
    #[arg(short, long, env = "DATABASE_URL", default_value = "sqlite:db.sqlite3")]
    database: String,

    /// Install prefix prepended to every table name.
    #[arg(short, long, env = "OXIDE_STORE_PREFIX", default_value = "")]
    prefix: String,

    /// Namespace used by `[[\name]]` placeholders.
    #[arg(long, env = "OXIDE_STORE_NAMESPACE")]
    namespace: Option<String>,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show columns, keys and foreign keys of a live table.
    Describe {
        /// Logical table name.
        table: String,
    },

    /// Print the SQL a template renders to.
    Render {
        /// Query template.
        template: String,

        /// Values bound to the `?` markers.
        params: Vec<String>,
    },

    /// Execute a template and print the rows it returns.
    Sql {
        /// Query template.
        template: String,

        /// Values bound to the `?` markers.
        params: Vec<String>,
    },

    /// Converge the tables declared in a schema file.
    Apply {
        /// Schema file (TOML).
        schema: PathBuf,

        /// Only this table.
        #[arg(short, long)]
        table: Option<String>,

        /// Show SQL without executing (dry run).
        #[arg(long)]
        dry_run: bool,
    },
}

/// `null` is NULL, numbers are numbers, everything else is text.
fn parse_param(raw: &str) -> SqlValue {
    if raw.eq_ignore_ascii_case("null") {
        SqlValue::Null
    } else if let Ok(n) = raw.parse::<i64>() {
        SqlValue::Int(n)
    } else if let Ok(f) = raw.parse::<f64>() {
        SqlValue::Float(f)
    } else {
        SqlValue::Text(String::from(raw))
    }
}

fn dialect_for(url: &str) -> &'static dyn Dialect {
    if url.starts_with("mysql:") || url.starts_with("mariadb:") {
        &MySqlDialect
    } else {
        &SqliteDialect
    }
}

fn returns_rows(sql: &str) -> bool {
    let head = sql.trim_start().split_whitespace().next().unwrap_or_default();
    ["SELECT", "SHOW", "PRAGMA", "WITH", "DESCRIBE", "EXPLAIN"]
        .iter()
        .any(|keyword| head.eq_ignore_ascii_case(keyword))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut names = TableNames::new(cli.prefix.as_str());
    if let Some(namespace) = &cli.namespace {
        names = names.with_namespace(namespace.as_str());
    }

    match cli.command {
        Commands::Render { template, params } => {
            let params: Vec<SqlValue> = params.iter().map(|p| parse_param(p)).collect();
            println!("{}", names.render(dialect_for(&cli.database), &template, &params)?);
        }

        Commands::Describe { table } => {
            let mut db = oxide_sql_sqlx::connect(&cli.database).await?;
            let physical = names.physical(&table);
            let Some(columns) = db.describe(&physical).await? else {
                anyhow::bail!("table {physical} does not exist");
            };
            println!("\nTable {physical}");
            println!("{:-<60}", "");
            for column in &columns {
                println!(
                    " {:<24} {:<28} {}",
                    column.name,
                    column.sql_type,
                    if column.nullable { "NULL" } else { "NOT NULL" }
                );
            }
            for key in db.keys(&physical).await? {
                println!(
                    " {} {} ({})",
                    if key.unique { "UNIQUE KEY" } else { "KEY" },
                    key.name,
                    key.columns.join(", ")
                );
            }
            for fk in db.foreign_keys(&physical).await? {
                println!(
                    " FOREIGN KEY {} ({}) -> {} ON DELETE {}",
                    fk.name.as_deref().unwrap_or("-"),
                    fk.column,
                    fk.references,
                    fk.on_delete.as_sql()
                );
            }
            println!();
        }

        Commands::Sql { template, params } => {
            let mut db = oxide_sql_sqlx::connect(&cli.database).await?;
            let params: Vec<SqlValue> = params.iter().map(|p| parse_param(p)).collect();
            let sql = names.render(db.dialect(), &template, &params)?;
            if returns_rows(&sql) {
                let rows = db.fetch_all(&sql).await?;
                for row in &rows {
                    let cells: Vec<String> =
                        row.iter().map(|(name, value)| format!("{name}={value}")).collect();
                    println!("{}", cells.join("\t"));
                }
                info!(rows = rows.len(), "Query finished");
            } else {
                let result = db.execute(&sql).await?;
                info!(
                    rows_affected = result.rows_affected,
                    insert_id = ?result.last_insert_id,
                    "Statement executed"
                );
            }
        }

        Commands::Apply {
            schema,
            table,
            dry_run,
        } => {
            let file = SchemaFile::load(&schema)?;
            let definitions = match &table {
                Some(name) => vec![file.definition(name)?],
                None => file.definitions()?,
            };

            if dry_run {
                info!("Dry run mode - SQL will be printed but not executed.");
            }

            let mut db = oxide_sql_sqlx::connect(&cli.database).await?;
            let executor = MigrationExecutor::new(names).dry_run(dry_run);
            let reports = executor.migrate_all(&mut db, &definitions).await?;

            for report in &reports {
                println!(" [{}] {}", report.outcome, report.table);
                for sql in &report.statements {
                    println!("     {sql};");
                }
            }
            let changed = reports.iter().filter(|r| r.changed()).count();
            info!(tables = reports.len(), changed, "Schema applied");
        }
    }

    Ok(())
}
