//! Quarry CLI - Compile filters to parameterized SQL
//!
//! Usage:
//!   quarry select --table <t> [--filter <json>] [--order <col:dir>]... [--page N --rows M]
//!   quarry merge --table <t> --record <json> [--qualifier <col>]... [--identity <col>]
//!   quarry count --table <t> [--filter <json>]
//!
//! Examples:
//!   quarry select --table Customer --filter '{"Id": 5}'
//!   quarry select --table dbo.Orders --order Id:asc --page 2 --rows 10 --dialect tsql
//!   quarry merge --table Customer --record '{"Id": 5, "Name": "Ada"}' --identity Id --dialect tsql

use clap::{Args, Parser, Subcommand, ValueEnum};
use quarry::config::Settings;
use quarry::entity::{EntityDefinition, PropertyDef, TableName};
use quarry::filter::{Field, Filter, Normalizer, OrderField, QueryGroup};
use quarry::paging::PageSpec;
use quarry::sql::Dialect;
use quarry::statement::{
    CompiledStatement, MergeSpec, Operation, StatementBuilder, StatementRequest,
};
use quarry::types::TypeResolutionChain;
use quarry::value::{Record, Value, ValueKind};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "quarry")]
#[command(about = "Quarry - compile typed filters to parameterized multi-dialect SQL")]
#[command(version)]
struct Cli {
    /// Config file (defaults to QUARRY_CONFIG, ./quarry.toml, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a SELECT (optionally paged)
    Select {
        #[command(flatten)]
        target: Target,

        /// Filter as JSON: object, array of conditions, or key value
        #[arg(short, long)]
        filter: Option<String>,

        /// Comma-separated columns to project
        #[arg(short, long, value_delimiter = ',')]
        columns: Vec<String>,

        /// Ordering as column[:asc|:desc], repeatable
        #[arg(short, long)]
        order: Vec<String>,

        /// Zero-based page number
        #[arg(long, requires = "rows")]
        page: Option<u64>,

        /// Rows per page
        #[arg(long)]
        rows: Option<u64>,

        /// Return at most N rows (ignored when paging)
        #[arg(long)]
        top: Option<u64>,

        /// Table hints, inserted verbatim
        #[arg(long)]
        hints: Option<String>,
    },

    /// Compile an upsert
    Merge {
        #[command(flatten)]
        target: Target,

        /// Record to write, as a JSON object
        #[arg(short, long)]
        record: String,

        /// Match-on column, repeatable (defaults to the identity)
        #[arg(short, long)]
        qualifier: Vec<String>,

        /// Identity column reported back by the statement
        #[arg(long)]
        identity: Option<String>,

        /// Table hints, inserted verbatim
        #[arg(long)]
        hints: Option<String>,
    },

    /// Compile a COUNT(*)
    Count {
        #[command(flatten)]
        target: Target,

        #[arg(short, long)]
        filter: Option<String>,

        #[arg(long)]
        hints: Option<String>,
    },
}

#[derive(Args)]
struct Target {
    /// Table, optionally schema-qualified
    #[arg(short, long)]
    table: String,

    /// SQL dialect to generate (defaults to the configured one)
    #[arg(short, long)]
    dialect: Option<DialectArg>,
}

#[derive(Clone, ValueEnum)]
enum DialectArg {
    Sqlite,
    Postgres,
    Tsql,
    Mysql,
}

impl From<DialectArg> for Dialect {
    fn from(arg: DialectArg) -> Self {
        match arg {
            DialectArg::Sqlite => Dialect::Sqlite,
            DialectArg::Postgres => Dialect::Postgres,
            DialectArg::Tsql => Dialect::TSql,
            DialectArg::Mysql => Dialect::MySql,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::from_file(path),
        None => Settings::load(),
    };
    let settings = match settings {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(cli.command, &settings) {
        Ok(statement) => {
            println!("{}", statement.sql());
            match serde_json::to_string_pretty(statement.parameters()) {
                Ok(params) => println!("{}", params),
                Err(e) => {
                    eprintln!("Error serializing parameters: {}", e);
                    return ExitCode::FAILURE;
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands, settings: &Settings) -> Result<CompiledStatement, Box<dyn std::error::Error>> {
    let types = TypeResolutionChain::new(settings.type_mapper()?);
    let options = settings.repository_options();
    let builder_for = |target: &Target| {
        let dialect = target
            .dialect
            .clone()
            .map(Dialect::from)
            .unwrap_or(settings.dialect);
        StatementBuilder::new(dialect, &types).with_options(options.build_options())
    };
    let normalizer = Normalizer::new(options.field_case);

    let statement = match command {
        Commands::Select {
            target,
            filter,
            columns,
            order,
            page,
            rows,
            top,
            hints,
        } => {
            let entity = EntityDefinition::table_only(TableName::parse(&target.table));
            let group = parse_filter(filter.as_deref(), &normalizer, &entity)?;
            let order_by = order
                .iter()
                .map(|o| OrderField::parse(o).ok_or_else(|| format!("invalid --order '{}'", o)))
                .collect::<Result<Vec<_>, _>>()?;
            let operation = match rows {
                Some(rows) => Operation::BatchQuery(PageSpec::new(page.unwrap_or(0), rows)?),
                None => Operation::Query,
            };
            let request = StatementRequest::new(&entity, operation)
                .columns(Field::from_names(columns))
                .filter(group)
                .order_by(order_by)
                .top(top)
                .hints(hints);
            builder_for(&target).build(&request)?
        }
        Commands::Merge {
            target,
            record,
            qualifier,
            identity,
            hints,
        } => {
            let table = TableName::parse(&target.table);
            let entity = match identity {
                Some(identity) => EntityDefinition::builder(table.name.clone())
                    .qualified_table(table)
                    .property(PropertyDef::new(identity, ValueKind::Int).identity())
                    .build(),
                None => EntityDefinition::table_only(table),
            };
            let json: serde_json::Value = serde_json::from_str(&record)?;
            let record = parse_record(&json)?;
            let spec = MergeSpec::new(record).qualifiers(qualifier);
            let request = StatementRequest::new(&entity, Operation::Merge(spec)).hints(hints);
            builder_for(&target).build(&request)?
        }
        Commands::Count {
            target,
            filter,
            hints,
        } => {
            let entity = EntityDefinition::table_only(TableName::parse(&target.table));
            let group = parse_filter(filter.as_deref(), &normalizer, &entity)?;
            let request = StatementRequest::new(&entity, Operation::Count)
                .filter(group)
                .hints(hints);
            builder_for(&target).build(&request)?
        }
    };
    Ok(statement)
}

fn parse_filter(
    filter: Option<&str>,
    normalizer: &Normalizer,
    entity: &EntityDefinition,
) -> Result<QueryGroup, Box<dyn std::error::Error>> {
    let Some(filter) = filter else {
        return Ok(QueryGroup::default());
    };
    let json: serde_json::Value = serde_json::from_str(filter)?;
    Ok(normalizer.normalize(Filter::from_json(&json)?, entity)?)
}

fn parse_record(json: &serde_json::Value) -> Result<Record, Box<dyn std::error::Error>> {
    let object = json.as_object().ok_or("--record must be a JSON object")?;
    object
        .iter()
        .map(|(name, value)| {
            Value::from_json(value)
                .map(|v| (name.clone(), v))
                .ok_or_else(|| format!("member '{}' is not a scalar", name).into())
        })
        .collect()
}
