//! queryget command-line planner
//!
//! Loads an entity schema, compiles a request query string against one of
//! its entities and prints the resulting plan.

mod formatter;

use std::path::PathBuf;

use clap::Parser;
use formatter::OutputFormat;
use queryget_core::{EntityRegistry, Params, PlanConfig, QueryPlanner, Schema};
use tracing::debug;

/// queryget command-line planner
#[derive(Parser, Debug)]
#[command(name = "queryget")]
#[command(version, about = "Compile request parameters into a query plan")]
pub struct Args {
    /// Schema file (JSON)
    pub schema: PathBuf,

    /// Entity to plan for; lists the schema's entities when omitted
    pub entity: Option<String>,

    /// Request query string, e.g. `status=open&props=id,buyer.name&page=2`
    #[arg(short = 'q', long, default_value = "")]
    pub query: String,

    /// Request parameters as a flat JSON object, merged after the query string
    #[arg(long)]
    pub json: Option<String>,

    /// Output format
    #[arg(long, default_value = "table", value_enum)]
    pub format: OutputFormat,

    /// Rows per page when the request gives none
    #[arg(long, default_value_t = queryget_core::config::DEFAULT_PAGE_SIZE)]
    pub page_size: u64,

    /// Upper bound for a requested page size
    #[arg(long)]
    pub max_page_size: Option<u64>,

    /// Relation levels a selection may expand
    #[arg(long, default_value_t = queryget_core::config::DEFAULT_SELECT_DEPTH)]
    pub depth: usize,

    /// Reject unrecognized boolean tokens instead of treating them as false
    #[arg(long)]
    pub strict: bool,
}

impl From<&Args> for PlanConfig {
    fn from(args: &Args) -> Self {
        let config = PlanConfig::new()
            .with_default_page_size(args.page_size)
            .with_select_depth(args.depth)
            .with_strict_flags(args.strict);
        match args.max_page_size {
            Some(max) => config.with_max_page_size(max),
            None => config,
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Plan(#[from] queryget_core::Error),

    #[error("invalid output: {0}")]
    Output(#[from] serde_json::Error),
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("queryget=info")),
        )
        .init();

    let args = Args::parse();

    match run(&args) {
        Ok(output) => println!("{}", output),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn run(args: &Args) -> Result<String, CliError> {
    let registry = EntityRegistry::from_schema(Schema::load(&args.schema)?)?;
    let formatter = formatter::create_formatter(args.format);

    let Some(entity) = &args.entity else {
        return Ok(formatter.format_entities(&registry.entity_names()));
    };

    let mut params = Params::from_query_str(&args.query);
    if let Some(json) = &args.json {
        for (key, value) in Params::from_json(json)?.iter() {
            params.insert(key, value.clone());
        }
    }
    debug!(entity = %entity, params = params.len(), "planning request");

    let mut planner = QueryPlanner::new(&registry, entity)?.with_config(PlanConfig::from(args));
    planner.apply(&params)?;
    let plan = planner.build()?;

    formatter.format_plan(&plan)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_into_config() {
        let args = Args::parse_from([
            "queryget",
            "shop.json",
            "Order",
            "--page-size",
            "20",
            "--max-page-size",
            "50",
            "--depth",
            "2",
            "--strict",
        ]);
        let config = PlanConfig::from(&args);

        assert_eq!(config.default_page_size, 20);
        assert_eq!(config.max_page_size, Some(50));
        assert_eq!(config.select_depth, 2);
        assert!(config.strict_flags);
    }

    #[test]
    fn test_default_args() {
        let args = Args::parse_from(["queryget", "shop.json"]);
        assert!(args.entity.is_none());
        assert_eq!(args.format, OutputFormat::Table);
        assert_eq!(PlanConfig::from(&args), PlanConfig::default());
    }
}
