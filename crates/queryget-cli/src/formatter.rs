//! Output formatters for compiled plans.

use clap::ValueEnum;
use comfy_table::Table;
use queryget_core::sql;
use queryget_proto::{Projection, QueryPlan};

use crate::CliError;

/// Output format for plans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Summary table
    Table,
    /// The plan as JSON
    Json,
    /// Parameterized SQL statements
    Sql,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Sql => write!(f, "sql"),
        }
    }
}

/// Trait for formatting output.
pub trait Formatter {
    /// Format a compiled plan.
    fn format_plan(&self, plan: &QueryPlan) -> Result<String, CliError>;

    /// Format the entity names of a schema.
    fn format_entities(&self, entities: &[String]) -> String;
}

/// Create a formatter for the given output format.
pub fn create_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Table => Box::new(TableFormatter),
        OutputFormat::Json => Box::new(JsonFormatter),
        OutputFormat::Sql => Box::new(SqlFormatter),
    }
}

/// Table formatter using comfy-table.
pub struct TableFormatter;

impl Formatter for TableFormatter {
    fn format_plan(&self, plan: &QueryPlan) -> Result<String, CliError> {
        let mut table = Table::new();
        table.set_header(vec!["Part", "Value"]);

        table.add_row(vec!["entity".to_string(), format!("{} ({})", plan.entity, plan.table)]);
        for join in &plan.joins {
            table.add_row(vec!["join".to_string(), join.to_string()]);
        }
        for predicate in &plan.filters {
            table.add_row(vec!["filter".to_string(), serde_json::to_string(predicate)?]);
        }
        if let Some(projection) = &plan.projection {
            projection_rows(&mut table, "", projection);
        }
        for order in &plan.order_by {
            table.add_row(vec![
                "order".to_string(),
                format!("{} {}", order.column, order.direction.as_sql()),
            ]);
        }
        if let Some(window) = plan.window {
            table.add_row(vec![
                "window".to_string(),
                format!("skip {} take {}", window.skip, window.take),
            ]);
        }

        Ok(table.to_string())
    }

    fn format_entities(&self, entities: &[String]) -> String {
        let mut table = Table::new();
        table.set_header(vec!["Entity"]);

        for entity in entities {
            table.add_row(vec![entity]);
        }

        table.to_string()
    }
}

fn projection_rows(table: &mut Table, path: &str, projection: &Projection) {
    let label = if path.is_empty() {
        "select".to_string()
    } else {
        format!("select {}", path)
    };
    let columns: Vec<String> = projection.columns.iter().map(ToString::to_string).collect();
    table.add_row(vec![label, columns.join(", ")]);

    for (name, relation) in &projection.relations {
        let nested = if path.is_empty() {
            name.clone()
        } else {
            format!("{}.{}", path, name)
        };
        projection_rows(table, &nested, &relation.projection);
    }
}

/// JSON formatter.
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format_plan(&self, plan: &QueryPlan) -> Result<String, CliError> {
        Ok(serde_json::to_string_pretty(plan)?)
    }

    fn format_entities(&self, entities: &[String]) -> String {
        serde_json::Value::from(entities.to_vec()).to_string()
    }
}

/// SQL formatter: one block per statement, root first.
pub struct SqlFormatter;

impl Formatter for SqlFormatter {
    fn format_plan(&self, plan: &QueryPlan) -> Result<String, CliError> {
        let mut blocks = Vec::new();
        for statement in sql::render(plan)? {
            let mut block = String::new();
            if !statement.path.is_empty() {
                block.push_str(&format!("-- {}", statement.path));
                if let Some(parent) = &statement.parent_column {
                    block.push_str(&format!(" ($1 = values of {})", parent));
                }
                block.push('\n');
            }
            block.push_str(&statement.sql);
            block.push_str(";\n-- params: ");
            block.push_str(&serde_json::to_string(&statement.params)?);
            blocks.push(block);
        }
        Ok(blocks.join("\n\n"))
    }

    fn format_entities(&self, entities: &[String]) -> String {
        entities.join("\n")
    }
}
