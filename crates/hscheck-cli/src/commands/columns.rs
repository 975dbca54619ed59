use hscheck_core::config::load_column_config;
use hscheck_core::error::AuditError;
use std::path::Path;

use super::load_columns;

pub fn list(path: Option<&Path>) -> Result<(), AuditError> {
    let config = load_columns(path)?;
    match path {
        Some(p) => println!("Column layouts in {}:\n", p.display()),
        None => println!("Built-in column layouts:\n"),
    }
    for key in config.keys() {
        let fields = config.fields(key)?;
        let names: Vec<String> = fields.iter().map(|f| f.name()).collect();
        println!("  {:<12} {} column(s)", key, fields.len());
        println!("               {}", names.join(", "));
        println!();
    }
    Ok(())
}

pub fn validate(path: &Path) -> Result<(), AuditError> {
    let config = load_column_config(path)?;
    let count = config.keys().count();
    println!("Valid column configuration: {count} layout(s)");
    for key in config.keys() {
        println!("  {key}: {} field(s)", config.fields(key)?.len());
    }
    Ok(())
}
