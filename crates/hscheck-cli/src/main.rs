mod commands;
mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use commands::audit::ReferenceArgs;
use commands::lines::Stage;
use commands::{PipelineArgs, TruncateArgs};

#[derive(Parser)]
#[command(
    name = "hscheck",
    version,
    about = "Customs invoice audit: table reconstruction, arithmetic checks and HS code comparison"
)]
struct Cli {
    /// Log debug output to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconstruct an invoice, validate it and compare HS codes with a reference spreadsheet
    Audit {
        /// Path to the invoice PDF
        pdf_file: PathBuf,

        /// Path to the reference XLSX mapping item codes to HS codes
        xlsx_file: PathBuf,

        #[command(flatten)]
        reference: ReferenceArgs,

        #[command(flatten)]
        pipeline: PipelineArgs,

        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,

        /// Write the report to a JSON file
        #[arg(short = 'O', long = "out", value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Reconstruct and validate an invoice without a reference spreadsheet
    Extract {
        /// Path to the invoice PDF
        pdf_file: PathBuf,

        #[command(flatten)]
        pipeline: PipelineArgs,

        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,

        /// Write the report to a JSON file
        #[arg(short = 'O', long = "out", value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Read named fields from fixed page/line positions
    Select {
        /// Path to the PDF
        pdf_file: PathBuf,

        /// JSON selector rule file
        #[arg(short, long, value_name = "FILE")]
        rules: PathBuf,

        #[command(flatten)]
        truncate: TruncateArgs,

        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,
    },
    /// Dump the document lines at one reconciliation stage
    Lines {
        /// Path to the PDF
        pdf_file: PathBuf,

        #[arg(long, value_enum, default_value = "final")]
        stage: Stage,

        #[command(flatten)]
        truncate: TruncateArgs,

        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,
    },
    /// Inspect column configurations
    Columns {
        #[command(subcommand)]
        action: ColumnsAction,
    },
}

#[derive(Subcommand)]
enum ColumnsAction {
    /// List column layouts (built-in unless a file is given)
    List {
        /// Column configuration file
        #[arg(long, value_name = "FILE")]
        columns: Option<PathBuf>,
    },
    /// Validate a column configuration file
    Validate {
        /// Path to JSON column configuration
        file: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // Ok(true) means the run completed with discrepancies.
    let result = match cli.command {
        Commands::Audit {
            pdf_file,
            xlsx_file,
            reference,
            pipeline,
            output,
            out,
        } => commands::audit::run(&pdf_file, &xlsx_file, &reference, &pipeline, &output, out),
        Commands::Extract {
            pdf_file,
            pipeline,
            output,
            out,
        } => commands::extract::run(&pdf_file, &pipeline, &output, out),
        Commands::Select {
            pdf_file,
            rules,
            truncate,
            output,
        } => commands::select::run(&pdf_file, &rules, &truncate, &output).map(|()| false),
        Commands::Lines {
            pdf_file,
            stage,
            truncate,
            output,
        } => commands::lines::run(&pdf_file, stage, &truncate, &output).map(|()| false),
        Commands::Columns { action } => match action {
            ColumnsAction::List { columns } => commands::columns::list(columns.as_deref()),
            ColumnsAction::Validate { file } => commands::columns::validate(&file),
        }
        .map(|()| false),
    };

    match result {
        Ok(false) => {}
        Ok(true) => std::process::exit(2),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
