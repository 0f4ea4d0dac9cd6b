//! cpfcheck CLI - Compare benefit spreadsheets by CPF
//!
//! ```bash
//! cpfcheck serve                                  # Start HTTP server (port 3000)
//! cpfcheck compare --base base.xlsx \
//!     --pensionistas pens.xlsx --aposentados apos.xlsx -o out/
//! cpfcheck inspect base.xlsx                      # Show headers and detected columns
//! ```

use clap::{Parser, Subcommand};
use cpfcheck::reconcile::{CPF_KEYWORDS, PENSIONER_CPF_KEYWORDS, RECIPIENT_KEYWORDS};
use cpfcheck::{compare_files, load_dataset_file, locate_column, AppConfig, CompareInputs};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "cpfcheck")]
#[command(about = "Reconcile Base Geral, Pensionistas and Aposentados spreadsheets by CPF", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start HTTP server
    Serve {
        /// Port to listen on (default: CPFCHECK_PORT or 3000)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Compare files on disk and write the result workbooks
    Compare {
        /// Base Geral spreadsheet
        #[arg(short, long)]
        base: PathBuf,

        /// Pensionistas spreadsheet
        #[arg(short, long)]
        pensionistas: Option<PathBuf>,

        /// Aposentados spreadsheet
        #[arg(short, long)]
        aposentados: Option<PathBuf>,

        /// Directory for the result workbooks
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,

        /// Print the report as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// Show how a spreadsheet is read and which columns are detected
    Inspect {
        /// Spreadsheet or CSV file
        file: PathBuf,

        /// Number of rows to print
        #[arg(short, long, default_value = "5")]
        rows: usize,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve { port } => cmd_serve(port).await,

        Commands::Compare {
            base,
            pensionistas,
            aposentados,
            out_dir,
            json,
        } => cmd_compare(
            CompareInputs {
                base,
                pensionistas,
                aposentados,
            },
            &out_dir,
            json,
        ),

        Commands::Inspect { file, rows } => cmd_inspect(&file, rows),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

async fn cmd_serve(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env()?.with_port(port);
    cpfcheck::server::start_server(config).await?;
    Ok(())
}

fn cmd_compare(
    inputs: CompareInputs,
    out_dir: &Path,
    as_json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Base Geral: {}", inputs.base.display());
    if let Some(ref p) = inputs.pensionistas {
        eprintln!("   Pensionistas: {}", p.display());
    }
    if let Some(ref p) = inputs.aposentados {
        eprintln!("   Aposentados: {}", p.display());
    }

    let report = compare_files(&inputs);

    let mut written = Vec::new();
    if report.success {
        fs::create_dir_all(out_dir)?;
        for artifact in report.artifacts() {
            let path = out_dir.join(&artifact.file_name);
            fs::write(&path, &artifact.bytes)?;
            eprintln!("💾 {} ({} rows)", path.display(), artifact.rows);
            written.push(path);
        }
    }

    if as_json {
        let files: Vec<String> = written.iter().map(|p| p.display().to_string()).collect();
        let output = json!({
            "success": report.success,
            "message": report.message,
            "stats": report.stats,
            "files": files,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        let stats = &report.stats;
        println!("\n📊 {}", report.message);
        println!("   Base total:       {}", stats.base_total);
        println!("   Base (no RGPS):   {}", stats.base_filtered);
        if let (Some(total), Some(matches)) = (stats.pensionistas_total, stats.pensionistas_matches) {
            println!("   Pensionistas:     {} ({} matches)", total, matches);
        }
        if let (Some(total), Some(missing)) = (stats.aposentados_total, stats.aposentados_missing) {
            println!("   Aposentados:      {} ({} missing)", total, missing);
        }
    }

    if !report.success {
        return Err(report.message.into());
    }

    Ok(())
}

fn cmd_inspect(file: &Path, rows: usize) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Inspecting: {}", file.display());

    let loaded = load_dataset_file(file)?;
    let dataset = &loaded.dataset;
    let headers = dataset.headers();

    eprintln!("   Format: {}", loaded.format);
    eprintln!("   Columns: {}", headers.join(", "));
    eprintln!("   Rows: {}", dataset.len());

    let detected = [
        ("CPF", locate_column(headers, CPF_KEYWORDS)),
        ("CPF (pensionistas)", locate_column(headers, PENSIONER_CPF_KEYWORDS)),
        ("Destinatário", locate_column(headers, RECIPIENT_KEYWORDS)),
    ];
    for (label, column) in detected {
        eprintln!("   {:<20} {}", label, column.unwrap_or("-"));
    }

    let preview: Vec<_> = dataset.to_json_rows().into_iter().take(rows).collect();
    println!("{}", serde_json::to_string_pretty(&preview)?);

    Ok(())
}
