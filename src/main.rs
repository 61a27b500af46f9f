//! Command line entry point: import changes from Bitwarden into KeePass.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use vault_reconcile::{run, SyncError, SyncOptions, SyncReport};

#[derive(Parser)]
#[command(name = "vault-reconcile")]
#[command(about = "Import changes from Bitwarden into KeePass")]
#[command(version)]
struct Cli {
    /// Bitwarden JSON export file
    #[arg(short = 'b', long = "bitwarden", value_name = "JSON_FILE")]
    bitwarden_file: PathBuf,

    /// KeePass 2 XML export file
    #[arg(short = 'k', long = "keepass", value_name = "XML_FILE")]
    keepass_file: PathBuf,

    /// Output KeePass 2 XML file (default: <XML_FILE stem>-out.<ext>)
    #[arg(short = 'o', long = "out-xml", value_name = "XML_FILE")]
    out_xml: Option<PathBuf>,

    /// Also write CSV importable files for differing entries
    #[arg(short = 'd', long = "difference")]
    difference: bool,

    /// Directory for the CSV files
    #[arg(long = "csv-dir", value_name = "DIR", default_value = ".")]
    csv_dir: PathBuf,
}

impl From<Cli> for SyncOptions {
    fn from(cli: Cli) -> Self {
        SyncOptions {
            bitwarden_path: cli.bitwarden_file,
            keepass_path: cli.keepass_file,
            out_xml: cli.out_xml,
            write_difference: cli.difference,
            csv_dir: cli.csv_dir,
        }
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_target(false)
        .format_timestamp(None)
        .init();

    let options = SyncOptions::from(Cli::parse());

    println!("Processing...");
    match run(&options) {
        Ok(report) => {
            print_report(&report);
            ExitCode::SUCCESS
        }
        Err(e) => {
            // Printed directly so the failure shows even with logging disabled.
            eprintln!("{}", error_line(&e));
            ExitCode::FAILURE
        }
    }
}

fn error_line(err: &SyncError) -> String {
    format!("Error: {}", err)
}

fn print_report(report: &SyncReport) {
    let output = &report.output;
    let only_keepass: Vec<&str> = output.missing_in_xml.keys().map(String::as_str).collect();
    let only_bitwarden: Vec<&str> = output.missing_in_json.iter().map(String::as_str).collect();

    println!("===");
    println!("Entries in KP, but not in BW: {:?}", only_keepass);
    println!("Entries in BW, but not in KP: {:?}", only_bitwarden);

    for path in &report.csv_written {
        println!("Wrote {}", path.display());
    }
    if let Some(path) = &report.xml_written {
        println!("===");
        println!("Wrote {}", path.display());
    }
}
