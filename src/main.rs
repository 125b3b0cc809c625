//! kontaktliste command-line tool
//!
//! 名簿（XLSX）から連絡先リスト（HTMLまたはJSON）を作成します。
//!
//! ```bash
//! kontaktliste anmeldung.xlsx kontaktliste.html --placeholder data/placeholder.png
//! kontaktliste anmeldung.xlsx teilnehmer.json --placeholder data/placeholder.png --format json --image-dir build
//! ```

use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use std::process;
use tracing::{error, info, warn};

use kontaktliste::{load_participants, render_to_file, OutputFormat, Participant, RosterError};

/// 出力形式（コマンドライン用）
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Html,
    Json,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Html => OutputFormat::Html,
            Format::Json => OutputFormat::Json,
        }
    }
}

/// Create a consent-respecting contact list from a sign-up spreadsheet
#[derive(Parser, Debug)]
#[clap(name = "kontaktliste", version)]
#[clap(about = "Create a consent-respecting contact list from a sign-up spreadsheet")]
struct Args {
    /// Sign-up spreadsheet (.xlsx)
    roster: PathBuf,

    /// Output file
    output: PathBuf,

    /// Placeholder image used when no consented photo is available
    #[clap(long, value_name = "FILE", default_value = "data/placeholder.png")]
    placeholder: PathBuf,

    /// Output format
    #[clap(long, value_enum, default_value = "html")]
    format: Format,

    /// Directory for extracted photos (a temporary directory is used if omitted)
    #[clap(long, value_name = "DIR")]
    image_dir: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(&args) {
        Ok(0) => info!("no participants with blanket consent in {}", args.roster.display()),
        Ok(count) => info!(
            "contact list with {} participants written to {}",
            count,
            args.output.display()
        ),
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    }
}

/// 抽出と出力を行い、出力した参加者数を返す
fn run(args: &Args) -> Result<usize, RosterError> {
    // 写真の埋め込みはレンダリング時に行うため、一時ディレクトリは出力後に削除してよい
    let scratch;
    let image_dir: &Path = match &args.image_dir {
        Some(dir) => dir,
        None => {
            if matches!(args.format, Format::Json) {
                warn!("photo paths in JSON output point into a temporary directory; use --image-dir to keep them");
            }
            scratch = tempfile::Builder::new()
                .prefix("kontaktliste_build_")
                .tempdir()?;
            scratch.path()
        }
    };

    let participants: Vec<Participant> =
        load_participants(&args.roster, &args.placeholder, image_dir)?;
    if participants.is_empty() {
        return Ok(0);
    }

    render_to_file(&participants, &args.output, args.format.into())?;
    Ok(participants.len())
}
