//! edna-ingest - eDNA Sequence Ingestion
//!
//! Parses an uploaded sequence file, scores every sequence and prints the
//! stored rows as JSON.
//!
//! ## Usage
//!
//! ```bash
//! edna-ingest <sequence_file>
//! edna-ingest -f fastq <sequence_file>            # Force format
//! edna-ingest --prompt <sequence_file>            # Print the classification prompt
//! edna-ingest --taxonomy completion.json <sequence_file>
//! ```
//!
//! With `--taxonomy`, the file holds a saved chat-completion response from the
//! classification service; it is run through the analysis pipeline as if the
//! service had just returned it.
//!
//! ## Supported Formats
//!
//! - FASTA (content starts with `>`)
//! - FASTQ (content starts with `@`)
//! - Plain text, one sequence per line
//!
//! Set `RUST_LOG=info` (or `debug`) to follow the ingestion steps.

// Use jemalloc for better memory management (returns memory to OS)
#[cfg(not(windows))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::info;
use serde::Serialize;

use edna_ingest::analysis::{analyze_sequences, AnalysisRequest, AnalysisResponse};
use edna_ingest::formats::{read_text, InputFormat};
use edna_ingest::ingest::{process_upload_with_options, UploadRequest};
use edna_ingest::store::MemoryStore;
use edna_ingest::taxonomy::{build_analysis_prompt, ChatRequest, TaxonRow, TaxonomyError};

/// File format specification for command line
#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    /// FASTA format
    Fasta,
    /// FASTQ format
    Fastq,
    /// One sequence per line
    Plain,
    /// Auto-detect from content
    Auto,
}

impl From<FormatArg> for Option<InputFormat> {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Fasta => Some(InputFormat::Fasta),
            FormatArg::Fastq => Some(InputFormat::Fastq),
            FormatArg::Plain => Some(InputFormat::Plain),
            FormatArg::Auto => None,
        }
    }
}

/// edna-ingest - Parse and score uploaded eDNA sequence files
///
/// By default prints the upload response (stored sequences with length and
/// quality score) as JSON.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Sequence file to ingest (FASTA, FASTQ, or one sequence per line)
    file: PathBuf,

    /// Force a specific file format (overrides auto-detection)
    #[arg(short = 'f', long = "format", value_enum, default_value = "auto")]
    format: FormatArg,

    /// Identifier of the uploaded file (default: the file name)
    #[arg(long = "file-id")]
    file_id: Option<String>,

    /// Identifier of the project the upload belongs to
    #[arg(long = "project-id", default_value = "local")]
    project_id: String,

    /// Identifier of the user running the analysis
    #[arg(long = "user-id", default_value = "local")]
    user_id: String,

    /// Output file. Use "-" for stdout.
    #[arg(short = 'o', long = "output", default_value = "-")]
    output: String,

    /// Print the classification prompt for the ingested sequences instead of the response
    #[arg(long = "prompt", conflicts_with = "taxonomy")]
    prompt: bool,

    /// Run the analysis with a saved classification response (JSON) and print the result
    #[arg(long = "taxonomy", value_name = "JSON")]
    taxonomy: Option<PathBuf>,
}

/// Analysis response printed with --taxonomy, followed by the stored taxon rows.
#[derive(Serialize)]
struct AnalysisOutput<'a> {
    #[serde(flatten)]
    response: &'a AnalysisResponse,
    taxa: Vec<&'a TaxonRow>,
}

fn open_output(output: &str) -> Result<Box<dyn Write>> {
    if output == "-" {
        Ok(Box::new(io::stdout().lock()))
    } else {
        let file = fs::File::create(output)
            .with_context(|| format!("Cannot create output file {}", output))?;
        Ok(Box::new(io::BufWriter::new(file)))
    }
}

fn default_file_id(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn run(args: Args) -> Result<()> {
    let content =
        read_text(&args.file).with_context(|| format!("Cannot read {}", args.file.display()))?;
    let file_id = args.file_id.clone().unwrap_or_else(|| default_file_id(&args.file));

    let request = UploadRequest::new(file_id, content, args.project_id.clone());
    let mut store = MemoryStore::new();
    store.create_project(args.project_id.clone());
    let response = process_upload_with_options(&request, args.format.into(), &mut store)?;

    let mut out = open_output(&args.output)?;

    if args.prompt {
        write!(out, "{}", build_analysis_prompt(&response.sequences))?;
    } else if let Some(taxonomy_path) = &args.taxonomy {
        let answer = fs::read_to_string(taxonomy_path)
            .with_context(|| format!("Cannot read {}", taxonomy_path.display()))?;
        let mut classifier =
            |_: &ChatRequest| -> Result<String, TaxonomyError> { Ok(answer.clone()) };

        let analysis_request = AnalysisRequest::new(&args.project_id, response.sequences.clone());
        let analysis =
            analyze_sequences(&analysis_request, &args.user_id, &mut classifier, &mut store)?;

        let output = AnalysisOutput {
            response: &analysis,
            taxa: store.taxa_for_analysis(&analysis.analysis.id).collect(),
        };
        info!("Stored {} taxa", output.taxa.len());
        serde_json::to_writer_pretty(&mut out, &output)?;
        writeln!(out)?;
    } else {
        serde_json::to_writer_pretty(&mut out, &response)?;
        writeln!(out)?;
    }
    out.flush()?;

    if args.output != "-" {
        eprintln!(
            "Wrote {} sequences to {}",
            response.sequences_count, args.output
        );
    }

    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    run(args)
}
