use anyhow::Result;
use clap::Parser;
use sample_sheet::{JoinPolicy, Platform, SampleSheetDef, SchemeRef};
use std::path::PathBuf;

/// Create a sample sheet from a sequencing run directory and a metadata
/// table, for consumption by downstream analysis workflows.
#[derive(Parser, Debug)]
#[clap(name = "make_sample_sheet", version)]
struct Args {
    /// Sequencing platform: 'nanopore' (alias 'ont') or 'illumina'.
    #[clap(long, value_name = "PLATFORM")]
    platform: String,

    /// Run directory containing the raw reads.
    #[clap(long, value_name = "DIR")]
    run_dir: PathBuf,

    /// Metadata table (CSV or XLS/XLSX) with 'sample' and 'barcode'
    /// columns; any further columns are carried into the sheet unchanged.
    #[clap(long, value_name = "FILE")]
    metadata: PathBuf,

    /// Amplicon scheme identifier (e.g. artic-inrb-mpox/2500/v1.0.0).
    #[clap(long, value_name = "SCHEME")]
    amplicon_scheme: String,

    /// Path to a local custom amplicon scheme, if relevant.
    #[clap(long, value_name = "PATH")]
    custom_scheme_path: Option<String>,

    /// Where to write the sample sheet.
    #[clap(long, value_name = "FILE", default_value = "sample_sheet.csv")]
    output: PathBuf,

    /// Fail instead of warn when a metadata row has no reads under the
    /// run directory, or reads have no metadata row.
    #[clap(long)]
    strict: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let platform: Platform = args.platform.parse()?;
    let scheme = SchemeRef::resolve(&args.amplicon_scheme, args.custom_scheme_path.as_deref())?;

    let def = SampleSheetDef {
        platform,
        run_dir: args.run_dir,
        metadata: args.metadata,
        scheme,
        join_policy: if args.strict {
            JoinPolicy::Strict
        } else {
            JoinPolicy::Lenient
        },
    };
    def.build()?.write_csv(&args.output)?;
    Ok(())
}
