use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::*;

use isoenum::io::{read_molecule_path, write_variants};
use isoenum::*;

#[derive(Parser)]
#[command(
    name = "isoenum",
    about = "Enumerate isotopically labeled variants and NMR coupling patterns of a molecule",
    version,
    propagate_version = true
)]
struct Cli {
    /// Log level (error, warn, info, debug, trace)
    #[arg(long, value_name = "LEVEL", default_value = "warn", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Enumerate isotope labeling schemas
    Name(NameArgs),

    /// Enumerate NMR coupling combinations and group them by magnetic equivalence
    Nmr(NmrArgs),

    /// Apply ionization states
    Chg(ChgArgs),
}

/// I/O options shared by all commands.
#[derive(Args)]
struct IoOptions {
    /// Atom table CSV (position,symbol,charge,isotope,bonds)
    #[arg(value_name = "MOLECULE")]
    molecule: PathBuf,

    /// Output CSV (stdout if omitted)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct NameArgs {
    #[command(flatten)]
    io: IoOptions,

    /// Isotope table CSV (symbol,isotopes,default); the built-in table if omitted
    #[arg(long, value_name = "FILE")]
    isotopes: Option<PathBuf>,

    /// Label every atom of an element, ISOTOPE:ELEMENT
    #[arg(short, long, value_name = "RULES", value_delimiter = ',')]
    all: Vec<String>,

    /// Label one atom, ISOTOPE:ELEMENT:POSITION
    #[arg(short, long, value_name = "RULES", value_delimiter = ',')]
    specific: Vec<String>,

    /// Enumerate labelings, ISOTOPE:ELEMENT[:MIN]:MAX or ISOTOPE:ELEMENT
    #[arg(short, long, value_name = "RULES", value_delimiter = ',')]
    enumerate: Vec<String>,

    /// Fill unlabeled atoms with their default isotope
    #[arg(short, long)]
    complete: bool,

    /// Ignore isotopes already present in the molecule
    #[arg(long)]
    ignore_existing: bool,
}

#[derive(Args)]
struct NmrArgs {
    #[command(flatten)]
    io: IoOptions,

    /// Experiment type (1D1H, 1DCHSQC)
    #[arg(short = 't', long = "type", value_name = "EXPERIMENT", default_value = "1D1H")]
    experiment: String,

    /// Coupling types to observe (Resonance/HResonance, J1CH, J2HH, J3HH); all if omitted
    #[arg(long, value_name = "TYPES", value_delimiter = ',')]
    couplings: Vec<String>,

    /// Decoupled elements
    #[arg(short, long, value_name = "ELEMENTS", value_delimiter = ',')]
    decoupled: Vec<String>,

    /// Expand combinations into partial occupancy subsets
    #[arg(long)]
    subset: bool,
}

#[derive(Args)]
struct ChgArgs {
    #[command(flatten)]
    io: IoOptions,

    /// Ionization states, ELEMENT:POSITION:CHARGE
    #[arg(short, long, value_name = "STATES", value_delimiter = ',', allow_hyphen_values = true)]
    states: Vec<String>,
}

fn output(path: Option<&PathBuf>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => Box::new(File::create(path).with_context(|| format!("Failed to create {}", path.display()))?),
        None => Box::new(io::stdout().lock()),
    })
}

fn run_name(args: NameArgs) -> Result<()> {
    let molecule = read_molecule_path(&args.io.molecule)?;
    let config = match &args.isotopes {
        Some(path) => IsotopeConfiguration::from_csv_path(path)
            .with_context(|| format!("Failed to load isotope table {}", path.display()))?,
        None => IsotopeConfiguration::standard(),
    };
    let request = LabelingRequest {
        specific: args.specific,
        all: args.all,
        enumerate: args.enumerate,
        complete: args.complete,
        ignore_existing: args.ignore_existing,
    };

    let variants = label_variants(&molecule, &config, &request, &MorganCanonicalizer::default())?;
    write_variants(output(args.io.output.as_ref())?, &molecule, &variants, None)
}

fn run_nmr(args: NmrArgs) -> Result<()> {
    let molecule = read_molecule_path(&args.io.molecule)?;
    let experiment = NmrExperiment::new(&args.experiment, &args.couplings, &args.decoupled)?;

    let result = nmr_variants(&molecule, &experiment, args.subset, &MorganCanonicalizer::default())?;
    write_variants(
        output(args.io.output.as_ref())?,
        &molecule,
        &result.variants,
        Some(&result.grouping),
    )
}

fn run_chg(args: ChgArgs) -> Result<()> {
    let molecule = read_molecule_path(&args.io.molecule)?;
    let states = args
        .states
        .iter()
        .map(|state| parse_charge_state(state))
        .collect::<Result<Vec<_>, _>>()?;

    let variant = charge_variant(&molecule, &states, &MorganCanonicalizer::default())?;
    write_variants(output(args.io.output.as_ref())?, &molecule, &[variant], None)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let result = match cli.command {
        Command::Name(args) => run_name(args),
        Command::Nmr(args) => run_nmr(args),
        Command::Chg(args) => run_chg(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
