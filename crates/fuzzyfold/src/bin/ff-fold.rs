use std::io::Write;
use std::rc::Rc;

use anyhow::Result;
use clap::{ArgAction, Args, Parser};
use colored::*;
use env_logger::Builder;
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;

use ff_constraints::Reference;
use ff_fold::{compute_bpp, fold_mfe, fold_pf, sample_structure, traceback, FoldCompound, FoldOptions};
use ff_fold2d::{two_d_fold, TwoDFoldCompound};
use ff_gquad::GquadTable;
use ff_structure::{DotBracketVec, PairTable};

use fuzzyfold::energy_parsers::EnergyModelArguments;
use fuzzyfold::input_parsers::{read_fasta_like_input, ruler};

#[derive(Debug, Args)]
pub struct FoldInput {
    /// Input file (FASTA-like), or "-" for stdin
    #[arg(value_name = "INPUT", default_value = "-")]
    pub input: String,

    /// Verbosity (-v = info, -vv = debug)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Args)]
pub struct FoldArguments {
    /// Treat the sequence as circular
    #[arg(long)]
    pub circular: bool,

    /// Include G-quadruplex motifs in the recursion
    #[arg(long)]
    pub gquad: bool,

    /// Compute the partition function and base-pair probabilities
    #[arg(short = 'p', long)]
    pub partition_function: bool,

    /// Draw this many stochastic samples from the Boltzmann ensemble (implies -p)
    #[arg(long, value_name = "N")]
    pub samples: Option<usize>,

    /// Seed for the stochastic sampler
    #[arg(long, value_name = "SEED", default_value = "0")]
    pub seed: u64,

    /// First reference structure for 2D distance-class folding
    #[arg(long, value_name = "DOTBRACKET")]
    pub ref1: Option<String>,

    /// Second reference structure for 2D distance-class folding
    #[arg(long, value_name = "DOTBRACKET")]
    pub ref2: Option<String>,

    /// Maximum base-pair distance to reference 1 (unbounded if omitted)
    #[arg(long, value_name = "N")]
    pub maxdist1: Option<u32>,

    /// Maximum base-pair distance to reference 2 (unbounded if omitted)
    #[arg(long, value_name = "N")]
    pub maxdist2: Option<u32>,
}

#[derive(Debug, Parser)]
#[command(name = "ff-fold")]
#[command(author, version, about)]
pub struct Cli {
    #[command(flatten)]
    pub fold: FoldInput,

    #[command(flatten, next_help_heading = "Energy model parameters")]
    pub energy: EnergyModelArguments,

    #[command(flatten, next_help_heading = "Folding parameters")]
    pub options: FoldArguments,
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.fold.verbose);

    let tables = Rc::new(cli.energy.load_tables()?);
    let (header, sequence, _) = read_fasta_like_input(&cli.fold.input)?;
    if let Some(h) = header {
        println!("{}", h.yellow());
    }

    let fold_options = FoldOptions {
        dangles: cli.energy.loop_energy_config().dangles,
        temperature: cli.energy.temperature,
        pf_scale: None,
        circular: cli.options.circular,
        gquad: cli.options.gquad,
        no_gu: cli.energy.no_gu,
        no_closing_gu: cli.energy.no_closing_gu,
        gquad_layer_mismatch: 1,
        gquad_layer_mismatch_max: 1,
    };
    let fc = FoldCompound::new(sequence.clone(), tables, fold_options)?;

    info!("{}", ruler(fc.len() - 1).magenta());

    let mfe_tables = fold_mfe(&fc);
    let mfe_result = traceback(&fc, &mfe_tables);
    let mut mfe_dbv = DotBracketVec::from(&mfe_result.pairs);
    mfe_dbv.mark_gquad(&mfe_result.gquad_columns);
    println!(
        "{}\n{} {}",
        sequence,
        mfe_dbv,
        format!("{:>6.2}", mfe_tables.mfe() as f64 / 100.0).green()
    );

    if cli.options.partition_function || cli.options.samples.is_some() {
        let pf_tables = fold_pf(&fc)?;
        let log_q = pf_tables.partition_function().ln() + (fc.len() as f64) * fc.default_pf_scale().ln();
        let ensemble_free_energy = -fc.kt() * log_q;
        println!(
            "{}",
            format!("free energy of ensemble = {:>6.2} kcal/mol", ensemble_free_energy).cyan()
        );

        let bpp = compute_bpp(&fc, &pf_tables)?;
        for i in 0..fc.len() {
            for j in (i + 1)..fc.len() {
                let p = bpp.get(i, j);
                if p <= 0.01 {
                    continue;
                }
                let is_gquad_footprint = pf_tables.gquad_pf.as_ref().is_some_and(|gq| gq.get(i, j).is_some());
                if is_gquad_footprint {
                    for (pos, col_p) in GquadTable::distribute_probability(&sequence, i, j, p) {
                        if col_p > 0.01 {
                            println!("{:>4} {:>4} {:>6.4} (gquad)", pos + 1, pos + 1, col_p);
                        }
                    }
                } else {
                    println!("{:>4} {:>4} {:>6.4}", i + 1, j + 1, p);
                }
            }
        }

        if let Some(n) = cli.options.samples {
            let mut rng = StdRng::seed_from_u64(cli.options.seed);
            for _ in 0..n {
                let sampled = sample_structure(&fc, &pf_tables, &mut rng)?;
                println!("{}", DotBracketVec::from(&sampled));
            }
        }
    }

    if let (Some(r1), Some(r2)) = (&cli.options.ref1, &cli.options.ref2) {
        let ref1 = Reference::new(&sequence, &PairTable::try_from(r1.as_str())?)?;
        let ref2 = Reference::new(&sequence, &PairTable::try_from(r2.as_str())?)?;
        let tdc = TwoDFoldCompound::new(&fc, ref1, ref2, cli.options.maxdist1, cli.options.maxdist2);
        let two_d = two_d_fold(&tdc);
        for sol in two_d.solutions() {
            println!("{:>4} {:>4} {:>8.2}", sol.k, sol.l, sol.en);
        }
        println!("{:>4}", "INF".red());
    }

    Ok(())
}
