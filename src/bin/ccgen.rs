//! CLI driver: reads a constant matrix, decomposes it into shift-add
//! factors, and emits the resulting netlist as VHDL.

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use log::{info, warn};

use ccgen::codegen::{lzd::gen_lzd, lzd::write_dot, p2d::gen_p2d};
use ccgen::config::{Config, OperandCap};
use ccgen::decomp::{lzd, p2d};
use ccgen::emit;
use ccgen::hir::Builder;
use ccgen::matrix::Matrix;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Method {
    P2d,
    Lzd,
}

/// Compiles a constant matrix-vector multiply into a shift-add VHDL netlist.
#[derive(Parser, Debug)]
#[command(name = "ccgen", version, about)]
struct Args {
    /// Path to a JSON file holding the target matrix as rows of numbers.
    #[arg(long)]
    matrix: PathBuf,

    /// Decomposition strategy.
    #[arg(long, value_enum)]
    method: Method,

    /// Total fixed-point bit width.
    #[arg(long)]
    w: u32,

    /// Fractional bits. Defaults to `w / 2`.
    #[arg(long)]
    d: Option<u32>,

    /// P2D input column slice widths; must sum to the matrix's column count.
    #[arg(long, value_delimiter = ',')]
    slices: Vec<usize>,

    /// Operand cap per combined row: 2 or 3.
    #[arg(long, default_value_t = 2)]
    e: usize,

    #[arg(long, default_value_t = 48.0)]
    sqnr_target_db: f64,

    #[arg(long, default_value_t = ccgen::decomp::P_MAX)]
    p_max: usize,

    /// LZD adder budget.
    #[arg(long, default_value_t = 64)]
    max_add: usize,

    /// Optional DOT graph output path.
    #[arg(long)]
    graph: Option<PathBuf>,

    #[arg(long)]
    verbose: bool,

    #[arg(long, default_value = ".")]
    out_dir: PathBuf,
}

fn load_matrix(path: &PathBuf) -> anyhow::Result<Matrix> {
    let text = fs::read_to_string(path).with_context(|| format!("reading matrix file {}", path.display()))?;
    let rows: Vec<Vec<f64>> = serde_json::from_str(&text).with_context(|| format!("parsing matrix JSON {}", path.display()))?;
    Ok(Matrix::from_rows(rows))
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let e = match args.e {
        2 => OperandCap::Two,
        3 => OperandCap::Three,
        other => bail!("--e must be 2 or 3, got {other}"),
    };

    let mut config = Config::new(args.w);
    config.d = args.d.unwrap_or(args.w / 2);
    config.slices = args.slices;
    config.e = e;
    config.sqnr_target_db = args.sqnr_target_db;
    config.p_max = args.p_max;
    config.max_add = args.max_add;
    config.graph = args.graph;
    config.verbose = args.verbose;
    config.out_dir = args.out_dir;

    let matrix = load_matrix(&args.matrix)?;
    info!(
        "loaded {}x{} target matrix, w={} d={}",
        matrix.rows(),
        matrix.cols(),
        config.w,
        config.d
    );

    let mut builder = Builder::new();

    match args.method {
        Method::P2d => {
            let slices = if config.slices.is_empty() {
                vec![matrix.cols()]
            } else {
                config.slices.clone()
            };
            let result = p2d::decompose(&matrix, &slices, e.as_usize(), config.w, config.d, config.sqnr_target_db);
            let Some(result) = result else {
                warn!("P2D failed to reach {} dB within {} iterations", config.sqnr_target_db, config.p_max);
                bail!("P2D decomposition did not converge");
            };
            info!(
                "P2D converged in {} iterations, {} adders, {:.2} dB",
                result.iter_count, result.total_adds, result.final_sqnr
            );
            gen_p2d(&mut builder, &result, &slices, matrix.rows(), config.w, config.d)?;
        }
        Method::Lzd => {
            let result = lzd::decompose(&matrix, config.sqnr_target_db, config.max_add);
            let Some(result) = result else {
                warn!("LZD failed to reach {} dB within an adder budget of {}", config.sqnr_target_db, config.max_add);
                bail!("LZD decomposition did not converge");
            };
            info!(
                "LZD converged using {} adders, {:.2} dB",
                result.total_adds, result.final_sqnr
            );
            gen_lzd(&mut builder, &result, config.w, config.d)?;
            if let Some(graph_path) = &config.graph {
                write_dot(&result, graph_path)?;
                info!("wrote dictionary graph to {}", graph_path.display());
            }
        }
    }

    for id in 0..builder.module_count() {
        if builder.module(id).determined {
            emit::emit_module(&builder, id, &config.out_dir)?;
        }
    }

    Ok(())
}
