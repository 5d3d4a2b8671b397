//! rarefy - repeated rarefaction CLI
//!
//! Command-line interface for rarefied diversity analyses and for handing
//! count tables to external differential abundance engines.

use clap::{Args, Parser, Subcommand, ValueEnum};
use env_logger::Env;
use log::{info, warn};
use microbiome_rarefy::aggregate::AcatStatistic;
use microbiome_rarefy::analysis::{run_alpha, run_analysis, run_permanova, AlphaConfig, AnalysisConfig, AnalysisReport};
use microbiome_rarefy::daa::{CommandEngine, Correction, DaEngine, DaOutputs, DaRequest};
use microbiome_rarefy::data::Dataset;
use microbiome_rarefy::diversity::{AlphaIndex, DistanceMetric};
use microbiome_rarefy::error::Result;
use microbiome_rarefy::rarefy::{rarefy_replicates, LowDepthPolicy, RarefactionConfig};
use microbiome_rarefy::taxonomy::clean_feature_ids;
use microbiome_rarefy::test::PermanovaConfig;
use std::fs;
use std::path::{Path, PathBuf};

/// CLI-friendly low-depth policy
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliPolicy {
    /// Leave short samples out of every replicate
    Exclude,
    /// Stop with an error
    Fail,
}

impl From<CliPolicy> for LowDepthPolicy {
    fn from(policy: CliPolicy) -> Self {
        match policy {
            CliPolicy::Exclude => LowDepthPolicy::Exclude,
            CliPolicy::Fail => LowDepthPolicy::Fail,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum CliAcat {
    /// Sum the Cauchy quantiles
    Sum,
    /// Average the Cauchy quantiles
    Mean,
}

impl From<CliAcat> for AcatStatistic {
    fn from(acat: CliAcat) -> Self {
        match acat {
            CliAcat::Sum => AcatStatistic::Sum,
            CliAcat::Mean => AcatStatistic::Mean,
        }
    }
}

/// Repeated rarefaction for microbiome count tables
#[derive(Parser)]
#[command(name = "rarefy")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Count table and metadata to analyse.
#[derive(Args)]
struct InputArgs {
    /// Path to count matrix TSV (features x samples)
    #[arg(short = 'c', long)]
    counts: PathBuf,

    /// Path to metadata TSV (first column sample ID)
    #[arg(short, long)]
    metadata: PathBuf,

    /// Replace lineage feature IDs with cleaned taxon labels
    #[arg(long)]
    clean_labels: bool,

    /// Separator between ranks in lineage feature IDs
    #[arg(long, default_value = ";")]
    lineage_sep: char,
}

#[derive(Args)]
struct RarefactionArgs {
    /// Reads kept per sample
    #[arg(short, long)]
    depth: u64,

    /// Number of rarefied replicates
    #[arg(short = 'n', long, default_value = "100")]
    replicates: usize,

    /// Base random seed
    #[arg(long, default_value = "42")]
    seed: u64,

    /// What to do with samples below the depth
    #[arg(long, value_enum, default_value = "exclude")]
    policy: CliPolicy,

    /// How replicate p-values are combined by ACAT
    #[arg(long, value_enum, default_value = "sum")]
    acat: CliAcat,
}

impl RarefactionArgs {
    fn config(&self) -> RarefactionConfig {
        RarefactionConfig::new(self.depth, self.replicates)
            .with_seed(self.seed)
            .with_policy(self.policy.into())
            .with_acat(self.acat.into())
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Compare alpha diversity between groups across rarefied replicates
    Alpha {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        rarefaction: RarefactionArgs,

        /// Diversity index (observed, shannon, simpson, invsimpson, chao1, pielou)
        #[arg(short, long, default_value = "shannon")]
        index: AlphaIndex,

        /// Metadata column holding the groups
        #[arg(short, long, default_value = "group")]
        group: String,

        /// Output path for per-replicate results TSV
        #[arg(short, long)]
        output: PathBuf,

        /// Output path for per-sample median diversity TSV
        #[arg(long)]
        samples: Option<PathBuf>,

        /// Output path for the full JSON report
        #[arg(long)]
        json: Option<PathBuf>,
    },

    /// PERMANOVA on a distance matrix per rarefied replicate
    Permanova {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        rarefaction: RarefactionArgs,

        /// Formula over metadata columns (e.g., "~ group")
        #[arg(short, long, default_value = "~ group")]
        formula: String,

        /// Distance metric (bray, jaccard, euclidean, manhattan, aitchison)
        #[arg(long, default_value = "bray")]
        metric: DistanceMetric,

        /// Metadata column restricting permutations to within its levels
        #[arg(long)]
        strata: Option<String>,

        /// Permutations per replicate
        #[arg(short, long, default_value = "999")]
        permutations: usize,

        /// Output path for per-replicate results TSV
        #[arg(short, long)]
        output: PathBuf,

        /// Output path for the full JSON report
        #[arg(long)]
        json: Option<PathBuf>,
    },

    /// Write rarefied count tables, one TSV per replicate
    Rarefy {
        /// Path to count matrix TSV
        #[arg(short = 'c', long)]
        counts: PathBuf,

        #[command(flatten)]
        rarefaction: RarefactionArgs,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Run an external differential abundance engine
    Da {
        #[command(flatten)]
        input: InputArgs,

        /// Engine request YAML (method: ancombc2 | aldex2 | maaslin2)
        #[arg(long)]
        config: PathBuf,

        /// Program that runs the engine; receives the work directory as its last argument
        #[arg(long)]
        program: PathBuf,

        /// Extra arguments passed to the program before the work directory
        #[arg(long, allow_hyphen_values = true)]
        arg: Vec<String>,

        /// Recompute q-values per contrast (BH, bonferroni, holm, none)
        #[arg(long)]
        correction: Option<Correction>,

        /// Round numbers to this many significant digits
        #[arg(long)]
        digits: Option<usize>,

        /// Output directory for result tables
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Write an example analysis configuration YAML
    Example {
        /// Analysis type (alpha, permanova)
        #[arg(short, long, default_value = "alpha")]
        analysis: String,

        /// Output path for the configuration file
        #[arg(short, long, default_value = "analysis.yaml")]
        output: PathBuf,
    },

    /// Run an analysis from a YAML configuration file
    Run {
        /// Path to analysis configuration YAML
        #[arg(long)]
        config: PathBuf,

        #[command(flatten)]
        input: InputArgs,

        /// Output path for per-replicate results TSV
        #[arg(short, long)]
        output: PathBuf,

        /// Output path for the full JSON report
        #[arg(long)]
        json: Option<PathBuf>,
    },
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Alpha {
            input,
            rarefaction,
            index,
            group,
            output,
            samples,
            json,
        } => cmd_alpha(
            &input,
            &rarefaction.config(),
            &AlphaConfig::new(index, &group),
            &output,
            samples.as_deref(),
            json.as_deref(),
        ),

        Commands::Permanova {
            input,
            rarefaction,
            formula,
            metric,
            strata,
            permutations,
            output,
            json,
        } => {
            let mut config = PermanovaConfig::new(&formula)
                .with_metric(metric)
                .with_permutations(permutations)
                .with_seed(rarefaction.seed);
            if let Some(column) = &strata {
                config = config.with_strata(column);
            }
            cmd_permanova(&input, &rarefaction.config(), &config, &output, json.as_deref())
        }

        Commands::Rarefy {
            counts,
            rarefaction,
            output,
        } => cmd_rarefy(&counts, &rarefaction.config(), &output),

        Commands::Da {
            input,
            config,
            program,
            arg,
            correction,
            digits,
            output,
        } => cmd_da(&input, &config, program, arg, correction, digits, &output),

        Commands::Example { analysis, output } => cmd_example(&analysis, &output),

        Commands::Run {
            config,
            input,
            output,
            json,
        } => cmd_run(&config, &input, &output, json.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn load_dataset(input: &InputArgs) -> Result<Dataset> {
    info!("Loading {:?} and {:?}", input.counts, input.metadata);
    let dataset = Dataset::from_tsv(&input.counts, &input.metadata)?;
    let dataset = if input.clean_labels {
        let counts = clean_feature_ids(dataset.counts(), input.lineage_sep)?;
        dataset.with_counts(counts)?
    } else {
        dataset
    };
    info!(
        "Loaded {} features x {} samples ({} dropped when joining)",
        dataset.counts().n_features(),
        dataset.n_samples(),
        dataset.dropped().len()
    );
    Ok(dataset)
}

fn write_report(report: &AnalysisReport, output: &Path, json: Option<&Path>) -> Result<()> {
    report.to_tsv(output)?;
    info!("Wrote per-replicate results to {:?}", output);
    if let Some(path) = json {
        fs::write(path, report.to_json()?)?;
        info!("Wrote JSON report to {:?}", path);
    }
    for sample in report.excluded() {
        warn!(
            "Sample '{}' (depth {}) was excluded from every replicate",
            sample.sample_id, sample.depth
        );
    }
    eprintln!("{}", report.aggregated());
    Ok(())
}

fn cmd_alpha(
    input: &InputArgs,
    rarefaction: &RarefactionConfig,
    config: &AlphaConfig,
    output: &Path,
    samples: Option<&Path>,
    json: Option<&Path>,
) -> Result<()> {
    let dataset = load_dataset(input)?;
    let report = run_alpha(&dataset, rarefaction, config)?;
    if let Some(path) = samples {
        report.write_sample_tsv(path)?;
        info!("Wrote per-sample medians to {:?}", path);
    }
    write_report(&AnalysisReport::Alpha(report), output, json)
}

fn cmd_permanova(
    input: &InputArgs,
    rarefaction: &RarefactionConfig,
    config: &PermanovaConfig,
    output: &Path,
    json: Option<&Path>,
) -> Result<()> {
    let dataset = load_dataset(input)?;
    let report = run_permanova(&dataset, rarefaction, config)?;
    eprintln!("Median R²:            {:.4}", report.r_squared_median);
    write_report(&AnalysisReport::Permanova(report), output, json)
}

fn cmd_rarefy(counts: &Path, rarefaction: &RarefactionConfig, output: &Path) -> Result<()> {
    let counts = microbiome_rarefy::data::CountMatrix::from_tsv(counts)?;
    let set = rarefy_replicates(&counts, rarefaction)?;

    fs::create_dir_all(output)?;
    let width = set.len().to_string().len();
    for (i, table) in set.iter().enumerate() {
        table.to_tsv(output.join(format!("replicate_{:0width$}.tsv", i + 1, width = width)))?;
    }
    if !set.excluded().is_empty() {
        let lines: Vec<String> = std::iter::once("sample_id\tdepth".to_string())
            .chain(
                set.excluded()
                    .iter()
                    .map(|s| format!("{}\t{}", s.sample_id, s.depth)),
            )
            .collect();
        fs::write(output.join("excluded.tsv"), lines.join("\n") + "\n")?;
    }

    eprintln!(
        "Wrote {} replicates of {} samples to {:?} ({} excluded)",
        set.len(),
        set.retained_samples().len(),
        output,
        set.excluded().len()
    );
    Ok(())
}

fn write_outputs(
    outputs: &DaOutputs,
    correction: Option<Correction>,
    digits: Option<usize>,
    output: &Path,
) -> Result<()> {
    fs::create_dir_all(output)?;
    for out in outputs.iter() {
        let stem = out.kind().map_or("primary", |k| k.name());
        let mut table = out.table().clone();
        if let Some(c) = correction {
            table = table.with_correction(c);
        }
        if let Some(d) = digits {
            table = table.round_signif(d);
        }
        let path = output.join(format!("{}.tsv", stem));
        table.to_tsv(&path)?;
        info!("Wrote {} rows to {:?}", table.len(), path);
    }
    Ok(())
}

fn cmd_da(
    input: &InputArgs,
    config: &Path,
    program: PathBuf,
    args: Vec<String>,
    correction: Option<Correction>,
    digits: Option<usize>,
    output: &Path,
) -> Result<()> {
    let request = DaRequest::from_yaml(&fs::read_to_string(config)?)?;
    let dataset = load_dataset(input)?;

    let engine = CommandEngine::new(request.method(), program).with_args(args);
    let outputs = engine.run(&dataset, &request)?;
    write_outputs(&outputs, correction, digits, output)?;

    if let Some(primary) = outputs.primary() {
        let alpha = 0.05;
        eprintln!(
            "{}: {} rows, {} with q < {}",
            engine.name(),
            primary.len(),
            primary.significant(alpha).len(),
            alpha
        );
    }
    Ok(())
}

fn cmd_example(analysis: &str, output: &Path) -> Result<()> {
    let config = AnalysisConfig::example(analysis)?;
    let yaml = config.to_yaml()?;

    fs::write(output, &yaml)?;
    eprintln!("Wrote example {} configuration to {:?}", config.name(), output);
    eprintln!();
    eprintln!("Contents:");
    println!("{}", yaml);
    Ok(())
}

fn cmd_run(config_path: &Path, input: &InputArgs, output: &Path, json: Option<&Path>) -> Result<()> {
    info!("Loading analysis configuration from {:?}", config_path);
    let config = AnalysisConfig::from_yaml(&fs::read_to_string(config_path)?)?;
    let dataset = load_dataset(input)?;

    info!("Running {} analysis", config.name());
    let report = run_analysis(&dataset, &config)?;
    write_report(&report, output, json)
}
