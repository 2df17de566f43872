use crate::config::RunConfig;
use crate::coverage::{CoverageStats, gather_coverage};
use crate::report::{
    CoverallsReport, PartialReport, build_job_flag_name, git_hash, git_header, read_props,
    repo_token, service_from_env,
};
use crate::tools::guess_tool;
use crate::utils::io::save_report;
use crate::utils::paths::absolute;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "covgather",
    about = "Gather gcov, llvm-cov or Cobertura coverage into a Coveralls report",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the full report for upload
    Report(GatherArgs),

    /// Build a simplified report for a later merge
    Partial(GatherArgs),
}

#[derive(Args, Debug, Clone)]
pub struct GatherArgs {
    /// Path to the gcov or llvm-cov program
    #[arg(
        long,
        value_name = "PATH",
        required_unless_present = "cobertura",
        conflicts_with = "cobertura"
    )]
    pub gcov: Option<PathBuf>,

    /// Look for Cobertura .xml files instead of running gcov
    #[arg(long)]
    pub cobertura: bool,

    /// Path to llvm-profdata, required with llvm-cov
    #[arg(long, value_name = "PATH")]
    pub merge: Option<PathBuf>,

    /// Name of the tested application
    #[arg(long, default_value = "")]
    pub target: String,

    /// Directory for source files
    #[arg(long, value_name = "DIR")]
    pub src_dir: PathBuf,

    /// Directory for generated files
    #[arg(long, value_name = "DIR")]
    pub bin_dir: PathBuf,

    /// Directory for temporary intermediate files
    #[arg(long, value_name = "DIR")]
    pub int_dir: PathBuf,

    /// Directory filters for relevant sources, separated with ':'
    #[arg(long, value_name = "DIR:DIR:...", value_delimiter = ':', required = true)]
    pub dirs: Vec<PathBuf>,

    /// Output JSON file for Coveralls
    #[arg(long, value_name = "JSON")]
    pub out: PathBuf,

    /// Extra tag enabling `*COV_EXCL_START[tag]` markers
    #[arg(long = "exclude-tag", value_name = "TAG")]
    pub exclude_tags: Vec<String>,

    /// Number of threads parsing intermediate files
    #[arg(short, long, default_value_t = num_cpus::get())]
    pub jobs: usize,

    /// Print the report header before gathering
    #[arg(long)]
    pub debug: bool,
}

impl GatherArgs {
    pub fn to_config(&self) -> RunConfig {
        let mut config = RunConfig::new(
            &self.src_dir,
            &self.bin_dir,
            &self.int_dir,
            self.dirs.clone(),
        );
        config.gcov = self.gcov.clone();
        config.cobertura = self.cobertura;
        config.merge = self.merge.clone();
        config.target = self.target.clone();
        config.tags = self.exclude_tags.clone();
        config
    }
}

fn configure_thread_pool(jobs: usize) {
    if let Err(e) = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs.max(1))
        .build_global()
    {
        log::debug!("Keeping the existing thread pool: {}", e);
    }
}

/// Output path as shown to the user, relative to the source root when possible
fn display_path(out: &Path, src_dir: &Path) -> String {
    out.strip_prefix(src_dir)
        .unwrap_or(out)
        .display()
        .to_string()
}

pub fn execute_report_command(args: &GatherArgs) -> Result<(), Box<dyn std::error::Error>> {
    configure_thread_pool(args.jobs);
    let config = args.to_config();

    let flag_name = build_job_flag_name(read_props(&config.bin_dir));
    let service = service_from_env();
    println!("Preparing Coveralls for {}.", service.display_name);

    let git = git_header(&config.git, &config.src_dir)?;
    let mut report = CoverallsReport::new(
        service,
        repo_token(|name| std::env::var(name).ok()),
        chrono::Utc::now(),
        &flag_name,
        git,
    );
    if args.debug {
        println!("{:#?}", report);
    }

    let tool = guess_tool(&config)?;
    let mut stats = CoverageStats::new();
    report.source_files = gather_coverage(&tool, &config, &mut stats)?;

    let out = absolute(&args.out);
    println!("-- Writing {}", display_path(&out, &config.src_dir));
    save_report(&report, &out)?;

    stats.report();
    Ok(())
}

pub fn execute_partial_command(args: &GatherArgs) -> Result<(), Box<dyn std::error::Error>> {
    configure_thread_pool(args.jobs);
    let config = args.to_config();

    println!("-- Building simplified report for later merge");

    let mut report = PartialReport::new(git_hash(&config.git, &config.src_dir)?);
    if args.debug {
        println!("{:#?}", report);
    }

    let tool = guess_tool(&config)?;
    let mut stats = CoverageStats::new();
    report.source_files = gather_coverage(&tool, &config, &mut stats)?;

    let out = absolute(&args.out);
    println!("-- Writing {}", display_path(&out, &config.src_dir));
    save_report(&report, &out)?;

    stats.report();
    Ok(())
}
