use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "ensemble",
    version,
    about = "Run ensembles of simulation-model invocations locally or on a cluster queue"
)]
pub struct Cli {
    /// Experiment config (JSON, or YAML for any other extension); flags override it
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Materialize the ensemble and run or submit its members
    Run(RunArgs),
    /// Draw a sample from the parameter space and print the table
    Sample(SampleArgs),
    /// Print the Cartesian product of discrete parameters
    Product(ProductArgs),
}

#[derive(Parser, Clone, Debug)]
pub struct RunArgs {
    /// Parameter specs NAME=SPEC[!DEFAULT]; discrete specs are combined as a product
    #[arg(short = 'p', long = "params", num_args = 1..)]
    pub params: Vec<String>,

    /// Ensemble table to run instead of -p
    #[arg(short = 'i', long, conflicts_with = "params")]
    pub params_file: Option<PathBuf>,

    /// Members to run, e.g. 0,2,4 or 0-9:2 (default: all)
    #[arg(short = 'j', long)]
    pub id: Option<String>,

    /// Also run the member that uses every parameter's default
    #[arg(long)]
    pub include_default: bool,

    /// Experiment directory
    #[arg(short = 'o', long, default_value = "out")]
    pub out_dir: PathBuf,

    /// Name run directories after the parameter values
    #[arg(short = 'a', long)]
    pub auto_dir: bool,

    /// Model executable
    #[arg(short = 'x', long)]
    pub executable: Option<String>,

    /// Argument template, e.g. "--alpha {alpha} --out {}"
    #[arg(long, allow_hyphen_values = true)]
    pub args: Option<String>,

    /// Prefix before each parameter value, e.g. "--{} " ({} is the name)
    #[arg(long, allow_hyphen_values = true)]
    pub arg_param_prefix: Option<String>,

    /// Prefix before the run directory, e.g. "--out "
    #[arg(long, allow_hyphen_values = true)]
    pub arg_out_prefix: Option<String>,

    /// Parameter file written into each run directory
    #[arg(long)]
    pub file_name: Option<String>,

    /// Parameter file format: linesep|json
    #[arg(long)]
    pub file_type: Option<String>,

    /// Submit one job per member to the cluster queue
    #[arg(short = 's', long)]
    pub submit: bool,

    /// Run members one after the other in the foreground
    #[arg(short = 't', long)]
    pub test: bool,

    /// Print the commands, run nothing
    #[arg(long)]
    pub echo: bool,

    /// Wait for background members or queued jobs to finish
    #[arg(short = 'w', long)]
    pub wait: bool,

    /// Submit all members as a single array job
    #[arg(short = 'b', long)]
    pub array: bool,

    /// Overwrite an existing experiment directory
    #[arg(short = 'f', long)]
    pub force: bool,

    /// Save the model section of the config to FILE for reuse with -c
    #[arg(long)]
    pub save_wrapper: Option<PathBuf>,

    /// Run as one task of an array job (no experiment setup)
    #[arg(long, hide = true)]
    pub task: bool,

    #[command(flatten)]
    pub queue: QueueArgs,
}

#[derive(clap::Args, Clone, Debug, Default)]
pub struct QueueArgs {
    /// Cluster queuing system: slurm|loadleveler|pbs
    #[arg(long)]
    pub scheduler: Option<String>,

    /// Queue / quality of service
    #[arg(long)]
    pub qos: Option<String>,

    #[arg(long)]
    pub job_name: Option<String>,

    #[arg(long)]
    pub account: Option<String>,

    /// Wall clock limit, e.g. 01:00:00
    #[arg(long)]
    pub walltime: Option<String>,
}

#[derive(Parser, Clone, Debug)]
pub struct SampleArgs {
    /// Parameter specs NAME=SPEC[!DEFAULT]
    #[arg(short = 'p', long = "params", num_args = 1.., required = true)]
    pub params: Vec<String>,

    /// Ensemble size
    #[arg(short = 'N', long)]
    pub size: usize,

    #[arg(long)]
    pub seed: Option<u64>,

    /// lhs|montecarlo
    #[arg(long, default_value = "lhs")]
    pub method: String,

    /// LHS criterion: classic|center|maximin|centermaximin|correlation
    #[arg(long)]
    pub criterion: Option<String>,

    /// LHS candidate designs to compare
    #[arg(long)]
    pub iterations: Option<usize>,

    /// Output file (default: stdout)
    #[arg(short = 'o', long)]
    pub out: Option<PathBuf>,
}

#[derive(Parser, Clone, Debug)]
pub struct ProductArgs {
    /// Discrete parameter specs, e.g. a=1,2,3 or b=0:1:5
    #[arg(short = 'p', long = "params", num_args = 1.., required = true)]
    pub params: Vec<String>,

    /// Output file (default: stdout)
    #[arg(short = 'o', long)]
    pub out: Option<PathBuf>,
}
