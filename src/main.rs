use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};

use quarry::banner::{BannerInfo, print_banner, print_run_summary};
use quarry::config::{
    DuplicatePolicy, ProviderConfig, ResumePolicy, RunConfig, SessionConfig, jitter_interval,
    resolve_input, resolve_output,
};
use quarry::consts::{
    DEFAULT_CONCURRENCY, DEFAULT_INPUT_DIR, DEFAULT_MAX_STEPS, DEFAULT_RESULTS_DIR,
    DEFAULT_SUMMARY_INTERVAL, DEFAULT_TOOL_TIMEOUT_SECS,
};
use quarry::inspect::{Inspector, LocalInspector};
use quarry::processor::agent::AgentProcessor;
use quarry::prompts::PromptVariant;
use quarry::thinker::openai::OpenAiThinker;
use quarry::tools::ToolRegistry;
use quarry::tools::inspect::InspectTool;
use quarry::{logging, run_batch};

#[derive(Parser)]
#[command(
    name = "quarry",
    version,
    about = "Run an agent over every question in a file, resumably."
)]
struct Cli {
    /// Input file (.json array or .jsonl). Bare names are read from --input-dir
    #[arg(long)]
    infile: PathBuf,

    /// Directory for bare input names
    #[arg(long, default_value = DEFAULT_INPUT_DIR)]
    input_dir: PathBuf,

    /// Output file. `.json` keeps one array, anything else appends lines.
    /// Defaults to <results-dir>/<input stem>.jsonl
    #[arg(long)]
    outfile: Option<PathBuf>,

    /// Directory for bare output names
    #[arg(long, default_value = DEFAULT_RESULTS_DIR)]
    results_dir: PathBuf,

    /// Only process the first N input items
    #[arg(long)]
    sample_num: Option<usize>,

    /// Steps between progress summaries; jittered by one per run
    #[arg(long, default_value_t = DEFAULT_SUMMARY_INTERVAL)]
    summary_interval: usize,

    /// System prompt variant
    #[arg(long, value_enum, default_value_t = PromptVariant::Default)]
    prompts_type: PromptVariant,

    /// Items processed at the same time
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Maximum agent steps per item
    #[arg(long, default_value_t = DEFAULT_MAX_STEPS)]
    max_steps: usize,

    /// Which prior results count as done
    #[arg(long, value_enum, default_value_t = ResumePolicy::SkipAll)]
    resume: ResumePolicy,

    /// What to do with repeated questions in the input
    #[arg(long, value_enum, default_value_t = DuplicatePolicy::Skip)]
    duplicates: DuplicatePolicy,

    /// Model name (overrides DEFAULT_MODEL)
    #[arg(long)]
    model: Option<String>,

    /// Tool execution timeout in seconds
    #[arg(long, default_value_t = DEFAULT_TOOL_TIMEOUT_SECS)]
    tool_timeout: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let cli = Cli::parse();

    let provider = ProviderConfig::from_env(cli.model.clone())?;
    info!(
        api_base = %provider.api_base,
        model = %provider.model,
        api_key = %provider.masked_key(),
        "provider configured"
    );

    let infile = resolve_input(&cli.infile, &cli.input_dir);
    let outfile = resolve_output(cli.outfile.as_deref(), &infile, &cli.results_dir);
    let summary_interval = jitter_interval(cli.summary_interval);

    let config = RunConfig {
        infile,
        outfile,
        sample: cli.sample_num,
        concurrency: cli.concurrency,
        resume: cli.resume,
        duplicates: cli.duplicates,
        session: SessionConfig {
            summary_interval,
            prompt_variant: cli.prompts_type,
            max_steps: cli.max_steps,
        },
    };
    config.validate()?;

    print_banner(&BannerInfo {
        model: &provider.model,
        api_base: &provider.api_base,
        api_key: &provider.masked_key(),
        infile: &config.infile,
        outfile: &config.outfile,
        concurrency: config.concurrency,
        max_steps: config.session.max_steps,
        summary_interval,
        prompts: config.session.prompt_variant.as_str(),
    });

    let inspector: Arc<dyn Inspector> = Arc::new(LocalInspector::default());
    let tools = Arc::new(ToolRegistry::new());
    tools
        .register(Arc::new(InspectTool::new(Arc::clone(&inspector))))
        .await;

    let thinker = Arc::new(OpenAiThinker::new(provider)?);
    let processor = Arc::new(AgentProcessor::new(
        thinker,
        tools,
        Duration::from_secs(cli.tool_timeout),
    ));

    let show_progress = std::io::stderr().is_terminal();

    tokio::select! {
        result = run_batch(&config, processor, inspector, show_progress) => {
            let summary = result?;
            print_run_summary(&summary);
        }
        _ = tokio::signal::ctrl_c() => {
            warn!(
                output = %config.outfile.display(),
                "interrupted; finished results are saved, rerun to resume"
            );
        }
    }

    Ok(())
}
