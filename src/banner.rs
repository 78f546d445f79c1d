//! Startup banner and run summary display.

use std::path::Path;

use crate::consts::{AUTHOR, HOMEPAGE, REPO, format_number};
use crate::progress::RunSummary;

/// Run configuration for display in the startup banner.
pub struct BannerInfo<'a> {
    pub model: &'a str,
    pub api_base: &'a str,
    pub api_key: &'a str,
    pub infile: &'a Path,
    pub outfile: &'a Path,
    pub concurrency: usize,
    pub max_steps: usize,
    pub summary_interval: usize,
    pub prompts: &'a str,
}

pub fn render_banner(info: &BannerInfo) -> String {
    format!(
        r#"
   ╔═══════════════════════════════════════╗
   ║              Q U A R R Y              ║
   ║    many questions, one answer each    ║
   ╚═══════════════════════════════════════╝

   version   {}
   by        {}
   home      {}
   repo      {}
   model     {} ({})
   api key   {}
   input     {}
   output    {}
   workers   {}
   steps     {} (summary every {})
   prompts   {}
"#,
        env!("CARGO_PKG_VERSION"),
        AUTHOR,
        HOMEPAGE,
        REPO,
        info.model,
        info.api_base,
        info.api_key,
        info.infile.display(),
        info.outfile.display(),
        info.concurrency,
        info.max_steps,
        info.summary_interval,
        info.prompts,
    )
}

pub fn print_banner(info: &BannerInfo) {
    println!("{}", render_banner(info));
}

pub fn render_summary(summary: &RunSummary) -> String {
    let n = |v: usize| format_number(v as u64);
    format!(
        "run: {} new ({} ok, {} failed), {} done before, {} / {} done in total",
        n(summary.newly_completed),
        n(summary.succeeded),
        n(summary.failed),
        n(summary.already_done),
        n(summary.cumulative()),
        n(summary.total),
    )
}

pub fn print_run_summary(summary: &RunSummary) {
    println!("{}", render_summary(summary));
}
