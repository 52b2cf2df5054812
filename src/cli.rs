//! Command handler functions for the covdelta CLI.
//!
//! Each `cmd_*` function returns its output instead of printing, making them
//! easy to test with a scripted [`HttpClient`].

use std::fmt::Write;
use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::circleci::{Locator, DEFAULT_PAGE_SIZE};
use crate::config::Config;
use crate::error::CovdeltaError;
use crate::http::{
    fetch_following_redirects, parse_url, without_query, HttpClient, DEFAULT_MAX_REDIRECTS,
};
use crate::model::CoverageReport;
use crate::report::Comparison;

/// Rendered comment body plus the reviewer warning, if coverage dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub body: String,
    pub warning: Option<String>,
}

impl Outcome {
    fn new(
        current: Option<&CoverageReport>,
        master: Option<&CoverageReport>,
        pr_label: &str,
        branch_label: &str,
    ) -> Self {
        let comparison = Comparison::new(current, master);
        Self {
            body: comparison.render(pr_label, branch_label),
            warning: comparison.warning(),
        }
    }
}

/// Tuning for build lookups.
#[derive(Debug, Clone, Copy)]
pub struct LookupOptions {
    pub page_size: usize,
    pub max_pages: Option<usize>,
    pub max_redirects: u32,
}

impl Default for LookupOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: None,
            max_redirects: DEFAULT_MAX_REDIRECTS,
        }
    }
}

fn locator<'a>(
    client: &'a dyn HttpClient,
    config: &'a Config,
    options: &LookupOptions,
) -> Locator<'a> {
    Locator::new(client, config)
        .page_size(options.page_size)
        .max_pages(options.max_pages)
        .max_redirects(options.max_redirects)
}

fn pr_label(config: &Config) -> Result<&str> {
    config.pr_number.as_deref().context(
        "pull request number is unknown (set CIRCLE_PULL_REQUEST or pass --pr)",
    )
}

/// Compare the latest coverage of the PR's source branch (or of the
/// current build, with `use_current_build`) against the latest coverage of
/// `target_branch`, both produced by `job`.
pub fn cmd_report(
    client: &dyn HttpClient,
    config: &Config,
    target_branch: &str,
    job: &str,
    use_current_build: bool,
    options: &LookupOptions,
) -> Result<Outcome> {
    let pr = pr_label(config)?;
    let locator = locator(client, config, options);

    eprintln!("Looking up {target_branch} coverage from job '{job}' ...");
    let master = locator
        .find_coverage(target_branch, job)
        .with_context(|| format!("Failed to fetch coverage for {target_branch}"))?;

    let current = if use_current_build {
        let build_num = config
            .build_num
            .context("current build number is unknown (set CIRCLE_BUILD_NUM or pass --build-num)")?;
        eprintln!("Looking up coverage of build #{build_num} ...");
        locator
            .find_build_coverage(build_num)
            .with_context(|| format!("Failed to fetch coverage for build #{build_num}"))?
    } else {
        let branch = config
            .branch
            .as_deref()
            .context("source branch is unknown (set CIRCLE_BRANCH or pass --branch)")?;
        eprintln!("Looking up {branch} coverage from job '{job}' ...");
        locator
            .find_coverage(branch, job)
            .with_context(|| format!("Failed to fetch coverage for {branch}"))?
    };

    if master.is_none() {
        eprintln!("Warning: no coverage report found for {target_branch}");
    }
    if current.is_none() {
        eprintln!("Warning: no coverage report found for the current branch");
    }

    Ok(Outcome::new(current.as_ref(), master.as_ref(), pr, target_branch))
}

/// Compare two coverage reports downloaded from known URLs.
pub fn cmd_fetch(
    client: &dyn HttpClient,
    config: &Config,
    current_url: &str,
    master_url: &str,
    target_branch: &str,
    max_redirects: u32,
) -> Result<Outcome> {
    let pr = pr_label(config)?;
    let current = fetch_report(client, config, current_url, max_redirects)?;
    let master = fetch_report(client, config, master_url, max_redirects)?;
    Ok(Outcome::new(Some(&current), Some(&master), pr, target_branch))
}

fn fetch_report(
    client: &dyn HttpClient,
    config: &Config,
    url: &str,
    max_redirects: u32,
) -> Result<CoverageReport> {
    eprintln!("Fetching {} ...", without_query(url));
    let resp = fetch_following_redirects(
        client,
        config.authorize(parse_url(url)?).as_str(),
        &config.headers(),
        max_redirects,
    )?;
    if !resp.is_success() {
        return Err(CovdeltaError::Http {
            url: without_query(url).to_string(),
            status: resp.status,
        }
        .into());
    }
    Ok(CoverageReport::from_slice(&resp.body, url)?)
}

/// Compare two coverage files on disk. A missing `master` renders as
/// placeholders.
pub fn cmd_compare(
    current: &Path,
    master: Option<&Path>,
    pr_label: &str,
    target_branch: &str,
) -> Result<Outcome> {
    let current_report = CoverageReport::from_file(current)
        .with_context(|| format!("Failed to read {}", current.display()))?;
    let master_report = match master {
        Some(path) => Some(
            CoverageReport::from_file(path)
                .with_context(|| format!("Failed to read {}", path.display()))?,
        ),
        None => None,
    };
    Ok(Outcome::new(
        Some(&current_report),
        master_report.as_ref(),
        pr_label,
        target_branch,
    ))
}

/// List the coverage artifact URLs for the current build and for the latest
/// matching build of `target_branch`.
pub fn cmd_urls(
    client: &dyn HttpClient,
    config: &Config,
    target_branch: &str,
    job: &str,
    options: &LookupOptions,
) -> Result<String> {
    let locator = locator(client, config, options);

    let current = match config.build_num {
        Some(build_num) => locator.coverage_url(build_num)?,
        None => bail!("current build number is unknown (set CIRCLE_BUILD_NUM or pass --build-num)"),
    };
    let master = locator.find_coverage_url(target_branch, job)?;

    let mut out = String::new();
    writeln!(out, "current: {}", current.as_deref().unwrap_or("-")).unwrap();
    writeln!(out, "{target_branch}: {}", master.as_deref().unwrap_or("-")).unwrap();
    Ok(out)
}
