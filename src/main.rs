use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::builder::RangedU64ValueParser;
use clap::{Args, Parser, Subcommand};

use covdelta::circleci::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use covdelta::cli::{self, LookupOptions, Outcome};
use covdelta::config::{Auth, Config};
use covdelta::http::{UreqClient, DEFAULT_MAX_REDIRECTS};

/// covdelta — Compare CircleCI coverage reports and render a PR comment.
#[derive(Parser)]
#[command(name = "covdelta", version, about)]
struct Cli {
    #[command(flatten)]
    project: ProjectArgs,

    /// Exit with an error when coverage decreased.
    #[arg(long, global = true)]
    fail_on_decrease: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Overrides for values normally read from the CircleCI environment.
#[derive(Args)]
struct ProjectArgs {
    /// GitHub owner of the project (default: $CIRCLE_PROJECT_USERNAME).
    #[arg(long, global = true)]
    owner: Option<String>,

    /// GitHub repository name (default: $CIRCLE_PROJECT_REPONAME).
    #[arg(long, global = true)]
    repo: Option<String>,

    /// CircleCI API token (default: $CIRCLE_TOKEN).
    #[arg(long, global = true)]
    token: Option<String>,

    /// Pull request number (default: last segment of $CIRCLE_PULL_REQUEST).
    #[arg(long, global = true)]
    pr: Option<String>,

    /// Source branch of the pull request (default: $CIRCLE_BRANCH).
    #[arg(long, global = true)]
    branch: Option<String>,

    /// Build number of the running job (default: $CIRCLE_BUILD_NUM).
    #[arg(long, global = true)]
    build_num: Option<u64>,

    /// CircleCI API root.
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// How to send the API token.
    #[arg(long, global = true, value_enum, default_value_t = Auth::Header)]
    auth: Auth,
}

#[derive(Args)]
struct LookupArgs {
    /// Builds requested per page of the branch listing.
    #[arg(
        long,
        default_value_t = DEFAULT_PAGE_SIZE,
        value_parser = RangedU64ValueParser::<usize>::new().range(1..=MAX_PAGE_SIZE as u64)
    )]
    page_size: usize,

    /// Give up after this many pages.
    #[arg(long)]
    max_pages: Option<usize>,

    /// Redirect hops to follow when downloading a report.
    #[arg(long, default_value_t = DEFAULT_MAX_REDIRECTS)]
    max_redirects: u32,
}

impl From<&LookupArgs> for LookupOptions {
    fn from(args: &LookupArgs) -> Self {
        Self {
            page_size: args.page_size,
            max_pages: args.max_pages,
            max_redirects: args.max_redirects,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Compare the latest coverage of the source branch against a target branch.
    Report {
        /// Target branch of the pull request, e.g. "master".
        target_branch: String,

        /// Workflow job that stores coverage/coverage.json.
        job: String,

        /// Take the current side from the running build instead of the
        /// latest build on the source branch.
        #[arg(long)]
        current_build: bool,

        #[command(flatten)]
        lookup: LookupArgs,
    },

    /// Compare two coverage reports at known URLs.
    Fetch {
        /// URL of the current branch's coverage.json.
        current_url: String,

        /// URL of the target branch's coverage.json.
        master_url: String,

        /// Label for the target column.
        #[arg(long, default_value = "master")]
        target_branch: String,

        /// Redirect hops to follow when downloading a report.
        #[arg(long, default_value_t = DEFAULT_MAX_REDIRECTS)]
        max_redirects: u32,
    },

    /// Compare two coverage files on disk.
    Compare {
        /// Current branch's coverage.json.
        current: PathBuf,

        /// Target branch's coverage.json. Omit to render placeholders.
        master: Option<PathBuf>,

        /// Label for the target column.
        #[arg(long, default_value = "master")]
        target_branch: String,
    },

    /// Print the coverage artifact URLs for the current build and a target branch.
    Urls {
        /// Target branch to search.
        target_branch: String,

        /// Workflow job that stores coverage/coverage.json.
        #[arg(default_value = "build")]
        job: String,

        #[command(flatten)]
        lookup: LookupArgs,
    },
}

fn main() -> Result<()> {
    let args = Cli::parse();

    let outcome = match &args.command {
        Commands::Report {
            target_branch,
            job,
            current_build,
            lookup,
        } => {
            let config = resolve_config(&args.project)?;
            cli::cmd_report(
                &UreqClient::new(),
                &config,
                target_branch,
                job,
                *current_build,
                &lookup.into(),
            )?
        }
        Commands::Fetch {
            current_url,
            master_url,
            target_branch,
            max_redirects,
        } => {
            let config = env_config(&args.project)?;
            cli::cmd_fetch(
                &UreqClient::new(),
                &config,
                current_url,
                master_url,
                target_branch,
                *max_redirects,
            )?
        }
        Commands::Compare {
            current,
            master,
            target_branch,
        } => {
            let config = env_config(&args.project)?;
            let pr = config
                .pr_number
                .context("pull request number is unknown (set CIRCLE_PULL_REQUEST or pass --pr)")?;
            cli::cmd_compare(current, master.as_deref(), &pr, target_branch)?
        }
        Commands::Urls {
            target_branch,
            job,
            lookup,
        } => {
            let config = resolve_config(&args.project)?;
            let out = cli::cmd_urls(&UreqClient::new(), &config, target_branch, job, &lookup.into())?;
            print!("{out}");
            return Ok(());
        }
    };

    emit(&outcome, args.fail_on_decrease)
}

fn emit(outcome: &Outcome, fail_on_decrease: bool) -> Result<()> {
    println!("{}", outcome.body);
    if let Some(warning) = &outcome.warning {
        eprintln!("Warning: {warning}");
        if fail_on_decrease {
            bail!("{warning}");
        }
    }
    Ok(())
}

/// Environment values with command-line overrides applied.
fn env_config(args: &ProjectArgs) -> Result<Config> {
    let mut config = Config::from_env()?;
    if let Some(owner) = &args.owner {
        config.owner = owner.clone();
    }
    if let Some(repo) = &args.repo {
        config.repo = repo.clone();
    }
    if let Some(token) = &args.token {
        config.token = token.clone();
    }
    if let Some(pr) = &args.pr {
        config.pr_number = Some(pr.trim_start_matches('#').to_string());
    }
    if let Some(branch) = &args.branch {
        config.branch = Some(branch.clone());
    }
    if let Some(build_num) = args.build_num {
        config.build_num = Some(build_num);
    }
    if let Some(api_url) = &args.api_url {
        config.api_url = api_url.clone();
    }
    config.auth = args.auth;
    Ok(config)
}

/// Like [`env_config`] but requires the project and token.
fn resolve_config(args: &ProjectArgs) -> Result<Config> {
    let config = env_config(args)?;
    config.validate()?;
    Ok(config)
}
