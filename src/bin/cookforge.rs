use clap::{ArgAction, Args, Parser, Subcommand};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use cookforge::adapters::{ForgePort, GitHubAdapter, HttpTransport, Transport};
use cookforge::commands::{
    self, CloneOptions, CompareOptions, DeployOptions, ListOptions, OutputOptions, RowField, SearchOptions,
};
use cookforge::config::{ConfigOverrides, CookforgeConfig, TOKEN_ENV};
use cookforge::git::GitCli;
use cookforge::package::ChefServerClient;
use cookforge::services::{DeployMode, SyncEngine};
use cookforge::storage::{CookforgePaths, SnapshotStore};
use cookforge::types::SslVerifyMode;
use cookforge::version::VersionBump;

#[derive(Parser, Debug)]
#[command(name = "cookforge", version)]
#[command(about = "Reconcile cookbook repositories with a Chef server")]
struct Cli {
    /// Config file (default ~/.cookforge/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// State directory holding the config and snapshot cache
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    /// Remote forge URL
    #[arg(long, global = true)]
    url: Option<String>,

    /// Explicit API base URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Organizations, colon-separated (first wins on name collisions)
    #[arg(long = "org", global = true)]
    orgs: Option<String>,

    /// Link type: ssh, http, https, svn, html or git
    #[arg(long, global = true)]
    link: Option<String>,

    /// verify_peer or verify_none
    #[arg(long, global = true)]
    ssl_verify_mode: Option<SslVerifyMode>,

    #[arg(long, global = true)]
    proxy: Option<String>,

    /// API token (also read from COOKFORGE_TOKEN)
    #[arg(long, global = true)]
    token: Option<String>,

    /// Artifact server URL including the organization path
    #[arg(long, global = true)]
    chef_url: Option<String>,

    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

/// Column selection shared by `list` and `compare`
#[derive(Args, Debug)]
struct OutputArgs {
    /// Comma-separated fields to show instead of the default columns
    #[arg(long)]
    fields: Option<String>,

    /// Print the selectable fields and exit
    #[arg(long)]
    fieldlist: bool,

    /// Omit the header line
    #[arg(long)]
    noheader: bool,
}

impl OutputArgs {
    fn options(&self) -> anyhow::Result<OutputOptions> {
        Ok(OutputOptions {
            fields: self.fields.as_deref().map(RowField::parse_list).transpose()?,
            noheader: self.noheader,
        })
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List cookbooks with their repositories
    List {
        cookbook: Option<String>,
        /// List every repository instead of every published cookbook
        #[arg(short, long)]
        all: bool,
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Compare published versions with repository tags
    Compare {
        cookbook: Option<String>,
        #[arg(short, long)]
        all: bool,
        /// Only show cookbooks whose versions differ
        #[arg(short, long)]
        mismatch: bool,
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Search repositories on the forge
    Search {
        query: Vec<String>,
        /// Show the repository URL instead of the description
        #[arg(short, long)]
        link: bool,
    },

    /// Clone cookbook repositories into the cookbook path
    Clone {
        cookbook: Option<String>,
        /// Clone every published cookbook
        #[arg(short, long)]
        all: bool,
        #[arg(long)]
        cookbook_path: Option<PathBuf>,
    },

    /// Tag and release a cookbook version
    Deploy {
        cookbook: String,
        version: Option<String>,
        #[arg(long)]
        major: bool,
        #[arg(long)]
        minor: bool,
        /// Default bump class
        #[arg(long)]
        patch: bool,
        /// Deploy the given version without bump checks
        #[arg(short, long)]
        quick: bool,
        #[arg(long)]
        work_dir: Option<PathBuf>,
    },

    /// Delete a repository on the forge
    Destroy {
        name: String,
        /// Delete from this user's namespace instead of the first organization
        #[arg(long)]
        user: Option<String>,
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Refresh the snapshot cache of every organization
    Sync {
        /// Ignore cached snapshots
        #[arg(long)]
        force: bool,
    },
}

fn init_tracing(verbose: u8) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let default_filter = match verbose {
            0 => "warn,cookforge=info",
            1 => "warn,cookforge=debug",
            _ => "info,cookforge=trace",
        };
        tracing_subscriber::EnvFilter::new(default_filter)
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Ask on stderr, read y/n from stdin. Anything but yes is no.
fn confirm(question: &str) -> bool {
    eprint!("{question} (y/N) ");
    let _ = std::io::stderr().flush();
    let mut answer = String::new();
    if std::io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn artifact_server(config: &CookforgeConfig) -> anyhow::Result<ChefServerClient> {
    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(config.artifact_transport())?);
    Ok(ChefServerClient::new(transport, config.artifact_url()?))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let paths = match &cli.state_dir {
        Some(dir) => CookforgePaths::with_root(dir),
        None => CookforgePaths::new()?,
    };
    let config_path = cli.config.clone().unwrap_or_else(|| paths.config_file());

    let mut config = CookforgeConfig::load(&config_path).await?;
    config.apply_overrides(ConfigOverrides {
        url: cli.url,
        api_url: cli.api_url,
        orgs: cli.orgs,
        link: cli.link,
        ssl_verify_mode: cli.ssl_verify_mode,
        proxy: cli.proxy,
        token: cli.token,
        cookbook_path: match &cli.command {
            Command::Clone { cookbook_path, .. } => cookbook_path.clone(),
            _ => None,
        },
        work_dir: match &cli.command {
            Command::Deploy { work_dir, .. } => work_dir.clone(),
            _ => None,
        },
        artifact_url: cli.chef_url,
    });
    config.apply_env_token(std::env::var(TOKEN_ENV).ok());
    config.validate()?;

    let api_base = config.api_base()?;
    tracing::debug!(
        config = %config_path.display(),
        api_base = %api_base,
        organizations = ?config.organizations,
        link = %config.link_type(),
        ssl_verify_mode = %config.ssl_verify_mode,
        proxy = ?config.proxy,
        token = config.token.is_some(),
        "effective configuration"
    );

    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(config.forge_transport())?);
    let forge: Arc<dyn ForgePort> = Arc::new(GitHubAdapter::new(transport, api_base));
    let engine = SyncEngine::new(forge, SnapshotStore::new(paths.clone()), config.host()?);
    let orgs = config.organizations.clone();
    let link = config.link_type();

    match cli.command {
        Command::List { cookbook, all, output } => {
            if output.fieldlist {
                println!("{}", RowField::field_list());
                return Ok(());
            }
            let artifacts = artifact_server(&config)?;
            let options = ListOptions {
                cookbook,
                all,
                link,
                output: output.options()?,
            };
            let report = commands::list(&engine, &artifacts, &orgs, &options).await?;
            println!("{}", report.format());
        }

        Command::Compare {
            cookbook,
            all,
            mismatch,
            output,
        } => {
            if output.fieldlist {
                println!("{}", RowField::field_list());
                return Ok(());
            }
            let artifacts = artifact_server(&config)?;
            let options = CompareOptions {
                cookbook,
                all,
                mismatch,
                link,
                output: output.options()?,
            };
            let report = commands::compare(&engine, &artifacts, &orgs, &options).await?;
            println!("{}", report.format());
        }

        Command::Search { query, link } => {
            let options = SearchOptions {
                query: query.join(" "),
                link,
            };
            let report = commands::search(engine.forge().as_ref(), &options).await?;
            println!("{}", report.format());
        }

        Command::Clone { cookbook, all, .. } => {
            let artifacts = artifact_server(&config)?;
            let options = CloneOptions {
                cookbook,
                all,
                link,
                token: config.token.clone(),
                cookbook_path: config.cookbook_path(),
            };
            let report = commands::clone(&engine, &artifacts, &GitCli::new(), &orgs, &options).await?;
            println!("{}", report.format());
        }

        Command::Deploy {
            cookbook,
            version,
            major,
            minor,
            patch: _,
            quick,
            ..
        } => {
            let artifacts = artifact_server(&config)?;
            let options = DeployOptions {
                cookbook,
                version,
                bump: VersionBump::from_flags(major, minor),
                mode: if quick { DeployMode::Quick } else { DeployMode::Checked },
                link,
                token: config.token.clone(),
                work_dir: config.work_dir(),
                upload: config.upload_command()?,
            };
            let report = commands::deploy(&engine, &artifacts, &GitCli::new(), &orgs, &options, |current, proposed| {
                eprintln!("Version {current} is already published");
                confirm(&format!("Deploy as {proposed} instead?"))
            })
            .await?;
            println!("{}", report.format());
        }

        Command::Destroy { name, user, yes } => {
            let owner = commands::destroy_owner(&orgs, user.as_deref())?;
            if !yes && !confirm(&format!("Delete repository {owner}/{name}?")) {
                anyhow::bail!("destroy of {owner}/{name} cancelled");
            }
            let report = commands::destroy(engine.forge().as_ref(), &owner, &name).await?;
            println!("{}", report.format());
        }

        Command::Sync { force } => {
            let report = commands::sync(&engine, &orgs, force).await?;
            println!("{}", report.format());
        }
    }

    Ok(())
}
