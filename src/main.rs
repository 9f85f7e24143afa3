use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use studio_folio::{
    auth::AdminGate,
    catalog::{self, build_catalog},
    category::{Category, CategoryFilter},
    config::{Config, ObjectStorage},
    dashboard::{Dashboard, DashboardTab},
    deploy::{local::storage::LocalStorage, s3},
    message::{ContactForm, MessageBoard},
    progress::create_reporter,
    storage::{guard::Guarded, index, object},
};
use tracing::{error, info};

#[derive(Parser)]
struct Opts {
    #[clap(short, long, env = "STUDIO_FOLIO_CONFIG")]
    config: PathBuf,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the portfolio catalog, optionally for one category.
    Catalog {
        #[clap(long, default_value_t)]
        category: CategoryFilter,
    },
    /// Leave a message for the studio.
    Contact {
        #[clap(long)]
        name: String,
        #[clap(long)]
        email: String,
        #[clap(long)]
        message: String,
    },
    /// Upload images into a category.
    Upload {
        #[clap(flatten)]
        admin: AdminArgs,
        #[clap(long)]
        category: Category,
        #[clap(required = true)]
        files: Vec<PathBuf>,
    },
    /// Read or remove contact messages.
    Messages {
        #[clap(flatten)]
        admin: AdminArgs,
        #[clap(subcommand)]
        action: MessagesAction,
    },
}

#[derive(Args)]
struct AdminArgs {
    #[clap(long, env = "STUDIO_FOLIO_ADMIN_USER")]
    username: String,
    #[clap(long, env = "STUDIO_FOLIO_ADMIN_PASSWORD", hide_env_values = true)]
    password: String,
}

#[derive(Subcommand)]
enum MessagesAction {
    List,
    Delete { id: i64 },
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn open_dashboard<'s, O: object::Client, I: index::Client>(
    config: &Config,
    admin: &AdminArgs,
    objects: &'s O,
    index: &'s I,
) -> anyhow::Result<Dashboard<'s, O, I>> {
    let route = AdminGate::new(config.admin.clone()).login(&admin.username, &admin.password)?;
    info!(route = %route.href(config.base_path.as_deref()), "admin session");
    Dashboard::mount(objects, index)
        .await
        .context("load dashboard")
}

async fn run_command<O: object::Client, I: index::Client>(
    config: &Config,
    objects: &O,
    index: &I,
    command: Command,
) -> anyhow::Result<()> {
    match command {
        Command::Catalog { category } => {
            let images = build_catalog(objects).await;
            print_json(&catalog::filter(&images, category))
        }
        Command::Contact {
            name,
            email,
            message,
        } => {
            let mut form = ContactForm {
                name,
                email,
                message,
            };
            let stored = MessageBoard::new(index)
                .submit(&mut form)
                .await
                .context("send message")?;
            print_json(&stored)
        }
        Command::Upload {
            admin,
            category,
            files,
        } => {
            let reporter = create_reporter();
            let mut dashboard = open_dashboard(config, &admin, objects, index)
                .await?
                .with_reporter(reporter.clone());
            dashboard.select_tab(DashboardTab::Uploads);
            let selected = files.len();
            let queued = dashboard.uploads().select_paths(files, category).await;
            if queued == 0 {
                reporter.finish();
                bail!("none of the {selected} selected files is an image");
            }
            let urls = dashboard.uploads().confirm().await;
            reporter.finish();
            print_json(&urls.context("upload images")?)
        }
        Command::Messages { admin, action } => {
            let mut dashboard = open_dashboard(config, &admin, objects, index).await?;
            dashboard.select_tab(DashboardTab::Messages);
            if let MessagesAction::Delete { id } = action {
                dashboard
                    .delete_message(id)
                    .await
                    .with_context(|| format!("delete message {id}"))?;
            }
            print_json(dashboard.messages())
        }
    }
}

async fn run(opts: Opts) -> anyhow::Result<()> {
    let config = tokio::fs::read_to_string(&opts.config)
        .await
        .with_context(|| "read config")?;
    let config = Config::from_yaml(&config)
        .with_context(|| format!("parse config from {}", opts.config.display()))?;

    let index = LocalStorage::open(&config.index.url)
        .await
        .with_context(|| format!("open index {}", config.index.url))?
        .index_client();
    match &config.object_store {
        ObjectStorage::S3(s3_config) => {
            let objects = Guarded::new(s3::Client::new(s3_config).await, config.retry.clone());
            run_command(&config, &objects, &index, opts.command).await
        }
        ObjectStorage::Local {
            url,
            public_base_url,
        } => {
            let storage = LocalStorage::open(url)
                .await
                .with_context(|| format!("open object store {url}"))?;
            let objects = Guarded::new(
                storage.object_client(public_base_url.clone()),
                config.retry.clone(),
            );
            run_command(&config, &objects, &index, opts.command).await
        }
    }
}

fn main() {
    let opts = Opts::parse();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(?e, "failed to start runtime");
            std::process::exit(1);
        }
    };
    if let Err(e) = runtime.block_on(run(opts)) {
        error!(?e, "critical error");
        std::process::exit(1);
    }
}
