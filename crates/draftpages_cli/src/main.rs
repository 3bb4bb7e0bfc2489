//! `draftpages` command-line entry point.
//!
//! # Responsibility
//! - Drive the overlay engine against one SQLite file for scripting and
//!   local inspection.
//! - Print every result as JSON on stdout.
//!
//! # Invariants
//! - Exit status is non-zero whenever the engine reports an error.

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use draftpages_core::repo::criteria::{Criteria, PageField};
use draftpages_core::{
    init_from_config, open_db, Actor, CompositePageReader, DraftPagesConfig, DraftRoutes,
    ListDraftsParams, OverlayRegionStore, PageHooks, PageIdsBody, PageQueryOptions,
    RegionLoaders, Role, RoleCapabilityGate, RouteResponse, SqlitePageRepository,
    SqliteSearchIndexer, SqliteVersionRecorder,
};
use log::info;
use serde_json::{json, Value};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "draftpages")]
#[command(author, version, about = "Draft overlays for region-based CMS pages")]
#[command(propagate_version = true)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true, env = "DRAFTPAGES_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database file (overrides the config)
    #[arg(long, global = true, env = "DRAFTPAGES_DB")]
    db: Option<PathBuf>,

    /// Acting user id
    #[arg(long, global = true, default_value = "cli")]
    actor: String,

    /// Acting role: guest, contributor, editor or admin
    #[arg(long, global = true, default_value = "guest")]
    role: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List pages with pending drafts
    ListDrafts {
        /// `time` or `author`
        #[arg(long)]
        sort: Option<String>,

        /// `asc` or `desc`
        #[arg(long)]
        order: Option<String>,
    },

    /// Publish the drafts of the given pages
    Commit {
        #[arg(required = true)]
        page_ids: Vec<String>,
    },

    /// Discard the drafts of the given pages
    Revert {
        #[arg(required = true)]
        page_ids: Vec<String>,
    },

    /// Write one draft region
    PutRegion {
        /// `slug:region`
        key: String,

        /// Region content as JSON
        content: String,
    },

    /// Query pages as the acting user sees them
    Query {
        /// Full-text filter
        #[arg(long)]
        q: Option<String>,

        /// Match pages carrying any of these tags
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Show published regions even to editors
        #[arg(long)]
        canonical_only: bool,
    },

    /// List distinct values of one page field, or `tags`
    Distinct {
        /// `tags` or a field such as `page_type`, `last_edit_author`
        field: String,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Self::ListDrafts { .. } => "list-drafts",
            Self::Commit { .. } => "commit",
            Self::Revert { .. } => "revert",
            Self::PutRegion { .. } => "put-region",
            Self::Query { .. } => "query",
            Self::Distinct { .. } => "distinct",
        }
    }
}

fn main() {
    if let Err(err) = run(Cli::parse()) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => DraftPagesConfig::load(path)?,
        None => DraftPagesConfig::default(),
    };
    if let Some(db) = cli.db.clone() {
        config.database_path = db;
    }
    init_from_config(&config).map_err(|err| anyhow!(err))?;

    let role = Role::parse(&cli.role)?;
    let actor = Actor::new(cli.actor.clone(), role);

    let conn = open_db(&config.database_path).with_context(|| {
        format!(
            "failed to open database `{}`",
            config.database_path.display()
        )
    })?;
    let repo = SqlitePageRepository::new(&conn);
    let versions = SqliteVersionRecorder::new(&conn);
    let indexer = SqliteSearchIndexer::new(&conn);
    let gate = RoleCapabilityGate;
    let loaders = RegionLoaders::new(config.loader_policy());
    let hooks = PageHooks {
        gate: &gate,
        versions: &versions,
        indexer: &indexer,
        loaders: &loaders,
    };

    info!(
        "event=cli_command module=cli status=start actor={} role={} command={}",
        actor.id,
        role.as_str(),
        cli.command.name()
    );

    let output = match cli.command {
        Commands::ListDrafts { sort, order } => {
            let routes = DraftRoutes::new(&repo, hooks).with_list_limit(config.list_drafts_limit);
            route_output(routes.list_drafts(&actor, &ListDraftsParams { sort, order }))?
        }
        Commands::Commit { page_ids } => {
            let routes = DraftRoutes::new(&repo, hooks);
            route_output(routes.commit(&actor, &ids_body(page_ids)))?
        }
        Commands::Revert { page_ids } => {
            let routes = DraftRoutes::new(&repo, hooks);
            route_output(routes.revert(&actor, &ids_body(page_ids)))?
        }
        Commands::PutRegion { key, content } => {
            let content: Value = serde_json::from_str(&content)
                .with_context(|| format!("region content for `{key}` is not valid JSON"))?;
            let write = OverlayRegionStore::new(&repo, hooks).put_region(&actor, &key, content)?;
            json!({
                "slug": write.slug,
                "region": write.region_key,
                "created_page": write.created_page,
            })
        }
        Commands::Query {
            q,
            tags,
            canonical_only,
        } => {
            let options = PageQueryOptions {
                q,
                tags: (!tags.is_empty()).then_some(tags),
                canonical_only,
                ..PageQueryOptions::default()
            };
            let results =
                CompositePageReader::new(&repo, hooks).query(&actor, Criteria::Everything, &options)?;
            serde_json::to_value(results)?
        }
        Commands::Distinct { field } => {
            let reader = CompositePageReader::new(&repo, hooks);
            let options = PageQueryOptions::default();
            if field == "tags" {
                json!(reader.distinct_tags(&actor, Criteria::Everything, &options)?)
            } else {
                let parsed = PageField::parse(&field)
                    .ok_or_else(|| anyhow!("unknown page field `{field}`"))?;
                json!(reader.distinct(&actor, Criteria::Everything, &options, parsed)?)
            }
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn ids_body(page_ids: Vec<String>) -> PageIdsBody {
    PageIdsBody {
        page_id: None,
        page_ids: Some(page_ids),
    }
}

fn route_output(response: RouteResponse) -> Result<Value> {
    if response.status != 200 {
        let message = response
            .body
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("request failed")
            .to_string();
        bail!("{message} (status {})", response.status);
    }
    Ok(response.body)
}
