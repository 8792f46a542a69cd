use crate::api_server::{start_api_server, ApiState};
use crate::config::Config;
use crate::models::{MeetupId, MemberId};
use crate::roster::Roster;
use crate::search::MeetupQuery;
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

/// Trailclub - meetup calendar, members and attendees for a hiking club
#[derive(Debug, Parser)]
#[command(name = "trailclub")]
#[command(about = "Admin back end for a hiking club", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Config file (defaults to TRAILCLUB_CONFIG_PATH or the platform config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the HTTP API
    Serve {
        /// Address to listen on (overrides server.bind)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Show projected calendar events
    Calendar {
        /// First day (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,

        /// Last day (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,
    },

    /// Manage meetups
    Meetups {
        #[command(subcommand)]
        action: MeetupActions,
    },

    /// Manage meetup attendees
    Attendees {
        #[command(subcommand)]
        action: AttendeeActions,
    },

    /// Manage members
    Members {
        #[command(subcommand)]
        action: MemberActions,
    },

    /// View configuration
    Config {
        #[command(subcommand)]
        action: ConfigActions,
    },
}

#[derive(Debug, Args, Default)]
pub struct FilterArgs {
    /// Title contains
    #[arg(long)]
    pub title: Option<String>,

    /// Leader nickname contains
    #[arg(long)]
    pub leader: Option<String>,

    /// Activity types, comma separated
    #[arg(long = "type")]
    pub types: Option<String>,

    /// Levels, comma separated
    #[arg(long = "level")]
    pub levels: Option<String>,

    /// Statuses, comma separated (pending, completed, cancelled)
    #[arg(long = "status")]
    pub statuses: Option<String>,

    #[arg(long)]
    pub from: Option<String>,

    #[arg(long)]
    pub to: Option<String>,
}

impl From<FilterArgs> for MeetupQuery {
    fn from(args: FilterArgs) -> Self {
        MeetupQuery {
            title: args.title,
            leader: args.leader,
            types: args.types,
            levels: args.levels,
            statuses: args.statuses,
            from: args.from,
            to: args.to,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum MeetupActions {
    /// List meetups matching the filters
    List {
        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Delete a meetup and its attendee links
    #[command(alias = "remove")]
    Delete {
        #[arg(required = true)]
        id: MeetupId,
    },
}

#[derive(Debug, Subcommand)]
pub enum AttendeeActions {
    /// Replace a meetup's attendees with the given member ids
    Set {
        #[arg(required = true)]
        meetup: MeetupId,

        /// Member ids; none clears the list
        members: Vec<MemberId>,
    },
}

#[derive(Debug, Subcommand)]
pub enum MemberActions {
    /// List members, optionally searching every field
    List {
        #[arg(long, short)]
        query: Option<String>,
    },

    /// Nickname autocomplete
    Suggest {
        #[arg(required = true)]
        input: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigActions {
    /// Print the effective configuration
    Show,
}

pub async fn execute(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;

    if let Commands::Config {
        action: ConfigActions::Show,
    } = &cli.command
    {
        println!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    let service = crate::build_service(&config)?;

    match cli.command {
        Commands::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| config.server.bind.clone());
            let state = Arc::new(ApiState { service, config });
            start_api_server(state, &bind).await
        }
        Commands::Calendar { from, to } => {
            let filter = MeetupQuery {
                from,
                to,
                ..Default::default()
            }
            .into_filter()?;
            let projection = service.calendar().await?;
            for event in filter.apply(&projection.events) {
                println!(
                    "{} - {}  {}  [{}]",
                    event.start.format("%Y-%m-%d %H:%M"),
                    event.end.format("%H:%M"),
                    event.title,
                    event.resource.status
                );
            }
            for rejected in &projection.rejected {
                println!("skipped: {}", rejected);
            }
            Ok(())
        }
        Commands::Meetups { action } => match action {
            MeetupActions::List { filter } => {
                let filter = MeetupQuery::from(filter).into_filter()?;
                for event in service.meetup_events(&filter).await? {
                    let meetup = &event.resource;
                    println!(
                        "{:>5}  {}  {:<10}  {}",
                        meetup.id,
                        event.start.format("%Y-%m-%d"),
                        meetup.activity_type.as_str(),
                        event.title
                    );
                }
                Ok(())
            }
            MeetupActions::Delete { id } => {
                service
                    .delete_meetup(id)
                    .await
                    .with_context(|| format!("Failed to delete meetup {}", id))?;
                println!("Meetup {} deleted", id);
                Ok(())
            }
        },
        Commands::Attendees {
            action: AttendeeActions::Set { meetup, members },
        } => {
            let desired: HashSet<MemberId> = members.into_iter().collect();
            let report = service
                .set_attendees(meetup, &desired)
                .await
                .context("Failed to update attendees")?;
            println!(
                "Attendees updated: {} added, {} removed",
                report.added.len(),
                report.removed.len()
            );
            Ok(())
        }
        Commands::Members { action } => match action {
            MemberActions::List { query } => {
                let members = match query {
                    Some(q) => service.search_members(&q).await?,
                    None => service.list_members().await?,
                };
                let roster = Roster::from_members(members);
                for member in roster.members() {
                    println!(
                        "{:>5}  {:<16}  {}",
                        member.id,
                        member.nickname,
                        member.email.as_deref().unwrap_or("-")
                    );
                }
                Ok(())
            }
            MemberActions::Suggest { input } => {
                for option in service.suggest_members(&input).await {
                    println!("{:>5}  {}", option.member_id, option.label);
                }
                Ok(())
            }
        },
        Commands::Config { .. } => Ok(()),
    }
}
