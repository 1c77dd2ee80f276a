#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line front end for the crime intelligence engine.
//!
//! ```text
//! crime_intel_cli heatmap --bbox 12.95,77.55,12.98,77.60 --cell-size 250
//! crime_intel_cli related 42 --radius-km 3
//! crime_intel_cli offenders --role suspect --min-cases 3
//! crime_intel_cli stats monthly --year 2024
//! crime_intel_cli serve
//! ```
//!
//! Every analytical subcommand loads the snapshot, runs one operation,
//! and prints the result as pretty JSON. Bounding boxes and lists use the
//! same formats as the HTTP query string.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Datelike as _, Utc};
use clap::{Args, Parser, Subcommand};
use crime_intel_analytics::{Engine, EngineConfig};
use crime_intel_analytics_models::RiskParams;
use crime_intel_database::db;
use crime_intel_server_models::{
    ClusterQuery, HeatmapQuery, PatternQuery, RelatedQuery, RepeatOffenderQuery,
    ScopeQuery, SearchQueryParams, SimilarQuery,
};
use serde::Serialize;

#[derive(Parser)]
#[command(
    name = "crime_intel_cli",
    about = "Spatial and correlation analytics over a crime data snapshot"
)]
struct Cli {
    /// Snapshot file (defaults to `$CRIME_INTEL_SNAPSHOT` or data/snapshot.json)
    #[arg(long, global = true)]
    snapshot: Option<PathBuf>,

    /// Engine configuration TOML (defaults to `$CRIME_INTEL_CONFIG`)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Candidate filters shared by the heatmap and cluster commands.
#[derive(Args)]
struct CandidateArgs {
    /// Earliest occurrence (RFC 3339)
    #[arg(long)]
    from: Option<DateTime<Utc>>,
    /// Latest occurrence (RFC 3339)
    #[arg(long)]
    to: Option<DateTime<Utc>>,
    /// Comma-separated case statuses
    #[arg(long)]
    statuses: Option<String>,
    /// Comma-separated tag names
    #[arg(long)]
    tags: Option<String>,
}

/// Scope shared by the pattern, offender, and statistics commands.
#[derive(Args)]
struct ScopeArgs {
    /// Bounding box as south,west,north,east
    #[arg(long)]
    bbox: Option<String>,
    /// Radius centre latitude
    #[arg(long, requires = "lng")]
    lat: Option<f64>,
    /// Radius centre longitude
    #[arg(long, requires = "lat")]
    lng: Option<f64>,
    /// Radius in kilometers
    #[arg(long)]
    radius_km: Option<f64>,
    /// Earliest occurrence (RFC 3339)
    #[arg(long)]
    from: Option<DateTime<Utc>>,
    /// Latest occurrence (RFC 3339)
    #[arg(long)]
    to: Option<DateTime<Utc>>,
    /// Comma-separated tag names
    #[arg(long)]
    tags: Option<String>,
    /// Restrict to one case
    #[arg(long)]
    case_id: Option<i64>,
}

impl From<ScopeArgs> for ScopeQuery {
    fn from(args: ScopeArgs) -> Self {
        Self {
            bbox: args.bbox,
            lat: args.lat,
            lng: args.lng,
            radius_km: args.radius_km,
            from: args.from,
            to: args.to,
            tags: args.tags,
            case_id: args.case_id,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Grid density over a bounding box
    Heatmap {
        /// Bounding box as south,west,north,east
        #[arg(long)]
        bbox: String,
        /// Cell edge length in meters
        #[arg(long, default_value = "250")]
        cell_size: f64,
        #[command(flatten)]
        filter: CandidateArgs,
    },
    /// Density-based incident clusters
    Clusters {
        /// Bounding box as south,west,north,east
        #[arg(long)]
        bbox: Option<String>,
        /// Neighbourhood radius in meters
        #[arg(long, default_value = "500")]
        radius: f64,
        /// Neighbours required for a core point
        #[arg(long, default_value = "3")]
        min_points: usize,
        #[command(flatten)]
        filter: CandidateArgs,
    },
    /// Cases related to a reference case
    Related {
        /// Reference case ID
        case_id: i64,
        /// Tag signal weight
        #[arg(long)]
        tag_weight: Option<f64>,
        /// Suspect signal weight
        #[arg(long)]
        suspect_weight: Option<f64>,
        /// Spatial signal weight
        #[arg(long)]
        spatial_weight: Option<f64>,
        /// Temporal signal weight
        #[arg(long)]
        temporal_weight: Option<f64>,
        /// Spatial cut-off in kilometers
        #[arg(long)]
        radius_km: Option<f64>,
        /// Temporal cut-off in days
        #[arg(long)]
        days_range: Option<f64>,
        /// Only score cases inside the radius and day window
        #[arg(long)]
        restrict: bool,
        /// Maximum number of results
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Cases with a similar modus operandi
    Similar {
        /// Reference case ID
        case_id: i64,
        /// Maximum number of results
        #[arg(long, default_value = "10")]
        limit: usize,
    },
    /// Tag co-occurrence and suspect patterns
    Patterns {
        #[command(flatten)]
        scope: ScopeArgs,
        /// Minimum count for a pattern
        #[arg(long, default_value = "2")]
        min_occurrence: u32,
    },
    /// Persons linked to several cases in one role
    Offenders {
        #[command(flatten)]
        scope: ScopeArgs,
        /// Role counted (suspect, victim, witness)
        #[arg(long, default_value = "suspect")]
        role: String,
        /// Minimum distinct cases
        #[arg(long, default_value = "2")]
        min_cases: u32,
    },
    /// Risk score for a person
    Risk {
        /// Person ID
        person_id: i64,
        /// Reference time (RFC 3339, defaults to now)
        #[arg(long)]
        as_of: Option<DateTime<Utc>>,
    },
    /// Multi-criteria case search
    Search {
        /// Bounding box as south,west,north,east
        #[arg(long)]
        bbox: Option<String>,
        /// Radius centre latitude
        #[arg(long)]
        lat: Option<f64>,
        /// Radius centre longitude
        #[arg(long)]
        lng: Option<f64>,
        /// Radius in kilometers
        #[arg(long)]
        radius_km: Option<f64>,
        /// Earliest occurrence (RFC 3339)
        #[arg(long)]
        from: Option<DateTime<Utc>>,
        /// Latest occurrence (RFC 3339)
        #[arg(long)]
        to: Option<DateTime<Utc>>,
        /// Comma-separated case statuses
        #[arg(long)]
        status: Option<String>,
        /// Comma-separated tag names
        #[arg(long)]
        tags: Option<String>,
        /// Suspect name fragment
        #[arg(long)]
        suspect: Option<String>,
        /// Assigned officer ID
        #[arg(long)]
        officer: Option<i64>,
        /// Page size
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Descriptive statistics
    Stats {
        #[command(subcommand)]
        kind: StatsCommand,
    },
    /// Serve the HTTP API over the loaded snapshot
    Serve,
}

#[derive(Subcommand)]
enum StatsCommand {
    /// Incidents per tag
    Tags {
        #[command(flatten)]
        scope: ScopeArgs,
    },
    /// Incidents per district
    Districts {
        #[command(flatten)]
        scope: ScopeArgs,
    },
    /// Incidents per month of one year
    Monthly {
        #[command(flatten)]
        scope: ScopeArgs,
        /// Calendar year (defaults to the current year)
        #[arg(long)]
        year: Option<i32>,
    },
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn load_engine(cli: &Cli) -> Result<Engine, Box<dyn std::error::Error>> {
    let config = EngineConfig::resolve(cli.config.as_deref())?;
    let path = cli
        .snapshot
        .clone()
        .unwrap_or_else(db::snapshot_path_from_env);
    let snapshot = db::open_path(&path)?;
    log::debug!("Loaded snapshot from {}", path.display());
    Ok(Engine::new(Arc::new(snapshot), config)?)
}

#[allow(clippy::too_many_lines)]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init_custom_env("RUST_LOG");
    let cli = Cli::parse();
    let engine = load_engine(&cli)?;
    let cancel = engine.request_token();

    match cli.command {
        Commands::Heatmap {
            bbox,
            cell_size,
            filter,
        } => {
            let params = HeatmapQuery {
                bbox,
                cell_size: Some(cell_size),
                from: filter.from,
                to: filter.to,
                statuses: filter.statuses,
                tags: filter.tags,
            }
            .into_params()?;
            print_json(&engine.heatmap(&params, &cancel)?)?;
        }
        Commands::Clusters {
            bbox,
            radius,
            min_points,
            filter,
        } => {
            let params = ClusterQuery {
                bbox,
                radius: Some(radius),
                min_points: Some(min_points),
                from: filter.from,
                to: filter.to,
                statuses: filter.statuses,
                tags: filter.tags,
            }
            .into_params()?;
            print_json(&engine.clusters(&params, &cancel)?)?;
        }
        Commands::Related {
            case_id,
            tag_weight,
            suspect_weight,
            spatial_weight,
            temporal_weight,
            radius_km,
            days_range,
            restrict,
            limit,
        } => {
            let params = RelatedQuery {
                tag_weight,
                suspect_weight,
                spatial_weight,
                temporal_weight,
                radius_km,
                days_range,
                restrict: Some(restrict),
                limit,
            }
            .into_params(case_id);
            print_json(&engine.related_cases(&params, &cancel)?)?;
        }
        Commands::Similar { case_id, limit } => {
            let params = SimilarQuery { limit: Some(limit) }.into_params(case_id);
            print_json(&engine.similar_behavior(&params, &cancel)?)?;
        }
        Commands::Patterns {
            scope,
            min_occurrence,
        } => {
            let params = PatternQuery {
                min_occurrence: Some(min_occurrence),
            }
            .into_params(&scope.into())?;
            print_json(&engine.patterns(&params, &cancel)?)?;
        }
        Commands::Offenders {
            scope,
            role,
            min_cases,
        } => {
            let params = RepeatOffenderQuery {
                role: Some(role),
                min_cases: Some(min_cases),
            }
            .into_params(&scope.into())?;
            print_json(&engine.repeat_offenders(&params, &cancel)?)?;
        }
        Commands::Risk { person_id, as_of } => {
            let params = RiskParams {
                person_id,
                as_of: as_of.unwrap_or_else(Utc::now),
            };
            print_json(&engine.risk(&params, &cancel)?)?;
        }
        Commands::Search {
            bbox,
            lat,
            lng,
            radius_km,
            from,
            to,
            status,
            tags,
            suspect,
            officer,
            limit,
        } => {
            let params = SearchQueryParams {
                bbox,
                lat,
                lng,
                radius_km,
                from,
                to,
                status,
                tags,
                suspect,
                officer,
                limit,
            }
            .into_params()?;
            print_json(&engine.search(params, &cancel)?)?;
        }
        Commands::Stats { kind } => match kind {
            StatsCommand::Tags { scope } => {
                let filter = ScopeQuery::from(scope).to_filter()?;
                print_json(&engine.tag_frequency(&filter, &cancel)?)?;
            }
            StatsCommand::Districts { scope } => {
                let filter = ScopeQuery::from(scope).to_filter()?;
                print_json(&engine.districts(&filter, &cancel)?)?;
            }
            StatsCommand::Monthly { scope, year } => {
                let filter = ScopeQuery::from(scope).to_filter()?;
                let year = year.unwrap_or_else(|| Utc::now().year());
                print_json(&engine.monthly_trend(&filter, year, &cancel)?)?;
            }
        },
        Commands::Serve => {
            actix_web::rt::System::new().block_on(crime_intel_server::serve(engine))?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory as _;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_options_follow_the_subcommand() {
        let cli = Cli::try_parse_from([
            "crime_intel_cli",
            "offenders",
            "--role",
            "witness",
            "--snapshot",
            "fixtures/snapshot.json",
        ])
        .unwrap();
        assert_eq!(cli.snapshot, Some(PathBuf::from("fixtures/snapshot.json")));
        match cli.command {
            Commands::Offenders {
                role, min_cases, ..
            } => {
                assert_eq!(role, "witness");
                assert_eq!(min_cases, 2);
            }
            _ => panic!("expected offenders"),
        }
    }

    #[test]
    fn scope_args_become_a_filter() {
        let cli = Cli::try_parse_from([
            "crime_intel_cli",
            "stats",
            "districts",
            "--lat",
            "12.97",
            "--lng",
            "77.59",
            "--radius-km",
            "2",
        ])
        .unwrap();
        let Commands::Stats {
            kind: StatsCommand::Districts { scope },
        } = cli.command
        else {
            panic!("expected stats districts");
        };
        let filter = ScopeQuery::from(scope).to_filter().unwrap();
        assert_eq!(filter.radius_meters, Some(2000.0));
    }

    #[test]
    fn heatmap_requires_a_bbox() {
        assert!(Cli::try_parse_from(["crime_intel_cli", "heatmap"]).is_err());
    }
}
