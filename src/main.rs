use std::path::PathBuf;
use std::process;

use activities_map::{
    strava::auth::DEFAULT_SCOPES,
    util::{
        logging::{self, LogLevel},
        DateTimeUtils,
    },
    App, BoundingBox, Config, FilterCriteria, Result, RunRequest, SyncMode,
};
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(
    name = "activities-map",
    version,
    about = "Mirror Strava activities locally and draw them as KML tracks"
)]
struct Cli {
    /// Public configuration file
    #[arg(long, global = true, default_value = "config.toml")]
    config: PathBuf,
    /// Credentials overlay (client id, secret, access token)
    #[arg(long, global = true, default_value = "secrets.toml")]
    secrets: PathBuf,
    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    /// Re-list everything and refetch changed tracks
    Refresh,
    /// Only list activities newer than the cached ones
    Newer,
    /// Work from the local cache only
    Cache,
}

impl From<Mode> for SyncMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Refresh => SyncMode::Refresh,
            Mode::Newer => SyncMode::CheckForNewer,
            Mode::Cache => SyncMode::CacheOnly,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Synchronize, filter and write a KML document
    Run {
        /// Defaults to `newer` with a token, `cache` without
        #[arg(long, value_enum)]
        mode: Option<Mode>,
        /// Activity category from the configuration (Foot, Bike, ...)
        #[arg(long = "type")]
        category: Option<String>,
        #[arg(long)]
        include_private: bool,
        #[arg(long, allow_hyphen_values = true)]
        center_lat: Option<f64>,
        #[arg(long, allow_hyphen_values = true)]
        center_long: Option<f64>,
        /// Half height of the bounding box in degrees
        #[arg(long)]
        lat_dist: Option<f64>,
        /// Half width of the bounding box in degrees
        #[arg(long)]
        long_dist: Option<f64>,
        /// Do not restrict activities to the bounding box
        #[arg(long)]
        no_location: bool,
        /// Unix seconds or a date (YYYY-MM-DD, RFC 3339)
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
        /// Simplification tolerance, 0 keeps every point
        #[arg(long)]
        tolerance: Option<f64>,
        /// Access token for this run only
        #[arg(long)]
        token: Option<String>,
    },
    /// Print the URL that starts the authorization flow
    AuthUrl,
    /// Exchange an authorization code for an access token
    Token {
        code: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    logging::init(if cli.verbose {
        LogLevel::VERBOSE
    } else {
        LogLevel::INFO
    });

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(&cli.config, Some(&cli.secrets))?;

    match cli.command {
        Commands::Run {
            mode,
            category,
            include_private,
            center_lat,
            center_long,
            lat_dist,
            long_dist,
            no_location,
            from,
            to,
            tolerance,
            token,
        } => {
            let center = [
                center_lat.unwrap_or(config.default_latitude),
                center_long.unwrap_or(config.default_longitude),
            ];
            let distance = [
                lat_dist.unwrap_or(config.location_distance_lat),
                long_dist.unwrap_or(config.location_distance_long),
            ];

            let app = App::new(config).with_access_token(token);

            let mut request = RunRequest::new(mode.map_or_else(|| app.default_mode(), SyncMode::from));
            request.tolerance = tolerance;
            request.criteria = FilterCriteria {
                category,
                include_private,
                bounding_box: (!no_location).then(|| BoundingBox::around(center, distance)),
                from_stamp: from.as_deref().map(DateTimeUtils::parse_stamp).transpose()?,
                to_stamp: to.as_deref().map(DateTimeUtils::parse_stamp).transpose()?,
            };

            let (path, outcome) = app.run(&request).await?;
            println!("{}", path.display());
            println!(
                "activities: {}, tracks: {}, remote calls: {}, cached: {}, skipped: {}{}",
                outcome.activities.len(),
                outcome.document.placemark_count,
                outcome.stats.called,
                outcome.stats.cached,
                outcome.stats.skipped,
                if outcome.stats.aborted { ", aborted" } else { "" }
            );
        }
        Commands::AuthUrl => {
            let app = App::new(config);
            println!("{}", app.auth()?.authorization_url(DEFAULT_SCOPES));
        }
        Commands::Token { code } => {
            let app = App::new(config);
            let tokens = app.auth()?.exchange_code_for_token(&code).await?;
            println!("{}", tokens.access_token);
        }
    }

    Ok(())
}
