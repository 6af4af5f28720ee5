//! StoryForge CLI: the main entry point.
//!
//! Commands:
//! - `onboard`:   Initialize config & data directory
//! - `generate`:  Write the next scene of the story
//! - `text`:      Free-form generation with explicit context
//! - `validate`:  Continuity-check a chapter
//! - `sentiment`: Score the emotions of a passage
//! - `arc`:       Check segments against an intended emotional arc
//! - `image`:     Illustrate a description
//! - `memory`:    Inspect and edit continuity memory
//! - `providers`: Show configured provider families

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "storyforge",
    about = "StoryForge: AI-assisted interactive storytelling",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration and data directory
    Onboard,

    /// Generate the next narrative segment
    Generate {
        /// What should happen next
        prompt: String,

        /// Story owner recorded with the scene
        #[arg(short, long, default_value = "local")]
        user: String,

        #[command(flatten)]
        toggles: commands::story::ToggleArgs,

        /// Write the illustration to this file (implies --image)
        #[arg(long, conflicts_with = "no_image")]
        image_out: Option<std::path::PathBuf>,

        /// Print the segment as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate free-form text with explicit context
    Text {
        prompt: String,

        #[arg(short, long, default_value = "")]
        context: String,
    },

    /// Check a chapter for plot holes and inconsistencies
    Validate {
        /// File containing the chapter text
        chapter: std::path::PathBuf,

        #[arg(short, long, default_value = "")]
        context: String,

        /// Character whose profile is added to the context (repeatable)
        #[arg(long = "character", value_name = "NAME")]
        characters: Vec<String>,
    },

    /// Score the emotions expressed in a passage
    Sentiment {
        text: String,

        /// Print the scores as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check story segments against an intended emotional arc
    Arc {
        /// Files holding the segments, in story order
        #[arg(required = true)]
        segments: Vec<std::path::PathBuf>,

        /// Intended emotion per segment, comma-separated (e.g. joy,fear,sadness)
        #[arg(short, long)]
        intended: String,

        /// Minimum score the intended emotion must reach
        #[arg(short, long, default_value_t = storyforge_engine::DEFAULT_ARC_THRESHOLD)]
        threshold: f64,
    },

    /// Generate an illustration
    Image {
        description: String,

        /// Extra direction appended to the description
        #[arg(short, long)]
        prompt: Option<String>,

        /// Output file (PNG)
        #[arg(short, long, default_value = "scene.png")]
        out: std::path::PathBuf,
    },

    /// Manage continuity memory
    Memory {
        #[command(subcommand)]
        action: MemoryAction,
    },

    /// List configured provider families
    Providers,
}

#[derive(Subcommand)]
enum MemoryAction {
    /// Show stored events, newest first
    History {
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Find the events most relevant to a query
    Search {
        query: String,

        #[arg(short = 'n', long, default_value_t = 3)]
        limit: usize,
    },

    /// Record an event by hand
    Add {
        text: String,

        #[arg(short, long, default_value = "local")]
        user: String,
    },

    /// Delete every stored event
    Clear {
        #[arg(long)]
        confirm: bool,
    },

    /// List character profiles
    Profiles,

    /// Create or update a character profile
    SetProfile {
        name: String,

        /// Traits as key=value pairs
        #[arg(required = true)]
        traits: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Generate {
            prompt,
            user,
            toggles,
            image_out,
            json,
        } => commands::story::generate(&prompt, &user, &toggles, image_out, json).await?,
        Commands::Text { prompt, context } => commands::story::text(&prompt, &context).await?,
        Commands::Validate {
            chapter,
            context,
            characters,
        } => commands::story::validate(&chapter, &context, &characters).await?,
        Commands::Sentiment { text, json } => commands::sentiment::analyze(&text, json).await?,
        Commands::Arc {
            segments,
            intended,
            threshold,
        } => {
            let intended = commands::sentiment::parse_arc(&intended);
            commands::sentiment::arc(&segments, &intended, threshold).await?
        }
        Commands::Image {
            description,
            prompt,
            out,
        } => commands::image::run(&description, prompt.as_deref(), &out).await?,
        Commands::Memory { action } => match action {
            MemoryAction::History { limit } => commands::memory::history(limit).await?,
            MemoryAction::Search { query, limit } => commands::memory::search(&query, limit).await?,
            MemoryAction::Add { text, user } => commands::memory::add(&text, &user).await?,
            MemoryAction::Clear { confirm } => commands::memory::clear(confirm).await?,
            MemoryAction::Profiles => commands::memory::profiles().await?,
            MemoryAction::SetProfile { name, traits } => {
                commands::memory::set_profile(&name, &traits).await?
            }
        },
        Commands::Providers => commands::providers::run().await?,
    }

    Ok(())
}
