use anyhow::{anyhow, Context, Result};
use case_base::{CandidateInfo, CbrConfig};
use clap::{Parser, Subcommand};
use colored::Colorize;
use data_loader::{Dataset, Genre, UserId};
use recommender::{Evaluation, MovieRecommender};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

/// CBR-Recs - adaptive case-based movie recommender
#[derive(Parser)]
#[command(name = "cbr-recs")]
#[command(about = "Case-based movie recommender with online adaptation", long_about = None)]
struct Cli {
    /// Path to MovieLens dataset directory
    #[arg(short, long, default_value = "data/ml-1m")]
    data_dir: PathBuf,

    /// JSON file overriding the default CBR parameters
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seed for the train / test partition
    #[arg(long)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay test cases through the CBR cycle and report the metrics
    Evaluate {
        /// Maximum number of test cases to consume
        #[arg(long, default_value = "100")]
        cases: usize,

        /// Write the score and similarity sequences to this JSON file
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Get movie recommendations for a user
    Recommend {
        /// User ID to get recommendations for
        #[arg(long)]
        user_id: UserId,
    },

    /// Show a user's ratings and adaptive state
    User {
        /// User ID to display
        #[arg(long)]
        user_id: UserId,
    },
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref(), cli.seed)?;

    println!("Loading MovieLens dataset from {}...", cli.data_dir.display());
    let start = Instant::now();
    let dataset =
        Dataset::load_from_dir(&cli.data_dir).context("Failed to load MovieLens dataset")?;
    let mut recommender = MovieRecommender::from_dataset(dataset, config)
        .context("Failed to initialize the case base")?;
    println!("{} Built case base in {:?}", "✓".green(), start.elapsed());

    match cli.command {
        Commands::Evaluate { cases, output } => {
            handle_evaluate(&mut recommender, cases, output.as_deref())?
        }
        Commands::Recommend { user_id } => handle_recommend(&recommender, user_id)?,
        Commands::User { user_id } => handle_user(&recommender, user_id)?,
    }

    Ok(())
}

fn load_config(path: Option<&Path>, seed: Option<u64>) -> Result<CbrConfig> {
    let config = match path {
        Some(path) => CbrConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => CbrConfig::default(),
    };
    Ok(match seed {
        Some(seed) => config.with_seed(seed),
        None => config,
    })
}

/// Handle the 'evaluate' command
fn handle_evaluate(
    recommender: &mut MovieRecommender,
    cases: usize,
    output: Option<&Path>,
) -> Result<()> {
    let start = Instant::now();
    let evaluation = recommender.evaluate(cases)?;

    print_evaluation(&evaluation);
    println!("Elapsed: {:?}", start.elapsed());

    if let Some(path) = output {
        let file = File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &evaluation)
            .context("Failed to write evaluation results")?;
        info!("Wrote {} iterations to {}", evaluation.len(), path.display());
    }
    Ok(())
}

/// Handle the 'recommend' command
fn handle_recommend(recommender: &MovieRecommender, user_id: UserId) -> Result<()> {
    let recommendations = recommender.recommend(user_id)?;
    print_recommendations(recommender, &recommendations);
    Ok(())
}

/// Handle the 'user' command
fn handle_user(recommender: &MovieRecommender, user_id: UserId) -> Result<()> {
    let case_base = recommender.case_base();
    let index = case_base.index();
    let user = index
        .get_user(user_id)
        .ok_or_else(|| anyhow!("User {} not found", user_id))?;
    let ratings = index.get_user_ratings(user_id);

    println!("{}", format!("User ID: {}", user_id).bold().blue());
    println!("{}Age: {:?}", "• ".green(), user.age);
    println!("{}Gender: {:?}", "• ".green(), user.gender);
    println!("{}Occupation: {:?}", "• ".green(), user.occupation);
    println!("{}Training ratings: {}", "• ".cyan(), ratings.len());
    println!(
        "{}Mean rating: {:.2}",
        "• ".cyan(),
        case_base.get_mean_user_rating(user_id)
    );
    println!(
        "{}Affinity: {:.3}",
        "• ".cyan(),
        case_base.get_user_affinity(user_id)
    );

    let mut top_rated: Vec<_> = ratings.iter().collect();
    top_rated.sort_by(|a, b| {
        b.rating
            .total_cmp(&a.rating)
            .then_with(|| a.movie_id.cmp(&b.movie_id))
    });
    println!("Top rated movies:");
    for rating in top_rated.iter().take(5) {
        println!(
            "  - {} (Rating: {})",
            case_base.movie_name(rating.movie_id),
            rating.rating
        );
    }

    let willingness = case_base.get_user_preferences(user_id);
    let mut genres: Vec<(Genre, f32)> = Genre::ALL
        .iter()
        .map(|&g| (g, willingness[g.index()]))
        .collect();
    genres.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    println!("Genre willingness:");
    for (genre, weight) in genres {
        println!("  - {:<12} {:.3}", genre.label(), weight);
    }
    Ok(())
}

fn print_evaluation(evaluation: &Evaluation) {
    println!("{}", "Evaluation:".bold().blue());
    for (i, (score, sim)) in evaluation
        .scores
        .iter()
        .zip(&evaluation.similarities)
        .enumerate()
    {
        println!(
            "{:>5}. score {:.4}  similarity {:.4}",
            (i + 1).to_string().green(),
            score,
            sim
        );
    }
    println!(
        "{} iterations, mean score {:.4}, mean similarity {:.4}",
        evaluation.len(),
        evaluation.mean_score(),
        evaluation.mean_similarity()
    );
    println!(
        "{} cases retained, {} case base commits",
        evaluation.retained, evaluation.commits
    );
}

fn print_recommendations(recommender: &MovieRecommender, recommendations: &[CandidateInfo]) {
    println!("{}", "Movie Recommendations:".bold().blue());
    for (rank, candidate) in recommendations.iter().enumerate() {
        let genres = candidate
            .genres
            .iter()
            .map(|g| g.label())
            .collect::<Vec<_>>()
            .join(", ");
        let source = match candidate.neighbor {
            Some(neighbor) => format!("via user {}", neighbor),
            None => "popular".to_string(),
        };
        println!(
            "{}. {} [{}] - Score: {:.3} ({})",
            (rank + 1).to_string().green(),
            candidate.name,
            genres,
            candidate.score,
            source
        );
    }
    if recommendations.is_empty() {
        println!("  (none)");
    }
    info!(
        "Recommended {} movies with config rec_movies={}",
        recommendations.len(),
        recommender.config().rec_movies
    );
}
