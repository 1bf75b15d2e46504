//! DevChain CLI
//!
//! Command-line interface for a running DevChain API:
//! - Register and log learning entries
//! - List entries, badges and stats
//! - Back up and restore a user's data

use chrono::{Duration, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use devchain::config::Config;
use devchain::format::{format_number, format_streak};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "devchain")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Track your learning milestones and earn badges")]
#[command(long_about = "DevChain records learning entries, unlocks milestone badges and can anchor\nentries on the Hedera network.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// API server URL (default: http://localhost:<api.port>)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// User id (default: the signed-in user)
    #[arg(short, long, global = true)]
    pub user: Option<String>,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Register a new user and sign in
    Register {
        username: String,
        email: String,
    },

    /// Sign in by email
    Login {
        email: String,
    },

    /// Log a learning entry
    Log {
        title: String,
        /// What you learned (10-1000 characters)
        #[arg(short, long)]
        description: String,
        /// tutorial, course, project, book, certification, workshop, conference, other
        #[arg(short, long, default_value = "tutorial")]
        category: String,
        /// Date (default: today). Supports: "today", "yesterday", YYYY-MM-DD
        #[arg(long)]
        date: Option<String>,
    },

    /// List entries, newest first
    Entries {
        #[arg(short, long)]
        category: Option<String>,
    },

    /// Show badges and progress
    Badges,

    /// Claim an unlocked milestone badge
    Claim {
        milestone: u32,
    },

    /// Show learning stats
    Stats,

    /// Show API status
    Status,

    /// Download a JSON backup
    Backup {
        /// Output file (default: devchain-backup-<date>.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Restore a JSON backup
    Restore {
        path: PathBuf,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = Config::load_default();

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(config.api.request_timeout_secs))
        .build()?;
    let api_url = cli
        .api_url
        .clone()
        .unwrap_or_else(|| format!("http://localhost:{}", config.api.port));
    let api = |path: &str| format!("{}/api/v1{}", api_url, path);

    match &cli.command {
        Commands::Register { username, email } => {
            let response = client
                .post(api("/users"))
                .json(&serde_json::json!({ "username": username, "email": email }))
                .send()
                .await?;
            let user = expect_json(response, "Registration failed").await?;
            println!(
                "Registered {} ({})",
                user["username"].as_str().unwrap_or("-"),
                user["id"].as_str().unwrap_or("-")
            );
        }

        Commands::Login { email } => {
            let response = client
                .post(api("/session"))
                .json(&serde_json::json!({ "email": email }))
                .send()
                .await?;
            let session = expect_json(response, "Sign in failed").await?;
            println!(
                "Signed in as {}",
                session["user"]["username"].as_str().unwrap_or("-")
            );
        }

        Commands::Log {
            title,
            description,
            category,
            date,
        } => {
            let user_id = resolve_user(&client, &api_url, cli.user.as_deref()).await?;
            let date = parse_date(date.as_deref())?;

            let body = serde_json::json!({
                "title": title,
                "description": description,
                "category": category,
                "date": date.format("%Y-%m-%d").to_string(),
            });

            let response = client
                .post(api(&format!("/users/{}/entries", user_id)))
                .json(&body)
                .send()
                .await?;
            let submission = expect_json(response, "Log failed").await?;

            if cli.format == "json" {
                println!("{}", serde_json::to_string_pretty(&submission)?);
            } else {
                println!("Logged \"{}\" on {}", title, date);
                if let Some(tx) = submission["ledger"]["transaction_id"].as_str() {
                    println!(
                        "  Ledger: {} ({})",
                        tx,
                        submission["ledger"]["kind"].as_str().unwrap_or("-")
                    );
                }
                for badge in submission["unlocked"].as_array().into_iter().flatten() {
                    println!(
                        "  {} Badge unlocked: {}",
                        badge["icon"].as_str().unwrap_or(""),
                        badge["name"].as_str().unwrap_or("-")
                    );
                }
            }
        }

        Commands::Entries { category } => {
            let user_id = resolve_user(&client, &api_url, cli.user.as_deref()).await?;
            let mut request = client.get(api(&format!("/users/{}/entries", user_id)));
            if let Some(category) = category {
                request = request.query(&[("category", category)]);
            }
            let entries = expect_json(request.send().await?, "Failed to fetch entries").await?;

            if cli.format == "json" {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                print_entries(&entries);
            }
        }

        Commands::Badges => {
            let user_id = resolve_user(&client, &api_url, cli.user.as_deref()).await?;
            let response = client
                .get(api(&format!("/users/{}/badges", user_id)))
                .send()
                .await?;
            let data = expect_json(response, "Failed to fetch badges").await?;

            if cli.format == "json" {
                println!("{}", serde_json::to_string_pretty(&data)?);
            } else {
                print_badges(&data);
            }
        }

        Commands::Claim { milestone } => {
            let user_id = resolve_user(&client, &api_url, cli.user.as_deref()).await?;
            let response = client
                .post(api(&format!("/users/{}/badges/{}/claim", user_id, milestone)))
                .send()
                .await?;
            let badge = expect_json(response, "Claim failed").await?;
            println!(
                "{} Claimed {}",
                badge["icon"].as_str().unwrap_or(""),
                badge["name"].as_str().unwrap_or("-")
            );
            if let Some(tx) = badge["transactionId"].as_str() {
                println!("  Transaction: {}", tx);
            }
        }

        Commands::Stats => {
            let user_id = resolve_user(&client, &api_url, cli.user.as_deref()).await?;
            let response = client
                .get(api(&format!("/users/{}/stats", user_id)))
                .send()
                .await?;
            let stats = expect_json(response, "Failed to fetch stats").await?;

            if cli.format == "json" {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_stats(&stats);
            }
        }

        Commands::Status => {
            let response = client.get(format!("{}/health", api_url)).send().await;

            match response {
                Ok(resp) if resp.status().is_success() => {
                    let health: serde_json::Value = resp.json().await?;

                    println!("DevChain v{}", env!("CARGO_PKG_VERSION"));
                    println!();
                    for field in ["status", "storage", "ledger", "scheduler"] {
                        println!("{:<10} {}", field, health[field].as_str().unwrap_or("unknown"));
                    }
                    if let Some(uptime) = health["uptime_seconds"].as_u64() {
                        println!();
                        println!("Uptime: {}", format_duration(uptime));
                    }
                }
                Ok(resp) => {
                    eprintln!("API returned error: {}", resp.status());
                    std::process::exit(1);
                }
                Err(e) => {
                    eprintln!("Cannot connect to DevChain API at {}", api_url);
                    eprintln!("Error: {}", e);
                    eprintln!();
                    eprintln!("Make sure the DevChain API server is running:");
                    eprintln!("  cargo run --bin devchain-api");
                    std::process::exit(1);
                }
            }
        }

        Commands::Backup { output } => {
            let user_id = resolve_user(&client, &api_url, cli.user.as_deref()).await?;
            let response = client
                .get(api(&format!("/users/{}/backup", user_id)))
                .send()
                .await?;

            if !response.status().is_success() {
                eprintln!("{}", error_message("Backup failed", response).await);
                std::process::exit(1);
            }
            let data = response.text().await?;
            let path = output.clone().unwrap_or_else(|| {
                PathBuf::from(devchain::backup::backup_filename(Utc::now().date_naive()))
            });

            std::fs::write(&path, &data)?;
            println!("Backup written to {:?}", path);
        }

        Commands::Restore { path } => {
            if !path.exists() {
                eprintln!("File not found: {:?}", path);
                std::process::exit(1);
            }
            let body = std::fs::read_to_string(path)?;

            let response = client
                .post(api("/backup/restore"))
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body)
                .send()
                .await?;
            let summary = expect_json(response, "Restore failed").await?;
            println!(
                "Restored {} entries for {}",
                summary["entries"].as_u64().unwrap_or(0),
                summary["userId"].as_str().unwrap_or("-")
            );
        }

        Commands::Config { output } => {
            let config = devchain::config::generate_default_config();

            match output {
                Some(path) => {
                    // Create parent directory if needed
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(path, &config)?;
                    println!("Config written to {:?}", path);
                }
                None => {
                    print!("{}", config);
                }
            }
        }
    }

    Ok(())
}

/// Explicit `--user`, else whoever is signed in
async fn resolve_user(
    client: &reqwest::Client,
    api_url: &str,
    user: Option<&str>,
) -> Result<String, Box<dyn std::error::Error>> {
    if let Some(user) = user {
        return Ok(user.to_string());
    }

    let response = client
        .get(format!("{}/api/v1/session", api_url))
        .send()
        .await?;
    let session = expect_json(response, "Failed to read session").await?;

    match session["user"]["id"].as_str() {
        Some(id) => Ok(id.to_string()),
        None => Err("No user signed in. Run `devchain register` or `devchain login`, or pass --user".into()),
    }
}

async fn expect_json(
    response: reqwest::Response,
    context: &str,
) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    if !response.status().is_success() {
        eprintln!("{}", error_message(context, response).await);
        std::process::exit(1);
    }
    Ok(response.json().await?)
}

/// The API's error message, with any per-field messages
async fn error_message(context: &str, response: reqwest::Response) -> String {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();

    let body: serde_json::Value = serde_json::from_str(&text).unwrap_or_default();
    let mut message = match body["error"]["message"].as_str() {
        Some(message) => format!("{} ({}): {}", context, status, message),
        None => format!("{} ({}): {}", context, status, text),
    };
    if let Some(fields) = body["error"]["fields"].as_object() {
        for (field, error) in fields {
            message.push_str(&format!("\n  {}: {}", field, error.as_str().unwrap_or("-")));
        }
    }
    message
}

fn parse_date(s: Option<&str>) -> Result<NaiveDate, Box<dyn std::error::Error>> {
    let today = Utc::now().date_naive();
    match s.map(|s| s.trim().to_lowercase()).as_deref() {
        None | Some("today") => Ok(today),
        Some("yesterday") => Ok(today - Duration::days(1)),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|_| format!("Invalid date: {}. Use YYYY-MM-DD, today or yesterday", s).into()),
    }
}

fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else if seconds < 86400 {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    } else {
        format!("{}d {}h", seconds / 86400, (seconds % 86400) / 3600)
    }
}

fn print_entries(entries: &serde_json::Value) {
    let entries = match entries.as_array() {
        Some(e) if !e.is_empty() => e,
        _ => {
            println!("No entries yet.");
            println!();
            println!("Log your first one with:");
            println!("  devchain log \"Learned Rust ownership\" -d \"Borrowing and lifetimes\"");
            return;
        }
    };

    println!("{:<12} {:<14} {:<40} {}", "Date", "Category", "Title", "Ledger");
    println!("{}", "-".repeat(76));

    for entry in entries {
        let ledger = match entry["transactionId"].as_str() {
            Some(tx) if tx.starts_with("local_") => "local",
            Some(_) => "anchored",
            None => "-",
        };
        println!(
            "{:<12} {:<14} {:<40} {}",
            entry["date"].as_str().unwrap_or("-"),
            entry["category"].as_str().unwrap_or("-"),
            truncate(entry["title"].as_str().unwrap_or("-"), 40),
            ledger
        );
    }
}

fn print_badges(data: &serde_json::Value) {
    for badge in data["badges"].as_array().into_iter().flatten() {
        let unlocked = badge["unlocked"].as_bool().unwrap_or(false);
        println!(
            "{} {:<20} {:>4} entries  {:<10} {}",
            badge["icon"].as_str().unwrap_or(" "),
            badge["name"].as_str().unwrap_or("-"),
            badge["milestone"].as_u64().unwrap_or(0),
            badge["rarity"].as_str().unwrap_or("-"),
            if unlocked { "unlocked" } else { "locked" }
        );
    }
    if let Some(message) = data["progress"]["message"].as_str() {
        println!();
        println!("{}", message);
    }
}

fn print_stats(stats: &serde_json::Value) {
    let number = |key: &str| format_number(stats[key].as_u64().unwrap_or(0));

    println!("Entries:        {}", number("totalEntries"));
    println!("This week:      {}", number("entriesThisWeek"));
    println!(
        "Streak:         {}",
        format_streak(stats["learningStreak"].as_u64().unwrap_or(0) as u32)
    );
    println!("Badges:         {}", number("totalBadges"));
    println!("Anchored:       {}", number("anchoredEntries"));
    if let Some(top) = stats["topCategory"].as_str() {
        println!("Top category:   {}", top);
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
