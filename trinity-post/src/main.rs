//! trinity-post - Compose posts and fan them out to social platforms
//!
//! Command-line transport for the Trinity publishing pipeline.

use clap::{Parser, Subcommand};
use libtrinity::logging::LoggingConfig;
use libtrinity::media::local::MediaMimeType;
use libtrinity::media::{LocalFiles, MediaSource};
use libtrinity::service::{telegram_source, TrinityService};
use libtrinity::{
    Config, FanoutPolicy, MediaKind, NewPost, PublishReport, Result, TrinityError,
};
use std::io::{IsTerminal, Read};
use std::path::Path;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "trinity-post")]
#[command(version)]
#[command(about = "Compose posts and publish them to several social platforms")]
#[command(long_about = "\
trinity-post - Compose posts and publish them to several social platforms

COMMANDS:
    draft     Create a draft post
    append    Append a line of text to a draft
    attach    Attach a media item to a draft
    toggle    Select or deselect a target platform
    targets   Show the target selection
    publish   Publish a post to every selected platform
    cancel    Cancel a post
    show      Show a post with its media, targets and activity log

PLATFORMS:
    twitter, pinterest, facebook, instagram, tiktok

USAGE EXAMPLES:
    # Create a draft and publish it to Twitter and Facebook
    trinity-post draft \"Hello world\"
    trinity-post toggle 1 twitter
    trinity-post toggle 1 facebook
    trinity-post publish 1

    # Attach photos in order
    trinity-post attach 1 ~/pictures/a.jpg
    trinity-post attach 1 ~/pictures/b.jpg

CONFIGURATION:
    Configuration file: ~/.config/trinity/config.toml
    Database location: ~/.local/share/trinity/posts.db

    Override with environment variables:
        TRINITY_CONFIG     - Path to config file
        DATABASE_PATH      - Path to database file

EXIT CODES:
    0 - Success
    1 - Publishing or system failure
    2 - Missing platform credentials
    3 - Invalid input (unknown post, platform or too many media)
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Resolve media references as Telegram file ids via the configured bot
    #[arg(long, global = true)]
    telegram: bool,

    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a draft post and print its id
    Draft {
        /// Post text (reads from stdin if not provided)
        text: Option<String>,

        /// Media reference to attach; repeat to attach several in order
        #[arg(short, long)]
        media: Vec<String>,

        /// Submitting user
        #[arg(long, default_value_t = 0)]
        author: i64,

        /// Conversation the post was submitted in
        #[arg(long, default_value_t = 0)]
        chat: i64,

        /// Submission message id
        #[arg(long, default_value_t = 0)]
        message_id: i64,
    },

    /// Append a line of text to a post
    Append { post_id: i64, text: String },

    /// Attach a media item to a post
    Attach {
        post_id: i64,

        /// File path, URL or file id
        source_ref: String,

        /// Treat the item as a video regardless of its extension
        #[arg(long)]
        video: bool,
    },

    /// Select or deselect a target platform
    Toggle { post_id: i64, platform: String },

    /// Show the target selection
    Targets { post_id: i64 },

    /// Publish a post to every selected platform
    Publish {
        post_id: i64,

        /// attempt_all or stop_on_first_failure (defaults to the configured policy)
        #[arg(long)]
        policy: Option<String>,

        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Cancel a post
    Cancel {
        post_id: i64,

        #[arg(long, default_value = "canceled by author")]
        reason: String,
    },

    /// Show a post with its media, targets and activity log
    Show {
        post_id: i64,

        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut logging = LoggingConfig::from_env();
    if std::env::var_os("TRINITY_LOG_LEVEL").is_none() {
        logging.level = "error".to_string();
    }
    logging.verbose(cli.verbose).init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load()?;

    if let Commands::Publish {
        policy: Some(policy),
        ..
    } = &cli.command
    {
        config.publish.policy = policy.parse::<FanoutPolicy>()?;
    }

    let media: Arc<dyn MediaSource> = if cli.telegram {
        let files = telegram_source(&config)?.ok_or_else(|| {
            TrinityError::InvalidInput("--telegram requires a configured bot token".to_string())
        })?;
        Arc::new(files)
    } else {
        Arc::new(LocalFiles::new())
    };

    let service = TrinityService::from_config(&config, media).await?;

    match cli.command {
        Commands::Draft {
            text,
            media,
            author,
            chat,
            message_id,
        } => cmd_draft(&service, text, media, author, chat, message_id).await,
        Commands::Append { post_id, text } => {
            service.database().append_text(post_id, &text).await
        }
        Commands::Attach {
            post_id,
            source_ref,
            video,
        } => cmd_attach(&service, post_id, &source_ref, video).await,
        Commands::Toggle { post_id, platform } => {
            let selection = service.selector().toggle(post_id, &platform).await?;
            println!("{}", selection);
            Ok(())
        }
        Commands::Targets { post_id } => {
            for line in service.selector().menu(post_id).await? {
                println!("{}", line);
            }
            Ok(())
        }
        Commands::Publish {
            post_id, format, ..
        } => cmd_publish(&service, post_id, &format).await,
        Commands::Cancel { post_id, reason } => {
            service.publisher().cancel(post_id, &reason).await
        }
        Commands::Show { post_id, format } => cmd_show(&service, post_id, &format).await,
    }
}

fn validate_format(format: &str) -> Result<()> {
    if format != "text" && format != "json" {
        return Err(TrinityError::InvalidInput(format!(
            "Invalid format '{}'. Must be 'text' or 'json'",
            format
        )));
    }
    Ok(())
}

fn media_kind(source_ref: &str, video: bool) -> MediaKind {
    if video {
        return MediaKind::Video;
    }
    MediaMimeType::from_path(Path::new(source_ref))
        .map(|mime| mime.kind())
        .unwrap_or(MediaKind::Photo)
}

fn read_text(text: Option<String>) -> Result<String> {
    if let Some(text) = text {
        return Ok(text);
    }

    let mut stdin = std::io::stdin();
    if stdin.is_terminal() {
        return Ok(String::new());
    }

    let mut buffer = String::new();
    stdin
        .read_to_string(&mut buffer)
        .map_err(|e| TrinityError::InvalidInput(format!("Failed to read stdin: {}", e)))?;
    Ok(buffer.trim_end().to_string())
}

async fn cmd_draft(
    service: &TrinityService,
    text: Option<String>,
    media: Vec<String>,
    author: i64,
    chat: i64,
    message_id: i64,
) -> Result<()> {
    let mut draft = NewPost::text(author, chat, read_text(text)?).with_message_id(message_id);
    draft.media = media
        .into_iter()
        .map(|source_ref| {
            let kind = media_kind(&source_ref, false);
            (source_ref, kind)
        })
        .collect();

    let post_id = service.database().create_post(&draft).await?;
    println!("{}", post_id);
    Ok(())
}

async fn cmd_attach(
    service: &TrinityService,
    post_id: i64,
    source_ref: &str,
    video: bool,
) -> Result<()> {
    let db = service.database();
    db.add_media(post_id, source_ref, media_kind(source_ref, video))
        .await?;
    println!("{}", db.count_media(post_id).await?);
    Ok(())
}

async fn cmd_publish(service: &TrinityService, post_id: i64, format: &str) -> Result<()> {
    validate_format(format)?;

    let report = service.publisher().publish(post_id).await?;
    if format == "json" {
        println!("{}", report_json(&report));
    } else {
        println!("{}", report.summary());
    }

    report.into_result().map(|_| ())
}

fn report_json(report: &PublishReport) -> serde_json::Value {
    let outcomes: Vec<serde_json::Value> = report
        .outcomes
        .iter()
        .map(|o| match &o.result {
            Ok(id) => serde_json::json!({
                "platform": o.platform,
                "success": true,
                "external_id": id,
            }),
            Err(e) => serde_json::json!({
                "platform": o.platform,
                "success": false,
                "error": e.to_string(),
            }),
        })
        .collect();

    serde_json::json!({
        "post_id": report.post_id,
        "outcomes": outcomes,
        "skipped": report.skipped,
    })
}

async fn cmd_show(service: &TrinityService, post_id: i64, format: &str) -> Result<()> {
    validate_format(format)?;

    let db = service.database();
    let post = db.get_post(post_id).await?;
    let media = db.list_media(post_id).await?;
    let targets = db.list_target_rows(post_id).await?;
    let logs = db.list_logs(post_id).await?;

    if format == "json" {
        let json = serde_json::json!({
            "post": post,
            "media": media,
            "targets": targets,
            "log": logs,
        });
        println!("{}", json);
        return Ok(());
    }

    println!("post {} [{}]", post.id, post.status);
    if !post.text.is_empty() {
        println!("{}", post.text);
    }
    for item in &media {
        println!("media {}: {} ({})", item.position, item.source_ref, item.kind);
    }
    for target in &targets {
        let detail = target
            .external_id
            .as_deref()
            .or(target.error.as_deref())
            .unwrap_or("");
        println!("target {}: {} {}", target.platform, target.status, detail);
    }
    for entry in &logs {
        let platform = entry.platform.map(|p| p.as_str()).unwrap_or("-");
        println!("log {} {} {}", platform, entry.event, entry.detail);
    }
    Ok(())
}
