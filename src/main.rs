use std::net::IpAddr;

use chrono::Local;
use clap::{Parser, Subcommand};
use review_scrap::{
    api::create_router,
    browser::ReviewBrowser,
    config::Config,
    info_time,
    process::{GoodreadsSource, PaginationCoordinator},
    Result, DEFAULT_QUERY_ENDPOINT, DEFAULT_USER_AGENT,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "review-scrap")]
#[command(about = "Scrapes favorable book reviews and serves them page by page")]
#[command(version)]
struct Args {
    /// Review query service endpoint
    #[arg(long, global = true, env = "GOODREADS_QUERY_ENDPOINT", default_value = DEFAULT_QUERY_ENDPOINT)]
    query_endpoint: String,

    /// Credential used when none can be found in the book page or the request
    #[arg(long, global = true, env = "GOODREADS_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    #[arg(long, global = true, env = "REVIEW_SCRAP_USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    user_agent: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve GET /reviews over HTTP
    Serve {
        #[arg(short, long, default_value = "3000", env = "REVIEW_SCRAP_PORT")]
        port: u16,

        #[arg(long, default_value = "0.0.0.0", env = "REVIEW_SCRAP_HOST")]
        host: IpAddr,
    },
    /// Print the favorable reviews of a book, page by page
    Fetch {
        /// Book URL
        url: String,

        /// How many pages to walk
        #[arg(short, long, default_value_t = 1)]
        pages: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "review_scrap=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let mut config = Config {
        query_endpoint: args.query_endpoint,
        user_agent: args.user_agent,
        ..Config::default()
    }
    .with_fallback_api_key(args.api_key);

    match args.command {
        Command::Serve { port, host } => {
            config.port = port;
            config.host = host;
            serve(config).await
        }
        Command::Fetch { url, pages } => fetch(config, &url, pages).await,
    }
}

async fn serve(config: Config) -> Result<()> {
    let coordinator = PaginationCoordinator::new(
        GoodreadsSource::new(&config),
        config.fallback_api_key.clone(),
    );
    let app = create_router(coordinator);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info_time!("Listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn fetch(config: Config, url: &str, pages: u32) -> Result<()> {
    let start_time = Local::now();
    let coordinator = PaginationCoordinator::new(
        GoodreadsSource::new(&config),
        config.fallback_api_key.clone(),
    );
    let mut browser = ReviewBrowser::new(&coordinator, url)?;

    let mut page = browser.open().await?;
    if let Some(book) = &page.book {
        println!("{} by {}\n{}\n", book.title, book.author, book.cover_url);
    }
    loop {
        print_page(page);
        if page.pagination.current_page >= pages || !page.pagination.has_next {
            break;
        }
        page = browser.next().await?;
    }

    info_time!(start_time, "Fetched {} page(s) of {}", browser.current_page().unwrap_or(0), url);
    Ok(())
}

fn print_page(page: &review_scrap::process::ReviewsPage) {
    println!(
        "--- page {} ({} favorable, {} total) ---",
        page.pagination.current_page, page.total_filtered, page.total_count
    );
    for review in &page.reviews {
        println!(
            "{} {:<30} {}\n{}\n",
            "*".repeat(review.rating as usize),
            review.reviewer,
            review.date,
            review.content.trim()
        );
    }
}
