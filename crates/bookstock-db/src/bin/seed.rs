//! # Seed Data Generator
//!
//! Populates the database with a sample book catalog for development.
//!
//! ## Usage
//! ```bash
//! # Whole catalog into the configured database
//! cargo run -p bookstock-db --bin seed
//!
//! # First 10 books only
//! cargo run -p bookstock-db --bin seed -- --count 10
//!
//! # Specify database path / config file
//! cargo run -p bookstock-db --bin seed -- --db ./data/bookstock.db
//! cargo run -p bookstock-db --bin seed -- --config ./bookstock.toml
//! ```
//!
//! Logging follows `RUST_LOG` (default `info,bookstock_db=debug,sqlx=warn`).

use std::env;
use std::path::PathBuf;

use bookstock_core::{Money, NewBook};
use bookstock_db::{Database, StoreConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// (title, author, isbn, price, stock, category)
const CATALOG: &[(&str, &str, &str, &str, i64, &str)] = &[
    ("The Left Hand of Darkness", "Ursula K. Le Guin", "978-0-441-47812-5", "9.99", 12, "Science Fiction"),
    ("Kindred", "Octavia E. Butler", "978-0-8070-8305-2", "16.00", 8, "Fiction"),
    ("The Fifth Season", "N. K. Jemisin", "978-0-316-22929-6", "17.99", 5, "Fantasy"),
    ("Dune", "Frank Herbert", "978-0-441-17271-9", "10.99", 20, "Science Fiction"),
    ("Beloved", "Toni Morrison", "978-1-4000-3341-6", "15.00", 6, "Fiction"),
    ("Piranesi", "Susanna Clarke", "978-1-63557-563-6", "18.00", 4, "Fantasy"),
    ("The Structure of Scientific Revolutions", "Thomas S. Kuhn", "978-0-226-45812-0", "20.00", 3, "Science"),
    ("A Brief History of Time", "Stephen Hawking", "978-0-553-38016-3", "18.00", 9, "Science"),
    ("The Design of Everyday Things", "Don Norman", "978-0-465-05065-9", "19.99", 7, "Design"),
    ("Gödel, Escher, Bach", "Douglas R. Hofstadter", "978-0-465-02656-2", "22.99", 2, "Science"),
    ("The Rust Programming Language", "Steve Klabnik", "978-1-59327-828-1", "39.95", 10, "Computing"),
    ("Structure and Interpretation of Computer Programs", "Harold Abelson", "978-0-262-51087-5", "55.00", 1, "Computing"),
    ("Invisible Cities", "Italo Calvino", "978-0-15-645380-6", "14.99", 0, "Fiction"),
    ("The Remains of the Day", "Kazuo Ishiguro", "978-0-679-73172-9", "16.00", 5, "Fiction"),
    ("Braiding Sweetgrass", "Robin Wall Kimmerer", "978-1-57131-356-0", "20.00", 11, "Nature"),
    ("The Overstory", "Richard Powers", "978-0-393-35668-0", "18.95", 6, "Fiction"),
];

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,bookstock_db=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut count: usize = CATALOG.len();
    let mut db_path: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(CATALOG.len());
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--config" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Bookstock Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>      Number of books to insert (default: whole catalog)");
                println!("  -d, --db <PATH>      Database file path (default: from config)");
                println!("      --config <PATH>  Config file (default: platform config dir)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            other => warn!(argument = %other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    let mut config = StoreConfig::load(config_path)?;
    if let Some(path) = db_path {
        config.database.path = path;
    }

    println!("Bookstock Seed Data Generator");
    println!("=============================");
    println!("Database: {}", config.database.path.display());
    println!("Books:    {}", count.min(CATALOG.len()));
    println!();

    let db = Database::new(config.db_config()).await?;

    let existing = db.books().count().await?;
    if existing > 0 {
        println!("Database already has {} books", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let start = std::time::Instant::now();
    let mut inserted = 0;

    for (title, author, isbn, price, stock, category) in CATALOG.iter().take(count) {
        let new_book = NewBook {
            title: title.to_string(),
            author: author.to_string(),
            isbn: isbn.to_string(),
            price: price.parse::<Money>()?,
            stock: *stock,
            category: category.to_string(),
        };

        match db.books().insert(&new_book).await {
            Ok(book) => {
                inserted += 1;
                info!(id = %book.id, title = %book.title, "Seeded book");
            }
            Err(e) => eprintln!("Failed to insert {}: {}", title, e),
        }
    }

    let books = db.books().list().await?;
    let stock_value = books.iter().try_fold(Money::zero(), |total, book| {
        book.stock_value().and_then(|value| total.checked_add(value))
    });

    println!();
    println!("Inserted {} books in {:?}", inserted, start.elapsed());
    println!("  Copies on hand: {}", books.iter().map(|b| b.stock).sum::<i64>());
    match stock_value {
        Some(value) => println!("  Stock value:    {}", value),
        None => println!("  Stock value:    too large to display"),
    }
    println!();
    println!("Seed complete!");

    db.close().await;
    Ok(())
}
