//! PathDB CLI

use clap::{Parser, Subcommand};
use pathdb::storage::codec;
use pathdb::{Bins, Database, Exp, PathStep, QueryResult, Selection, Value, ValueType};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pathdb")]
#[command(about = "An embedded document store queried with path expressions", long_about = None)]
struct Cli {
    /// Database directory (defaults to current directory)
    #[arg(short, long, default_value = ".")]
    database: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new PathDB database
    Init,

    /// Store a record from a JSON file (each top-level field becomes a bin)
    Put {
        set: String,
        key: String,
        /// JSON file holding the record's bins
        file: PathBuf,
    },

    /// Print a record
    Get {
        set: String,
        key: String,
    },

    /// Execute a PathQL statement against one record
    Query {
        set: String,
        key: String,
        /// The PathQL statement to execute
        statement: String,
    },

    /// Start an interactive PathQL shell bound to one record
    Repl {
        set: String,
        key: String,
    },

    /// Remove every record in a set
    Truncate {
        set: String,
    },

    /// List sets
    Sets,

    /// Run the inventory walkthrough
    Demo {
        /// Inventory data file
        #[arg(default_value = "data/inventory_sample.json")]
        data: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => init_database(&cli.database).await,
        Commands::Put { set, key, file } => put_record(&cli.database, &set, &key, &file).await,
        Commands::Get { set, key } => get_record(&cli.database, &set, &key).await,
        Commands::Query { set, key, statement } => {
            run_query(&cli.database, &set, &key, &statement).await
        }
        Commands::Repl { set, key } => run_repl(&cli.database, &set, &key).await,
        Commands::Truncate { set } => truncate_set(&cli.database, &set).await,
        Commands::Sets => list_sets(&cli.database).await,
        Commands::Demo { data } => run_demo(&cli.database, &data).await,
    }
}

async fn init_database(path: &PathBuf) -> anyhow::Result<()> {
    println!("Initializing PathDB database at {:?}...", path);

    let _db = Database::open(path).await?;

    println!("Database initialized successfully!");
    println!();
    println!("Get started:");
    println!("  pathdb put products catalog inventory.json");
    println!("  pathdb query products catalog \"SELECT TREE FROM catalog AT inventory.*{{featured}}\"");

    Ok(())
}

async fn put_record(path: &PathBuf, set: &str, key: &str, file: &PathBuf) -> anyhow::Result<()> {
    let content = tokio::fs::read_to_string(file).await?;
    let json: serde_json::Value = serde_json::from_str(&content)?;
    let bins = bins_from_json(json)?;

    let db = Database::open(path).await?;
    let generation = db.put(set, key, bins).await?;
    println!("Stored '{}' in set '{}' (generation {})", key, set, generation);
    Ok(())
}

async fn get_record(path: &PathBuf, set: &str, key: &str) -> anyhow::Result<()> {
    let db = Database::open(path).await?;
    match db.get(set, key).await? {
        Some(record) => {
            println!("--- {} (generation {}) ---", record.key, record.meta.generation);
            for (bin, value) in &record.bins {
                println!("[{}]", bin);
                println!("{}", codec::pretty(value));
            }
        }
        None => println!("Record '{}' not found in set '{}'.", key, set),
    }
    Ok(())
}

async fn run_query(path: &PathBuf, set: &str, key: &str, statement: &str) -> anyhow::Result<()> {
    let db = Database::open(path).await?;
    match db.execute(set, key, statement).await {
        Ok(result) => print_result(&result),
        Err(e) => {
            println!("Error: {}", e);
            if let Some(suggestion) = e.downcast_ref::<pathdb::Error>().and_then(|e| e.suggestion())
            {
                println!("Hint: {}", suggestion);
            }
        }
    }
    Ok(())
}

async fn run_repl(path: &PathBuf, set: &str, key: &str) -> anyhow::Result<()> {
    use std::io::{self, BufRead, Write};

    println!("PathQL Interactive Shell - set '{}', record '{}'", set, key);
    println!("Type 'help' for commands, 'exit' to quit.");
    println!();

    let db = Database::open(path).await?;

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("pathql> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line.to_lowercase().as_str() {
            "exit" | "quit" | "\\q" => break,
            "help" | "\\h" => {
                println!("Statements:");
                println!("  SELECT TREE FROM <bin> AT <path>      - Matching substructure");
                println!("  SELECT VALUES FROM <bin> AT <path>    - Flattened matched values");
                println!("  SELECT KEYS FROM <bin> AT <path>      - Matched keys");
                println!("  SELECT COUNT FROM <bin> AT <path>     - Number of matches");
                println!("  MODIFY <bin> AT <path> SET k = expr   - Rewrite matched nodes");
                println!();
                println!("Paths: steps joined with '.', e.g. inventory.*{{featured}}.variants.*{{quantity > 0}}");
                println!("Append NOFAIL to tolerate malformed nested data.");
                continue;
            }
            _ => {}
        }

        match db.execute(set, key, line).await {
            Ok(result) => print_result(&result),
            Err(e) => {
                println!("Error: {}", e);
            }
        }
        println!();
    }

    println!("Goodbye!");
    Ok(())
}

async fn truncate_set(path: &PathBuf, set: &str) -> anyhow::Result<()> {
    let db = Database::open(path).await?;
    let removed = db.truncate(set).await?;
    println!("{} record(s) removed from set '{}'.", removed, set);
    Ok(())
}

async fn list_sets(path: &PathBuf) -> anyhow::Result<()> {
    let db = Database::open(path).await?;
    let sets = db.sets()?;
    if sets.is_empty() {
        println!("No sets.");
    } else {
        for name in sets {
            println!("{} ({} records)", name, db.keys(&name)?.len());
        }
    }
    Ok(())
}

fn print_result(result: &QueryResult) {
    match result {
        QueryResult::Tree(value) => println!("{}", codec::pretty(value)),
        QueryResult::Values(values) => {
            for value in values {
                println!("{}", codec::pretty(value));
            }
            println!("({} value(s))", values.len());
        }
        QueryResult::Keys(keys) => {
            for key in keys {
                println!("{}", codec::pretty(key));
            }
            println!("({} key(s))", keys.len());
        }
        QueryResult::Count(n) => println!("{}", n),
        QueryResult::Affected(n) => println!("({} node(s) changed)", n),
    }
}

fn bins_from_json(json: serde_json::Value) -> anyhow::Result<Bins> {
    match json {
        serde_json::Value::Object(fields) => Ok(fields
            .into_iter()
            .map(|(name, value)| (name, Value::from(value)))
            .collect()),
        _ => anyhow::bail!("Record file must be a JSON object (one field per bin)"),
    }
}

// =============================================================================
// Demo walkthrough
// =============================================================================

const SET: &str = "products";
const KEY: &str = "catalog";
const BIN: &str = "catalog";

async fn run_demo(path: &PathBuf, data: &PathBuf) -> anyhow::Result<()> {
    let db = Database::open(path).await?;

    // Fresh start: load the sample inventory into a single record
    let content = tokio::fs::read_to_string(data).await?;
    let catalog: serde_json::Value = serde_json::from_str(&content)?;
    db.truncate(SET).await?;

    let mut bins = Bins::new();
    bins.insert(BIN.to_string(), Value::from(catalog));
    db.put(SET, KEY, bins).await?;
    println!("Inventory data loaded from {:?}", data);

    banner("STEP 1: Retrieved inventory data");
    print_bin(&db).await?;

    // Filters used throughout: featured products, variants with stock
    let featured = Exp::eq(
        Exp::map_get("featured", ValueType::Bool, Exp::loop_value()),
        Exp::val(true),
    );
    let in_stock = Exp::gt(
        Exp::map_get("quantity", ValueType::Int, Exp::loop_value()),
        Exp::val(0),
    );
    let featured_in_stock = vec![
        PathStep::key("inventory"),
        PathStep::filtered(featured.clone()),
        PathStep::key("variants"),
        PathStep::filtered(in_stock.clone()),
    ];

    banner("MAIN EXAMPLE: Featured products with variants in stock");
    let result = db
        .select_by_path(SET, KEY, BIN, &featured_in_stock, Selection::tree())
        .await?;
    print_result(&result);

    banner("ADVANCED 1: Products whose key matches the regex '10000.*'");
    let key_match = vec![
        PathStep::key("inventory"),
        PathStep::filtered(Exp::regex_match("10000.*", Exp::loop_key())),
    ];
    let result = db
        .select_by_path(SET, KEY, BIN, &key_match, Selection::tree())
        .await?;
    print_result(&result);

    banner("ADVANCED 2: Same query, returning only the matched keys");
    let result = db
        .select_by_path(SET, KEY, BIN, &key_match, Selection::keys())
        .await?;
    print_result(&result);

    banner("ADVANCED 3: Variants in stock AND priced under 50");
    let affordable = Exp::and(
        in_stock.clone(),
        Exp::lt(
            Exp::map_get("price", ValueType::Int, Exp::loop_value()),
            Exp::val(50),
        ),
    );
    let steps = vec![
        PathStep::key("inventory"),
        PathStep::filtered(featured.clone()),
        PathStep::key("variants"),
        PathStep::filtered(affordable),
    ];
    let result = db
        .select_by_path(SET, KEY, BIN, &steps, Selection::tree())
        .await?;
    print_result(&result);

    banner("ADVANCED 4: Add 10 units to every matched variant, in place");
    let bump = Exp::add(
        Exp::map_get("quantity", ValueType::Int, Exp::loop_value()),
        Exp::val(10),
    );
    let changed = db
        .modify_by_path(SET, KEY, BIN, &featured_in_stock, "quantity", &bump, None, false)
        .await?;
    println!("{} variant(s) updated. Inventory is now:", changed);
    print_bin(&db).await?;

    banner("ADVANCED 5: Same update, written to a separate bin");
    let changed = db
        .modify_by_path(
            SET, KEY, BIN, &featured_in_stock, "quantity", &bump,
            Some("updated"), false,
        )
        .await?;
    println!("{} variant(s) updated. Source bin untouched; 'updated' bin holds:", changed);
    let record = db
        .get(SET, KEY)
        .await?
        .ok_or_else(|| anyhow::anyhow!("demo record disappeared"))?;
    if let Some(value) = record.bin("updated") {
        println!("{}", codec::pretty(value));
    }

    banner("ADVANCED 6: Tolerating malformed data with NOFAIL");
    let bad_product = Value::from(serde_json::json!({
        "name": "Hooded Sweatshirt",
        "category": "clothing",
        "featured": true,
        "description": "Warm fleece hoodie with front pocket and adjustable hood.",
        "variants": { "quantity": "10" }
    }));
    db.insert_at_path(SET, KEY, BIN, &[PathStep::key("inventory")], "10000003", bad_product)
        .await?;
    println!("Planted record '10000003' whose variants map is malformed.");
    println!();

    println!("Without NOFAIL:");
    match db
        .select_by_path(SET, KEY, BIN, &featured_in_stock, Selection::tree())
        .await
    {
        Ok(_) => println!("  Unexpected success"),
        Err(e) => println!("  Query failed as expected: {}", e),
    }
    println!();

    println!("With NOFAIL, the malformed record is skipped:");
    let result = db
        .select_by_path(SET, KEY, BIN, &featured_in_stock, Selection::tree().no_fail())
        .await?;
    print_result(&result);

    Ok(())
}

async fn print_bin(db: &Database) -> anyhow::Result<()> {
    let record = db
        .get(SET, KEY)
        .await?
        .ok_or_else(|| anyhow::anyhow!("demo record disappeared"))?;
    match record.bin(BIN) {
        Some(value) => println!("{}", codec::pretty(value)),
        None => println!("(bin '{}' missing)", BIN),
    }
    Ok(())
}

fn banner(title: &str) {
    println!();
    println!("{}", "=".repeat(80));
    println!("{}", title);
    println!("{}", "=".repeat(80));
}
