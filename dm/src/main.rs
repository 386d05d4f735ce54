//! Dungeon Master rules engine driver.
//!
//! Feeds narrator output (or direct tool requests) to the engine over stdin.
//!
//! ```bash
//! cargo run -p dm -- --player Thorin --seed 42
//! cargo run -p dm -- --serve
//! ```

mod headless;

use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Logs go to stderr so stdout carries only the protocol
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }

    let env_seed = std::env::var("DM_DICE_SEED").ok();
    let config = headless::parse_config_from_args(&args, env_seed.as_deref())?;
    tracing::debug!(?config, "starting");

    if config.serve {
        headless::run_serve(config).await
    } else {
        headless::run_headless(config).await
    }
}

fn print_help() {
    println!("Dungeon Master - dice, combat and state tools for an AI narrator");
    println!();
    println!("USAGE:");
    println!("  dm [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("  -h, --help         Show this help message");
    println!("  --seed <N>         Seed the dice for reproducible rolls");
    println!("  --player <NAME>    Create a player before reading input");
    println!("  --serve            JSON-lines mode: {{\"tool\": ..., \"args\": ...}} per line");
    println!();
    println!("ENVIRONMENT:");
    println!("  DM_DICE_SEED       Dice seed when --seed is not given");
    println!("  RUST_LOG           Log filter (default: warn), logs go to stderr");
    println!();
    println!("EXAMPLES:");
    println!("  dm                              # Paste narrator text, then #run");
    println!("  dm --player Thorin --seed 42");
    println!("  echo '{{\"tool\":\"roll_dice\",\"args\":{{\"notation\":\"1d20\"}}}}' | dm --serve");
}
