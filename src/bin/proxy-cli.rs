use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "proxy-cli")]
#[command(about = "Status CLI for the hotspot proxy", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://127.0.0.1:8889")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Running state and active client count
    Status,
    /// Client addresses seen within the TTL
    Clients,
    /// Recent proxy log lines
    Logs,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let path = match cli.command {
        Commands::Status => "status",
        Commands::Clients => "clients",
        Commands::Logs => "logs",
    };
    let res = client
        .get(format!("{}/admin/{}", cli.url.trim_end_matches('/'), path))
        .send()
        .await?;

    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    match (path, &json) {
        ("logs", Value::Array(lines)) => {
            for line in lines {
                println!("{}", line.as_str().unwrap_or_default());
            }
        }
        _ => println!("{}", serde_json::to_string_pretty(&json)?),
    }
    Ok(())
}
