use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

use doorman::security::signing::{client_signature, now_millis};

#[derive(Parser)]
#[command(name = "doorman-cli")]
#[command(about = "Management CLI for the doorman security gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[arg(short, long, default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check gateway system status
    Status,
    /// Show the current IP whitelist
    Whitelist,
    /// Add an IP to the whitelist
    Allow { ip: String },
    /// Remove an IP from the whitelist
    Deny { ip: String },
    /// Show rate limiter statistics
    RateLimits,
    /// Clear all rate limit buckets
    ClearRateLimits,
    /// Produce X-Timestamp and X-Signature headers for a request
    Sign {
        /// HTTP method, e.g. DELETE
        method: String,
        /// Request path, e.g. /api/users/delete/42
        path: String,
        /// Shared signing secret
        #[arg(short, long)]
        secret: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    match cli.command {
        Commands::Status => {
            let res = client
                .get(format!("{}/api/admin/status", cli.url))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Whitelist => {
            let res = client
                .get(format!("{}/api/admin/whitelist", cli.url))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Allow { ip } => {
            let res = client
                .post(format!("{}/api/admin/whitelist", cli.url))
                .headers(headers)
                .json(&serde_json::json!({ "ip": ip }))
                .send()
                .await?;
            print_status(res);
        }
        Commands::Deny { ip } => {
            let res = client
                .delete(format!("{}/api/admin/whitelist/{}", cli.url, ip))
                .headers(headers)
                .send()
                .await?;
            print_status(res);
        }
        Commands::RateLimits => {
            let res = client
                .get(format!("{}/api/admin/rate-limits", cli.url))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::ClearRateLimits => {
            let res = client
                .post(format!("{}/api/admin/rate-limits/clear", cli.url))
                .headers(headers)
                .send()
                .await?;
            print_status(res);
        }
        Commands::Sign {
            method,
            path,
            secret,
        } => {
            let timestamp = now_millis();
            let signature = client_signature(&method.to_uppercase(), &path, timestamp, &secret);
            println!("X-Timestamp: {}", timestamp);
            println!("X-Signature: {}", signature);
        }
    }

    Ok(())
}

fn print_status(res: reqwest::Response) {
    let status = res.status();
    if status.is_success() {
        println!("OK ({})", status);
    } else {
        eprintln!("Error: Admin API returned status {}", status);
    }
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
