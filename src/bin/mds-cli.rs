use clap::{Parser, Subcommand};
use reqwest::Response;
use serde_json::Value;

#[derive(Parser)]
#[command(name = "mds-cli")]
#[command(about = "Query a running metadata emulator", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://127.0.0.1:8080")]
    url: String,

    /// Service account to query.
    #[arg(short, long, default_value = "default")]
    account: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the served project id
    ProjectId,
    /// Print the service account email
    Email,
    /// Print the granted scopes
    Scopes,
    /// Fetch an access token
    Token,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = format!("{}/computeMetadata/v1", cli.url);

    let (path, json) = match cli.command {
        Commands::ProjectId => (format!("{base}/project/project-id"), false),
        Commands::Email => (
            format!("{base}/instance/service-accounts/{}/email", cli.account),
            false,
        ),
        Commands::Scopes => (
            format!("{base}/instance/service-accounts/{}/scopes", cli.account),
            false,
        ),
        Commands::Token => (
            format!("{base}/instance/service-accounts/{}/token", cli.account),
            true,
        ),
    };

    let res = client
        .get(path)
        .header("Metadata-Flavor", "Google")
        .send()
        .await?;
    print_response(res, json).await
}

async fn print_response(
    res: Response,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let body = res.text().await?;

    if !status.is_success() {
        return Err(format!("emulator returned {status}: {}", body.trim_end()).into());
    }

    if json {
        let value: Value = serde_json::from_str(&body)?;
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{}", body.trim_end());
    }
    Ok(())
}
