use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::{json, Map, Value};

use nodehub::api::ADMIN_KEY_HEADER;

#[derive(Parser)]
#[command(name = "nodehub-cli")]
#[command(about = "Admin CLI for the NodeHub control plane", long_about = None)]
struct Cli {
    #[arg(short, long, env = "NODEHUB_URL", default_value = "http://localhost:8080")]
    url: String,

    #[arg(short, long, env = "NODEHUB_ADMIN_KEY")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show control plane status
    Status,
    /// Manage nodes
    Nodes {
        #[command(subcommand)]
        command: NodeCommands,
    },
    /// Inspect templates
    Templates {
        #[command(subcommand)]
        command: TemplateCommands,
    },
    /// Push templates to nodes
    Releases {
        #[command(subcommand)]
        command: ReleaseCommands,
    },
    /// Manage subscriptions
    Subscriptions {
        #[command(subcommand)]
        command: SubscriptionCommands,
    },
}

#[derive(Subcommand)]
enum NodeCommands {
    List,
    Show {
        id: String,
    },
    Create {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "vps")]
        node_type: String,
        #[arg(long, default_value = "")]
        region: String,
        #[arg(long, default_value = "")]
        entry_direct: String,
        #[arg(long, default_value = "")]
        entry_cdn: String,
        #[arg(long, default_value = "")]
        entry_ip: String,
    },
    Delete {
        id: String,
    },
}

#[derive(Subcommand)]
enum TemplateCommands {
    List,
    /// Known protocol, transport and TLS keys
    Registry,
}

#[derive(Subcommand)]
enum ReleaseCommands {
    List,
    Create {
        /// Target node ids
        #[arg(long = "node", required = true)]
        nodes: Vec<String>,
        /// Template ids to apply
        #[arg(long = "template", required = true)]
        templates: Vec<String>,
        /// Release params as key=value
        #[arg(long = "param")]
        params: Vec<String>,
    },
}

#[derive(Subcommand)]
enum SubscriptionCommands {
    List,
    Create {
        #[arg(long)]
        name: String,
        /// Restrict to these node ids (all nodes when omitted)
        #[arg(long = "node")]
        nodes: Vec<String>,
        #[arg(long, default_value = "")]
        remark: String,
        #[arg(long)]
        disabled: bool,
    },
}

fn parse_params(raw: &[String]) -> Result<Map<String, Value>, String> {
    let mut params = Map::new();
    for item in raw {
        let (k, v) = item
            .split_once('=')
            .ok_or_else(|| format!("param '{item}' must be key=value"))?;
        params.insert(k.trim().to_string(), Value::String(v.trim().to_string()));
    }
    Ok(params)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/').to_string();

    let mut headers = HeaderMap::new();
    headers.insert(ADMIN_KEY_HEADER, HeaderValue::from_str(&cli.key)?);

    let get = |path: &str| client.get(format!("{base}{path}")).headers(headers.clone());
    let post = |path: &str, body: Value| {
        client
            .post(format!("{base}{path}"))
            .headers(headers.clone())
            .json(&body)
    };

    let res = match cli.command {
        Commands::Status => get("/api/system/status").send().await?,
        Commands::Nodes { command } => match command {
            NodeCommands::List => get("/api/nodes").send().await?,
            NodeCommands::Show { id } => get(&format!("/api/nodes/{id}")).send().await?,
            NodeCommands::Create {
                name,
                node_type,
                region,
                entry_direct,
                entry_cdn,
                entry_ip,
            } => {
                let body = json!({
                    "name": name,
                    "node_type": node_type,
                    "region": region,
                    "entry_direct": entry_direct,
                    "entry_cdn": entry_cdn,
                    "entry_ip": entry_ip,
                });
                post("/api/nodes", body).send().await?
            }
            NodeCommands::Delete { id } => {
                client
                    .delete(format!("{base}/api/nodes/{id}"))
                    .headers(headers.clone())
                    .send()
                    .await?
            }
        },
        Commands::Templates { command } => match command {
            TemplateCommands::List => get("/api/templates").send().await?,
            TemplateCommands::Registry => get("/api/templates/registry").send().await?,
        },
        Commands::Releases { command } => match command {
            ReleaseCommands::List => get("/api/releases").send().await?,
            ReleaseCommands::Create { nodes, templates, params } => {
                let body = json!({
                    "node_ids": nodes,
                    "template_ids": templates,
                    "params": parse_params(&params)?,
                });
                post("/api/releases", body).send().await?
            }
        },
        Commands::Subscriptions { command } => match command {
            SubscriptionCommands::List => get("/api/subscriptions").send().await?,
            SubscriptionCommands::Create {
                name,
                nodes,
                remark,
                disabled,
            } => {
                let body = json!({
                    "name": name,
                    "enabled": !disabled,
                    "visible_node_ids": nodes,
                    "remark": remark,
                });
                post("/api/subscriptions", body).send().await?
            }
        },
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    match serde_json::from_str::<Value>(&text) {
        Ok(json) if status.is_success() => {
            println!("{}", serde_json::to_string_pretty(json.get("data").unwrap_or(&json))?);
        }
        Ok(json) => {
            eprintln!("Error: control plane returned status {status}");
            eprintln!("{}", serde_json::to_string_pretty(json.get("error").unwrap_or(&json))?);
            std::process::exit(1);
        }
        Err(_) => {
            eprintln!("Error: control plane returned status {status}");
            eprintln!("Response: {text}");
            std::process::exit(1);
        }
    }
    Ok(())
}
