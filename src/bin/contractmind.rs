use alloy_primitives::{Address, B256};
use clap::{Parser, Subcommand};
use contractmind::domain::types::Route;
use contractmind::error::CoreError;
use contractmind::intent::abi::FunctionSignature;
use contractmind::intent::catalog::InterfaceCatalog;
use contractmind::intent::classifier::{classify, Classification, Intent, IntentContext};
use contractmind::intent::codec::encode_call;
use contractmind::logging::init_tracing;
use contractmind::service::ChatRequest;
use contractmind::{ContractMind, ServiceConfig};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "contractmind", version, about = "Compile chat intents into contract calls")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true, env = "CONTRACTMIND_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the 4-byte selector of a function signature
    Selector {
        /// e.g. "balanceOf(address)"
        signature: String,
    },
    /// Classify an intent offline and show the calldata it would produce
    Classify {
        #[arg(long, default_value = "")]
        action: String,
        #[arg(long, default_value = "")]
        message: String,
        #[arg(long)]
        amount: Option<String>,
        #[arg(long)]
        token: Option<String>,
        #[arg(long)]
        user: Address,
        #[arg(long, default_value_t = Address::ZERO)]
        target: Address,
    },
    /// Send a chat message for an agent against the configured node
    Query {
        agent: String,
        #[arg(long)]
        message: String,
        #[arg(long)]
        user: Address,
        #[arg(long)]
        action: Option<String>,
    },
    /// Show the status and decoded events of a transaction
    Status { tx_hash: B256 },
    /// Show an agent record
    Agent { id: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match ServiceConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("error: {error}");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&config.log_filter);

    match run(cli.command, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, config: ServiceConfig) -> Result<(), CoreError> {
    match command {
        Command::Selector { signature } => {
            let function = FunctionSignature::parse(&signature)?;
            print_json(&json!({
                "signature": function.canonical(),
                "selector": function.selector_hex(),
            }))
        }
        Command::Classify {
            action,
            message,
            amount,
            token,
            user,
            target,
        } => {
            let catalog = InterfaceCatalog::global();
            let intent = Intent {
                action,
                message,
                amount,
                token,
                ..Intent::default()
            }
            .with_message_hints(catalog);
            let context = IntentContext {
                caller: user,
                target,
                route: Route::Direct,
                token_decimals: config.token_decimals,
            };
            match classify(catalog, &intent, &context)? {
                Classification::Unknown(unknown) => print_json(&unknown),
                Classification::Resolved(operation) => {
                    let calldata = encode_call(&operation.function, &operation.arguments)?;
                    print_json(&json!({
                        "kind": format!("{:?}", operation.kind).to_lowercase(),
                        "function": operation.function.canonical(),
                        "selector": operation.function.selector_hex(),
                        "calldata": format!("0x{}", hex::encode(calldata)),
                        "description": operation.description,
                    }))
                }
            }
        }
        Command::Query {
            agent,
            message,
            user,
            action,
        } => {
            let service = ContractMind::from_config(config)?;
            let response = service
                .process_message(
                    &agent,
                    ChatRequest {
                        message,
                        user_address: user,
                        action,
                        protocol: None,
                        amount: None,
                        token: None,
                        params: BTreeMap::new(),
                    },
                )
                .await?;
            print_json(&response)
        }
        Command::Status { tx_hash } => {
            let service = ContractMind::from_config(config)?;
            print_json(&service.transaction_status(tx_hash).await?)
        }
        Command::Agent { id } => {
            let service = ContractMind::from_config(config)?;
            print_json(&service.get_agent(&id).await?)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CoreError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|error| CoreError::Internal(format!("failed to render output: {error}")))?;
    println!("{rendered}");
    Ok(())
}
