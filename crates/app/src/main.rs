//! authlink command-line client.
//!
//! Runs one GraphQL operation against `--endpoint` (or `AUTHLINK_GQL_ENDPOINT`),
//! signed in when an access token is given and with the public role
//! otherwise, and prints every result as JSON. Every flag falls back to its
//! `AUTHLINK_*` environment variable.

use std::sync::Arc;

use authlink_application::auth::AuthStatePublisher;
use authlink_application::ports::{NoopTokenStorage, TokenStorage};
use authlink_domain::{ClientSettings, DomainResult, OperationResult, PublicRole, RequestPolicy};
use authlink_infrastructure::{BindOptions, FileTokenStorage, SessionIdentityProvider, TransportBinder};
use clap::{ArgAction, Args, Parser, Subcommand};
use futures_util::StreamExt;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "authlink", version, about = "Run GraphQL operations with identity-provider auth")]
struct Cli {
    /// Absolute http(s) URI of the GraphQL endpoint.
    #[arg(long, env = "AUTHLINK_GQL_ENDPOINT")]
    endpoint: String,
    /// Role sent when no user is signed in.
    #[arg(long, env = "AUTHLINK_PUBLIC_ROLE", default_value = "public")]
    public_role: String,
    /// Default cache interaction for queries (for example `network-only`).
    #[arg(long, env = "AUTHLINK_REQUEST_POLICY", value_parser = parse_request_policy)]
    request_policy: Option<RequestPolicy>,
    /// Reconnect the subscription connection after it drops.
    #[arg(
        long,
        env = "AUTHLINK_WS_AUTO_RECONNECT",
        default_value_t = true,
        action = ArgAction::Set
    )]
    auto_reconnect: bool,
    /// Access token of the signed-in user; without one the public role is used.
    #[arg(long, env = "AUTHLINK_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,
    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn settings(&self) -> DomainResult<ClientSettings> {
        let mut settings =
            ClientSettings::new(&self.endpoint).with_public_role(PublicRole::new(&self.public_role));
        if let Some(policy) = self.request_policy {
            settings.request_policy = policy;
        }
        settings.subscription.auto_reconnect = self.auto_reconnect;
        settings.validate()?;
        Ok(settings)
    }

    fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref().filter(|token| !token.is_empty())
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a query and print its result.
    Query(OperationArgs),
    /// Run a mutation and print its result.
    Mutation(OperationArgs),
    /// Start a subscription and print results until it ends or ctrl-c.
    Subscribe(OperationArgs),
}

impl Command {
    const fn operation(&self) -> &OperationArgs {
        match self {
            Self::Query(args) | Self::Mutation(args) | Self::Subscribe(args) => args,
        }
    }
}

#[derive(Debug, Args)]
struct OperationArgs {
    /// GraphQL document.
    document: String,
    /// Variables as a JSON object.
    #[arg(value_parser = parse_variables)]
    variables: Option<serde_json::Value>,
}

impl OperationArgs {
    fn variables(&self) -> serde_json::Value {
        self.variables.clone().unwrap_or(serde_json::Value::Null)
    }
}

fn parse_request_policy(value: &str) -> Result<RequestPolicy, String> {
    serde_json::from_value(serde_json::Value::String(value.to_string())).map_err(|_| {
        format!(
            "expected one of cache-first, cache-only, network-only, cache-and-network; got {value:?}"
        )
    })
}

fn parse_variables(value: &str) -> Result<serde_json::Value, String> {
    serde_json::from_str(value).map_err(|e| format!("invalid variables: {e}"))
}

fn render(result: &OperationResult) -> serde_json::Value {
    let mut rendered = serde_json::json!({ "data": result.data });
    if let Some(error) = result.error.as_ref().filter(|e| !e.is_empty()) {
        rendered["error"] = serde_json::json!({
            "message": error.message(),
            "status": error.status,
        });
    }
    rendered
}

fn print_result(result: &OperationResult) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(&render(result))?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let settings = cli.settings()?;

    let provider = Arc::new(SessionIdentityProvider::new());
    let publisher = AuthStatePublisher::new(&*provider);
    let mut consumer = publisher.subscribe();
    tokio::spawn(async move {
        while let Some(state) = consumer.changed().await {
            tracing::info!(?state, "authentication state changed");
        }
    });
    match cli.access_token() {
        Some(token) => provider.sign_in(token),
        None => provider.resolve_signed_out(),
    }

    let storage: Arc<dyn TokenStorage> = match FileTokenStorage::default_location() {
        Some(storage) => Arc::new(storage),
        None => Arc::new(NoopTokenStorage),
    };

    tracing::info!("Starting authlink v{}", env!("CARGO_PKG_VERSION"));
    let binder = TransportBinder::bind_with(
        settings,
        provider,
        BindOptions {
            storage: Some(storage),
            subscriptions: matches!(cli.command, Command::Subscribe(_)),
            ..BindOptions::default()
        },
    )?;
    let client = binder.client();

    let args = cli.command.operation();
    match &cli.command {
        Command::Query(_) => print_result(&client.query(&args.document, args.variables()).await)?,
        Command::Mutation(_) => {
            print_result(&client.mutation(&args.document, args.variables()).await)?;
        }
        Command::Subscribe(_) => {
            let mut results = client.subscription(&args.document, args.variables()).await;
            loop {
                tokio::select! {
                    item = results.next() => match item {
                        Some(result) => print_result(&result)?,
                        None => break,
                    },
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
        }
    }

    binder.close();
    publisher.shutdown();
    Ok(())
}
