use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use seisan_auth::app::AuthController;
use seisan_auth::config::GateConfig;
use seisan_auth::error::{AuthError, ConfigError, ValidationError};
use seisan_auth::provider::gotrue::{GoTrueClient, build_http_client};
use seisan_auth::provider::memory::{MemoryIdentityProvider, MemoryProfileStore, seed_demo};
use seisan_auth::provider::rest::RestProfileStore;
use seisan_auth::provider::{IdentityProvider, ProfileStore};
use seisan_auth::redirect::Location;
use seisan_auth::services::account::OnboardingDetails;
use seisan_auth::services::register::RegistrationForm;
use seisan_auth::storage::{DEMO_MODE_KEY, DEMO_USER_KEY, FileStorage, Storage, save_json};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("signal handler failed: {0}")]
    Signal(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "seisan-auth", about = "Session resolution and auth flows for the expense app")]
struct Cli {
    /// Use the in-memory provider seeded with a verified demo account.
    #[arg(long, env = "SEISAN_DEMO")]
    demo: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve the view for a landing URL once.
    Resolve(UrlArgs),
    /// Resolve, then print every router change until interrupted.
    Watch(UrlArgs),
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        confirm_password: String,
    },
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    ResetPassword {
        #[arg(long)]
        email: String,
    },
    Onboard {
        #[arg(long)]
        full_name: String,
        #[arg(long)]
        company_name: String,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        position: Option<String>,
    },
    SignOut,
}

#[derive(Args, Debug)]
struct UrlArgs {
    /// Full landing URL including any query string and hash fragment.
    #[arg(long)]
    url: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), CliError> {
    let _ = dotenvy::dotenv();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("seisan_auth=info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = GateConfig::from_env()?;

    let landing = match &cli.command {
        Command::Resolve(args) | Command::Watch(args) => args.url.clone(),
        _ => None,
    };
    let location = match landing {
        Some(raw) => Location::parse(&raw)?,
        None => Location::new(config.app_origin.clone()),
    };
    let controller = build_controller(&config, cli.demo, Arc::new(location))?;

    match cli.command {
        Command::Resolve(_) => {
            let resolution = controller.mount().await;
            print_json(&json!({
                "resolution": resolution,
                "router": controller.router(),
                "url": controller.location().href().as_str(),
            }))?;
        }
        Command::Watch(_) => run_watch(&controller).await?,
        Command::Register { email, password, confirm_password } => {
            let form = RegistrationForm { email, password, confirm_password };
            let outcome = controller.register(&form).await?;
            print_json(&json!({ "result": outcome, "router": controller.router() }))?;
        }
        Command::Login { email, password } => {
            let outcome = controller.login(&email, &password).await?;
            print_json(&json!({ "result": outcome, "router": controller.router() }))?;
        }
        Command::ResetPassword { email } => {
            controller.request_password_reset(&email).await?;
            print_json(&json!({ "result": { "outcome": "sent" } }))?;
        }
        Command::Onboard { full_name, company_name, phone, position } => {
            let details = OnboardingDetails { full_name, company_name, phone, position };
            let outcome = controller.complete_onboarding(&details).await?;
            print_json(&json!({ "result": outcome, "router": controller.router() }))?;
        }
        Command::SignOut => {
            controller.sign_out().await;
            print_json(&json!({ "router": controller.router() }))?;
        }
    }
    Ok(())
}

fn build_controller(config: &GateConfig, demo: bool, location: Arc<Location>) -> Result<AuthController, CliError> {
    let storage: Arc<dyn Storage> = Arc::new(FileStorage::new(&config.storage_path));

    let (provider, profiles): (Arc<dyn IdentityProvider>, Arc<dyn ProfileStore>) = if demo {
        let provider = MemoryIdentityProvider::new();
        let user = seed_demo(&provider);
        provider.start_session(user.id);
        storage.set_item(DEMO_MODE_KEY, "true");
        save_json(storage.as_ref(), DEMO_USER_KEY, &user);
        tracing::info!(user_id = %user.id, "demo mode");
        (Arc::new(provider), Arc::new(MemoryProfileStore::new()))
    } else {
        let project = config.require_provider()?;
        let http = build_http_client(config.timeouts)?;
        let provider = GoTrueClient::new(http.clone(), project.url.clone(), project.anon_key.clone(), storage.clone());
        let profiles = RestProfileStore::new(http, project.url.clone(), project.anon_key.clone());
        (Arc::new(provider), Arc::new(profiles))
    };

    Ok(AuthController::new(provider, profiles, storage, location, config))
}

async fn run_watch(controller: &AuthController) -> Result<(), CliError> {
    controller.mount().await;
    let mut rx = controller.watch();
    print_json(&json!({ "router": controller.router() }))?;

    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let router = rx.borrow_and_update().clone();
                print_json(&json!({ "router": router }))?;
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
        }
    }
    controller.teardown();
    Ok(())
}

fn print_json(value: &Value) -> Result<(), CliError> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}
