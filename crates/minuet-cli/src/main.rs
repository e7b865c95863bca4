//! Minuet CLI - session host for the MinuetAItor backend.
//!
//! Stands in for the web shell: wires a `SessionContext` over file-backed
//! storage and drives login, logout, status, profile, and the background
//! session keepers.

use anyhow::Result;
use clap::{Parser, Subcommand};
use minuet_core::{init_logging, Config, Paths};
use minuet_session::{
    LoginFailure, RefreshSchedule, SessionContext, WarningEvent, WarningPolicy,
};
use minuet_storage::FileStore;
use std::io::{self, Write};
use std::sync::Arc;

/// Minuet CLI - session and profile management for MinuetAItor.
#[derive(Parser)]
#[command(name = "minuet")]
#[command(about = "Minuet session CLI for the MinuetAItor backend")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Login with email and password
    Login,

    /// Logout and clear the session
    Logout,

    /// Show authentication status
    Status,

    /// Show the cached session profile
    Me {
        /// Bypass the profile cache
        #[arg(long)]
        refresh: bool,
    },

    /// Keep the session alive and print expiry warnings until interrupted
    Watch,
}

fn build_context() -> Result<Arc<SessionContext>> {
    let paths = Paths::new()?;
    paths.ensure_dirs()?;
    let config = Config::load(&paths)?;
    let storage = Arc::new(FileStore::open(paths.state_file()));
    let context = SessionContext::new(&config, storage)?;
    Ok(context)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let context = build_context()?;
    context.restore();

    match cli.command {
        Commands::Login => login(&context).await,
        Commands::Logout => logout(&context),
        Commands::Status => status(&context),
        Commands::Me { refresh } => me(&context, refresh).await,
        Commands::Watch => watch(&context).await,
    }
}

async fn login(context: &Arc<SessionContext>) -> Result<()> {
    if context.snapshot().authenticated {
        println!("Already logged in.");
        return Ok(());
    }

    print!("Email: ");
    io::stdout().flush()?;
    let mut email = String::new();
    io::stdin().read_line(&mut email)?;
    let email = email.trim().to_string();
    if email.is_empty() {
        eprintln!("Email is required");
        return Ok(());
    }

    let password = rpassword::prompt_password("Password: ")?;
    if password.is_empty() {
        eprintln!("Password is required");
        return Ok(());
    }

    println!("Logging in...");
    match context.login(&email, &password).await {
        Ok(snapshot) => {
            println!("Logged in as {}", email);
            if let Some(expires_at) = snapshot.expires_at {
                println!("Session expires at {}", expires_at.to_rfc3339());
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("Login failed: {}", LoginFailure::classify(&e).user_message());
            Ok(())
        }
    }
}

fn logout(context: &Arc<SessionContext>) -> Result<()> {
    context.logout("user");
    println!("Logged out.");
    Ok(())
}

fn status(context: &Arc<SessionContext>) -> Result<()> {
    let snapshot = context.snapshot();
    if snapshot.authenticated {
        println!("Auth:     logged in");
        match snapshot.expires_at {
            Some(expires_at) => {
                println!("Expires:  {}", expires_at.to_rfc3339());
                let remaining = expires_at
                    .signed_duration_since(chrono::Utc::now())
                    .num_seconds();
                println!("TTL:      {}s", remaining.max(0));
            }
            None => println!("Expires:  unknown"),
        }
    } else {
        println!("Auth:     logged out");
    }
    Ok(())
}

async fn me(context: &Arc<SessionContext>, refresh: bool) -> Result<()> {
    if !context.snapshot().authenticated {
        eprintln!("Not logged in.");
        return Ok(());
    }

    if let Err(e) = context.profile.load_from_api(refresh).await {
        eprintln!("Profile load failed: {}", e);
    }

    match context.profile.profile() {
        Some(profile) => {
            println!("User:        {} ({})", profile.user.username, profile.user.user_id);
            if let Some(full_name) = &profile.user.full_name {
                println!("Name:        {}", full_name);
            }
            if let Some(email) = &profile.user.email {
                println!("Email:       {}", email);
            }
            println!("Roles:       {}", profile.authz.roles.join(", "));
            println!("Permissions: {}", profile.authz.permissions.join(", "));
            println!("Fetched:     {}", profile.meta.fetched_at.to_rfc3339());
        }
        None => eprintln!("No profile available."),
    }
    Ok(())
}

async fn watch(context: &Arc<SessionContext>) -> Result<()> {
    if !context.snapshot().authenticated {
        eprintln!("Not logged in.");
        return Ok(());
    }

    context.spawn_auto_refresh(RefreshSchedule::default());
    let warning = context.spawn_expiry_warning(
        WarningPolicy::default(),
        Arc::new(|event| match event {
            WarningEvent::Show { remaining_secs } => {
                println!("! session expires in {}s", remaining_secs);
            }
            WarningEvent::Tick { remaining_secs } => {
                println!("  {}s remaining", remaining_secs);
            }
            WarningEvent::Hide => println!("session renewed"),
            WarningEvent::ForceLogout => println!("session expired, logged out"),
            WarningEvent::KeepAliveFailed { message } => {
                println!("keep-alive failed: {}", message);
            }
        }),
    );

    println!("Watching session (ctrl-c to stop)...");
    tokio::signal::ctrl_c().await?;

    warning.dispose();
    println!("Stopped.");
    Ok(())
}
