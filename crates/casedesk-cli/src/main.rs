use casedesk::modules::permissions::service::repair_permission_names;
use casedesk_cli::admin::create_admin;
use casedesk_cli::report::format_repair_report;
use casedesk_db::{init_db_pool, run_migrations};
use clap::{Parser, Subcommand};
use dialoguer::{Input, Password};
use dotenvy::dotenv;
use sqlx::PgPool;

#[derive(Parser)]
#[command(name = "casedesk-cli")]
#[command(about = "Casedesk CLI - Administrative tools for Casedesk", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a user holding the system administrator role
    CreateAdmin {
        /// Email address
        #[arg(short = 'e', long)]
        email: Option<String>,

        /// Full name
        #[arg(short = 'n', long)]
        full_name: Option<String>,

        /// Password (will be prompted securely if not provided)
        #[arg(short = 'p', long)]
        password: Option<String>,
    },
    /// Recompute every permission name from its module, action and scope
    RepairPermissionNames,
    /// Apply pending database migrations
    Migrate,
}

#[tokio::main]
async fn main() {
    dotenv().ok();

    let cli = Cli::parse();
    let pool = init_db_pool().await;

    match cli.command {
        Commands::CreateAdmin {
            email,
            full_name,
            password,
        } => handle_create_admin(&pool, email, full_name, password).await,
        Commands::RepairPermissionNames => handle_repair_permission_names(&pool).await,
        Commands::Migrate => handle_migrate(&pool).await,
    }
}

async fn handle_create_admin(
    pool: &PgPool,
    email: Option<String>,
    full_name: Option<String>,
    password: Option<String>,
) {
    let email = email.unwrap_or_else(|| {
        Input::new()
            .with_prompt("Email address")
            .interact_text()
            .expect("Failed to read email")
    });

    let full_name = full_name.or_else(|| {
        Input::<String>::new()
            .with_prompt("Full name (optional)")
            .allow_empty(true)
            .interact_text()
            .ok()
            .filter(|name| !name.trim().is_empty())
    });

    let password = password.unwrap_or_else(|| {
        Password::new()
            .with_prompt("Password")
            .with_confirmation("Confirm password", "Passwords don't match")
            .interact()
            .expect("Failed to read password")
    });

    match create_admin(pool, &email, full_name, &password).await {
        Ok(admin) => {
            println!("\n✅ Administrator created successfully!");
            println!("   Email: {}", admin.email);
            if let Some(name) = admin.full_name {
                println!("   Name: {}", name);
            }
        }
        Err(e) => {
            eprintln!("\n❌ Error creating administrator: {:#}", e.error);
            std::process::exit(1);
        }
    }
}

async fn handle_repair_permission_names(pool: &PgPool) {
    match repair_permission_names(pool).await {
        Ok(report) => {
            print!("{}", format_repair_report(&report));
            if !report.conflicts.is_empty() {
                std::process::exit(2);
            }
        }
        Err(e) => {
            eprintln!("\n❌ Error repairing permission names: {:#}", e.error);
            std::process::exit(1);
        }
    }
}

async fn handle_migrate(pool: &PgPool) {
    match run_migrations(pool).await {
        Ok(()) => println!("✅ Migrations applied"),
        Err(e) => {
            eprintln!("\n❌ Error applying migrations: {}", e);
            std::process::exit(1);
        }
    }
}
