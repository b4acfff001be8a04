use chrono::Utc;
use clap::Parser;
use entity::user;
use facesecure::{
    config::{Command, Config},
    server::run_server,
};
use facesecure_core::password::hash_password;
use migration::MigratorTrait;
use sea_orm::{ActiveModelTrait, ColumnTrait, Database, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let config = Config::parse();

    // Initialize logger based on command
    let log_level = match &config.command {
        Command::Serve(serve_config) => serve_config.log_level.as_str(),
        _ => "info",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    match config.command {
        Command::Serve(serve_config) => {
            run_server(serve_config).await?;
        }
        Command::Migrate { database_url } => {
            run_migrations(&database_url).await?;
        }
        Command::CreateUser {
            name,
            email,
            password,
        } => {
            create_user(&name, &email, &password).await?;
        }
        Command::ListUsers => {
            list_users().await?;
        }
    }

    Ok(())
}

fn database_url_from_env() -> String {
    std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite://./facesecure.db?mode=rwc".to_string())
}

async fn run_migrations(database_url: &str) -> anyhow::Result<()> {
    log::info!("Connecting to database: {}", database_url);
    let db = Database::connect(database_url).await?;

    log::info!("Running database migrations...");
    migration::Migrator::up(&db, None).await?;

    println!("✅ Database migrations completed successfully!");

    Ok(())
}

async fn create_user(name: &str, email: &str, password: &str) -> anyhow::Result<()> {
    let db = Database::connect(database_url_from_env()).await?;

    let email = email.trim().to_lowercase();
    let existing = user::Entity::find()
        .filter(user::Column::Email.eq(&email))
        .one(&db)
        .await?;

    if existing.is_some() {
        anyhow::bail!("An account with email '{}' already exists", email);
    }

    log::info!("Hashing password...");
    let password_hash = hash_password(password)?;

    let now = Utc::now();
    let account = user::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        name: Set(name.trim().to_string()),
        email: Set(email.clone()),
        password_hash: Set(Some(password_hash)),
        face_template: Set(None),
        device_trust: Set(serde_json::json!({})),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
    };
    let account = account.insert(&db).await?;

    println!("✅ Account created successfully!");
    println!("   ID: {}", account.id);
    println!("   Email: {}", email);

    Ok(())
}

async fn list_users() -> anyhow::Result<()> {
    let db = Database::connect(database_url_from_env()).await?;

    let users = user::Entity::find().all(&db).await?;

    if users.is_empty() {
        println!("No accounts found.");
    } else {
        println!("Accounts:");
        println!("{:<38} {:<30} {:<20}", "ID", "Email", "Created At");
        println!("{}", "-".repeat(90));
        for account in users {
            println!(
                "{:<38} {:<30} {:<20}",
                account.id,
                account.email,
                account.created_at.format("%Y-%m-%d %H:%M:%S")
            );
        }
    }

    Ok(())
}
