use std::io::{self, Write};

use clap::{Args, Subcommand};
use storefront_app::{
    auth::{PgAuthService, UserRole},
    database::{self, Db},
};

#[derive(Debug, Args)]
pub(crate) struct UserCommand {
    #[command(subcommand)]
    command: UserSubcommand,
}

#[derive(Debug, Subcommand)]
enum UserSubcommand {
    /// Create a user and print their API token
    Create(CreateUserArgs),
}

#[derive(Debug, Args)]
struct CreateUserArgs {
    /// Email address
    #[arg(long)]
    email: String,

    /// Grant access to the admin API
    #[arg(long)]
    admin: bool,

    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,
}

pub(crate) async fn run(command: UserCommand) -> Result<(), String> {
    match command.command {
        UserSubcommand::Create(args) => create_user(args).await,
    }
}

async fn create_user(args: CreateUserArgs) -> Result<(), String> {
    let pool = database::connect(&args.database_url)
        .await
        .map_err(|error| format!("failed to connect to database: {error}"))?;

    let role = if args.admin {
        UserRole::Admin
    } else {
        UserRole::Customer
    };

    let issued = PgAuthService::new(Db::new(pool))
        .create_user(&args.email, role)
        .await
        .map_err(|error| format!("failed to create user: {error}"))?;

    let mut stdout = io::stdout().lock();

    writeln!(stdout, "user_uuid: {}", issued.user.uuid)
        .and_then(|()| writeln!(stdout, "email: {}", issued.user.email))
        .and_then(|()| writeln!(stdout, "role: {}", issued.user.role))
        .and_then(|()| writeln!(stdout, "api_token: {}", issued.token))
        .and_then(|()| writeln!(stdout, "store this token now; it is only shown once"))
        .map_err(|error| format!("failed to write output: {error}"))
}
