use anyhow::Result;
use clap::Parser;

mod access;
mod cache;
mod cli;
mod commands;
mod config;
mod error;
mod models;
mod persist;
mod routing;
mod store;
mod validation;

use cli::{Args, Commands, CompanyCommands};
use commands::AppContext;
use commands::utils::init_logging;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    // Commands that don't need a loaded configuration
    match args.command {
        Commands::Init { output, force } => {
            return commands::setup::init(output.or(args.config), force).map(|_| ());
        }
        Commands::HashPassword { password } => return commands::setup::hash_password(&password),
        _ => {}
    }

    let mut ctx = AppContext::load(args.config)?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        match args.command {
            Commands::Register { username, password } => {
                commands::account::register(&ctx, &username, &password).await.map(|_| ())
            }
            Commands::Login { username, password } => {
                commands::account::login(&ctx, &username, &password).await.map(|_| ())
            }
            Commands::Logout => commands::account::logout(&ctx),
            Commands::Status => commands::account::status(&ctx).await.map(|_| ()),
            Commands::Profile { cpf, phone, email } => {
                let input = access::ProfileInput { cpf, phone, email };
                commands::account::profile(&ctx, input).await.map(|_| ())
            }
            Commands::Company { command } => match command {
                CompanyCommands::Add { name, cnpj } => {
                    commands::account::add_company(&ctx, &name, &cnpj).await
                }
                CompanyCommands::List => commands::account::list_companies(&ctx).await,
            },
            Commands::DeleteAccount { yes } => commands::account::delete_account(&ctx, yes).await,
            Commands::Watch => commands::session::watch(&ctx).await.map(|_| ()),
            Commands::Route { path } => commands::session::route(&ctx, &path).map(|_| ()),
            Commands::Admin {
                credentials,
                command,
            } => commands::admin::run(&mut ctx, credentials, command).await,
            Commands::Init { .. } | Commands::HashPassword { .. } => Ok(()),
        }
    })
}
