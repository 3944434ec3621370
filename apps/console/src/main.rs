use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use client_core::{ControllerConfig, Endpoint, HttpPersonTransport, PersonController, UpdateStrategy};
use shared::domain::{Character, Person, PersonId};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Manage persons through the person collection endpoint")]
struct Args {
    #[arg(long, default_value = "http://127.0.0.1:9000")]
    server_url: String,
    /// `replace` uses PUT; `resubmit` saves through POST with the id attached.
    #[arg(long, default_value_t = UpdateStrategy::ReplaceStrippingTags)]
    strategy: UpdateStrategy,
    /// Backend-specific `q` sent with every list request.
    #[arg(long)]
    query: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    List,
    Get {
        id: i64,
    },
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        age: u32,
        #[arg(long = "character")]
        characters: Vec<Character>,
    },
    Update {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        age: Option<u32>,
        /// Replaces the current characters when given at least once.
        #[arg(long = "character")]
        characters: Vec<Character>,
        #[arg(long, conflicts_with = "characters")]
        clear_characters: bool,
    },
    Remove {
        id: i64,
    },
}

#[derive(Debug, Default, PartialEq, Eq)]
struct Edits {
    name: Option<String>,
    age: Option<u32>,
    characters: Vec<Character>,
    clear_characters: bool,
}

fn apply_edits(mut person: Person, edits: Edits) -> Person {
    if let Some(name) = edits.name {
        person.name = name;
    }
    if let Some(age) = edits.age {
        person.age = age;
    }
    if edits.clear_characters {
        person.characters.clear();
    } else if !edits.characters.is_empty() {
        person.characters = edits.characters.into_iter().map(Character::tag).collect();
    }
    person
}

fn print_persons(persons: &[Person]) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(persons)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();
    let args = Args::parse();

    let endpoint = Endpoint::new(&args.server_url)?;
    let controller = PersonController::new(
        Arc::new(HttpPersonTransport::new(endpoint)),
        ControllerConfig {
            update_strategy: args.strategy,
            list_query: args.query,
        },
    );
    info!(server_url = %args.server_url, strategy = %args.strategy, "console ready");

    match args.command {
        Command::List => {
            let persons = controller.list().await?;
            print_persons(&persons)?;
        }
        Command::Get { id } => {
            let person = controller.get(PersonId(id)).await?;
            println!("{}", serde_json::to_string_pretty(&person)?);
        }
        Command::Create {
            name,
            age,
            characters,
        } => {
            controller.set_draft_name(name).await;
            controller.set_draft_age(Some(age)).await;
            for character in characters {
                controller.add_draft_character(character).await;
            }
            let created = controller.create().await?;
            println!("created person id={}", created.id);
            print_persons(&controller.persons().await)?;
        }
        Command::Update {
            id,
            name,
            age,
            characters,
            clear_characters,
        } => {
            let current = controller.get(PersonId(id)).await?;
            let edited = apply_edits(
                current,
                Edits {
                    name,
                    age,
                    characters,
                    clear_characters,
                },
            );
            controller.update(&edited).await?;
            println!("updated person id={id}");
            print_persons(&controller.persons().await)?;
        }
        Command::Remove { id } => {
            let person = controller.get(PersonId(id)).await?;
            controller.remove(&person).await?;
            println!("removed person id={id}");
            print_persons(&controller.persons().await)?;
        }
    }

    Ok(())
}
