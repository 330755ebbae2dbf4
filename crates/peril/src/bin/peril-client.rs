//! `peril-client`: joins the game as one player and reads commands from
//! stdin.

use std::io::Write;
use std::sync::Arc;

use peril::prelude::*;
use tokio::io::{AsyncBufReadExt, BufReader};

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let config = PerilConfig::from_env()?;

    println!("Starting Peril client...");
    let broker = Arc::new(AmqpBroker::connect(&config.amqp_url).await?);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("Welcome to the Peril client!");
    println!("Please enter your username:");
    prompt();
    let username = lines.next_line().await?.unwrap_or_default();
    let client = PerilClient::start(broker, config.routing.clone(), &username).await?;
    println!("Welcome, {}!", client.username());
    println!("{CLIENT_HELP}");

    loop {
        prompt();
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let command = match ClientCommand::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };

        let result = match command {
            ClientCommand::Spawn { location, rank } => client
                .spawn(location, rank)
                .map(|id| println!("Spawned unit {id}.")),
            ClientCommand::Move { location, unit_ids } => client
                .move_units(location, &unit_ids)
                .await
                .map(|army_move| {
                    println!(
                        "Moved {} units to {}.",
                        army_move.units.len(),
                        army_move.to_location
                    )
                }),
            ClientCommand::Status => {
                print!("{}", client.status());
                Ok(())
            }
            ClientCommand::Spam(count) => client
                .spam(count)
                .await
                .map(|()| println!("Published {count} logs.")),
            ClientCommand::Help => {
                println!("{CLIENT_HELP}");
                Ok(())
            }
            ClientCommand::Quit => {
                println!("I hate this game! (╯°□°)╯︵ ┻━┻");
                break;
            }
        };
        if let Err(e) = result {
            if e.is_fatal() {
                return Err(e.into());
            }
            println!("{e}");
        }
    }

    client.shutdown().await?;
    Ok(())
}
