//! `peril-server`: declares the game topology and drives pause/resume
//! from a prompt on stdin.

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

    println!("Starting Peril server...");
    let broker = Arc::new(AmqpBroker::connect(&config.amqp_url).await?);
    let server = PerilServer::start(broker, config.routing.clone()).await?;
    println!("{SERVER_HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt();
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let command = match ServerCommand::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };

        let result = match command {
            ServerCommand::Pause => server.pause().await,
            ServerCommand::Resume => server.resume().await,
            ServerCommand::Help => {
                println!("{SERVER_HELP}");
                Ok(())
            }
            ServerCommand::Quit => break,
        };
        if let Err(e) = result {
            if e.is_fatal() {
                return Err(e.into());
            }
            tracing::error!(error = %e, "command failed");
        }
    }

    let report = server.shutdown().await?;
    println!("Received {} game logs. Goodbye.", report.acknowledged);
    Ok(())
}
