use anyhow::Result;
use clap::{Parser, Subcommand};
use client_core::{RemoteState, Snapshot, SyncClient};
use shared::domain::{ChannelId, UserId};
use tokio::sync::watch;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    server_url: String,
    #[arg(long)]
    auth_token: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Page through one owner's pets.
    Pets {
        owner_id: i64,
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value_t = 1)]
        through_page: i64,
    },
    /// Page through a channel's message feed.
    Messages {
        channel_id: i64,
        #[arg(long, default_value_t = 1)]
        through_page: i64,
    },
    /// Page through a select-option collection.
    Options {
        collection: String,
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value_t = 1)]
        through_page: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let cli = Cli::parse();
    let (_auth_tx, auth_rx) = watch::channel(cli.auth_token.clone());
    let client = SyncClient::connect(&cli.server_url, auth_rx)?;

    match cli.command {
        Command::Pets {
            owner_id,
            search,
            through_page,
        } => {
            let picker = client.pet_picker(UserId(owner_id));
            if search.is_some() {
                picker.set_search(search).await;
            }
            for page in 1..=through_page {
                picker.request(page).await;
            }
            let snapshot = picker.subscribe().borrow().clone();
            render(&snapshot, |pet| {
                format!(
                    "pet_id={} name={} species={:?}",
                    pet.pet_id.0, pet.name, pet.species
                )
            });
        }
        Command::Messages {
            channel_id,
            through_page,
        } => {
            let feed = client.message_feed(ChannelId(channel_id));
            for page in 1..=through_page {
                feed.request(page).await;
            }
            let snapshot = feed.subscribe().borrow().clone();
            render(&snapshot, |message| {
                format!(
                    "message_id={} sender={} sent_at={} body={}",
                    message.message_id.0,
                    message
                        .sender_username
                        .as_deref()
                        .unwrap_or("unknown"),
                    message.sent_at,
                    message.body
                )
            });
        }
        Command::Options {
            collection,
            search,
            through_page,
        } => {
            let selector = client.option_selector(collection);
            if search.is_some() {
                selector.set_search(search).await;
            }
            for page in 1..=through_page {
                selector.request(page).await;
            }
            let snapshot = selector.subscribe().borrow().clone();
            render(&snapshot, |option| {
                format!("value={} label={}", option.value, option.label)
            });
        }
    }

    Ok(())
}

fn render<T>(snapshot: &Snapshot<T>, line: impl Fn(&T) -> String) {
    match &snapshot.state {
        RemoteState::Loading => println!("still loading"),
        RemoteState::Failed(error) => println!("request failed: {error}"),
        RemoteState::Ready(items) => {
            for item in items {
                println!("{}", line(item));
            }
            match snapshot.window {
                Some(window) => println!(
                    "-- pages {}..{}, showing {} of {} items",
                    window.low,
                    window.high,
                    items.len(),
                    snapshot
                        .total_count
                        .map(|count| count.to_string())
                        .unwrap_or_else(|| "?".to_string())
                ),
                None => println!("-- {} items", items.len()),
            }
        }
    }
}
