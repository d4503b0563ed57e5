//! Pairup - anonymous one-on-one chat
//!
//! Console client: onboards once, then pairs with strangers through the
//! matchmaking server.

use std::sync::Arc;

use pairup_net::{VerifyClient, WsConnector};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod console;
mod error;
mod onboarding;
mod runtime;
mod session;
mod state;
mod timers;

use console::Input;
use error::Result;
use runtime::{Runtime, RuntimeHandle};

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    tracing::info!("Starting Pairup");

    if let Err(e) = run().await {
        tracing::error!("Fatal: {}", e);
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config = config::AppConfig::load()?;
    let state = state::AppState::open(&config)?;

    let verifier = VerifyClient::new(&config.server.verify_url)?;
    let onboarded = onboarding::onboard(&state.db, &verifier, &config.profile).await?;
    tracing::info!(
        identity = %onboarded.identity.short(),
        nickname = %onboarded.profile.nickname,
        data_dir = %state.data_dir().display(),
        "Ready"
    );

    let connector = Arc::new(WsConnector::new(&config.server.url)?);
    let (handle, mut notices, task) = Runtime::spawn(
        connector,
        onboarded.identity,
        onboarded.profile.nickname,
        state.db,
    );

    println!("{}", console::HELP);

    // Session changes
    let mut views = handle.subscribe();
    tokio::spawn(async move {
        let mut last = views.borrow_and_update().clone();
        while views.changed().await.is_ok() {
            let current = views.borrow_and_update().clone();
            for line in console::render_change(&last, &current) {
                println!("{line}");
            }
            last = current;
        }
    });

    // Connection status
    let mut link = handle.subscribe_link();
    tokio::spawn(async move {
        while link.changed().await.is_ok() {
            let status = *link.borrow_and_update();
            println!("{}", console::render_link(status));
        }
    });

    tokio::spawn(async move {
        while let Some(notice) = notices.recv().await {
            println!("{}", console::render_notice(&notice));
        }
    });

    read_input(&handle).await?;

    handle.shutdown().await;
    let _ = task.await;
    Ok(())
}

async fn read_input(handle: &RuntimeHandle) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let input = console::parse_input(&line);
        match &input {
            Input::Quit => break,
            Input::Empty => continue,
            Input::Help => println!("{}", console::HELP),
            Input::Limits => println!("{}", console::render_limits(&handle.view().limits)),
            Input::Status => println!(
                "{}",
                console::render_status(&handle.view(), handle.link_status())
            ),
            Input::Reconnect => {
                if !handle.reconnect().await {
                    break;
                }
            }
            Input::Invalid(reason) => println!("! {reason}"),
            _ => {
                if let Some(event) = console::to_event(&input, &handle.view()) {
                    if !handle.dispatch(event).await {
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}
