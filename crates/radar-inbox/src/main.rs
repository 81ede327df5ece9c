use std::sync::Arc;

use clap::Parser;
use radar_core::{CounterpartId, Operation, Session, UserId};
use radar_inbox::{Cli, CliReporter, Command, InboxConfig, PollingOnly};
use radar_logging::{RadarSubscriberBuilder, SessionContextGuard};
use radar_messaging::{MessagingSession, UnreadEvent, UnreadReconciler};
use radar_rest::RestBackend;
use tokio::sync::{broadcast, watch};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = InboxConfig::resolve(&cli)?;

    let _log_guard = RadarSubscriberBuilder::new()
        .with_config(config.logging.clone())
        .init();

    let user = cli.require_user()?;
    let _session_guard = SessionContextGuard::new(&user);

    let backend = Arc::new(RestBackend::new(config.rest_config()?)?);
    let reporter = Arc::new(CliReporter::new());
    let reconciler = UnreadReconciler::new(backend, reporter.clone(), config.reconciler.clone());

    match cli.command {
        Command::Counts => {
            reconciler.set_session(Session::LoggedIn { user_id: user }).await;
            reporter.check(Operation::Refresh)?;

            let counts = reconciler.snapshot();
            for entry in counts.sorted() {
                println!("{}\t{}", entry.counterpart_id, entry.unread_count);
            }
            println!("total\t{}", counts.total());
        }

        Command::Read { counterpart } => {
            let counterpart = CounterpartId::new(counterpart);
            reconciler.set_session(Session::LoggedIn { user_id: user }).await;
            reconciler.mark_conversation_read(&counterpart).await;
            reporter.check(Operation::MarkRead)?;
            println!("Marked {counterpart} read");
        }

        Command::Delivered { counterpart } => {
            let counterpart = CounterpartId::new(counterpart);
            reconciler.set_session(Session::LoggedIn { user_id: user }).await;
            reconciler.mark_conversation_delivered(&counterpart).await;
            reporter.check(Operation::MarkDelivered)?;
            println!("Marked {counterpart} delivered");
        }

        Command::Watch { .. } => watch_counts(reconciler, user).await?,
    }

    Ok(())
}

async fn watch_counts(reconciler: UnreadReconciler, user: UserId) -> anyhow::Result<()> {
    let mut events = reconciler.subscribe();
    let (_identity_tx, identity_rx) = watch::channel(Session::LoggedIn { user_id: user });
    let handle = MessagingSession::start(
        reconciler.clone(),
        Arc::new(PollingOnly::new()),
        identity_rx,
    );

    info!("Watching unread counts, Ctrl-C to stop");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(UnreadEvent::CountsChanged { total }) => println!("unread: {total}"),
                Ok(UnreadEvent::Ready) => println!("unread: {}", reconciler.total_unread()),
                Ok(UnreadEvent::SessionReset { .. }) => {}
                Err(broadcast::error::RecvError::Lagged(_)) => {
                    println!("unread: {}", reconciler.total_unread());
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    handle.stop().await;
    Ok(())
}
