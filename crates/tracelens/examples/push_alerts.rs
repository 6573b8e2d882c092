//! Watch the alerts view react to pushed alerts, using fixtures only.
//!
//! Run with: cargo run --example push_alerts

use std::sync::Arc;

use tracelens::fixtures::{anchor, FixtureSource};
use tracelens::prelude::*;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let fixtures = Arc::new(FixtureSource::sample());
    let sources = SourceSet::new(fixtures.clone(), fixtures.clone());

    // Acknowledgements are attributed to the logged-in user
    let session = Arc::new(SessionContext::in_memory()?);
    session.login("oncall@example.com", "secret")?;

    let config = ClientConfig::default();
    let handle = ViewRuntime::spawn(AlertsView::new(config.limits), sources, session, DataMode::Mock, config.reconnect);

    let ready = handle
        .wait_for(|u| u.loads > 0 && u.connection == ConnectionState::Open)
        .await
        .ok_or("view stopped")?;
    println!("{}", tracelens::render::status_line("alerts", &ready));

    // A new alert is prepended at once, then the view reloads
    fixtures.raise_alert(Alert {
        id: 100,
        severity: Severity::Critical,
        title: "Error rate above 20%".into(),
        created_at: anchor() + chrono::Duration::minutes(5),
        ..Default::default()
    })?;
    let pushed = handle.wait_for(|u| u.loads > 1).await.ok_or("view stopped")?;

    handle.dispatch(AlertsAction::Acknowledge(100));
    let acked = handle.wait_for(|u| u.loads > 2).await.ok_or("view stopped")?;

    for line in tracelens::render::alerts(&acked.snapshot) {
        println!("{line}");
    }
    println!("alerts before ack: {}", pushed.snapshot.alerts.len());

    handle.shutdown().await;
    Ok(())
}
