//! Loads a freelancer's dashboard: profile, projects and bids, fetched
//! concurrently. If the access credential has expired, all three requests
//! share a single renewal.
//!
//! ```text
//! REAUTH_BASE_URL=http://localhost:5000/api \
//! REAUTH_EMAIL=dev@market.test REAUTH_PASSWORD=... \
//! RUST_LOG=reauth=debug cargo run -p dashboard-sync
//! ```

use futures_util::future::join_all;
use reauth::prelude::*;
use reauth::ChannelNavigator;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Backend types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct Login {
    email: String,
    password: String,
}

const PANELS: [(&str, &str); 3] = [
    ("profile", "/auth/me"),
    ("projects", "/project/projects/my"),
    ("bids", "/bid/bids/mine"),
];

fn credentials_from_env() -> Option<Login> {
    Some(Login {
        email: std::env::var("REAUTH_EMAIL").ok()?,
        password: std::env::var("REAUTH_PASSWORD").ok()?,
    })
}

/// Summarizes a JSON panel: item count for arrays, key count otherwise.
fn summarize(body: &serde_json::Value) -> String {
    match body {
        serde_json::Value::Array(items) => format!("{} item(s)", items.len()),
        serde_json::Value::Object(fields) => format!("{} field(s)", fields.len()),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let (navigator, mut routes) = ChannelNavigator::new();
    tokio::spawn(async move {
        while let Some(route) = routes.recv().await {
            tracing::warn!(route = %route, "session ended, please sign in again");
        }
    });

    let client = Client::builder()
        .config(ClientConfig::from_env())
        .navigator(navigator)
        .build()?;
    tracing::info!(base_url = %client.config().base_url, "dashboard sync starting");

    if let Some(login) = credentials_from_env() {
        client.post_json("/auth/login", &login).await?;
        tracing::info!(email = %login.email, "signed in");
    }

    let panels = join_all(PANELS.iter().map(|(name, target)| {
        let client = client.clone();
        async move { (*name, client.get(target).await) }
    }))
    .await;

    let codec = JsonCodec;
    for (name, result) in panels {
        match result {
            Ok(response) => match response.json::<_, serde_json::Value>(&codec) {
                Ok(body) => tracing::info!(panel = name, summary = %summarize(&body), "loaded"),
                Err(e) => tracing::warn!(panel = name, error = %e, "unreadable panel"),
            },
            Err(e) if e.is_auth_expired() => {
                tracing::error!(panel = name, error = %e, "not signed in");
            }
            Err(e) => tracing::warn!(panel = name, status = ?e.status(), error = %e, "panel failed"),
        }
    }

    Ok(())
}
