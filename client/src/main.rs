//! Ottoman demo - shows a conflicting write being reconciled.
//!
//! Two copies of the same car are loaded, each edits a different field, and
//! both are saved. The second save conflicts and is merged automatically.

use ottoman_client::{Config, CouchServer};
use ottoman_engine::{document_fields, Document, Identity, ReconcileStrategy, Tracked};
use serde::{Deserialize, Serialize};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Car {
    #[serde(flatten)]
    identity: Identity,
    make: String,
    model: String,
    horse_powers: u32,
}

impl Document for Car {
    fn identity(&self) -> &Identity {
        &self.identity
    }

    fn identity_mut(&mut self) -> &mut Identity {
        &mut self.identity
    }

    document_fields!(Car {
        make,
        model,
        horse_powers
    });

    fn default_strategy() -> ReconcileStrategy<Self> {
        ReconcileStrategy::AutoMerge
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ottoman_client=debug,ottoman_engine=debug,ottoman=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!("Connecting to {}", config.url);
    let server = CouchServer::from_config(&config)?;
    let db = server.fresh_database(&config.database).await?;

    let mut car = Tracked::new(Car {
        make: "Hoopty".into(),
        model: "Type R".into(),
        horse_powers: 5,
        ..Default::default()
    });
    db.save(&mut car).await?;
    let id = car.id().unwrap_or_default().to_string();
    tracing::info!(%id, rev = car.rev().unwrap_or_default(), "created car");

    let mut theirs = db.fetch::<Car>(&id).await?;
    theirs.model = "Type S".into();
    db.save(&mut theirs).await?;

    car.make = "Slightly Better".into();
    car.horse_powers = 6;
    let outcome = db.save(&mut car).await?;

    tracing::info!(?outcome, "saved stale copy");
    println!("{}", serde_json::to_string_pretty(car.document())?);

    Ok(())
}
