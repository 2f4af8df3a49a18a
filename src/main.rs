use anyhow::Context;
use folio_app::App;
use folio_kernel::settings::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().with_context(|| "failed to load folio settings")?;
    folio_telemetry::init(&settings.telemetry)?;

    tracing::info!(
        env = ?settings.environment,
        db = %settings.database.name,
        collection = %settings.database.collection,
        "folio-app tour starting"
    );

    let app = App::connect(settings).await?;
    let outcome = folio_app::books::tour::run(app.books(), &mut std::io::stdout()).await;
    app.shutdown().await?;

    outcome?;
    tracing::info!("folio-app tour complete");
    Ok(())
}
