use color_eyre::eyre;
use futures::StreamExt;
use linkroute::{settings::Settings, station::Station, ExecLauncher};

async fn serve(settings: Settings) -> eyre::Result<()> {
    tracing::info!("station up");

    let station = Station::new(&settings, Box::new(ExecLauncher::new()));
    let mut events = station.store().subscribe();

    let _conn = zbus::ConnectionBuilder::session()?
        .name(linkroute::NAME)?
        .serve_at(linkroute::PATH, station)?
        .build()
        .await?;
    tracing::info!(name = linkroute::NAME, path = linkroute::PATH, "station set up");

    // the store lives as long as the connection, so this only ends with the process
    while let Some(event) = events.next().await {
        tracing::info!(?event, "config changed");
    }
    Ok(())
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    let settings = Settings::load()?;
    linkroute::settings::init_tracing(&settings)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(serve(settings))
}
