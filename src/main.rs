use std::{env, error::Error};

use tokio::{fs, net};
use tracing_subscriber::{
    layer::SubscriberExt as _, util::SubscriberInitExt as _,
};

use helpdesk::Config;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .init();

    let path = env::args().nth(1).unwrap_or_else(|| "config.toml".to_owned());
    let config = fs::read_to_string(&path).await?;
    let config = toml::from_str::<Config>(&config)?;

    let addr = config.http.server.addr;
    let app = helpdesk::app(config).await?;

    let listener = net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
