use crate::cli::{actions::Action, globals::GlobalArgs};
use crate::pordisto::{new, state::AuthConfig};
use anyhow::{anyhow, Result};
use url::Url;

/// Handle the server action
pub async fn handle(action: Action, globals: &GlobalArgs) -> Result<()> {
    match action {
        Action::Server {
            port,
            dsn,
            base_url,
        } => {
            // Misconfiguration is fatal before the listener binds.
            let base_url = Url::parse(&base_url)
                .map_err(|err| anyhow!("Invalid base URL {base_url}: {err}"))?;

            let config = AuthConfig::new(base_url.to_string());

            new(port, dsn, config, globals).await?;
        }
    }

    Ok(())
}
