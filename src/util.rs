use tracing::trace;

use crate::config::GatewayConfig;

const GATEWAY_API_URL: &str = "FEEDWATCH_GATEWAY_API_URL";

const GATEWAY_PUBLIC_URL: &str = "FEEDWATCH_GATEWAY_PUBLIC_URL";

const GATEWAY_USERNAME: &str = "FEEDWATCH_GATEWAY_USERNAME";

const GATEWAY_PASSWORD: &str = "FEEDWATCH_GATEWAY_PASSWORD";

const DEFAULT_GATEWAY_URL: &str = "http://localhost:8083";

pub fn get_default_gateway_url() -> String {
    DEFAULT_GATEWAY_URL.to_string()
}

/// Load a `.env` file if one exists. A missing file is not an error.
pub fn load_env() {
    match dotenv::dotenv() {
        Ok(path) => trace!("loaded environment from {}", path.display()),
        Err(e) => trace!("no .env file loaded: {e}"),
    }
}

/// Override gateway settings with values from the environment
pub fn apply_gateway_env(config: &mut GatewayConfig) {
    if let Ok(url) = std::env::var(GATEWAY_API_URL) {
        config.api_url = url;
    }

    if let Ok(url) = std::env::var(GATEWAY_PUBLIC_URL) {
        config.public_url = Some(url);
    }

    if let Ok(username) = std::env::var(GATEWAY_USERNAME) {
        config.username = Some(username);
    }

    if let Ok(password) = std::env::var(GATEWAY_PASSWORD) {
        config.password = Some(password);
    }
}
