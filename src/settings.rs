use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct Postgres {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Server {
    pub listen: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Auth {
    pub token_ttl_minutes: i64,
    pub admin_username: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Uploads {
    pub dir: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Games {
    pub session_ttl_minutes: u64,
    pub poker_session_ttl_minutes: u64,
    pub sweep_interval_secs: u64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Draw {
    pub prize: i64,
    pub hour: u32,
    pub minute: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Time {
    pub utc_offset_hours: i32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Settings {
    pub postgres: Postgres,
    pub server: Server,
    pub auth: Auth,
    pub uploads: Uploads,
    pub games: Games,
    pub draw: Draw,
    pub time: Time,
}

fn default_max_connections() -> u32 {
    5
}

impl Settings {
    pub fn new(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("auth.token_ttl_minutes", 60)?
            .set_default("auth.admin_username", "admin")?
            .set_default("uploads.dir", "recibos")?
            .set_default("games.session_ttl_minutes", 60)?
            .set_default("games.poker_session_ttl_minutes", 120)?
            .set_default("games.sweep_interval_secs", 60)?
            .set_default("draw.prize", 500_000)?
            .set_default("draw.hour", 23)?
            .set_default("draw.minute", 59)?
            .set_default("time.utc_offset_hours", -5)?
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}
