//! `.env`-backed configuration.
//!
//! Variables are read once through [`dotenvy`] and deserialized into [`Env`];
//! call sites go through the [`crate::var!`] macro so a missing variable is a
//! single, well-typed failure at first access rather than a scattered panic.

use std::sync::LazyLock;

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::OnceCell;

static ENV_VARS: LazyLock<OnceCell<Env>> = LazyLock::new(OnceCell::new);
pub async fn get_var(var: Var) -> EnvResult<&'static str> {
    let vars = ENV_VARS.get_or_try_init(|| async { Env::new() }).await?;
    Ok(match var {
        Var::DatabaseUrl => &vars.database_url,
        Var::ServerApiPort => &vars.server_api_port,
        Var::CorsAllowOrigins => &vars.cors_allow_origins,
        Var::AuthTokenSecret => &vars.auth_token_secret,
        Var::AdminToken => &vars.admin_token,
        Var::CloudinaryCloudName => &vars.cloudinary_cloud_name,
        Var::CloudinaryApiKey => &vars.cloudinary_api_key,
        Var::CloudinaryApiSecret => &vars.cloudinary_api_secret,
        Var::GdriveAccessToken => &vars.gdrive_access_token,
        Var::OtelExporterEndpoint => &vars.otel_exporter_otlp_endpoint,
        Var::ApiServiceName => &vars.api_service_name,
        Var::ApiTracerName => &vars.api_tracer_name,
    })
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Env {
    pub database_url: String,
    pub server_api_port: String,
    pub cors_allow_origins: String,
    pub auth_token_secret: String,
    pub admin_token: String,
    pub cloudinary_cloud_name: String,
    pub cloudinary_api_key: String,
    pub cloudinary_api_secret: String,
    // empty string when the admin has not connected a Drive account
    #[serde(default)]
    pub gdrive_access_token: String,
    pub otel_exporter_otlp_endpoint: String,
    pub api_service_name: String,
    pub api_tracer_name: String,
}

impl Env {
    pub fn new() -> EnvResult<Self> {
        from_env::<Env>()
    }
}

#[derive(Debug)]
pub enum Var {
    DatabaseUrl,
    ServerApiPort,
    CorsAllowOrigins,
    AuthTokenSecret,
    AdminToken,
    CloudinaryCloudName,
    CloudinaryApiKey,
    CloudinaryApiSecret,
    GdriveAccessToken,
    OtelExporterEndpoint,
    ApiServiceName,
    ApiTracerName,
}

#[macro_export]
macro_rules! var {
    ($ev:expr) => {
        $crate::util::env::get_var($ev)
    };
}

pub fn from_env<T>() -> EnvResult<T>
where
    T: serde::de::DeserializeOwned,
{
    from_iter(dotenvy::vars())
}

pub fn from_iter<Iter, T>(iter: Iter) -> EnvResult<T>
where
    T: serde::de::DeserializeOwned,
    Iter: IntoIterator<Item = (String, String)>,
{
    let map: Map<String, Value> = iter
        .into_iter()
        .map(|(k, v)| (k, Value::String(v)))
        .collect();

    Ok(serde_json::from_value(Value::Object(map))?)
}

pub type EnvResult<T> = core::result::Result<T, EnvErr>;

#[derive(Debug, Error)]
pub enum EnvErr {
    #[error(transparent)]
    Dotenvy(#[from] dotenvy::Error),

    #[error("env deserialization error: {0}")]
    DeserializationError(#[from] serde_json::Error),
}

#[cfg(test)]
mod test {
    use super::*;

    fn fixture() -> Vec<(String, String)> {
        [
            ("DATABASE_URL", "postgres://localhost/worksheet_hub"),
            ("SERVER_API_PORT", "3000"),
            ("CORS_ALLOW_ORIGINS", "*"),
            ("AUTH_TOKEN_SECRET", "sekrit"),
            ("ADMIN_TOKEN", "admin-sekrit"),
            ("CLOUDINARY_CLOUD_NAME", "demo"),
            ("CLOUDINARY_API_KEY", "key"),
            ("CLOUDINARY_API_SECRET", "secret"),
            ("OTEL_EXPORTER_OTLP_ENDPOINT", "http://localhost:4317"),
            ("API_SERVICE_NAME", "worksheet-hub-api"),
            ("API_TRACER_NAME", "worksheet-hub-tracer"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn test_from_iter() {
        let env: Env = from_iter(fixture()).unwrap();

        assert_eq!(env.server_api_port, "3000");
        assert_eq!(env.database_url, "postgres://localhost/worksheet_hub");
        // defaults to "not connected"
        assert_eq!(env.gdrive_access_token, "");
    }

    #[test]
    fn test_missing_var_is_an_error() {
        let mut vars = fixture();
        vars.retain(|(k, _)| k != "DATABASE_URL");

        assert!(from_iter::<_, Env>(vars).is_err());
    }

    #[test]
    fn test_extra_vars_are_ignored() {
        let mut vars = fixture();
        vars.push(("SOMETHING_UNRELATED".to_string(), "1".to_string()));

        assert!(from_iter::<_, Env>(vars).is_ok());
    }
}
