pub mod config;
pub mod error;
pub mod secrets;

pub use config::E2eConfig;
pub use error::{E2eError, E2eResult};
pub use secrets::{EnvSecretProvider, SecretProvider, SecretValue, StaticSecretProvider};
