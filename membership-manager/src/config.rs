use std::str::FromStr;
use std::time;

use envconfig::Envconfig;

use crate::readiness::{Credentials, RetryPolicy};

#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(from = "BIND_HOST", default = "0.0.0.0")]
    pub host: String,

    #[envconfig(from = "BIND_PORT", default = "3310")]
    pub port: u16,

    // When unset, the coordinator is discovered through its service in our own stack.
    #[envconfig(from = "CITUS_HOST")]
    pub citus_host: Option<NonEmptyString>,

    #[envconfig(from = "POSTGRES_USER", default = "postgres")]
    pub postgres_user: NonEmptyString,

    #[envconfig(from = "POSTGRES_PASSWORD", default = "")]
    pub postgres_password: String,

    #[envconfig(from = "POSTGRES_DB")]
    pub postgres_db: Option<NonEmptyString>,

    #[envconfig(from = "POSTGRES_PORT", default = "5432")]
    pub postgres_port: u16,

    #[envconfig(from = "WORKER_SERVICE", default = "worker")]
    pub worker_service: NonEmptyString,

    #[envconfig(from = "COORDINATOR_SERVICE", default = "coordinator")]
    pub coordinator_service: NonEmptyString,

    // Docker sets this to the container id of the manager itself.
    #[envconfig(from = "HOSTNAME")]
    pub hostname: NonEmptyString,

    #[envconfig(from = "DOCKER_SOCKET", default = "/var/run/docker.sock")]
    pub docker_socket: String,

    #[envconfig(from = "SETTLE_DELAY_MS", default = "5000")]
    pub settle_delay: EnvMsDuration,

    #[envconfig(nested = true)]
    pub readiness: ReadinessConfig,
}

impl Config {
    /// Produce a host:port address for binding a TcpListener.
    pub fn bind(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The database to connect to, which defaults to the user name like the postgres image does.
    pub fn database(&self) -> &str {
        self.postgres_db
            .as_ref()
            .unwrap_or(&self.postgres_user)
            .as_str()
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            user: self.postgres_user.as_str().to_owned(),
            password: self.postgres_password.clone(),
            database: self.database().to_owned(),
        }
    }

    pub fn readiness_policy(&self) -> RetryPolicy {
        let mut policy = RetryPolicy::new(
            self.readiness.readiness_interval.0,
            self.readiness.readiness_backoff_coefficient.0,
        );
        if let Some(max) = self.readiness.readiness_max_interval {
            policy = policy.maximum_interval(max.0);
        }
        if let Some(attempts) = self.readiness.readiness_max_attempts {
            policy = policy.max_attempts(attempts);
        }
        policy
    }
}

/// Retry knobs for readiness probing. The defaults keep probing every second forever.
#[derive(Envconfig, Clone)]
pub struct ReadinessConfig {
    #[envconfig(from = "READINESS_INTERVAL_MS", default = "1000")]
    pub readiness_interval: EnvMsDuration,

    #[envconfig(from = "READINESS_BACKOFF_COEFFICIENT", default = "1")]
    pub readiness_backoff_coefficient: BackoffCoefficient,

    #[envconfig(from = "READINESS_MAX_INTERVAL_MS")]
    pub readiness_max_interval: Option<EnvMsDuration>,

    #[envconfig(from = "READINESS_MAX_ATTEMPTS")]
    pub readiness_max_attempts: Option<u32>,
}

#[derive(Debug, Clone, Copy)]
pub struct EnvMsDuration(pub time::Duration);

#[derive(Debug, PartialEq, Eq)]
pub struct ParseEnvMsDurationError;

impl FromStr for EnvMsDuration {
    type Err = ParseEnvMsDurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ms = s.parse::<u64>().map_err(|_| ParseEnvMsDurationError)?;

        Ok(EnvMsDuration(time::Duration::from_millis(ms)))
    }
}

/// A backoff coefficient of at least 1. Zero would turn every delay after the first
/// into a busy loop.
#[derive(Debug, Clone, Copy)]
pub struct BackoffCoefficient(pub u32);

#[derive(Debug, PartialEq, Eq)]
pub struct ParseBackoffCoefficientError;

impl FromStr for BackoffCoefficient {
    type Err = ParseBackoffCoefficientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.parse::<u32>() {
            Ok(coefficient) if coefficient >= 1 => Ok(BackoffCoefficient(coefficient)),
            _ => Err(ParseBackoffCoefficientError),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NonEmptyString(pub String);

impl NonEmptyString {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct StringIsEmptyError;

impl FromStr for NonEmptyString {
    type Err = StringIsEmptyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            Err(StringIsEmptyError)
        } else {
            Ok(NonEmptyString(s.to_owned()))
        }
    }
}
