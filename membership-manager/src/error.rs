use thiserror::Error;

/// Enumeration of errors returned when talking to the Docker Engine API.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("failed to connect to the docker socket: {0}")]
    SocketError(#[from] std::io::Error),
    #[error("http transport error: {0}")]
    TransportError(#[from] hyper::Error),
    #[error("failed to build request: {0}")]
    RequestError(#[from] http::Error),
    #[error("failed to encode query filters: {0}")]
    EncodeError(#[from] serde_urlencoded::ser::Error),
    #[error("docker returned {status} for {path}: {body}")]
    UnexpectedStatus {
        path: String,
        status: http::StatusCode,
        body: String,
    },
    #[error("invalid docker json: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("docker event stream closed")]
    EventStreamClosed,
    #[error("running task {task} has no network address")]
    MissingTaskAddress { task: String },
}

/// Enumeration of errors raised while resolving the stack and its services at startup.
#[derive(Error, Debug)]
pub enum ResolutionError {
    #[error("container {container} has no {label} label")]
    MissingStackLabel { container: String, label: String },
    #[error("no {role} service found matching {name}")]
    NotFound { role: String, name: String },
    #[error("{count} {role} services match {name}, expected exactly one")]
    Ambiguous {
        role: String,
        name: String,
        count: usize,
    },
    #[error("service {0} has no id")]
    MissingServiceId(String),
    #[error(transparent)]
    OrchestratorError(#[from] OrchestratorError),
}

/// Enumeration of errors from statements issued against the coordinator.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("coordinator statement failed: {0}")]
    QueryError(#[from] sqlx::Error),
}

/// Enumeration of errors raised while waiting for and connecting to a database node.
#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("{host} was still not ready after {attempts} attempts")]
    NotReady { host: String, attempts: u32 },
    #[error("failed to open session: {0}")]
    SessionError(#[from] sqlx::Error),
}

/// Top level error for the manager: anything reaching this is fatal to the process.
#[derive(Error, Debug)]
pub enum ManagerError {
    #[error("failed to resolve cluster context: {0}")]
    ResolutionError(#[from] ResolutionError),
    #[error("orchestrator error: {0}")]
    OrchestratorError(#[from] OrchestratorError),
    #[error("membership store error: {0}")]
    StoreError(#[from] StoreError),
    #[error("connection error: {0}")]
    ConnectError(#[from] ConnectError),
}
