use axum::{routing::get, Router};

pub fn app() -> Router {
    Router::new()
        .route("/", get(index))
        .route("/_readiness", get(index))
        .route("/_liveness", get(index))
}

pub async fn index() -> &'static str {
    "citus membership manager"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn index_names_the_service() {
        assert_eq!(index().await, "citus membership manager");
    }
}
