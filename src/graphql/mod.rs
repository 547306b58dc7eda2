pub mod mutation;
pub mod query;
pub mod types;

use juniper::{graphql_value, EmptySubscription, FieldError, FieldResult, RootNode};
use tokio::sync::OnceCell;
use tracing::error;

use crate::database::models::User;
use crate::error::{FailureCode, MarketError};
use crate::services::Services;

pub use mutation::Mutation;
pub use query::Query;

/// Per-request state handed to every resolver.
pub struct Context {
    services: Services,
    authorization: Option<String>,
    viewer: OnceCell<Option<User>>,
}

impl juniper::Context for Context {}

impl Context {
    pub fn new(services: Services, authorization: Option<String>) -> Self {
        Self {
            services,
            authorization,
            viewer: OnceCell::new(),
        }
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    /// The caller's identity, resolved on first use.
    pub async fn viewer(&self) -> Option<&User> {
        self.viewer
            .get_or_init(|| async {
                self.services
                    .identity
                    .resolve(self.authorization.as_deref())
                    .await
            })
            .await
            .as_ref()
    }
}

pub type Schema = RootNode<'static, Query, Mutation, EmptySubscription<Context>>;

pub fn schema() -> Schema {
    Schema::new(Query, Mutation, EmptySubscription::<Context>::new())
}

/// Fold a service result into a payload. Refusals land in the payload;
/// server-side failures become a GraphQL error.
pub(crate) fn settle<T, P>(
    result: Result<T, MarketError>,
    ok: impl FnOnce(T) -> P,
    refused: impl FnOnce(FailureCode, &MarketError) -> P,
) -> FieldResult<P> {
    match result {
        Ok(value) => Ok(ok(value)),
        Err(err) => match err.failure_code() {
            Some(code) => Ok(refused(code, &err)),
            None => Err(server_error(err)),
        },
    }
}

/// Log the detail and hand the client a generic message with a code.
pub(crate) fn server_error(err: MarketError) -> FieldError {
    error!("GraphQL resolver failed: {}", err);
    let code = err.error_code();
    FieldError::new(err.client_message(), graphql_value!({ "code": code }))
}
