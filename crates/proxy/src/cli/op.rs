use std::fmt;
use std::path::PathBuf;

use common::api::{ApiClient, ApiError, ApiRequest};

use cachefs_proxy::http_server::api::v0::ErrorBody;

/// A CLI subcommand
#[async_trait::async_trait]
pub trait Op: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;
    type Output: fmt::Display + fmt::Debug + Send;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error>;
}

/// What every subcommand gets to work with
#[derive(Debug, Clone)]
pub struct OpContext {
    /// Client for the proxy API
    pub client: ApiClient,
    /// Explicit config file, if one was given
    pub config_path: Option<PathBuf>,
}

impl OpContext {
    /// Call the proxy API, decoding its errno body on failure.
    pub async fn call<T: ApiRequest>(&self, request: T) -> Result<T::Response, CallError> {
        self.client.call(request).await.map_err(CallError::from)
    }
}

/// A failed proxy API call
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error("{message} (errno {errno})")]
    Proxy { errno: i32, message: String },
    #[error("{0}")]
    Api(ApiError),
}

impl From<ApiError> for CallError {
    fn from(err: ApiError) -> Self {
        match ErrorBody::from_api_error(&err) {
            Some(body) => CallError::Proxy {
                errno: body.errno,
                message: body.message,
            },
            None => CallError::Api(err),
        }
    }
}

/// Build the top-level `Command` enum and its `OpError`/`OpOutput` wrappers
/// from a list of `(Variant, Type)` pairs.
#[macro_export]
macro_rules! command_enum {
    ($(($variant:ident, $type:ty)),* $(,)?) => {
        #[derive(clap::Subcommand, Debug, Clone)]
        pub enum Command {
            $($variant($type),)*
        }

        #[derive(Debug, thiserror::Error)]
        pub enum OpError {
            $(
                #[error(transparent)]
                $variant(<$type as $crate::cli::op::Op>::Error),
            )*
        }

        #[derive(Debug)]
        pub enum OpOutput {
            $($variant(<$type as $crate::cli::op::Op>::Output),)*
        }

        impl std::fmt::Display for OpOutput {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(OpOutput::$variant(output) => write!(f, "{}", output),)*
                }
            }
        }

        #[async_trait::async_trait]
        impl $crate::cli::op::Op for Command {
            type Error = OpError;
            type Output = OpOutput;

            async fn execute(
                &self,
                ctx: &$crate::cli::op::OpContext,
            ) -> Result<Self::Output, Self::Error> {
                match self {
                    $(
                        Command::$variant(op) => op
                            .execute(ctx)
                            .await
                            .map(OpOutput::$variant)
                            .map_err(OpError::$variant),
                    )*
                }
            }
        }
    };
}
