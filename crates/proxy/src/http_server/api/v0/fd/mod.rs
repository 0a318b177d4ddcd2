use axum::routing::post;
use axum::Router;

use crate::ServiceState;

pub mod close;
pub mod lseek;
pub mod open;
pub mod read;
pub mod write;

pub use close::{CloseRequest, CloseResponse};
pub use lseek::{LseekRequest, LseekResponse};
pub use open::{OpenRequest, OpenResponse};
pub use read::{ReadRequest, ReadResponse};
pub use write::{WriteRequest, WriteResponse};

pub fn router(state: ServiceState) -> Router<ServiceState> {
    Router::new()
        .route("/open", post(open::handler))
        .route("/:fd/read", post(read::handler))
        .route("/:fd/write", post(write::handler))
        .route("/:fd/lseek", post(lseek::handler))
        .route("/:fd/close", post(close::handler))
        .with_state(state)
}
