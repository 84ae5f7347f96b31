//! REST surface for the LedgerGraph pipeline.

mod routes;
mod state;

pub use routes::build_router;
pub use state::AppContext;
