pub mod enums;
pub mod extract;
pub mod schema;
pub mod state;
#[cfg(test)]
pub mod test_utils;
pub mod utils;

pub use enums::*;
pub use schema::{follow_up_logs, follow_ups, leads, projects, teams, users};

pub use utils::{create_conn, create_lazy_conn, escape_like, run_migrations, DbPool};
