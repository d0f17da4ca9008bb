// Core (users, teams, projects)
pub mod core;
pub use self::core::*;

// Lead tracking
pub mod crm;
pub use self::crm::*;
