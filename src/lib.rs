pub mod core;
pub mod followups;
pub mod leads;
pub mod main_module;
pub mod projects;
pub mod security;
pub mod users;
