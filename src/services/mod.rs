pub mod agent;
pub mod audit;
pub mod boards;
pub mod cascade;
pub mod guard;
pub mod invitations;
pub mod ordering;
pub mod workspaces;
