pub mod document;
pub mod gamification;
pub mod project;
pub mod project_member;
pub mod suggestion;
pub mod task;
pub mod user;
