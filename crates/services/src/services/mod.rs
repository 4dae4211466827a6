pub mod config;
pub mod email;
pub mod events;
pub mod gamification;
pub mod gap_analysis;
pub mod openai_api;
pub mod permissions;
pub mod task_suggestion;
pub mod timeline;
