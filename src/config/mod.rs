// src/config/mod.rs
pub mod app;
pub mod static_posts;

pub use app::AppConfig;
pub use static_posts::{load_static_posts, parse_static_posts};
