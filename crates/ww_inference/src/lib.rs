pub mod export;
pub mod generator;
pub mod models;

pub use export::{export_html, slugify};
pub use generator::{parse_blog_response, BlogGenerator};
pub use models::{create_model, ChatCompletionModel, DemoModel};
