pub mod wordpress;

pub use wordpress::{ConnectionStatus, MediaRef, PostStatus, PublishedPost, WordPressClient};
