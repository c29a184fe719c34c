//! Typed record variants

mod media;
mod post;

pub use media::{MediaFile, MediaFilePatch, MediaType};
pub use post::{Post, PostPatch};

/// Captured photos and recordings
pub const FILES_STORE: &str = "files";

/// General purpose objects
pub const OBJECTS_STORE: &str = "objects";

pub const POSTS_STORE: &str = "posts";
