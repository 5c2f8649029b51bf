//! EPUB processing: container access, chunking and the translation pipeline

pub mod book;
pub mod chunker;
pub mod epub;
pub mod html;
