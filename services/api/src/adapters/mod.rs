pub mod blob;
pub mod db;
pub mod hash;

pub use blob::FsBlobStore;
pub use db::DbAdapter;
pub use hash::Argon2HashService;
