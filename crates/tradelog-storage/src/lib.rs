//! Concrete backends and the application-facing storage facades.
//! `SecureStorage` obfuscates records; it does not encrypt them.

pub mod file_backend;
pub mod secure_storage;
pub mod session_backend;
pub mod session_storage;

pub use file_backend::FileBackend;
pub use secure_storage::SecureStorage;
pub use session_backend::SessionBackend;
pub use session_storage::SessionStorage;
