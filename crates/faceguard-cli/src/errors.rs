pub use faceguard_core::errors::{AppError, AppResult};
