mod accounts;
mod health_check;

pub use accounts::{get_account, login, logout, me, refresh, signup, AuthResponse};
pub use health_check::health_check;
