pub mod password;
pub mod session;

pub use password::{hash_password, verify_password};
pub use session::{clear_session_cookie, session_cookie, CurrentUser, MaybeUser};
