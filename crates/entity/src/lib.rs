pub mod api_key;
pub mod login_attempt;
pub mod login_history;
pub mod user;
pub mod verification_session;

pub use user::Entity as User;
