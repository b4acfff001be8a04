pub mod api_key;
pub mod liveness;
pub mod matcher;
pub mod password;
pub mod template;
