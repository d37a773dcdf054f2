// Thin namespace wrapper for relay-layer components
pub mod handlers {
    pub use crate::handlers::*;
}

pub mod email_template {
    pub use crate::email_template::*;
}
