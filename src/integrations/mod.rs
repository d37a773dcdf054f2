//! External service integrations.

pub mod backend_client {
    pub use crate::backend_client::*;
}

pub mod mailer {
    pub use crate::mailer::*;
}
