// Domain-layer modules and shared errors/models
pub mod models {
    pub use crate::models::*;
}

pub mod synthetic {
    pub use crate::synthetic::*;
}

pub mod views {
    pub use crate::views::*;
}

pub mod errors {
    pub use crate::errors::*;
}
