//! Order, complaint, QR and staff-code lifecycles.
//!
//! Every operation takes the acting [`Actor`] explicitly, validates it
//! against the transition tables in `launderly_types::status`, and writes
//! the new state, its history row and any notification in one transaction.

mod complaints;
mod enrollment;
pub mod error;
mod orders;

use std::sync::Arc;

use launderly_db::Database;

pub use error::LifecycleError;
pub use launderly_types::models::Actor;

pub type Result<T> = std::result::Result<T, LifecycleError>;

#[derive(Clone)]
pub struct LifecycleManager {
    db: Arc<Database>,
}

impl LifecycleManager {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }
}
