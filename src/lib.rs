//! SQLite-backed store for users, admins and customers.
//!
//! # Intention
//!
//! - Own a single connection to one database file through [`Database`].
//! - Give each table a typed repository ([`UserRepository`],
//!   [`AdminRepository`], [`CustomerRepository`]) that decodes rows once at
//!   the storage boundary.
//! - Run multi-statement batches atomically with [`Database::run_batch`].
//!
//! # Architectural Boundaries
//!
//! - Only SQLite/database code belongs here.
//! - No business logic, validation or derived computation.

pub mod error;
pub mod models;
pub mod repository;
pub mod schema;
pub mod sqlite;

pub use error::{Error, Result};
pub use models::{
    Admin, AdminRepository, Customer, CustomerRepository, NewAdmin, NewCustomer, NewUser, User,
    UserRepository,
};
pub use repository::{Entity, Repository};
pub use sqlite::{BatchReport, Database, Params, Record, SqlQuery, SqliteConfig, Value};
