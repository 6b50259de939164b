//! Typed records for the `users`, `admins` and `customers` tables.
//!
//! Admins and customers point at a user through `user_id`. The reference is
//! declared in the schema but the store never checks that the user exists
//! before inserting.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::repository::{Entity, Repository};
use crate::schema::{ColumnConstraint, ColumnDefinition, DataType, ForeignKey, TableDefinition};
use crate::sqlite::{Params, Record};

pub type UserRepository<'db> = Repository<'db, User>;
pub type AdminRepository<'db> = Repository<'db, Admin>;
pub type CustomerRepository<'db> = Repository<'db, Customer>;

fn id_column() -> ColumnDefinition {
    ColumnDefinition::new("id", DataType::Integer)
        .with_constraint(ColumnConstraint::PrimaryKey)
        .with_constraint(ColumnConstraint::AutoIncrement)
}

fn user_reference() -> (ColumnDefinition, ForeignKey) {
    (
        ColumnDefinition::new("user_id", DataType::Integer),
        ForeignKey::new("user_id", User::TABLE, "id"),
    )
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub role: String,
}

impl NewUser {
    pub fn new(name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: role.into(),
        }
    }
}

impl Entity for User {
    type New = NewUser;

    const TABLE: &'static str = "users";
    const INSERT_COLUMNS: &'static [&'static str] = &["name", "role"];

    fn table() -> TableDefinition {
        TableDefinition::new(Self::TABLE)
            .add_column(id_column())
            .add_column(
                ColumnDefinition::new("name", DataType::Text)
                    .with_constraint(ColumnConstraint::NotNull),
            )
            .add_column(
                ColumnDefinition::new("role", DataType::Text)
                    .with_constraint(ColumnConstraint::NotNull),
            )
    }

    fn insert_params(new: &NewUser) -> Params {
        Params::new()
            .with_value(new.name.as_str())
            .with_value(new.role.as_str())
    }

    fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            id: record.integer("id")?,
            name: record.text("name")?,
            role: record.text("role")?,
        })
    }
}

impl UserRepository<'_> {
    pub fn add_user(&self, name: &str, role: &str) -> Result<()> {
        self.add(&NewUser::new(name, role))
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<User>> {
        self.get_by_id(id)
    }

    pub fn delete_user(&self, id: i64) -> Result<()> {
        self.delete(id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Admin {
    pub id: i64,
    pub user_id: Option<i64>,
    pub permissions: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAdmin {
    pub user_id: i64,
    pub permissions: String,
}

impl NewAdmin {
    pub fn new(user_id: i64, permissions: impl Into<String>) -> Self {
        Self {
            user_id,
            permissions: permissions.into(),
        }
    }
}

impl Entity for Admin {
    type New = NewAdmin;

    const TABLE: &'static str = "admins";
    const INSERT_COLUMNS: &'static [&'static str] = &["user_id", "permissions"];

    fn table() -> TableDefinition {
        let (user_id, reference) = user_reference();
        TableDefinition::new(Self::TABLE)
            .add_column(id_column())
            .add_column(user_id)
            .add_column(ColumnDefinition::new("permissions", DataType::Text))
            .add_foreign_key(reference)
    }

    fn insert_params(new: &NewAdmin) -> Params {
        Params::new()
            .with_value(new.user_id)
            .with_value(new.permissions.as_str())
    }

    fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            id: record.integer("id")?,
            user_id: record.optional_integer("user_id")?,
            permissions: record.optional_text("permissions")?,
        })
    }
}

impl AdminRepository<'_> {
    pub fn add_admin(&self, user_id: i64, permissions: &str) -> Result<()> {
        self.add(&NewAdmin::new(user_id, permissions))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: i64,
    pub user_id: Option<i64>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCustomer {
    pub user_id: i64,
    pub address: String,
}

impl NewCustomer {
    pub fn new(user_id: i64, address: impl Into<String>) -> Self {
        Self {
            user_id,
            address: address.into(),
        }
    }
}

impl Entity for Customer {
    type New = NewCustomer;

    const TABLE: &'static str = "customers";
    const INSERT_COLUMNS: &'static [&'static str] = &["user_id", "address"];

    fn table() -> TableDefinition {
        let (user_id, reference) = user_reference();
        TableDefinition::new(Self::TABLE)
            .add_column(id_column())
            .add_column(user_id)
            .add_column(ColumnDefinition::new("address", DataType::Text))
            .add_foreign_key(reference)
    }

    fn insert_params(new: &NewCustomer) -> Params {
        Params::new()
            .with_value(new.user_id)
            .with_value(new.address.as_str())
    }

    fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            id: record.integer("id")?,
            user_id: record.optional_integer("user_id")?,
            address: record.optional_text("address")?,
        })
    }
}

impl CustomerRepository<'_> {
    pub fn add_customer(&self, user_id: i64, address: &str) -> Result<()> {
        self.add(&NewCustomer::new(user_id, address))
    }
}
