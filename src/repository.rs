use std::marker::PhantomData;

use crate::error::Result;
use crate::schema::TableDefinition;
use crate::sqlite::{Database, Params, Record, SqlQuery};

/// A row type stored in its own table with an integer `id` primary key.
pub trait Entity: Sized {
    /// Payload accepted by [`Repository::add`]; everything except `id`.
    type New;

    const TABLE: &'static str;

    /// Columns bound, in order, by [`Entity::insert_params`].
    const INSERT_COLUMNS: &'static [&'static str];

    fn table() -> TableDefinition;

    fn insert_params(new: &Self::New) -> Params;

    fn from_record(record: &Record) -> Result<Self>;
}

/// CRUD over one entity's table, borrowing the shared [`Database`].
pub struct Repository<'db, E> {
    db: &'db Database,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for Repository<'_, E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for Repository<'_, E> {}

impl<'db, E: Entity> Repository<'db, E> {
    pub fn new(db: &'db Database) -> Self {
        Self {
            db,
            _entity: PhantomData,
        }
    }

    pub fn database(&self) -> &'db Database {
        self.db
    }

    /// Create the table if it does not exist yet.
    pub fn create_table(&self) -> Result<()> {
        self.db.execute(&SqlQuery::new(E::table().create_sql()))?;
        Ok(())
    }

    /// Insert one row. The generated id is not returned; use
    /// [`Database::last_insert_rowid`] when it is needed.
    pub fn add(&self, new: &E::New) -> Result<()> {
        self.db.execute(&self.insert_query(new))?;
        Ok(())
    }

    /// The insert statement [`Repository::add`] would run, for use in a
    /// [`Database::run_batch`].
    pub fn insert_query(&self, new: &E::New) -> SqlQuery {
        let placeholders: Vec<String> = (1..=E::INSERT_COLUMNS.len())
            .map(|i| format!("?{i}"))
            .collect();
        SqlQuery::new(format!(
            "INSERT INTO {} ({}) VALUES ({})",
            E::TABLE,
            E::INSERT_COLUMNS.join(", "),
            placeholders.join(", ")
        ))
        .with_params(E::insert_params(new))
    }

    pub fn get_by_id(&self, id: i64) -> Result<Option<E>> {
        let query = SqlQuery::new(format!("SELECT * FROM {} WHERE id = ?1", E::TABLE))
            .with_params(Params::new().with_value(id));
        self.db
            .fetch_one(&query)?
            .map(|record| E::from_record(&record))
            .transpose()
    }

    /// Every row, ordered by id.
    pub fn all(&self) -> Result<Vec<E>> {
        let query = SqlQuery::new(format!("SELECT * FROM {} ORDER BY id", E::TABLE));
        self.db
            .fetch_all(&query)?
            .iter()
            .map(E::from_record)
            .collect()
    }

    pub fn count(&self) -> Result<i64> {
        let query = SqlQuery::new(format!("SELECT COUNT(*) AS total FROM {}", E::TABLE));
        match self.db.fetch_one(&query)? {
            Some(record) => record.integer("total"),
            None => Ok(0),
        }
    }

    /// Delete the row with `id`; deleting a missing id is not an error.
    pub fn delete(&self, id: i64) -> Result<()> {
        let query = SqlQuery::new(format!("DELETE FROM {} WHERE id = ?1", E::TABLE))
            .with_params(Params::new().with_value(id));
        self.db.execute(&query)?;
        Ok(())
    }
}
