use tempfile::NamedTempFile;
use user_store::{
    AdminRepository, CustomerRepository, Database, Error, NewCustomer, NewUser, Params, Result,
    SqlQuery, SqliteConfig, User, UserRepository, Value,
};

// Helper function to create an in-memory database with all three tables
fn create_test_db() -> Result<Database> {
    let db = Database::new(SqliteConfig::in_memory());
    initialize_schema(&db)?;
    Ok(db)
}

// Helper function to create a temporary file-based database
fn create_temp_db() -> Result<(Database, NamedTempFile)> {
    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path().to_str().unwrap();
    let db = Database::new(SqliteConfig::new(path));
    initialize_schema(&db)?;
    Ok((db, temp_file))
}

fn initialize_schema(db: &Database) -> Result<()> {
    UserRepository::new(db).create_table()?;
    AdminRepository::new(db).create_table()?;
    CustomerRepository::new(db).create_table()
}

#[test]
fn test_basic_operations() {
    test_basic_operations_impl().unwrap();
}

fn test_basic_operations_impl() -> Result<()> {
    let db = create_test_db()?;
    let users = UserRepository::new(&db);

    users.add_user("Aibek", "admin")?;
    users.add_user("Beksultan", "customer")?;

    let user = users.get_user_by_id(1)?;
    assert_eq!(
        user,
        Some(User {
            id: 1,
            name: "Aibek".to_string(),
            role: "admin".to_string(),
        })
    );

    users.delete_user(1)?;
    assert!(users.get_user_by_id(1)?.is_none());
    assert_eq!(users.count()?, 1);

    Ok(())
}

#[test]
fn test_added_user_reads_back_by_generated_id() -> Result<()> {
    let db = create_test_db()?;
    let users = UserRepository::new(&db);

    for (name, role) in [("Alina", "customer"), ("", "auditor"), ("Дана", "admin")] {
        users.add_user(name, role)?;
        let id = db.last_insert_rowid()?;
        assert!(id > 0);
        let user = users.get_user_by_id(id)?.expect("inserted user");
        assert_eq!(user.id, id);
        assert_eq!(user.name, name);
        assert_eq!(user.role, role);
    }
    Ok(())
}

#[test]
fn test_missing_rows() -> Result<()> {
    let db = create_test_db()?;
    let users = UserRepository::new(&db);
    users.add_user("Aibek", "admin")?;

    assert!(users.get_user_by_id(42)?.is_none());
    users.delete_user(42)?;
    assert_eq!(users.count()?, 1);
    Ok(())
}

#[test]
fn test_create_table_is_idempotent() -> Result<()> {
    let db = create_test_db()?;
    let users = UserRepository::new(&db);
    users.add_user("Aibek", "admin")?;

    users.create_table()?;
    users.create_table()?;

    assert_eq!(users.count()?, 1);
    assert_eq!(users.all()?[0].name, "Aibek");
    Ok(())
}

#[test]
fn test_admin_and_customer_reference_users() -> Result<()> {
    let db = create_test_db()?;
    let users = UserRepository::new(&db);
    let admins = AdminRepository::new(&db);
    let customers = CustomerRepository::new(&db);

    users.add_user("Aibek", "admin")?;
    users.add_user("Beksultan", "customer")?;
    admins.add_admin(1, "full_access")?;
    customers.add_customer(2, "123 Main St")?;

    let admin = admins.get_by_id(1)?.expect("admin row");
    assert_eq!(admin.user_id, Some(1));
    assert_eq!(admin.permissions.as_deref(), Some("full_access"));

    let customer = customers.get_by_id(1)?.expect("customer row");
    assert_eq!(customer.user_id, Some(2));
    assert_eq!(customer.address.as_deref(), Some("123 Main St"));

    // Specialised repositories leave the users table alone.
    admins.delete(1)?;
    assert_eq!(admins.count()?, 0);
    assert_eq!(users.count()?, 2);
    Ok(())
}

#[test]
fn test_dangling_reference_is_accepted_by_default() -> Result<()> {
    let db = create_test_db()?;
    CustomerRepository::new(&db).add_customer(99, "nowhere")?;
    assert_eq!(CustomerRepository::new(&db).count()?, 1);
    Ok(())
}

#[test]
fn test_foreign_keys_enforced_when_configured() -> Result<()> {
    let db = Database::new(SqliteConfig::in_memory().with_foreign_keys(true));
    initialize_schema(&db)?;

    let err = AdminRepository::new(&db)
        .add_admin(99, "full_access")
        .unwrap_err();
    assert!(matches!(err, Error::Sqlite(_)));
    Ok(())
}

#[test]
fn test_batch_commits_all_statements() -> Result<()> {
    let db = create_test_db()?;
    let users = UserRepository::new(&db);
    let customers = CustomerRepository::new(&db);

    let report = db.run_batch(&[
        users.insert_query(&NewUser::new("Alina", "customer")),
        customers.insert_query(&NewCustomer::new(1, "456 Elm St")),
    ])?;

    assert_eq!(report.statements, 2);
    assert_eq!(report.rows_affected, 2);
    assert_eq!(users.count()?, 1);
    assert_eq!(customers.all()?[0].address.as_deref(), Some("456 Elm St"));
    Ok(())
}

#[test]
fn test_batch_rolls_back_every_statement() -> Result<()> {
    let db = create_test_db()?;
    let users = UserRepository::new(&db);
    users.add_user("Aibek", "admin")?;
    let before = users.all()?;

    let result = db.run_batch(&[
        users.insert_query(&NewUser::new("Alina", "customer")),
        users.insert_query(&NewUser::new("Dana", "customer")),
        SqlQuery::new("INSERT INTO users (name, nickname) VALUES (?1, ?2)")
            .with_params(Params::new().with_value("Erlan").with_value("E")),
    ]);

    match result {
        Err(Error::BatchAborted { index, statement, .. }) => {
            assert_eq!(index, 2);
            assert!(statement.contains("nickname"));
        }
        other => panic!("expected aborted batch, got {other:?}"),
    }
    assert_eq!(users.all()?, before);

    // The connection is usable after a rollback.
    users.add_user("Beksultan", "customer")?;
    assert_eq!(users.count()?, 2);
    Ok(())
}

#[test]
fn test_failed_statement_surfaces_engine_error() -> Result<()> {
    let db = create_test_db()?;
    let err = db
        .execute(&SqlQuery::new("INSERT INTO users (name) VALUES (?1)").with_params(
            Params::from(vec![Value::from("no role")]),
        ))
        .unwrap_err();
    assert!(err.to_string().contains("NOT NULL"));
    Ok(())
}

#[test]
fn test_fetch_all_returns_column_addressable_records() -> Result<()> {
    let db = create_test_db()?;
    let users = UserRepository::new(&db);
    users.add_user("Aibek", "admin")?;
    users.add_user("Beksultan", "customer")?;

    let rows = db.fetch_all(
        &SqlQuery::new("SELECT name FROM users WHERE role = ?1")
            .with_params(Params::new().with_value("customer")),
    )?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("name"), Some(&Value::Text("Beksultan".into())));
    assert_eq!(rows[0].get("role"), None);
    Ok(())
}

#[test]
fn test_file_database_survives_close_and_reopen() -> Result<()> {
    let (db, temp_file) = create_temp_db()?;
    let users = UserRepository::new(&db);
    users.add_user("Aibek", "admin")?;

    db.close()?;
    assert!(!db.is_open());

    // Next call reopens lazily.
    assert_eq!(users.get_user_by_id(1)?.map(|u| u.name), Some("Aibek".to_string()));
    assert!(db.is_open());
    drop(db);

    let reopened = Database::new(SqliteConfig::new(temp_file.path().to_str().unwrap()));
    assert_eq!(UserRepository::new(&reopened).count()?, 1);
    Ok(())
}

#[test]
fn test_reads_run_through_execute_and_batches() -> Result<()> {
    let db = create_test_db()?;
    let users = UserRepository::new(&db);
    users.add_user("Aibek", "admin")?;

    assert_eq!(db.execute(&SqlQuery::new("SELECT 1"))?, 0);
    assert_eq!(db.execute(&SqlQuery::new("SELECT * FROM users"))?, 0);

    let report = db.run_batch(&[
        users.insert_query(&NewUser::new("Alina", "customer")),
        SqlQuery::new("SELECT COUNT(*) FROM users"),
        users.insert_query(&NewUser::new("Dana", "customer")),
    ])?;
    assert_eq!(report.statements, 3);
    assert_eq!(report.rows_affected, 2);
    assert_eq!(users.count()?, 3);
    Ok(())
}
