use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use user_store::{
    AdminRepository, CustomerRepository, Database, NewCustomer, NewUser, SqliteConfig,
    UserRepository,
};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn main() -> Result<()> {
    init_tracing();

    let db = Database::new(SqliteConfig::default());
    let users = UserRepository::new(&db);
    let admins = AdminRepository::new(&db);
    let customers = CustomerRepository::new(&db);

    users.create_table().context("creating users table")?;
    admins.create_table().context("creating admins table")?;
    customers.create_table().context("creating customers table")?;

    users.add_user("Aibek", "admin")?;
    users.add_user("Beksultan", "customer")?;

    match users.get_user_by_id(1)? {
        Some(user) => println!("User: {}", serde_json::to_string(&user)?),
        None => println!("User: not found"),
    }

    admins.add_admin(1, "full_access")?;
    customers.add_customer(2, "123 Main St")?;

    let batch = [
        users.insert_query(&NewUser::new("Alina", "customer")),
        customers.insert_query(&NewCustomer::new(3, "456 Elm St")),
    ];
    match db.run_batch(&batch) {
        Ok(report) => println!("Transaction committed: {}", serde_json::to_string(&report)?),
        Err(err) => {
            error!(error = %err, "batch rolled back");
            println!("Transaction failed: {err}");
        }
    }

    db.close().context("closing database")?;
    info!("done");
    Ok(())
}
