//! entitydb - relational tables over a schemaless entity store

use anyhow::{Context, Result};
use clap::{Parser as ClapParser, Subcommand};
use entitydb::catalog::{Field, FieldType};
use entitydb::store::MemoryStore;
use entitydb::{Database, SelectOptions, Value};
use log::info;
use std::path::PathBuf;
use std::sync::Arc;

/// entitydb - query a demo schema of people and their dogs
#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Store snapshot file
    #[arg(short = 'D', long, default_value = "./entitydb.bin")]
    data: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Insert sample people and dogs and save the snapshot
    Seed,
    /// Print every row of a table as CSV
    Dump { table: String },
    /// Print the number of rows in a table
    Count { table: String },
    /// Print the rows of CHILD that reference row ID of TABLE as CSV
    Children {
        table: String,
        id: i64,
        child: String,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let store = Arc::new(
        MemoryStore::open_or_create(&args.data)
            .with_context(|| format!("Failed to open {}", args.data.display()))?,
    );
    let mut db = Database::new(store.clone());
    define_schema(&mut db).context("Failed to define schema")?;

    match args.command {
        Command::Seed => {
            seed(&db)?;
            store
                .save(&args.data)
                .with_context(|| format!("Failed to save {}", args.data.display()))?;
        }
        Command::Dump { table } => {
            let query = db.table(&table)?.id().greater_than(0)?;
            let rows = db.set(query)?.select(&SelectOptions::new())?;
            print!("{}", rows.to_csv()?);
        }
        Command::Count { table } => {
            let query = db.table(&table)?.id().greater_than(0)?;
            println!("{}", db.set(query)?.count()?);
        }
        Command::Children { table, id, child } => {
            let query = db.table(&table)?.id().equals(id)?;
            let rows = db.set(query)?.select(&SelectOptions::new())?;
            let record = rows
                .first()
                .and_then(|row| row.record())
                .with_context(|| format!("No row {} in {}", id, table))?;
            let children = record.referencing(&db, &child)?.select(&SelectOptions::new())?;
            print!("{}", children.to_csv()?);
        }
    }

    Ok(())
}

/// The demo schema. Definitions live in the process, so every run repeats them.
fn define_schema(db: &mut Database) -> Result<()> {
    db.define_table(
        "person",
        vec![
            Field::new("name", FieldType::String)?.notnull(true),
            Field::new("birth", FieldType::Date)?,
        ],
    )?;
    let person = db.table("person")?;
    let owner = Field::reference("owner", person)?;
    db.define_table(
        "dog",
        vec![
            Field::new("name", FieldType::String)?.notnull(true),
            Field::new("birth", FieldType::Date)?,
            owner,
        ],
    )?;
    Ok(())
}

fn seed(db: &Database) -> Result<()> {
    let people = [("Max", "1971-12-21"), ("Tim", "1982-03-07")];
    let dogs = [
        ("Snoopy", "2001-05-20", 0),
        ("Rex", "2004-11-02", 0),
        ("Lassie", "2008-08-15", 1),
    ];

    let mut ids = Vec::with_capacity(people.len());
    for (name, birth) in people {
        ids.push(db.insert(
            "person",
            &[("name", Value::from(name)), ("birth", Value::from(birth))],
        )?);
    }
    for (name, birth, owner) in dogs {
        db.insert(
            "dog",
            &[
                ("name", Value::from(name)),
                ("birth", Value::from(birth)),
                ("owner", Value::from(ids[owner])),
            ],
        )?;
    }
    info!("Seeded {} people and {} dogs", people.len(), dogs.len());
    Ok(())
}
