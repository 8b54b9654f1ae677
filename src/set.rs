//! Queryable sets.
//!
//! A [`QuerySet`] binds a [`Query`] to a database and executes it lazily:
//! nothing touches the store until `select`, `count`, `update` or `delete`
//! is called. Exactly one table must be inferable; there are no joins.
//! Multi-row updates and deletes run one entity at a time and are not
//! atomic: a failure leaves earlier rows already written.

use crate::catalog::{Field, Table};
use crate::database::Database;
use crate::error::{Error, Result};
use crate::expression::{OrderBy, Query};
use crate::rows::{Column, Rows};
use crate::store::{Direction, Entity, Key, StoreQuery, KEY_PROPERTY};
use crate::value::Value;
use log::debug;

/// Columns requested by a select.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    /// Every column of the table
    All(String),
    Field { table: String, field: String },
}

impl Projection {
    fn table(&self) -> &str {
        match self {
            Projection::All(table) | Projection::Field { table, .. } => table,
        }
    }
}

impl From<&Field> for Projection {
    fn from(field: &Field) -> Self {
        Projection::Field {
            table: field.table_name().to_string(),
            field: field.name().to_string(),
        }
    }
}

impl From<&Table> for Projection {
    fn from(table: &Table) -> Self {
        table.all()
    }
}

/// Options for [`QuerySet::select`].
#[derive(Debug, Clone, Default)]
pub struct SelectOptions {
    pub projection: Vec<Projection>,
    pub orderby: Option<OrderBy>,
    /// Always rejected: the store cannot group.
    pub groupby: Option<OrderBy>,
    /// `(lo, hi)`: fetch `hi - lo` rows starting at offset `lo`
    pub limitby: Option<(usize, usize)>,
    /// Always rejected: the store cannot join.
    pub left: Option<String>,
}

impl SelectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn project(mut self, projection: impl Into<Projection>) -> Self {
        self.projection.push(projection.into());
        self
    }

    pub fn orderby(mut self, orderby: OrderBy) -> Self {
        self.orderby = Some(orderby);
        self
    }

    pub fn groupby(mut self, groupby: OrderBy) -> Self {
        self.groupby = Some(groupby);
        self
    }

    pub fn limitby(mut self, lo: usize, hi: usize) -> Self {
        self.limitby = Some((lo, hi));
        self
    }

    pub fn left(mut self, table: impl Into<String>) -> Self {
        self.left = Some(table.into());
        self
    }
}

fn single_table<'a>(tables: impl IntoIterator<Item = &'a str>) -> Result<&'a str> {
    let mut distinct: Vec<&str> = Vec::new();
    for table in tables {
        if !distinct.contains(&table) {
            distinct.push(table);
        }
    }
    match distinct.as_slice() {
        [] => Err(Error::NoTableSelected),
        [table] => Ok(table),
        _ => Err(Error::MultipleTables(
            distinct.into_iter().map(str::to_string).collect(),
        )),
    }
}

/// A set of rows identified by a query.
#[derive(Clone)]
pub struct QuerySet<'db> {
    db: &'db Database,
    query: Option<Query>,
}

impl<'db> QuerySet<'db> {
    /// Bind `query` to `db`. Fails if the query spans several tables or
    /// names a table that is not defined.
    pub fn new(db: &'db Database, query: Option<Query>) -> Result<Self> {
        if let Some(query) = &query {
            let table = single_table(query.tables())?;
            db.table(table)?;
        }
        Ok(Self { db, query })
    }

    pub(crate) fn unfiltered(db: &'db Database) -> Self {
        Self { db, query: None }
    }

    pub fn query(&self) -> Option<&Query> {
        self.query.as_ref()
    }

    /// Narrow this set with another expression.
    ///
    /// By-id sets cannot be narrowed, and by-id expressions cannot narrow.
    /// An all-rows set narrowed by predicates on the same table becomes
    /// those predicates.
    pub fn filter(&self, query: Query) -> Result<QuerySet<'db>> {
        let combined = match (self.query.clone(), query) {
            (Some(Query::ById { .. }), _) | (_, Query::ById { .. }) => {
                return Err(Error::NotCombinable)
            }
            (None, query) => query,
            (Some(Query::All { table }), other) | (Some(other), Query::All { table }) => {
                single_table(other.tables().into_iter().chain([table.as_str()]))?;
                other
            }
            (Some(current), query) => current.and(query)?,
        };
        QuerySet::new(self.db, Some(combined))
    }

    /// Tables named by the query and the projection must be the same one.
    fn target_table(&self, projection: &[Projection]) -> Result<&'db Table> {
        let from_query = self.query.iter().flat_map(Query::tables);
        let from_projection = projection.iter().map(Projection::table);
        let name = single_table(from_query.chain(from_projection))?;
        self.db.table(name)
    }

    fn columns(table: &Table, projection: &[Projection]) -> Result<Vec<Column>> {
        if projection.is_empty() {
            return Ok(Column::all(table));
        }
        let mut columns = Vec::new();
        for p in projection {
            match p {
                Projection::All(_) => columns.extend(Column::all(table)),
                Projection::Field { field, .. } => {
                    table.field(field)?;
                    columns.push(Column::new(table.name(), field));
                }
            }
        }
        Ok(columns)
    }

    fn store_query(&self, table: &Table) -> StoreQuery {
        let mut query = StoreQuery::new(table.name());
        if let Some(q) = &self.query {
            for p in q.predicates() {
                query = query.filter(&p.field, p.op, p.value.clone());
            }
        }
        query
    }

    fn by_id(&self) -> Option<Key> {
        match &self.query {
            Some(Query::ById { table, id }) => Some(Key::new(table.as_str(), *id)),
            _ => None,
        }
    }

    fn extract(entity: &Entity, columns: &[Column]) -> Vec<Value> {
        columns
            .iter()
            .map(|c| {
                if c.field == "id" {
                    entity
                        .key()
                        .map_or(Value::Null, |key| Value::Integer(key.id))
                } else {
                    entity.get(&c.field).cloned().unwrap_or(Value::Null)
                }
            })
            .collect()
    }

    /// Fetch the rows of this set.
    pub fn select(&self, options: &SelectOptions) -> Result<Rows> {
        if options.groupby.is_some() {
            return Err(Error::Unsupported("groupby".to_string()));
        }
        if options.left.is_some() {
            return Err(Error::Unsupported("left join".to_string()));
        }

        let table = self.target_table(&options.projection)?;
        let columns = Self::columns(table, &options.projection)?;

        if let Some(key) = self.by_id() {
            debug!("select by id {}", key);
            let raw = match self.db.store().get(&key)? {
                Some(entity) => vec![Self::extract(&entity, &columns)],
                None => Vec::new(),
            };
            return Rows::materialize(self.db.catalog(), columns, raw);
        }

        let mut query = self.store_query(table);
        if let Some(orderby) = &options.orderby {
            for (name, descending) in orderby.components() {
                let field = table
                    .fields()
                    .iter()
                    .find(|f| f.name() == name)
                    .ok_or_else(|| {
                        Error::Unsupported(format!(
                            "orderby on '{}', which is not a field of {}",
                            name,
                            table.name()
                        ))
                    })?;
                field.asc()?;
                let property = if field.is_id() { KEY_PROPERTY } else { name };
                let direction = if descending {
                    Direction::Descending
                } else {
                    Direction::Ascending
                };
                query = query.order(property, direction);
            }
        }
        if let Some((lo, hi)) = options.limitby {
            query = query.fetch(hi.saturating_sub(lo), lo);
        }

        debug!("{}", query);
        let raw = self
            .db
            .store()
            .query(&query)?
            .iter()
            .map(|entity| Self::extract(entity, &columns))
            .collect();
        Rows::materialize(self.db.catalog(), columns, raw)
    }

    /// Number of rows in the set. Materializes the full selection.
    pub fn count(&self) -> Result<usize> {
        Ok(self.select(&SelectOptions::default())?.len())
    }

    /// Delete every row in the set, one entity at a time. Returns the
    /// number of rows deleted.
    pub fn delete(&self) -> Result<usize> {
        if let Some(key) = self.by_id() {
            let removed = self.db.store().delete(&key)?;
            debug!("delete {} (removed: {})", key, removed);
            return Ok(usize::from(removed));
        }

        let table = self.target_table(&[])?;
        let store = self.db.store();
        let mut deleted = 0;
        for entity in store.query(&self.store_query(table))? {
            if let Some(key) = entity.key() {
                if store.delete(key)? {
                    deleted += 1;
                }
            }
        }
        debug!("deleted {} rows from {}", deleted, table.name());
        Ok(deleted)
    }

    /// Assign `values` to every row in the set, writing one entity at a
    /// time. Returns the number of rows updated.
    pub fn update(&self, values: &[(&str, Value)]) -> Result<usize> {
        let table = self.target_table(&[])?;
        let assignments = table.coerce_values(values)?;
        let store = self.db.store();

        let entities = match self.by_id() {
            Some(key) => store.get(&key)?.into_iter().collect(),
            None => store.query(&self.store_query(table))?,
        };

        let mut updated = 0;
        for mut entity in entities {
            for (name, value) in &assignments {
                entity.set(name.as_str(), value.clone());
            }
            store.put(entity)?;
            updated += 1;
        }
        debug!("updated {} rows in {}", updated, table.name());
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FieldType;
    use anyhow::Result;

    fn setup() -> Result<Database> {
        let mut db = Database::in_memory();
        db.define_table(
            "posts",
            vec![
                Field::new("body", FieldType::Text)?,
                Field::new("total", FieldType::Integer)?,
            ],
        )?;
        db.define_table("tags", vec![Field::new("label", FieldType::String)?])?;
        for i in 0..10 {
            db.insert(
                "posts",
                &[("body", Value::from("")), ("total", Value::from(i))],
            )?;
        }
        Ok(db)
    }

    fn totals(rows: &Rows) -> Vec<i64> {
        rows.iter()
            .filter_map(|r| r.get("posts", "total").and_then(Value::as_i64))
            .collect()
    }

    #[test]
    fn test_multi_table_predicates_fail_at_construction() -> Result<()> {
        let db = setup()?;
        let query = db
            .table("posts")?
            .field("total")?
            .equals(1)?
            .and(db.table("tags")?.field("label")?.equals("x")?)?;
        assert!(matches!(db.set(query), Err(Error::MultipleTables(_))));
        Ok(())
    }

    #[test]
    fn test_unfiltered_set_needs_projection() -> Result<()> {
        let db = setup()?;
        let set = db.unfiltered();
        assert!(matches!(
            set.select(&SelectOptions::default()),
            Err(Error::NoTableSelected)
        ));
        let rows = set.select(&SelectOptions::new().project(db.table("posts")?))?;
        assert_eq!(rows.len(), 10);
        Ok(())
    }

    #[test]
    fn test_orderby_and_limitby() -> Result<()> {
        let db = setup()?;
        let posts = db.table("posts")?;
        let set = db.set(posts.id().greater_than(0)?)?;

        let rows = set.select(
            &SelectOptions::new()
                .orderby(posts.field("total")?.desc()?)
                .limitby(2, 5),
        )?;
        assert_eq!(totals(&rows), vec![7, 6, 5]);

        let rows = set.select(&SelectOptions::new().orderby(posts.id().desc()?).limitby(0, 2))?;
        assert_eq!(totals(&rows), vec![9, 8]);

        let rows = set.select(&SelectOptions::new().limitby(5, 2))?;
        assert!(rows.is_empty());
        Ok(())
    }

    #[test]
    fn test_orderby_must_name_fields() -> Result<()> {
        let db = setup()?;
        let posts = db.table("posts")?;
        let set = db.set(posts.id().greater_than(0)?)?;

        let derived = posts.field("total")?.plus(1).asc();
        assert!(matches!(
            set.select(&SelectOptions::new().orderby(derived)),
            Err(Error::Unsupported(_))
        ));
        assert!(matches!(
            set.select(&SelectOptions::new().orderby(OrderBy::parse("body"))),
            Err(Error::NotFilterable { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_groupby_and_left_join_rejected() -> Result<()> {
        let db = setup()?;
        let posts = db.table("posts")?;
        let set = db.set(posts.id().greater_than(0)?)?;
        assert!(matches!(
            set.select(&SelectOptions::new().groupby(posts.field("total")?.asc()?)),
            Err(Error::Unsupported(_))
        ));
        assert!(matches!(
            set.select(&SelectOptions::new().left("tags")),
            Err(Error::Unsupported(_))
        ));

        let by_id = db.set(posts.id().equals(1)?)?;
        assert!(by_id
            .select(&SelectOptions::new().groupby(OrderBy::parse("total")))
            .is_err());
        Ok(())
    }

    #[test]
    fn test_filter_narrowing() -> Result<()> {
        let db = setup()?;
        let posts = db.table("posts")?;
        let total = posts.field("total")?;

        let set = db.set(total.greater_or_equal(5)?)?;
        assert_eq!(set.count()?, 5);
        assert_eq!(set.filter(total.less_or_equal(5)?)?.count()?, 1);

        let all = db.set(posts.id().greater_than(0)?)?;
        assert_eq!(all.filter(total.less_than(3)?)?.count()?, 3);

        let by_id = db.set(posts.id().equals(1)?)?;
        assert!(matches!(
            by_id.filter(total.less_than(3)?),
            Err(Error::NotCombinable)
        ));
        assert!(matches!(
            set.filter(posts.id().equals(1)?),
            Err(Error::NotCombinable)
        ));

        let other = db.table("tags")?.field("label")?.equals("x")?;
        assert!(matches!(all.filter(other), Err(Error::MultipleTables(_))));
        Ok(())
    }

    #[test]
    fn test_projection() -> Result<()> {
        let db = setup()?;
        let posts = db.table("posts")?;
        let rows = db
            .set(posts.field("total")?.equals(3)?)?
            .select(&SelectOptions::new().project(posts.field("total")?))?;
        assert_eq!(rows.columns().len(), 1);
        let record = rows.row(0)?.record().expect("single table");
        assert_eq!(record.get("total"), Some(&Value::Integer(3)));
        assert_eq!(record.id(), None);

        let tags = db.table("tags")?;
        assert!(matches!(
            db.set(posts.field("total")?.equals(3)?)?
                .select(&SelectOptions::new().project(tags.field("label")?)),
            Err(Error::MultipleTables(_))
        ));
        Ok(())
    }

    #[test]
    fn test_update_and_delete_counts() -> Result<()> {
        let db = setup()?;
        let posts = db.table("posts")?;
        let total = posts.field("total")?;

        let set = db.set(total.less_than(4)?)?;
        assert_eq!(set.update(&[("total", Value::from(100))])?, 4);
        assert_eq!(db.set(total.equals(100)?)?.count()?, 4);

        assert!(matches!(
            set.update(&[("nope", Value::from(1))]),
            Err(Error::UnknownField { .. })
        ));
        assert!(matches!(
            set.update(&[("id", Value::from(1))]),
            Err(Error::InvalidFieldName(_))
        ));

        assert_eq!(db.set(total.equals(100)?)?.delete()?, 4);
        assert_eq!(db.set(posts.id().greater_than(0)?)?.count()?, 6);

        let missing = db.set(posts.id().equals(1)?)?;
        assert_eq!(missing.delete()?, 0);
        assert_eq!(missing.update(&[("total", Value::from(1))])?, 0);
        Ok(())
    }
}
