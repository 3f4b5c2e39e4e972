//! `PostgreSQL` storage engine.
//!
//! One table per class plus the `place_amenity` association (see the
//! `migrations/` directory). Registered entities wait in a pending map until
//! [`RelationalStore::save`] writes them in one transaction, parents before
//! children; every read goes to the database, so pending entities are not
//! visible until that transaction commits.
//!
//! Deletes are issued immediately and cascade through `ON DELETE CASCADE`.

use std::collections::{BTreeMap, BTreeSet};

use roost_types::{
    Amenity, AmenityId, City, CityId, ClassTag, Entity, IdentityKey, PLACE_AMENITY_TABLE, Place,
    PlaceId, Review, State, StateId, User, UserId, foreign_key, now,
};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgConnection, PgPool};

use crate::engine::{StorageEngine, classes};
use crate::error::StorageError;
use crate::postgres::{PostgresConfig, PostgresPool};
use crate::resolver::{self, ObjectMap, RelationResolver};
use crate::rows::{self, CityRow, LinkRow, NamedRow, PlaceRow, ReviewRow, UserRow};

/// Database-backed engine with a pending-registration buffer.
#[derive(Debug)]
pub struct RelationalStore {
    db: PostgresPool,
    pending: ObjectMap,
}

impl RelationalStore {
    /// Connect, run migrations, and start with nothing pending.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Connection`] if the server cannot be reached
    /// and [`StorageError::Migration`] if the schema cannot be applied.
    pub async fn connect(config: &PostgresConfig) -> Result<Self, StorageError> {
        let db = PostgresPool::connect(config).await?;
        db.run_migrations().await?;
        Ok(Self::from_pool(db))
    }

    const fn from_pool(db: PostgresPool) -> Self {
        Self {
            db,
            pending: BTreeMap::new(),
        }
    }

    /// Number of entities waiting for the next save.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Drop anything pending and close the pool.
    pub async fn close(&mut self) {
        if !self.pending.is_empty() {
            tracing::warn!(pending = self.pending.len(), "Closing with unsaved entities");
        }
        self.pending.clear();
        self.db.close().await;
    }

    async fn exists(&self, key: &IdentityKey) -> Result<bool, StorageError> {
        let sql = format!(
            "SELECT EXISTS (SELECT 1 FROM {} WHERE id = $1)",
            key.class().table()
        );
        let found: bool = sqlx::query_scalar(&sql)
            .bind(key.id())
            .fetch_one(self.db.pool())
            .await?;
        Ok(found)
    }

    /// Load the rows of `class` selected by `scope`, ordered by id.
    async fn fetch(&self, class: ClassTag, scope: &Scope<'_>) -> Result<Vec<Entity>, StorageError> {
        let sql = format!(
            "SELECT {} FROM {} {} ORDER BY id",
            rows::columns(class),
            class.table(),
            scope.clause(class)
        );
        let pool = self.db.pool();
        let value = scope.value();

        let entities = match class {
            ClassTag::User => fetch_rows::<UserRow>(pool, &sql, value)
                .await?
                .into_iter()
                .map(User::from)
                .map(Entity::from)
                .collect(),
            ClassTag::State => fetch_rows::<NamedRow>(pool, &sql, value)
                .await?
                .into_iter()
                .map(State::from)
                .map(Entity::from)
                .collect(),
            ClassTag::City => fetch_rows::<CityRow>(pool, &sql, value)
                .await?
                .into_iter()
                .map(City::from)
                .map(Entity::from)
                .collect(),
            ClassTag::Amenity => fetch_rows::<NamedRow>(pool, &sql, value)
                .await?
                .into_iter()
                .map(Amenity::from)
                .map(Entity::from)
                .collect(),
            ClassTag::Place => {
                let mut places: Vec<Place> = fetch_rows::<PlaceRow>(pool, &sql, value)
                    .await?
                    .into_iter()
                    .map(Place::from)
                    .collect();
                attach_amenities(pool, &mut places).await?;
                places.into_iter().map(Entity::from).collect()
            }
            ClassTag::Review => fetch_rows::<ReviewRow>(pool, &sql, value)
                .await?
                .into_iter()
                .map(Review::from)
                .map(Entity::from)
                .collect(),
        };
        Ok(entities)
    }
}

impl StorageEngine for RelationalStore {
    async fn all(&self, class: Option<ClassTag>) -> Result<ObjectMap, StorageError> {
        let mut objects = ObjectMap::new();
        for class in classes(class) {
            for entity in self.fetch(class, &Scope::All).await? {
                objects.insert(entity.identity_key(), entity);
            }
        }
        Ok(objects)
    }

    async fn register(&mut self, entity: Entity) -> Result<(), StorageError> {
        entity.validate()?;
        let key = entity.identity_key();
        if self.pending.contains_key(&key) || self.exists(&key).await? {
            return Err(StorageError::Validation(format!("{key} is already registered")));
        }
        tracing::debug!(%key, "Registered entity");
        self.pending.insert(key, entity);
        Ok(())
    }

    async fn update(&mut self, entity: Entity) -> Result<(), StorageError> {
        entity.validate()?;
        self.pending.insert(entity.identity_key(), entity);
        Ok(())
    }

    async fn save(&mut self) -> Result<(), StorageError> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let at = now();
        let mut staged = self.pending.clone();
        staged.values_mut().for_each(|entity| entity.touch(at));

        // Keys order by class first, so parents are written before children.
        let mut tx = self.db.pool().begin().await?;
        for entity in staged.values() {
            upsert(&mut tx, entity).await?;
        }
        tx.commit().await?;

        self.pending.clear();
        tracing::debug!(flushed = staged.len(), "Saved pending entities");
        Ok(())
    }

    async fn delete_key(&mut self, key: &IdentityKey) -> Result<(), StorageError> {
        let sql = format!("DELETE FROM {} WHERE id = $1", key.class().table());
        let result = sqlx::query(&sql)
            .bind(key.id())
            .execute(self.db.pool())
            .await?;
        let dropped = resolver::remove_cascading(&mut self.pending, key);

        if result.rows_affected() > 0 || dropped > 0 {
            tracing::debug!(%key, rows = result.rows_affected(), pending_dropped = dropped, "Deleted entity");
        }
        Ok(())
    }

    async fn reload(&mut self) -> Result<(), StorageError> {
        let discarded = std::mem::take(&mut self.pending).len();
        tracing::info!(discarded, "Discarded pending entities");
        Ok(())
    }

    async fn get(&self, class: ClassTag, id: &str) -> Result<Option<Entity>, StorageError> {
        Ok(self.fetch(class, &Scope::Id(id)).await?.into_iter().next())
    }

    async fn count(&self, class: Option<ClassTag>) -> Result<usize, StorageError> {
        let mut total = 0_usize;
        for class in classes(class) {
            let sql = format!("SELECT COUNT(*) FROM {}", class.table());
            let counted: i64 = sqlx::query_scalar(&sql).fetch_one(self.db.pool()).await?;
            total = total.saturating_add(usize::try_from(counted).unwrap_or(0));
        }
        Ok(total)
    }
}

impl RelationResolver for RelationalStore {
    async fn parent_of(
        &self,
        child: &Entity,
        parent: ClassTag,
    ) -> Result<Option<Entity>, StorageError> {
        let fk = foreign_key(child.class(), parent)
            .ok_or_else(|| resolver::no_such_reference(child.class(), parent))?;
        let Some(parent_id) = child.parent_id(parent) else {
            return Ok(None);
        };
        match self.fetch(parent, &Scope::Id(parent_id)).await?.into_iter().next() {
            Some(entity) => Ok(Some(entity)),
            None => Err(resolver::dangling(
                &child.identity_key(),
                fk.column,
                &IdentityKey::new(parent, parent_id),
            )),
        }
    }

    async fn children_of(
        &self,
        parent: &Entity,
        child: ClassTag,
    ) -> Result<Vec<Entity>, StorageError> {
        let fk = foreign_key(child, parent.class())
            .ok_or_else(|| resolver::no_such_reference(child, parent.class()))?;
        self.fetch(child, &Scope::Column(fk.column, parent.id())).await
    }

    /// Links are read from `place_amenity`; unsaved changes to
    /// `place.amenity_ids` are not reflected.
    async fn amenities_of(&self, place: &Place) -> Result<Vec<Amenity>, StorageError> {
        let linked = self.fetch(ClassTag::Amenity, &Scope::Linked(place.id.as_str())).await?;
        Ok(resolver::narrow(linked))
    }

    async fn places_with_amenity(&self, amenity: &Amenity) -> Result<Vec<Place>, StorageError> {
        let linked = self.fetch(ClassTag::Place, &Scope::Linked(amenity.id.as_str())).await?;
        Ok(resolver::narrow(linked))
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Row selection for [`RelationalStore::fetch`].
#[derive(Debug, Clone, Copy)]
enum Scope<'a> {
    /// Every row.
    All,
    /// The row with this id.
    Id(&'a str),
    /// Rows whose foreign-key column holds this id.
    Column(&'static str, &'a str),
    /// Rows on the other side of `place_amenity` from this id.
    Linked(&'a str),
}

impl<'a> Scope<'a> {
    fn clause(&self, class: ClassTag) -> String {
        match self {
            Self::All => String::new(),
            Self::Id(_) => "WHERE id = $1".to_owned(),
            Self::Column(column, _) => format!("WHERE {column} = $1"),
            Self::Linked(_) if class == ClassTag::Amenity => format!(
                "WHERE id IN (SELECT amenity_id FROM {PLACE_AMENITY_TABLE} WHERE place_id = $1)"
            ),
            Self::Linked(_) => format!(
                "WHERE id IN (SELECT place_id FROM {PLACE_AMENITY_TABLE} WHERE amenity_id = $1)"
            ),
        }
    }

    const fn value(&self) -> Option<&'a str> {
        match *self {
            Self::All => None,
            Self::Id(id) | Self::Column(_, id) | Self::Linked(id) => Some(id),
        }
    }
}

async fn fetch_rows<R>(pool: &PgPool, sql: &str, value: Option<&str>) -> Result<Vec<R>, StorageError>
where
    R: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    let query = sqlx::query_as::<_, R>(sql);
    let query = match value {
        Some(value) => query.bind(value.to_owned()),
        None => query,
    };
    Ok(query.fetch_all(pool).await?)
}

/// Fill in `amenity_ids` for freshly fetched places with one query.
async fn attach_amenities(pool: &PgPool, places: &mut [Place]) -> Result<(), StorageError> {
    if places.is_empty() {
        return Ok(());
    }
    let ids: Vec<String> = places.iter().map(|place| place.id.as_str().to_owned()).collect();
    let sql = format!(
        "SELECT place_id, amenity_id FROM {PLACE_AMENITY_TABLE} WHERE place_id = ANY($1)"
    );
    let links = sqlx::query_as::<_, LinkRow>(&sql)
        .bind(&ids)
        .fetch_all(pool)
        .await?;

    let mut by_place: BTreeMap<String, BTreeSet<AmenityId>> = BTreeMap::new();
    for link in links {
        by_place
            .entry(link.place_id)
            .or_default()
            .insert(link.amenity_id.into());
    }
    for place in places {
        if let Some(linked) = by_place.remove(place.id.as_str()) {
            place.amenity_ids = linked;
        }
    }
    Ok(())
}

/// Insert or overwrite one entity's row (and, for a place, its links).
async fn upsert(conn: &mut PgConnection, entity: &Entity) -> Result<(), StorageError> {
    match entity {
        Entity::User(user) => {
            sqlx::query(
                r"INSERT INTO users (id, created_at, updated_at, email, password, first_name, last_name)
                  VALUES ($1, $2, $3, $4, $5, $6, $7)
                  ON CONFLICT (id) DO UPDATE SET
                    updated_at = EXCLUDED.updated_at,
                    email = EXCLUDED.email,
                    password = EXCLUDED.password,
                    first_name = EXCLUDED.first_name,
                    last_name = EXCLUDED.last_name",
            )
            .bind(user.id.as_str())
            .bind(user.created_at)
            .bind(user.updated_at)
            .bind(&user.email)
            .bind(&user.password)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .execute(&mut *conn)
            .await?;
        }
        Entity::State(State { name, .. }) | Entity::Amenity(Amenity { name, .. }) => {
            upsert_named(conn, entity, name).await?;
        }
        Entity::City(city) => {
            sqlx::query(
                r"INSERT INTO cities (id, created_at, updated_at, state_id, name)
                  VALUES ($1, $2, $3, $4, $5)
                  ON CONFLICT (id) DO UPDATE SET
                    updated_at = EXCLUDED.updated_at,
                    state_id = EXCLUDED.state_id,
                    name = EXCLUDED.name",
            )
            .bind(city.id.as_str())
            .bind(city.created_at)
            .bind(city.updated_at)
            .bind(city.state_id.as_ref().map(StateId::as_str))
            .bind(&city.name)
            .execute(&mut *conn)
            .await?;
        }
        Entity::Place(place) => upsert_place(conn, place).await?,
        Entity::Review(review) => {
            sqlx::query(
                r"INSERT INTO reviews (id, created_at, updated_at, place_id, user_id, text)
                  VALUES ($1, $2, $3, $4, $5, $6)
                  ON CONFLICT (id) DO UPDATE SET
                    updated_at = EXCLUDED.updated_at,
                    place_id = EXCLUDED.place_id,
                    user_id = EXCLUDED.user_id,
                    text = EXCLUDED.text",
            )
            .bind(review.id.as_str())
            .bind(review.created_at)
            .bind(review.updated_at)
            .bind(review.place_id.as_ref().map(PlaceId::as_str))
            .bind(review.user_id.as_ref().map(UserId::as_str))
            .bind(&review.text)
            .execute(&mut *conn)
            .await?;
        }
    }
    Ok(())
}

/// Upsert into a table holding only a name (`states`, `amenities`).
async fn upsert_named(conn: &mut PgConnection, entity: &Entity, name: &str) -> Result<(), StorageError> {
    let sql = format!(
        "INSERT INTO {} (id, created_at, updated_at, name) VALUES ($1, $2, $3, $4)
         ON CONFLICT (id) DO UPDATE SET updated_at = EXCLUDED.updated_at, name = EXCLUDED.name",
        entity.class().table()
    );
    sqlx::query(&sql)
        .bind(entity.id())
        .bind(entity.created_at())
        .bind(entity.updated_at())
        .bind(name)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn upsert_place(conn: &mut PgConnection, place: &Place) -> Result<(), StorageError> {
    sqlx::query(
        r"INSERT INTO places (id, created_at, updated_at, city_id, user_id, name, description,
                              number_rooms, number_bathrooms, max_guest, price_by_night, latitude, longitude)
          VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
          ON CONFLICT (id) DO UPDATE SET
            updated_at = EXCLUDED.updated_at,
            city_id = EXCLUDED.city_id,
            user_id = EXCLUDED.user_id,
            name = EXCLUDED.name,
            description = EXCLUDED.description,
            number_rooms = EXCLUDED.number_rooms,
            number_bathrooms = EXCLUDED.number_bathrooms,
            max_guest = EXCLUDED.max_guest,
            price_by_night = EXCLUDED.price_by_night,
            latitude = EXCLUDED.latitude,
            longitude = EXCLUDED.longitude",
    )
    .bind(place.id.as_str())
    .bind(place.created_at)
    .bind(place.updated_at)
    .bind(place.city_id.as_ref().map(CityId::as_str))
    .bind(place.user_id.as_ref().map(UserId::as_str))
    .bind(&place.name)
    .bind(&place.description)
    .bind(rows::to_column(place.number_rooms))
    .bind(rows::to_column(place.number_bathrooms))
    .bind(rows::to_column(place.max_guest))
    .bind(rows::to_column(place.price_by_night))
    .bind(place.latitude)
    .bind(place.longitude)
    .execute(&mut *conn)
    .await?;

    // The association is replaced wholesale so unlinked amenities go away.
    let clear = format!("DELETE FROM {PLACE_AMENITY_TABLE} WHERE place_id = $1");
    sqlx::query(&clear)
        .bind(place.id.as_str())
        .execute(&mut *conn)
        .await?;

    if !place.amenity_ids.is_empty() {
        let amenity_ids: Vec<String> = place
            .amenity_ids
            .iter()
            .map(|id| id.as_str().to_owned())
            .collect();
        let link = format!(
            "INSERT INTO {PLACE_AMENITY_TABLE} (place_id, amenity_id) SELECT $1, UNNEST($2::TEXT[])"
        );
        sqlx::query(&link)
            .bind(place.id.as_str())
            .bind(&amenity_ids)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}
