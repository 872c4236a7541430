//! Principal persistence in `PostgreSQL`.

use chrono::{DateTime, Utc};
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use shopfront_core::{Email, Role, UserId};

use super::repository::UserRepository;
use super::{PgStore, RepositoryError, conflict_on_unique, contains_pattern};
use crate::models::{NewUser, Page, Pagination, User, UserFilter};

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for principal queries.
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    first_name: String,
    last_name: String,
    email: String,
    role: Role,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: UserId::new(row.id),
            first_name: row.first_name,
            last_name: row.last_name,
            email,
            role: row.role,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CredentialsRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: String,
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &UserFilter) {
    if let Some(email) = &filter.email {
        qb.push(" AND email ILIKE ");
        qb.push_bind(contains_pattern(email));
    }
    if let Some(role) = filter.role {
        qb.push(" AND role = ");
        qb.push_bind(role);
    }
}

impl UserRepository for PgStore {
    async fn create_user(&self, input: NewUser) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            INSERT INTO shop.user_account (id, first_name, last_name, email, password_hash, role)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, first_name, last_name, email, role, is_active, created_at, updated_at
            ",
        )
        .bind(Uuid::new_v4())
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(input.email.as_str())
        .bind(&input.password_hash)
        .bind(input.role)
        .fetch_one(self.pool())
        .await
        .map_err(|e| conflict_on_unique(e, "email"))?;

        row.try_into()
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, first_name, last_name, email, role, is_active, created_at, updated_at
            FROM shop.user_account
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn find_user_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, first_name, last_name, email, role, is_active, created_at, updated_at
            FROM shop.user_account
            WHERE LOWER(email) = LOWER($1)
            ",
        )
        .bind(email.as_str())
        .fetch_optional(self.pool())
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn find_credentials(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let row = sqlx::query_as::<_, CredentialsRow>(
            r"
            SELECT id, first_name, last_name, email, role, is_active, created_at, updated_at,
                   password_hash
            FROM shop.user_account
            WHERE LOWER(email) = LOWER($1)
            ",
        )
        .bind(email.as_str())
        .fetch_optional(self.pool())
        .await?;

        row.map(|r| -> Result<_, RepositoryError> {
            Ok((User::try_from(r.user)?, r.password_hash))
        })
        .transpose()
    }

    async fn get_password_hash(&self, id: UserId) -> Result<Option<String>, RepositoryError> {
        let hash = sqlx::query_scalar::<_, String>(
            "SELECT password_hash FROM shop.user_account WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        Ok(hash)
    }

    async fn update_password_hash(
        &self,
        id: UserId,
        password_hash: String,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE shop.user_account
            SET password_hash = $2, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(password_hash)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn set_user_active(&self, id: UserId, is_active: bool) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            UPDATE shop.user_account
            SET is_active = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, first_name, last_name, email, role, is_active, created_at, updated_at
            ",
        )
        .bind(id)
        .bind(is_active)
        .fetch_optional(self.pool())
        .await?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    async fn set_user_role(&self, id: UserId, role: Role) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            UPDATE shop.user_account
            SET role = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, first_name, last_name, email, role, is_active, created_at, updated_at
            ",
        )
        .bind(id)
        .bind(role)
        .fetch_optional(self.pool())
        .await?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    async fn delete_user(&self, id: UserId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            DELETE FROM shop.user_account u
            WHERE u.id = $1
              AND NOT EXISTS (SELECT 1 FROM shop.purchase_order o WHERE o.user_id = u.id)
            ",
        )
        .bind(id)
        .execute(self.pool())
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_foreign_key_violation()
            {
                return RepositoryError::Conflict("principal still owns orders".to_owned());
            }
            RepositoryError::Database(e)
        })?;

        if result.rows_affected() > 0 {
            return Ok(());
        }

        // Nothing deleted: either the principal is missing or it owns orders.
        match self.get_user(id).await? {
            None => Err(RepositoryError::NotFound),
            Some(_) => Err(RepositoryError::Conflict(
                "principal still owns orders".to_owned(),
            )),
        }
    }

    async fn list_users(
        &self,
        filter: &UserFilter,
        page: Pagination,
    ) -> Result<Page<User>, RepositoryError> {
        let mut count = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) FROM shop.user_account WHERE TRUE",
        );
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(self.pool()).await?;

        let mut select = QueryBuilder::<Postgres>::new(
            "SELECT id, first_name, last_name, email, role, is_active, created_at, updated_at \
             FROM shop.user_account WHERE TRUE",
        );
        push_filters(&mut select, filter);
        select.push(" ORDER BY created_at DESC, id LIMIT ");
        select.push_bind(i64::from(page.per_page()));
        select.push(" OFFSET ");
        select.push_bind(i64::try_from(page.offset()).unwrap_or(i64::MAX));

        let rows: Vec<UserRow> = select.build_query_as().fetch_all(self.pool()).await?;
        let items = rows
            .into_iter()
            .map(User::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page {
            items,
            total: u64::try_from(total).unwrap_or_default(),
            page: page.page(),
            per_page: page.per_page(),
        })
    }
}
