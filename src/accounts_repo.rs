use anyhow::Result;
use diesel::prelude::*;
use uuid::Uuid;

use crate::accounts::{Account, AccountModel, DebitOutcome, NewAccount};
use crate::error::LedgerError;
use crate::web::PgPool;

#[derive(Clone)]
pub struct AccountsRepository {
    pool: PgPool,
}

impl AccountsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new account. Returns None when the id is already taken.
    pub async fn create(&self, new_account: NewAccount) -> Result<Option<Account>> {
        use crate::schema::accounts::dsl;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let inserted: Option<AccountModel> = diesel::insert_into(dsl::accounts)
                .values(&new_account)
                .on_conflict(dsl::id)
                .do_nothing()
                .get_result(&mut conn)
                .optional()?;

            Ok::<Option<AccountModel>, anyhow::Error>(inserted)
        })
        .await??;

        Ok(result.map(|model| model.into()))
    }

    /// Get an account by ID
    pub async fn get_by_id(&self, account_id: Uuid) -> Result<Option<Account>> {
        use crate::schema::accounts::dsl;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let account: Option<AccountModel> = dsl::accounts
                .filter(dsl::id.eq(account_id))
                .select(AccountModel::as_select())
                .first(&mut conn)
                .optional()?;

            Ok::<Option<AccountModel>, anyhow::Error>(account)
        })
        .await??;

        Ok(result.map(|model| model.into()))
    }

    /// Add `delta` to the balance in a single statement. Returns the new
    /// balance, or None when the account does not exist.
    pub async fn adjust(&self, account_id: Uuid, delta: i32) -> Result<Option<i32>> {
        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            adjust_with_conn(&mut conn, account_id, delta)
        })
        .await??;

        Ok(result)
    }

    /// Subtract `amount` if the balance covers it. The row is locked for the
    /// duration of the check so concurrent debits serialize.
    pub async fn debit(&self, account_id: Uuid, amount: i32) -> Result<Option<DebitOutcome>> {
        use crate::schema::accounts::dsl;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            conn.transaction::<_, anyhow::Error, _>(|conn| {
                let available: Option<i32> = dsl::accounts
                    .filter(dsl::id.eq(account_id))
                    .select(dsl::credits)
                    .for_update()
                    .first(conn)
                    .optional()?;

                let Some(available) = available else {
                    return Ok(None);
                };

                if available < amount {
                    return Ok(Some(DebitOutcome::Insufficient { available }));
                }

                let remaining: i32 = diesel::update(dsl::accounts.filter(dsl::id.eq(account_id)))
                    .set(dsl::credits.eq(dsl::credits - amount))
                    .returning(dsl::credits)
                    .get_result(conn)?;

                Ok(Some(DebitOutcome::Debited { remaining }))
            })
        })
        .await??;

        Ok(result)
    }
}

/// Balance increment usable inside a caller's transaction.
///
/// An increment that would overflow the column fails with
/// [`LedgerError::balance_overflow`] inside the `anyhow::Error`, leaving the
/// balance untouched.
pub(crate) fn adjust_with_conn(
    conn: &mut PgConnection,
    account_id: Uuid,
    delta: i32,
) -> Result<Option<i32>> {
    use crate::schema::accounts::dsl;

    let new_balance: Option<i32> = diesel::update(
        dsl::accounts
            .filter(dsl::id.eq(account_id))
            .filter(dsl::credits.le(i32::MAX - delta.max(0))),
    )
    .set(dsl::credits.eq(dsl::credits + delta))
    .returning(dsl::credits)
    .get_result(conn)
    .optional()?;

    if new_balance.is_some() {
        return Ok(new_balance);
    }

    let exists: bool = diesel::select(diesel::dsl::exists(
        dsl::accounts.filter(dsl::id.eq(account_id)),
    ))
    .get_result(conn)?;

    if exists {
        return Err(LedgerError::balance_overflow().into());
    }
    Ok(None)
}
