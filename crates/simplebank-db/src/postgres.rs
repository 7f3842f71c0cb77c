//! PostgreSQL repository
//!
//! Balance changes follow one pattern: begin, lock the account rows with
//! `SELECT ... FOR UPDATE` in ascending id order, check, update, journal,
//! commit. Dropping an uncommitted transaction rolls it back, so a cancelled
//! request leaves nothing behind.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use simplebank_types::{Account, Card, Installment, JournalEntry, Loan, User};
use sqlx::{PgConnection, PgPool};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use uuid::Uuid;

use crate::models::{to_i32, DbAccount, DbCard, DbLoan, DbLoanPayment, DbTransaction, DbUser};
use crate::{DbError, DbResult, Posting, Repository};

const ACCOUNT_COLUMNS: &str = "id, user_id, number, balance, created_at";
const CARD_COLUMNS: &str =
    "id, account_id, pan_encrypted, cvv_hash, expiry_month, expiry_year, hmac, created_at";
const LOAN_COLUMNS: &str = "id, user_id, account_id, principal, annual_rate, term_months, \
     start_date, remaining_principal, created_at";
const PAYMENT_COLUMNS: &str =
    "loan_id, idx, due_date, amount, interest_part, principal_part, penalty, paid";
const TRANSACTION_COLUMNS: &str =
    "id, from_account_id, to_account_id, amount, occurred_at, kind, description";

/// Repository backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn schedule_for(&self, loan_ids: &[Uuid]) -> DbResult<HashMap<Uuid, Vec<Installment>>> {
        let rows = sqlx::query_as::<_, DbLoanPayment>(&format!(
            "SELECT {} FROM loan_payments WHERE loan_id = ANY($1) ORDER BY loan_id, idx",
            PAYMENT_COLUMNS
        ))
        .bind(loan_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut schedules: HashMap<Uuid, Vec<Installment>> = HashMap::new();
        for row in rows {
            let installment = Installment::try_from(row)?;
            schedules.entry(installment.loan_id).or_default().push(installment);
        }
        Ok(schedules)
    }
}

/// Lock one account row for the rest of the transaction
async fn lock_account(conn: &mut PgConnection, id: Uuid) -> DbResult<DbAccount> {
    sqlx::query_as::<_, DbAccount>(&format!(
        "SELECT {} FROM accounts WHERE id = $1 FOR UPDATE",
        ACCOUNT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| DbError::NotFound(format!("Account {}", id)))
}

async fn change_balance(conn: &mut PgConnection, id: Uuid, delta: Decimal) -> DbResult<DbAccount> {
    let account = sqlx::query_as::<_, DbAccount>(&format!(
        "UPDATE accounts SET balance = balance + $2 WHERE id = $1 RETURNING {}",
        ACCOUNT_COLUMNS
    ))
    .bind(id)
    .bind(delta)
    .fetch_one(conn)
    .await?;
    Ok(account)
}

async fn insert_transaction(conn: &mut PgConnection, entry: &JournalEntry) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO transactions
            (id, from_account_id, to_account_id, amount, occurred_at, kind, description)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(entry.id)
    .bind(entry.from_account_id)
    .bind(entry.to_account_id)
    .bind(entry.amount)
    .bind(entry.timestamp)
    .bind(entry.kind.as_str())
    .bind(&entry.description)
    .execute(conn)
    .await?;
    Ok(())
}

fn map_unique_violation(e: sqlx::Error, what: &str) -> DbError {
    if let sqlx::Error::Database(ref db_err) = e {
        if db_err.is_unique_violation() {
            let detail = db_err.constraint().unwrap_or(what).to_string();
            return DbError::Duplicate(detail);
        }
    }
    DbError::Query(e)
}

#[async_trait]
impl Repository for PgRepository {
    async fn add_user(&self, user: &User) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, password_hash, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "username or email already exists"))?;

        Ok(())
    }

    async fn get_user_by_username(&self, username: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, DbUser>(
            "SELECT id, username, email, password_hash, created_at FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user.map(User::from))
    }

    async fn get_user_by_id(&self, id: Uuid) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, DbUser>(
            "SELECT id, username, email, password_hash, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user.map(User::from))
    }

    async fn add_account(&self, account: &Account) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO accounts (id, user_id, number, balance, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(account.id)
        .bind(account.user_id)
        .bind(&account.number)
        .bind(account.balance)
        .bind(account.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "account number already exists"))?;

        Ok(())
    }

    async fn get_account(&self, id: Uuid) -> DbResult<Option<Account>> {
        let account = sqlx::query_as::<_, DbAccount>(&format!(
            "SELECT {} FROM accounts WHERE id = $1",
            ACCOUNT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account.map(Account::from))
    }

    async fn get_accounts_by_user(&self, user_id: Uuid) -> DbResult<Vec<Account>> {
        let accounts = sqlx::query_as::<_, DbAccount>(&format!(
            "SELECT {} FROM accounts WHERE user_id = $1 ORDER BY created_at, id",
            ACCOUNT_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(accounts.into_iter().map(Account::from).collect())
    }

    async fn update_account_balance(&self, id: Uuid, delta: Decimal) -> DbResult<Account> {
        let mut tx = self.pool.begin().await?;

        let current = lock_account(&mut tx, id).await?;
        if current.balance + delta < Decimal::ZERO {
            return Err(DbError::InsufficientBalance(format!(
                "Account {}: have {}, need {}",
                id, current.balance, -delta
            )));
        }

        let account = change_balance(&mut tx, id, delta).await?;
        tx.commit().await?;

        Ok(account.into())
    }

    async fn apply_movement(
        &self,
        postings: &[Posting],
        entry: &JournalEntry,
    ) -> DbResult<Vec<Account>> {
        let mut tx = self.pool.begin().await?;

        // Ascending id order keeps concurrent transfers from deadlocking
        let ids: BTreeSet<Uuid> = postings.iter().map(|p| p.account_id).collect();
        let mut locked: BTreeMap<Uuid, DbAccount> = BTreeMap::new();
        for id in ids {
            let row = lock_account(&mut tx, id).await?;
            locked.insert(id, row);
        }

        let mut projected: BTreeMap<Uuid, Decimal> =
            locked.iter().map(|(id, row)| (*id, row.balance)).collect();
        for posting in postings {
            let balance = projected.entry(posting.account_id).or_default();
            *balance += posting.delta;
            if *balance < Decimal::ZERO {
                return Err(DbError::InsufficientBalance(format!(
                    "Account {}: balance {} cannot cover {}",
                    posting.account_id,
                    locked[&posting.account_id].balance,
                    -posting.delta
                )));
            }
        }

        let mut updated = Vec::with_capacity(postings.len());
        for posting in postings {
            let account = change_balance(&mut tx, posting.account_id, posting.delta).await?;
            updated.push(Account::from(account));
        }

        insert_transaction(&mut tx, entry).await?;
        tx.commit().await?;

        Ok(updated)
    }

    async fn add_card(&self, card: &Card) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO cards
                (id, account_id, pan_encrypted, cvv_hash, expiry_month, expiry_year, hmac, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(card.id)
        .bind(card.account_id)
        .bind(&card.pan_encrypted)
        .bind(&card.cvv_hash)
        .bind(to_i32("expiry_month", card.expiry_month)?)
        .bind(card.expiry_year)
        .bind(&card.hmac)
        .bind(card.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_card_by_id(&self, id: Uuid) -> DbResult<Option<Card>> {
        let card = sqlx::query_as::<_, DbCard>(&format!(
            "SELECT {} FROM cards WHERE id = $1",
            CARD_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        card.map(Card::try_from).transpose()
    }

    async fn get_cards_by_account(&self, account_id: Uuid) -> DbResult<Vec<Card>> {
        let cards = sqlx::query_as::<_, DbCard>(&format!(
            "SELECT {} FROM cards WHERE account_id = $1 ORDER BY created_at, id",
            CARD_COLUMNS
        ))
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        cards.into_iter().map(Card::try_from).collect()
    }

    async fn add_loan(&self, loan: &Loan, disbursement: &JournalEntry) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        lock_account(&mut tx, loan.account_id).await?;

        sqlx::query(
            r#"
            INSERT INTO loans
                (id, user_id, account_id, principal, annual_rate, term_months,
                 start_date, remaining_principal, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(loan.id)
        .bind(loan.user_id)
        .bind(loan.account_id)
        .bind(loan.principal)
        .bind(loan.annual_rate)
        .bind(to_i32("term_months", loan.term_months)?)
        .bind(loan.start_date)
        .bind(loan.remaining_principal)
        .bind(loan.created_at)
        .execute(&mut *tx)
        .await?;

        for installment in &loan.schedule {
            sqlx::query(
                r#"
                INSERT INTO loan_payments
                    (loan_id, idx, due_date, amount, interest_part, principal_part, penalty, paid)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(loan.id)
            .bind(to_i32("idx", installment.idx)?)
            .bind(installment.due_date)
            .bind(installment.amount)
            .bind(installment.interest_part)
            .bind(installment.principal_part)
            .bind(installment.penalty)
            .bind(installment.paid)
            .execute(&mut *tx)
            .await?;
        }

        change_balance(&mut tx, loan.account_id, loan.principal).await?;
        insert_transaction(&mut tx, disbursement).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_loan(&self, id: Uuid) -> DbResult<Option<Loan>> {
        let Some(row) = sqlx::query_as::<_, DbLoan>(&format!(
            "SELECT {} FROM loans WHERE id = $1",
            LOAN_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let mut schedules = self.schedule_for(&[id]).await?;
        let schedule = schedules.remove(&id).unwrap_or_default();
        row.into_loan(schedule).map(Some)
    }

    async fn get_loans_by_user(&self, user_id: Uuid) -> DbResult<Vec<Loan>> {
        let rows = sqlx::query_as::<_, DbLoan>(&format!(
            "SELECT {} FROM loans WHERE user_id = $1 ORDER BY created_at, id",
            LOAN_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
        let mut schedules = self.schedule_for(&ids).await?;

        rows.into_iter()
            .map(|row| {
                let schedule = schedules.remove(&row.id).unwrap_or_default();
                row.into_loan(schedule)
            })
            .collect()
    }

    async fn add_transaction(&self, entry: &JournalEntry) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        insert_transaction(&mut conn, entry).await
    }

    async fn get_account_transactions(&self, account_id: Uuid) -> DbResult<Vec<JournalEntry>> {
        let rows = sqlx::query_as::<_, DbTransaction>(&format!(
            r#"
            SELECT {} FROM transactions
            WHERE from_account_id = $1 OR to_account_id = $1
            ORDER BY occurred_at DESC, seq DESC
            "#,
            TRANSACTION_COLUMNS
        ))
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(JournalEntry::try_from).collect()
    }

    async fn due_installments(&self, as_of: DateTime<Utc>) -> DbResult<Vec<Installment>> {
        let rows = sqlx::query_as::<_, DbLoanPayment>(&format!(
            r#"
            SELECT {} FROM loan_payments
            WHERE paid = FALSE AND due_date <= $1
            ORDER BY loan_id, due_date
            "#,
            PAYMENT_COLUMNS
        ))
        .bind(as_of)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Installment::try_from).collect()
    }

    async fn accrue_penalty(&self, loan_id: Uuid, idx: u32, penalty: Decimal) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE loan_payments SET penalty = $3 WHERE loan_id = $1 AND idx = $2 AND paid = FALSE",
        )
        .bind(loan_id)
        .bind(to_i32("idx", idx)?)
        .bind(penalty)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!(
                "Unpaid installment {} of loan {}",
                idx, loan_id
            )));
        }
        Ok(())
    }

    async fn mark_installment_paid(
        &self,
        loan_id: Uuid,
        idx: u32,
        penalty: Decimal,
        journal: &[JournalEntry],
    ) -> DbResult<Loan> {
        let idx_db = to_i32("idx", idx)?;
        let mut tx = self.pool.begin().await?;

        // Lock order: loan, installment, account
        let loan = sqlx::query_as::<_, DbLoan>(&format!(
            "SELECT {} FROM loans WHERE id = $1 FOR UPDATE",
            LOAN_COLUMNS
        ))
        .bind(loan_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::NotFound(format!("Loan {}", loan_id)))?;

        let payment = sqlx::query_as::<_, DbLoanPayment>(&format!(
            "SELECT {} FROM loan_payments WHERE loan_id = $1 AND idx = $2 FOR UPDATE",
            PAYMENT_COLUMNS
        ))
        .bind(loan_id)
        .bind(idx_db)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::NotFound(format!("Installment {} of loan {}", idx, loan_id)))?;
        let mut installment = Installment::try_from(payment)?;

        if installment.paid {
            return Err(DbError::Constraint(format!(
                "Installment {} of loan {} is already paid",
                idx, loan_id
            )));
        }

        let account = lock_account(&mut tx, loan.account_id).await?;
        installment.penalty = penalty;
        let total = installment.amount_due();
        if account.balance < total {
            return Err(DbError::InsufficientBalance(format!(
                "Account {}: have {}, need {}",
                account.id, account.balance, total
            )));
        }

        change_balance(&mut tx, account.id, -total).await?;
        for entry in journal {
            insert_transaction(&mut tx, entry).await?;
        }

        sqlx::query(
            "UPDATE loan_payments SET paid = TRUE, penalty = $3 WHERE loan_id = $1 AND idx = $2",
        )
        .bind(loan_id)
        .bind(idx_db)
        .bind(penalty)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE loans
            SET remaining_principal = GREATEST(remaining_principal - $2, 0)
            WHERE id = $1
            "#,
        )
        .bind(loan_id)
        .bind(installment.principal_part)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.get_loan(loan_id)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("Loan {}", loan_id)))
    }

    async fn health_check(&self) -> DbResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
