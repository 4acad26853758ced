use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use log::{debug, error};
use rorm::conditions::{Binary, BinaryOperator, Column, DynamicCollection, Value};
use rorm::fields::types::ForeignModelByField;
use rorm::{and, insert, or, query, update, Database, FieldAccess, Model};
use uuid::Uuid;

use crate::models::{Account, AccountSummary, Connection, ConnectionInsert, ConnectionStatus};
use crate::social::{
    Change, ConflictReason, ConnectionRecord, ConnectionStore, Decide, Missing, Pair,
    SocialError, UserDirectory, UserSummary,
};

fn utc(time: NaiveDateTime) -> DateTime<Utc> {
    Utc.from_utc_datetime(&time)
}

impl From<Connection> for ConnectionRecord {
    fn from(value: Connection) -> Self {
        Self {
            id: value.id,
            user: *value.user.key(),
            connected_user: *value.connected_user.key(),
            status: value.status,
            created_at: utc(value.created_at),
            accepted_at: value.accepted_at.map(utc),
            last_message_at: value.last_message_at.map(utc),
        }
    }
}

impl From<AccountSummary> for UserSummary {
    fn from(value: AccountSummary) -> Self {
        Self {
            uuid: value.uuid,
            username: value.username,
            display_name: value.display_name,
            verified: value.verified,
            active: value.active,
            joined_at: utc(value.created_at),
        }
    }
}

/// Escape the wildcards of a `LIKE` pattern
fn like_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// The [ConnectionStore] and [UserDirectory] on top of the database
#[derive(Clone)]
pub struct DbStore {
    db: Database,
}

impl DbStore {
    /// Create a store using the connection pool `db`
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ConnectionStore for DbStore {
    async fn find_pair(&self, pair: Pair) -> Result<Option<ConnectionRecord>, SocialError> {
        Ok(query!(&self.db, Connection)
            .condition(Connection::F.pair_key.equals(&pair.key()))
            .optional()
            .await?
            .map(ConnectionRecord::from))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<ConnectionRecord>, SocialError> {
        Ok(query!(&self.db, Connection)
            .condition(Connection::F.id.equals(id))
            .optional()
            .await?
            .map(ConnectionRecord::from))
    }

    async fn transition(
        &self,
        pair: Pair,
        decide: Decide<'_>,
    ) -> Result<Option<ConnectionRecord>, SocialError> {
        let key = pair.key();
        let mut tx = self.db.start_transaction().await?;

        let current = query!(&mut tx, Connection)
            .condition(Connection::F.pair_key.equals(&key))
            .optional()
            .await?
            .map(ConnectionRecord::from);

        let change = decide(current.as_ref())?;
        let now = Utc::now();

        let next = match (change, current) {
            (Change::Keep, current) => current,
            (
                Change::Create {
                    initiator,
                    target,
                    status,
                },
                None,
            ) => {
                let inserted = insert!(&mut tx, ConnectionInsert)
                    .return_primary_key()
                    .single(&ConnectionInsert {
                        pair_key: key.clone(),
                        user: ForeignModelByField::Key(initiator),
                        connected_user: ForeignModelByField::Key(target),
                        status,
                        created_at: now.naive_utc(),
                    })
                    .await;

                match inserted {
                    Ok(id) => Some(ConnectionRecord::new(id, initiator, target, status, now)),
                    Err(err) => {
                        // The transaction is unusable after a failed statement
                        drop(tx);

                        return if self.find_pair(pair).await?.is_some() {
                            debug!("Lost the race for connection {key}");
                            Err(SocialError::Conflict(ConflictReason::DuplicatePair))
                        } else {
                            Err(err.into())
                        };
                    }
                }
            }
            (
                Change::Update {
                    initiator,
                    target,
                    status,
                },
                Some(current),
            ) => {
                let next = current.rewritten(initiator, target, status, now);

                let updated = update!(&mut tx, Connection)
                    .condition(and!(
                        Connection::F.id.equals(current.id),
                        Connection::F.status.equals(current.status),
                        Connection::F.user.equals(current.user)
                    ))
                    .set(Connection::F.user, ForeignModelByField::Key(next.user))
                    .set(
                        Connection::F.connected_user,
                        ForeignModelByField::Key(next.connected_user),
                    )
                    .set(Connection::F.status, next.status)
                    .set(Connection::F.created_at, next.created_at.naive_utc())
                    .set(
                        Connection::F.accepted_at,
                        next.accepted_at.map(|t| t.naive_utc()),
                    )
                    .exec()
                    .await?;

                if updated == 0 {
                    return Err(SocialError::Conflict(ConflictReason::ConcurrentUpdate));
                }

                Some(next)
            }
            (Change::Delete, Some(current)) => {
                let deleted = rorm::delete!(&mut tx, Connection)
                    .condition(and!(
                        Connection::F.id.equals(current.id),
                        Connection::F.status.equals(current.status)
                    ))
                    .await?;

                if deleted == 0 {
                    return Err(SocialError::Conflict(ConflictReason::ConcurrentUpdate));
                }

                None
            }
            (Change::Create { .. }, Some(_)) => {
                return Err(SocialError::Conflict(ConflictReason::DuplicatePair));
            }
            (Change::Update { .. } | Change::Delete, None) => {
                return Err(SocialError::NotFound(Missing::Connection));
            }
        };

        tx.commit().await?;

        Ok(next)
    }

    async fn list_for(
        &self,
        user: Uuid,
        status: Option<ConnectionStatus>,
    ) -> Result<Vec<ConnectionRecord>, SocialError> {
        let involved = or!(
            Connection::F.user.equals(user),
            Connection::F.connected_user.equals(user)
        );

        let connections = match status {
            Some(status) => {
                query!(&self.db, Connection)
                    .condition(and!(involved, Connection::F.status.equals(status)))
                    .order_desc(Connection::F.created_at)
                    .order_desc(Connection::F.id)
                    .all()
                    .await?
            }
            None => {
                query!(&self.db, Connection)
                    .condition(involved)
                    .order_desc(Connection::F.created_at)
                    .order_desc(Connection::F.id)
                    .all()
                    .await?
            }
        };

        Ok(connections.into_iter().map(ConnectionRecord::from).collect())
    }

    async fn connected_among(
        &self,
        user: Uuid,
        candidates: &[Uuid],
    ) -> Result<HashSet<Uuid>, SocialError> {
        if candidates.is_empty() {
            return Ok(HashSet::new());
        }

        let partners: HashSet<Uuid> = query!(
            &self.db,
            (Connection::F.user, Connection::F.connected_user)
        )
        .condition(or!(
            Connection::F.user.equals(user),
            Connection::F.connected_user.equals(user)
        ))
        .all()
        .await?
        .into_iter()
        .map(|(from, to)| {
            if *from.key() == user {
                *to.key()
            } else {
                *from.key()
            }
        })
        .collect();

        Ok(candidates
            .iter()
            .filter(|c| partners.contains(c))
            .copied()
            .collect())
    }

    async fn touch_message(&self, pair: Pair, at: DateTime<Utc>) -> Result<(), SocialError> {
        let updated = update!(&self.db, Connection)
            .condition(Connection::F.pair_key.equals(&pair.key()))
            .set(Connection::F.last_message_at, Some(at.naive_utc()))
            .exec()
            .await?;

        if updated == 0 {
            return Err(SocialError::NotFound(Missing::Connection));
        }

        Ok(())
    }

    async fn purge_user(&self, user: Uuid) -> Result<u64, SocialError> {
        rorm::delete!(&self.db, Connection)
            .condition(or!(
                Connection::F.user.equals(user),
                Connection::F.connected_user.equals(user)
            ))
            .await
            .map_err(|err| {
                error!("Could not purge connections: {err}");
                SocialError::from(err)
            })
    }
}

#[async_trait]
impl UserDirectory for DbStore {
    async fn find_user(&self, uuid: Uuid) -> Result<Option<UserSummary>, SocialError> {
        Ok(query!(&self.db, AccountSummary)
            .condition(Account::F.uuid.equals(uuid))
            .optional()
            .await?
            .map(UserSummary::from))
    }

    async fn users_by_ids(&self, uuids: &[Uuid]) -> Result<Vec<UserSummary>, SocialError> {
        if uuids.is_empty() {
            return Ok(Vec::new());
        }

        Ok(query!(&self.db, AccountSummary)
            .condition(DynamicCollection::or(
                uuids.iter().map(|u| Account::F.uuid.equals(*u)).collect(),
            ))
            .all()
            .await?
            .into_iter()
            .map(UserSummary::from)
            .collect())
    }

    async fn suggestion_candidates(
        &self,
        exclude: Uuid,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<UserSummary>, SocialError> {
        Ok(query!(&self.db, AccountSummary)
            .condition(and!(
                Account::F.active.equals(true),
                Account::F.verified.equals(true),
                Account::F.uuid.not_equals(exclude)
            ))
            .order_desc(Account::F.created_at)
            .limit(limit)
            .offset(offset)
            .all()
            .await?
            .into_iter()
            .map(UserSummary::from)
            .collect())
    }

    async fn search_users(
        &self,
        exclude: Uuid,
        query: &str,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<UserSummary>, SocialError> {
        let pattern = like_pattern(query);

        Ok(query!(&self.db, AccountSummary)
            .condition(and!(
                Account::F.active.equals(true),
                Account::F.verified.equals(true),
                Account::F.uuid.not_equals(exclude),
                or!(
                    Binary {
                        operator: BinaryOperator::Like,
                        fst_arg: Column(Account::F.username),
                        snd_arg: Value::String(pattern.as_str().into()),
                    },
                    Binary {
                        operator: BinaryOperator::Like,
                        fst_arg: Column(Account::F.display_name),
                        snd_arg: Value::String(pattern.as_str().into()),
                    }
                )
            ))
            .order_asc(Account::F.display_name)
            .limit(limit)
            .offset(offset)
            .all()
            .await?
            .into_iter()
            .map(UserSummary::from)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(like_pattern("anna"), "%anna%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }
}
