use chrono::Utc;
use log::{debug, info};
use rusqlite::Transaction;
use std::collections::HashSet;
use uuid::Uuid;

use super::db_splits::{
    detach_from_split, find_group, insert_group, list_groups, load_layout, members, redistribute,
    set_membership, touch_group, update_direction,
};
use super::entity::{PaneLayout, SplitDirection, SplitGroup, SplitLayout, SplitRemoval};
use super::errors::SplitError;
use super::layout::{equal_share, normalize_sizes};
use crate::domains::sessions::db_sessions::find_session;
use crate::domains::sessions::{NewSession, Session, SessionError, SessionRegistry, SessionStatus};
use crate::infrastructure::database::Database;
use crate::infrastructure::database::timestamps::utc_from_epoch_seconds_lossy;

/// Groups sessions into proportionally sized panes. Every membership change
/// reads, recomputes and rewrites sizes inside one write transaction.
#[derive(Clone)]
pub struct SplitCoordinator {
    sessions: SessionRegistry,
}

fn ensure_joinable(session: &Session) -> Result<(), SplitError> {
    match session.status {
        SessionStatus::Active | SessionStatus::Suspended => Ok(()),
        status => Err(SplitError::SessionUnavailable {
            id: session.id.clone(),
            status,
        }),
    }
}

fn session_lookup_error(e: SessionError) -> SplitError {
    match e {
        SessionError::NotFound { id } => SplitError::SessionNotFound { id },
        other => SplitError::Session(other),
    }
}

fn layout_or_missing(
    tx: &Transaction<'_>,
    owner_id: &str,
    group_id: &str,
) -> Result<SplitLayout, SplitError> {
    load_layout(tx, owner_id, group_id)?.ok_or_else(|| SplitError::SplitNotFound {
        id: group_id.to_string(),
    })
}

/// Appends `joining_id` to the group at order `n` and resizes all members
/// to `1/(n+1)`. A session already in another group leaves it first.
fn attach(
    tx: &Transaction<'_>,
    owner_id: &str,
    group_id: &str,
    joining_id: &str,
) -> Result<SplitLayout, SplitError> {
    find_group(tx, owner_id, group_id)?.ok_or_else(|| SplitError::SplitNotFound {
        id: group_id.to_string(),
    })?;
    let joining = find_session(tx, owner_id, joining_id)?.ok_or_else(|| {
        SplitError::SessionNotFound {
            id: joining_id.to_string(),
        }
    })?;
    ensure_joinable(&joining)?;

    match joining.split_group_id.as_deref() {
        Some(current) if current == group_id => {
            return layout_or_missing(tx, owner_id, group_id);
        }
        Some(_) => {
            detach_from_split(tx, owner_id, joining_id)?;
        }
        None => {}
    }

    let mut ordered: Vec<String> = members(tx, owner_id, group_id)?
        .into_iter()
        .map(|m| m.session_id)
        .collect();
    ordered.push(joining_id.to_string());
    redistribute(tx, owner_id, group_id, &ordered)?;
    touch_group(tx, owner_id, group_id)?;
    layout_or_missing(tx, owner_id, group_id)
}

fn sibling_name(fallback: String, requested: Option<&str>) -> String {
    requested
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .unwrap_or(fallback)
}

impl SplitCoordinator {
    pub fn new(sessions: SessionRegistry) -> Self {
        Self { sessions }
    }

    fn db(&self) -> &Database {
        self.sessions.db()
    }

    /// Splits `source_session_id` into a new two-pane group. If the source is
    /// already grouped, a new pane is appended to that group instead.
    pub async fn create_split(
        &self,
        owner_id: &str,
        source_session_id: &str,
        direction: SplitDirection,
        new_name: Option<&str>,
    ) -> Result<SplitLayout, SplitError> {
        let source = self
            .sessions
            .get(owner_id, source_session_id)
            .map_err(session_lookup_error)?;
        ensure_joinable(&source)?;

        if let Some(group_id) = source.split_group_id.as_deref() {
            debug!("Session {source_session_id} already in split {group_id}, adding a pane");
            return self.add_to_split(owner_id, group_id, None, new_name).await;
        }

        let sibling = self
            .sessions
            .create(
                owner_id,
                NewSession {
                    name: sibling_name(format!("{} (split)", source.name), new_name),
                    working_directory: source.working_directory.clone(),
                    folder_id: source.folder_id.clone(),
                    ..NewSession::default()
                },
            )
            .await
            .map_err(SplitError::Session)?;

        let result = self.db().with_write_transaction(|tx| {
            let fresh = find_session(tx, owner_id, source_session_id)?.ok_or_else(|| {
                SplitError::SessionNotFound {
                    id: source_session_id.to_string(),
                }
            })?;
            ensure_joinable(&fresh)?;
            if let Some(group_id) = fresh.split_group_id.as_deref() {
                return attach(tx, owner_id, group_id, &sibling.id);
            }

            let now = utc_from_epoch_seconds_lossy(Utc::now().timestamp());
            let group = SplitGroup {
                id: Uuid::new_v4().to_string(),
                owner_id: owner_id.to_string(),
                direction,
                created_at: now,
                updated_at: now,
            };
            insert_group(tx, &group)?;
            let half = equal_share(2);
            set_membership(tx, owner_id, source_session_id, Some(&group.id), 0, half)?;
            set_membership(tx, owner_id, &sibling.id, Some(&group.id), 1, half)?;
            layout_or_missing(tx, owner_id, &group.id)
        });

        match result {
            Ok(layout) => {
                info!(
                    "Created {direction} split {} from session {source_session_id}",
                    layout.group.id
                );
                Ok(layout)
            }
            Err(e) => {
                self.sessions.discard(owner_id, &sibling.id).await;
                Err(e)
            }
        }
    }

    /// Adds `existing_session_id`, or a freshly created session when `None`,
    /// as the last pane of `group_id`.
    pub async fn add_to_split(
        &self,
        owner_id: &str,
        group_id: &str,
        existing_session_id: Option<&str>,
        new_name: Option<&str>,
    ) -> Result<SplitLayout, SplitError> {
        let current = {
            let conn = self.db().get_conn()?;
            load_layout(&conn, owner_id, group_id)?
        }
        .ok_or_else(|| SplitError::SplitNotFound {
            id: group_id.to_string(),
        })?;

        let (joining_id, created) = match existing_session_id {
            Some(id) => (id.to_string(), false),
            None => {
                let template = current
                    .members
                    .first()
                    .and_then(|m| self.sessions.get(owner_id, &m.session_id).ok());
                let sibling = self
                    .sessions
                    .create(
                        owner_id,
                        NewSession {
                            name: sibling_name(
                                format!("Pane {}", current.members.len() + 1),
                                new_name,
                            ),
                            working_directory: template
                                .as_ref()
                                .and_then(|s| s.working_directory.clone()),
                            folder_id: template.as_ref().and_then(|s| s.folder_id.clone()),
                            ..NewSession::default()
                        },
                    )
                    .await
                    .map_err(SplitError::Session)?;
                (sibling.id, true)
            }
        };

        let result = self
            .db()
            .with_write_transaction(|tx| attach(tx, owner_id, group_id, &joining_id));

        match result {
            Ok(layout) => {
                info!(
                    "Session {joining_id} joined split {group_id} ({} panes)",
                    layout.members.len()
                );
                Ok(layout)
            }
            Err(e) => {
                if created {
                    self.sessions.discard(owner_id, &joining_id).await;
                }
                Err(e)
            }
        }
    }

    pub fn remove_from_split(
        &self,
        owner_id: &str,
        session_id: &str,
    ) -> Result<SplitRemoval, SplitError> {
        let removal = self.db().with_write_transaction(|tx| {
            find_session(tx, owner_id, session_id)?.ok_or_else(|| {
                SplitError::SessionNotFound {
                    id: session_id.to_string(),
                }
            })?;
            detach_from_split(tx, owner_id, session_id)?.ok_or_else(|| SplitError::NotInSplit {
                id: session_id.to_string(),
            })
        })?;

        if let SplitRemoval::Dissolved { group_id, .. } = &removal {
            info!("Dissolved split {group_id} after removing session {session_id}");
        }
        Ok(removal)
    }

    /// Rewrites order and size for exactly the group's current members.
    pub fn update_layout(
        &self,
        owner_id: &str,
        group_id: &str,
        panes: &[PaneLayout],
    ) -> Result<SplitLayout, SplitError> {
        self.db().with_write_transaction(|tx| {
            find_group(tx, owner_id, group_id)?.ok_or_else(|| SplitError::SplitNotFound {
                id: group_id.to_string(),
            })?;
            let current: HashSet<String> = members(tx, owner_id, group_id)?
                .into_iter()
                .map(|m| m.session_id)
                .collect();

            let requested: HashSet<&str> = panes.iter().map(|p| p.session_id.as_str()).collect();
            if requested.len() != panes.len()
                || requested.len() != current.len()
                || !requested.iter().all(|id| current.contains(*id))
            {
                return Err(SplitError::InvalidLayout {
                    message: "panes must list every group member exactly once".to_string(),
                });
            }

            let sizes: Vec<f64> = panes.iter().map(|p| p.size).collect();
            let sizes =
                normalize_sizes(&sizes).map_err(|message| SplitError::InvalidLayout { message })?;

            for (order, (pane, size)) in panes.iter().zip(sizes).enumerate() {
                set_membership(
                    tx,
                    owner_id,
                    &pane.session_id,
                    Some(group_id),
                    order as i64,
                    size,
                )?;
            }
            touch_group(tx, owner_id, group_id)?;
            layout_or_missing(tx, owner_id, group_id)
        })
    }

    pub fn change_direction(
        &self,
        owner_id: &str,
        group_id: &str,
        direction: SplitDirection,
    ) -> Result<SplitLayout, SplitError> {
        self.db().with_write_transaction(|tx| {
            if update_direction(tx, owner_id, group_id, direction)? == 0 {
                return Err(SplitError::SplitNotFound {
                    id: group_id.to_string(),
                });
            }
            layout_or_missing(tx, owner_id, group_id)
        })
    }

    pub fn get_split(&self, owner_id: &str, group_id: &str) -> Result<SplitLayout, SplitError> {
        let conn = self.db().get_conn()?;
        load_layout(&conn, owner_id, group_id)?.ok_or_else(|| SplitError::SplitNotFound {
            id: group_id.to_string(),
        })
    }

    pub fn list_splits(&self, owner_id: &str) -> Result<Vec<SplitLayout>, SplitError> {
        let conn = self.db().get_conn()?;
        let mut layouts = Vec::new();
        for group in list_groups(&conn, owner_id)? {
            let members = members(&conn, owner_id, &group.id)?;
            layouts.push(SplitLayout { group, members });
        }
        Ok(layouts)
    }
}
