//! Named rosters of endpoints the local user has joined.

use std::sync::{Arc, RwLock};

use tether_common::{EventBus, SessionError};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::client::Client;
use crate::context::SessionContext;
use crate::endpoint::Endpoint;
use crate::sync::{read, write};

/// A joined group. Cheap to clone; clones share the roster.
///
/// The roster is fetched from the transport the first time it is asked
/// for. Membership changes delivered before that first fetch are kept and
/// applied over the fetched roster.
#[derive(Clone)]
pub struct Group {
    inner: Arc<GroupInner>,
}

struct GroupInner {
    id: String,
    ctx: SessionContext,
    roster: RwLock<Roster>,
    joins: EventBus<Endpoint>,
    leaves: EventBus<Endpoint>,
}

#[derive(Default)]
struct Roster {
    members: Vec<Endpoint>,
    synced: bool,
    /// Endpoint ids seen leaving before the first sync.
    departed: Vec<String>,
}

impl Group {
    /// Build a group bound to `client`. It is not tracked until passed to
    /// [`Client::add_group`]; [`Client::join`] does both.
    pub fn new(client: &Client, id: impl Into<String>) -> Self {
        Self::with_context(client.context(), id)
    }

    pub(crate) fn with_context(ctx: SessionContext, id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(GroupInner {
                id: id.into(),
                ctx,
                roster: RwLock::new(Roster::default()),
                joins: EventBus::default(),
                leaves: EventBus::default(),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub(crate) fn context(&self) -> &SessionContext {
        &self.inner.ctx
    }

    pub fn ptr_eq(&self, other: &Group) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn on_join(&self) -> broadcast::Receiver<Endpoint> {
        self.inner.joins.subscribe()
    }

    /// One event per departed endpoint.
    pub fn on_leave(&self) -> broadcast::Receiver<Endpoint> {
        self.inner.leaves.subscribe()
    }

    /// The current roster, fetching it from the transport on first use.
    pub async fn get_endpoints(&self) -> Result<Vec<Endpoint>, SessionError> {
        {
            let roster = read(&self.inner.roster);
            if roster.synced {
                return Ok(roster.members.clone());
            }
        }

        let members = self.inner.ctx.channel().get_group_members(self.id()).await?;
        let client = self.inner.ctx.client()?;
        let mut fetched = Vec::with_capacity(members.len());
        for member in members {
            let Some(endpoint) = client.get_endpoint(&member.endpoint_id, true)? else {
                continue;
            };
            if let Some(connection_id) = member.connection_id.as_deref() {
                endpoint.connection_or_insert(connection_id)?;
            }
            fetched.push(endpoint);
        }

        let mut roster = write(&self.inner.roster);
        if !roster.synced {
            for endpoint in fetched {
                let known = roster.members.iter().any(|m| m.id() == endpoint.id());
                let departed = roster.departed.iter().any(|id| id == endpoint.id());
                if !known && !departed {
                    roster.members.push(endpoint);
                }
            }
            roster.departed.clear();
            roster.synced = true;
            debug!(group_id = %self.id(), members = roster.members.len(), "group roster synced");
        }
        Ok(roster.members.clone())
    }

    /// Add `endpoint` to the roster and fire `join`. Returns false if it was
    /// already a member.
    pub(crate) fn add_member(&self, endpoint: Endpoint) -> bool {
        {
            let mut roster = write(&self.inner.roster);
            if roster.members.iter().any(|m| m.id() == endpoint.id()) {
                return false;
            }
            roster.departed.retain(|id| id != endpoint.id());
            roster.members.push(endpoint.clone());
        }
        debug!(group_id = %self.id(), endpoint_id = %endpoint.id(), "member joined");
        self.inner.joins.publish(endpoint);
        true
    }

    /// Drop the endpoint from the roster and fire `leave`.
    pub(crate) fn remove_member(&self, endpoint_id: &str) -> Option<Endpoint> {
        let removed = {
            let mut roster = write(&self.inner.roster);
            let position = roster.members.iter().position(|m| m.id() == endpoint_id);
            if !roster.synced && !roster.departed.iter().any(|id| id == endpoint_id) {
                roster.departed.push(endpoint_id.to_string());
            }
            position.map(|i| roster.members.remove(i))
        };
        if let Some(endpoint) = &removed {
            debug!(group_id = %self.id(), endpoint_id, "member left");
            self.inner.leaves.publish(endpoint.clone());
        }
        removed
    }

    /// Leave on the transport, then stop tracking the group.
    pub async fn leave(&self) -> Result<(), SessionError> {
        self.inner.ctx.channel().leave_group(self.id()).await?;
        info!(group_id = %self.id(), "left group");
        self.inner.ctx.client()?.remove_group(self).await
    }
}

impl std::fmt::Debug for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let roster = read(&self.inner.roster);
        f.debug_struct("Group")
            .field("id", &self.inner.id)
            .field("members", &roster.members.len())
            .field("synced", &roster.synced)
            .finish()
    }
}
