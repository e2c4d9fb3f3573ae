//! Group and endpoint registries, and endpoint garbage collection.
//!
//! An endpoint stays registered while some tracked group's roster lists it.
//! Removal is re-derived from live rosters every time rather than from a
//! reference count, so the registry converges even when rosters change
//! concurrently with a check. It is eventually consistent, not atomic.

use std::collections::HashSet;
use std::sync::Arc;

use futures_util::future::try_join_all;
use tether_common::SessionError;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use super::{Client, ClientEvent};
use crate::connection::Connection;
use crate::endpoint::Endpoint;
use crate::group::Group;
use crate::sync::{read, write};

#[derive(Default)]
pub(super) struct Registry {
    groups: Vec<TrackedGroup>,
    endpoints: Vec<Endpoint>,
}

pub(super) struct TrackedGroup {
    group: Group,
    /// Forwards the group's `leave` events to the removal check.
    watcher: Option<AbortHandle>,
}

impl TrackedGroup {
    pub(super) fn stop(self) {
        if let Some(watcher) = self.watcher {
            watcher.abort();
        }
    }
}

impl Registry {
    pub(super) fn drain(&mut self) -> (Vec<TrackedGroup>, Vec<Endpoint>) {
        (
            std::mem::take(&mut self.groups),
            std::mem::take(&mut self.endpoints),
        )
    }
}

impl Client {
    fn check_group(&self, group: &Group) -> Result<(), SessionError> {
        if group.id().is_empty() {
            return Err(SessionError::invalid("can't track a group without an id"));
        }
        if !group.context().same_session(&self.context()) {
            return Err(SessionError::invalid(format!(
                "group {} belongs to another client",
                group.id()
            )));
        }
        Ok(())
    }

    fn check_endpoint(&self, endpoint: &Endpoint) -> Result<(), SessionError> {
        if endpoint.id().is_empty() {
            return Err(SessionError::invalid("can't track an endpoint without an id"));
        }
        if !endpoint.context().same_session(&self.context()) {
            return Err(SessionError::invalid(format!(
                "endpoint {} belongs to another client",
                endpoint.id()
            )));
        }
        Ok(())
    }

    // -- groups ---------------------------------------------------------------

    /// Start tracking `group` and watching its `leave` events. If a group
    /// with the same id is already tracked, that instance is kept and
    /// returned.
    pub fn add_group(&self, group: Group) -> Result<Group, SessionError> {
        self.check_group(&group)?;

        let mut registry = write(&self.inner.registry);
        if let Some(existing) = registry.groups.iter().find(|t| t.group.id() == group.id()) {
            debug!(group_id = %group.id(), "group already tracked");
            return Ok(existing.group.clone());
        }

        let watcher = self.watch_leaves(&group);
        registry.groups.push(TrackedGroup {
            group: group.clone(),
            watcher,
        });
        debug!(group_id = %group.id(), "group tracked");
        Ok(group)
    }

    fn watch_leaves(&self, group: &Group) -> Option<AbortHandle> {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(group_id = %group.id(), "no runtime; group departures won't trigger cleanup");
            return None;
        };
        let mut leaves = group.on_leave();
        let client = Arc::downgrade(&self.inner);
        let group_id = group.id().to_string();

        let task = runtime.spawn(async move {
            loop {
                match leaves.recv().await {
                    Ok(endpoint) => {
                        let Some(inner) = client.upgrade() else { break };
                        if let Err(e) = Client::from_inner(inner)
                            .check_endpoint_for_removal(&endpoint)
                            .await
                        {
                            warn!(group_id = %group_id, endpoint_id = %endpoint.id(), error = %e, "removal check failed");
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(group_id = %group_id, skipped, "missed group departures");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
        Some(task.abort_handle())
    }

    /// Stop tracking `group`, then drop every endpoint of its last roster
    /// that no remaining group lists.
    pub async fn remove_group(&self, group: &Group) -> Result<(), SessionError> {
        self.check_group(group)?;

        let tracked = read(&self.inner.registry)
            .groups
            .iter()
            .find(|t| t.group.id() == group.id())
            .map(|t| t.group.clone());
        let Some(tracked) = tracked else {
            debug!(group_id = %group.id(), "group not tracked");
            return Ok(());
        };

        let roster = match tracked.get_endpoints().await {
            Ok(roster) => roster,
            Err(e) => {
                warn!(group_id = %group.id(), error = %e, "couldn't fetch roster of removed group");
                Vec::new()
            }
        };

        let removed = {
            let mut registry = write(&self.inner.registry);
            registry
                .groups
                .iter()
                .position(|t| t.group.id() == group.id())
                .map(|i| registry.groups.remove(i))
        };
        if let Some(removed) = removed {
            removed.stop();
        }

        self.remove_unreferenced(&roster).await;
        info!(group_id = %group.id(), "group removed");
        self.publish(ClientEvent::GroupRemoved {
            group_id: group.id().to_string(),
        });
        Ok(())
    }

    pub fn get_group(&self, group_id: &str) -> Result<Option<Group>, SessionError> {
        if group_id.is_empty() {
            return Err(SessionError::invalid("can't get a group without a group id"));
        }
        Ok(read(&self.inner.registry)
            .groups
            .iter()
            .find(|t| t.group.id() == group_id)
            .map(|t| t.group.clone()))
    }

    pub fn groups(&self) -> Vec<Group> {
        read(&self.inner.registry)
            .groups
            .iter()
            .map(|t| t.group.clone())
            .collect()
    }

    // -- endpoints ------------------------------------------------------------

    /// Look up a registered endpoint. With `create`, an unknown id is
    /// registered and returned.
    pub fn get_endpoint(&self, endpoint_id: &str, create: bool) -> Result<Option<Endpoint>, SessionError> {
        let found = read(&self.inner.registry)
            .endpoints
            .iter()
            .find(|e| e.id() == endpoint_id)
            .cloned();
        if found.is_some() || !create {
            return Ok(found);
        }
        self.add_endpoint(Endpoint::with_context(self.context(), endpoint_id))
            .map(Some)
    }

    /// Register `endpoint`. Idempotent by id: the instance already
    /// registered under that id wins and is returned.
    pub fn add_endpoint(&self, endpoint: Endpoint) -> Result<Endpoint, SessionError> {
        self.check_endpoint(&endpoint)?;

        let mut registry = write(&self.inner.registry);
        if let Some(existing) = registry.endpoints.iter().find(|e| e.id() == endpoint.id()) {
            return Ok(existing.clone());
        }
        debug!(endpoint_id = %endpoint.id(), "endpoint tracked");
        registry.endpoints.push(endpoint.clone());
        Ok(endpoint)
    }

    pub fn endpoints(&self) -> Vec<Endpoint> {
        read(&self.inner.registry).endpoints.clone()
    }

    /// Look up one connection of an endpoint. With `create`, the endpoint
    /// and the connection are registered when unknown.
    pub fn get_connection(
        &self,
        connection_id: &str,
        endpoint_id: &str,
        create: bool,
    ) -> Result<Option<Connection>, SessionError> {
        let Some(endpoint) = self.get_endpoint(endpoint_id, create)? else {
            return Ok(None);
        };
        if create {
            endpoint.connection_or_insert(connection_id).map(Some)
        } else {
            endpoint.get_connection(Some(connection_id))
        }
    }

    /// Drop `endpoint` from the registry if no tracked group lists it.
    /// Returns whether it was removed.
    pub async fn check_endpoint_for_removal(&self, endpoint: &Endpoint) -> Result<bool, SessionError> {
        self.check_endpoint(endpoint)?;
        let removed = self.remove_unreferenced(std::slice::from_ref(endpoint)).await;
        Ok(!removed.is_empty())
    }

    /// Fetch every tracked roster once and drop each candidate listed in
    /// none of them. A failed fetch keeps every candidate.
    async fn remove_unreferenced(&self, candidates: &[Endpoint]) -> Vec<String> {
        if candidates.is_empty() {
            return Vec::new();
        }

        let groups = self.groups();
        let rosters = match try_join_all(groups.iter().map(|group| group.get_endpoints())).await {
            Ok(rosters) => rosters,
            Err(e) => {
                warn!(error = %e, candidates = candidates.len(), "couldn't fetch group rosters, keeping endpoints");
                return Vec::new();
            }
        };
        let listed: HashSet<&str> = rosters.iter().flatten().map(Endpoint::id).collect();

        let removed: Vec<Endpoint> = {
            let mut registry = write(&self.inner.registry);
            candidates
                .iter()
                .filter(|candidate| !listed.contains(candidate.id()))
                .filter_map(|candidate| {
                    let position = registry.endpoints.iter().position(|e| e.id() == candidate.id())?;
                    Some(registry.endpoints.remove(position))
                })
                .collect()
        };

        removed
            .into_iter()
            .map(|endpoint| {
                endpoint.clear_connections();
                info!(endpoint_id = %endpoint.id(), "endpoint removed");
                let endpoint_id = endpoint.id().to_string();
                self.publish(ClientEvent::EndpointRemoved {
                    endpoint_id: endpoint_id.clone(),
                });
                endpoint_id
            })
            .collect()
    }
}
