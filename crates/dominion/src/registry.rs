//! Territory registry: entities, the name index and actor membership.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::ProgressionPolicy;
use crate::error::DominionError;
use crate::territory::Territory;
use crate::types::{ActorId, TerritoryId, WorldTime};

const MAX_NAME_LEN: usize = 32;

/// Owns territory entities, the name lookup and the bidirectional
/// actor-to-territory relation. An actor belongs to at most one territory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TerritoryRegistry {
    territories: BTreeMap<TerritoryId, Territory>,
    by_name: BTreeMap<String, TerritoryId>,
    member_of: BTreeMap<ActorId, TerritoryId>,
    next_territory_seq: u64,
}

impl TerritoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(
        &mut self,
        name: &str,
        leader: &str,
        now: WorldTime,
    ) -> Result<TerritoryId, DominionError> {
        validate_name(name)?;
        let key = name_key(name);
        if self.by_name.contains_key(&key) {
            return Err(DominionError::TerritoryExists {
                name: name.to_string(),
            });
        }
        if self.member_of.contains_key(leader) {
            return Err(DominionError::ActorAlreadyEnrolled {
                actor_id: leader.to_string(),
            });
        }

        self.next_territory_seq += 1;
        let territory_id = format!("terr-{}", self.next_territory_seq);
        let territory = Territory::new(&territory_id, name, leader, now);
        self.by_name.insert(key, territory_id.clone());
        self.member_of
            .insert(leader.to_string(), territory_id.clone());
        self.territories.insert(territory_id.clone(), territory);
        Ok(territory_id)
    }

    pub fn get(&self, territory_id: &str) -> Result<&Territory, DominionError> {
        self.territories
            .get(territory_id)
            .ok_or_else(|| DominionError::TerritoryNotFound {
                territory_id: territory_id.to_string(),
            })
    }

    pub fn get_mut(&mut self, territory_id: &str) -> Result<&mut Territory, DominionError> {
        self.territories
            .get_mut(territory_id)
            .ok_or_else(|| DominionError::TerritoryNotFound {
                territory_id: territory_id.to_string(),
            })
    }

    pub fn contains(&self, territory_id: &str) -> bool {
        self.territories.contains_key(territory_id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Territory> {
        let territory_id = self.by_name.get(&name_key(name))?;
        self.territories.get(territory_id)
    }

    pub fn territory_of(&self, actor_id: &str) -> Option<&TerritoryId> {
        self.member_of.get(actor_id)
    }

    pub fn territory_ids(&self) -> Vec<TerritoryId> {
        self.territories.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.territories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.territories.is_empty()
    }

    pub fn rename(&mut self, territory_id: &str, name: &str) -> Result<(), DominionError> {
        validate_name(name)?;
        let key = name_key(name);
        if let Some(existing) = self.by_name.get(&key) {
            if existing != territory_id {
                return Err(DominionError::TerritoryExists {
                    name: name.to_string(),
                });
            }
        }
        let territory = self.get_mut(territory_id)?;
        let old_key = name_key(&territory.name);
        territory.name = name.to_string();
        self.by_name.remove(&old_key);
        self.by_name.insert(key, territory_id.to_string());
        Ok(())
    }

    pub fn add_member(
        &mut self,
        territory_id: &str,
        actor_id: &str,
        now: WorldTime,
    ) -> Result<(), DominionError> {
        if self.member_of.contains_key(actor_id) {
            return Err(DominionError::ActorAlreadyEnrolled {
                actor_id: actor_id.to_string(),
            });
        }
        let territory = self.get_mut(territory_id)?;
        territory.members.insert(actor_id.to_string());
        territory.last_active_at = now;
        self.member_of
            .insert(actor_id.to_string(), territory_id.to_string());
        Ok(())
    }

    /// Removes a non-leader member. The leader leaves only through
    /// `transfer_leadership` or dissolve.
    pub fn remove_member(
        &mut self,
        territory_id: &str,
        actor_id: &str,
        now: WorldTime,
    ) -> Result<(), DominionError> {
        let territory = self.get_mut(territory_id)?;
        if !territory.members.remove(actor_id) {
            return Err(DominionError::ActorNotMember {
                actor_id: actor_id.to_string(),
            });
        }
        territory.last_active_at = now;
        self.member_of.remove(actor_id);
        Ok(())
    }

    /// Promotes an existing member to leader; the old leader becomes a
    /// regular member.
    pub fn transfer_leadership(
        &mut self,
        territory_id: &str,
        actor_id: &str,
        now: WorldTime,
    ) -> Result<(), DominionError> {
        let territory = self.get_mut(territory_id)?;
        if !territory.members.remove(actor_id) {
            return Err(DominionError::ActorNotMember {
                actor_id: actor_id.to_string(),
            });
        }
        let old_leader = std::mem::replace(&mut territory.leader, actor_id.to_string());
        territory.members.insert(old_leader);
        territory.last_active_at = now;
        Ok(())
    }

    /// Awards XP and returns the new level when one or more levels were
    /// gained.
    pub fn award_xp(
        &mut self,
        territory_id: &str,
        amount: u64,
        progression: &ProgressionPolicy,
    ) -> Result<Option<u32>, DominionError> {
        let territory = self.get_mut(territory_id)?;
        territory.xp = territory.xp.saturating_add(amount);
        let level = if progression.xp_per_level == 0 {
            territory.level
        } else {
            (territory.xp / progression.xp_per_level) as u32
        };
        if level > territory.level {
            territory.level = level;
            Ok(Some(level))
        } else {
            Ok(None)
        }
    }

    /// Drops the entity and every membership entry for its roster.
    /// Callers release the territory's cells first; the registry does not
    /// touch the index.
    pub fn remove_entry(&mut self, territory_id: &str) -> Result<Territory, DominionError> {
        let territory =
            self.territories
                .remove(territory_id)
                .ok_or_else(|| DominionError::TerritoryNotFound {
                    territory_id: territory_id.to_string(),
                })?;
        self.by_name.remove(&name_key(&territory.name));
        for actor in territory.roster() {
            if self.member_of.get(&actor).map(String::as_str) == Some(territory_id) {
                self.member_of.remove(&actor);
            }
        }
        Ok(territory)
    }

    /// Moves every roster actor of `from` into `to` as regular members.
    pub fn absorb_roster(&mut self, from: &Territory, to: &str) -> Result<(), DominionError> {
        for actor in from.roster() {
            self.member_of.insert(actor.clone(), to.to_string());
            let survivor = self.get_mut(to)?;
            survivor.members.insert(actor);
        }
        Ok(())
    }
}

fn name_key(name: &str) -> String {
    name.to_lowercase()
}

fn validate_name(name: &str) -> Result<(), DominionError> {
    let valid = !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(DominionError::InvalidName {
            name: name.to_string(),
        })
    }
}
