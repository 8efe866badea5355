//! Local players and their network identity

use crate::session::{LocalPlayerIdentity, UniqueNetId};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct LocalPlayer {
    name: String,
    net_id: UniqueNetId,
}

impl LocalPlayer {
    /// Player logged into the online service with a fresh id
    pub fn signed_in(name: impl Into<String>) -> Self {
        let name = name.into();
        let net_id = UniqueNetId(format!("{}-{}", name, Uuid::new_v4().simple()));
        Self { name, net_id }
    }
}

impl LocalPlayerIdentity for LocalPlayer {
    fn preferred_unique_net_id(&self) -> Option<UniqueNetId> {
        Some(self.net_id.clone())
    }

    fn display_name(&self) -> String {
        self.name.clone()
    }
}
