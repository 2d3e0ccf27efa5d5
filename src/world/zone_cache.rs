//! # Zone Registry
//!
//! Lazy, single-flight zone creation.
//!
//! `get_zone` returns the cached instance when one exists. Otherwise it
//! parses the zone definition, constructs the zone, initializes it, and caches
//! it, guaranteeing at most one parse+initialize per zone id even under
//! concurrent first access. The naive check-then-create race is closed with a
//! per-zone once-cell: concurrent callers await the in-flight creation instead
//! of re-triggering it, and creation of one zone never blocks creation of
//! another.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::error::{Result, WorldError};
use crate::world::physics::PhysicsEngine;
use crate::world::zone::{Zone, ZoneDescriptor, ZoneId, ZoneParser};

type ZoneCell = Arc<OnceCell<Arc<Zone>>>;

/// Process-wide cache of zone instances, one per zone id.
pub struct ZoneRegistry {
    parser: Arc<dyn ZoneParser>,
    physics: Option<Arc<dyn PhysicsEngine>>,
    descriptors: HashMap<ZoneId, ZoneDescriptor>,
    zones: Mutex<HashMap<ZoneId, ZoneCell>>,
}

impl ZoneRegistry {
    pub fn new(
        parser: Arc<dyn ZoneParser>,
        physics: Option<Arc<dyn PhysicsEngine>>,
        descriptors: impl IntoIterator<Item = ZoneDescriptor>,
    ) -> Self {
        Self {
            parser,
            physics,
            descriptors: descriptors
                .into_iter()
                .map(|d| (d.zone_id, d))
                .collect(),
            zones: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the zone for `zone_id`, creating and initializing it on first
    /// access. All concurrent first-callers observe the same instance.
    pub async fn get_zone(&self, zone_id: ZoneId) -> Result<Arc<Zone>> {
        // Grab the per-zone cell under a brief map lock; the parse and
        // initialization run outside it so zones load independently.
        let cell: ZoneCell = {
            let mut zones = self.zones.lock().unwrap_or_else(|e| e.into_inner());
            zones.entry(zone_id).or_default().clone()
        };

        let zone = cell
            .get_or_try_init(|| async {
                let descriptor = self.descriptors.get(&zone_id).ok_or_else(|| {
                    WorldError::ZoneLoad(format!("No zone definition for zone {}", zone_id.0))
                })?;

                debug!(zone = zone_id.0, resource = %descriptor.resource, "Loading zone");
                let info = self.parser.parse(descriptor).await?;

                let zone = Arc::new(Zone::new(info, self.physics.clone()));
                zone.initialize();

                info!(zone = zone_id.0, "Zone cached");
                Ok::<_, WorldError>(zone)
            })
            .await?;

        Ok(zone.clone())
    }

    /// Zones currently loaded. Never triggers a load.
    pub fn loaded_zone_ids(&self) -> Vec<ZoneId> {
        let zones = self.zones.lock().unwrap_or_else(|e| e.into_inner());
        zones
            .iter()
            .filter(|(_, cell)| cell.initialized())
            .map(|(id, _)| *id)
            .collect()
    }

    /// Drops a cached zone. The next `get_zone` re-parses and re-initializes.
    pub fn unload_zone(&self, zone_id: ZoneId) -> bool {
        let mut zones = self.zones.lock().unwrap_or_else(|e| e.into_inner());
        zones.remove(&zone_id).is_some()
    }
}
