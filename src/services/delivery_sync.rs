use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde_json::Value;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    entities::{
        carrier_city, carrier_region, pickup_point, Carrier, CarrierCity, CarrierRegion,
        PickupPoint,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    gateways::delivery::NovaPoshtaClient,
};

/// Background synchronizer for carrier reference data.
///
/// Fetches the full region/city/pickup-point hierarchy from the carrier
/// API, then upserts it in place keyed by `(carrier, external_ref)`. The
/// fetch completes before the first write, so a mid-fetch network failure
/// mutates nothing and previously cached entries survive. Safe to re-run at
/// any time; it never touches order, payment or delivery rows.
pub struct ReferenceDataSync {
    db: Arc<DatabaseConnection>,
    client: NovaPoshtaClient,
    event_sender: Arc<EventSender>,
    page_size: u32,
}

/// Per-kind upsert counts from one synchronizer run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub regions: usize,
    pub cities: usize,
    pub pickup_points: usize,
}

impl ReferenceDataSync {
    pub fn new(
        db: Arc<DatabaseConnection>,
        client: NovaPoshtaClient,
        event_sender: Arc<EventSender>,
        page_size: u32,
    ) -> Self {
        Self {
            db,
            client,
            event_sender,
            page_size,
        }
    }

    /// Runs one synchronization pass and reports the outcome for
    /// observability. Failures are surfaced, never retried inline; the
    /// scheduler simply tries again next interval.
    pub async fn run(&self) -> Result<SyncReport, ServiceError> {
        let result = self.sync_nova_poshta().await;

        match &result {
            Ok(report) => {
                self.event_sender
                    .send_or_log(Event::ReferenceDataSynced {
                        carrier: Carrier::NovaPoshta,
                        regions: report.regions,
                        cities: report.cities,
                        pickup_points: report.pickup_points,
                    })
                    .await;
            }
            Err(e) => {
                self.event_sender
                    .send_or_log(Event::ReferenceDataSyncFailed {
                        carrier: Carrier::NovaPoshta,
                        reason: e.to_string(),
                    })
                    .await;
            }
        }

        result
    }

    #[instrument(skip(self))]
    async fn sync_nova_poshta(&self) -> Result<SyncReport, ServiceError> {
        let carrier = Carrier::NovaPoshta;

        let areas = self.client.get_areas().await?;
        let regions = self.upsert_regions(carrier, &areas).await?;

        let cities = self.client.get_cities(self.page_size).await?;
        let cities = self.upsert_cities(carrier, &cities).await?;

        let warehouses = self.client.get_warehouses(self.page_size).await?;
        let pickup_points = self.upsert_pickup_points(carrier, &warehouses).await?;

        info!(
            "Synchronized {} reference data: {} regions, {} cities, {} pickup points",
            carrier, regions, cities, pickup_points
        );
        Ok(SyncReport {
            regions,
            cities,
            pickup_points,
        })
    }

    async fn upsert_regions(
        &self,
        carrier: Carrier,
        areas: &[Value],
    ) -> Result<usize, ServiceError> {
        let txn = self.db.begin().await?;
        let mut count = 0usize;

        for area in areas {
            let Some(external_ref) = str_field(area, "Ref") else {
                warn!("Skipping area without Ref: {:?}", area);
                continue;
            };
            let name = str_field(area, "Description").unwrap_or_default();

            let existing = CarrierRegion::find()
                .filter(carrier_region::Column::Carrier.eq(carrier))
                .filter(carrier_region::Column::ExternalRef.eq(external_ref.clone()))
                .one(&txn)
                .await?;

            match existing {
                Some(region) => {
                    let mut region: carrier_region::ActiveModel = region.into();
                    region.name = Set(name);
                    region.updated_at = Set(Utc::now());
                    region.update(&txn).await?;
                }
                None => {
                    let region = carrier_region::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        carrier: Set(carrier),
                        name: Set(name),
                        external_ref: Set(external_ref),
                        created_at: Set(Utc::now()),
                        updated_at: Set(Utc::now()),
                    };
                    region.insert(&txn).await?;
                }
            }
            count += 1;
        }

        txn.commit().await?;
        Ok(count)
    }

    async fn upsert_cities(
        &self,
        carrier: Carrier,
        cities: &[Value],
    ) -> Result<usize, ServiceError> {
        let region_map = self.region_map(carrier).await?;

        let txn = self.db.begin().await?;
        let mut count = 0usize;

        for city in cities {
            let Some(external_ref) = str_field(city, "Ref") else {
                warn!("Skipping city without Ref: {:?}", city);
                continue;
            };
            let Some(region_id) = str_field(city, "Area")
                .and_then(|area_ref| region_map.get(&area_ref).copied())
            else {
                warn!(
                    "Region not found for city {}, skipping",
                    external_ref
                );
                continue;
            };
            let name = str_field(city, "Description").unwrap_or_default();
            let settlement_type = str_field(city, "SettlementTypeDescription");

            let existing = CarrierCity::find()
                .filter(carrier_city::Column::Carrier.eq(carrier))
                .filter(carrier_city::Column::ExternalRef.eq(external_ref.clone()))
                .one(&txn)
                .await?;

            match existing {
                Some(current) => {
                    let mut current: carrier_city::ActiveModel = current.into();
                    current.region_id = Set(region_id);
                    current.name = Set(name);
                    current.settlement_type = Set(settlement_type);
                    current.updated_at = Set(Utc::now());
                    current.update(&txn).await?;
                }
                None => {
                    let city = carrier_city::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        region_id: Set(region_id),
                        carrier: Set(carrier),
                        name: Set(name),
                        settlement_type: Set(settlement_type),
                        external_ref: Set(external_ref),
                        created_at: Set(Utc::now()),
                        updated_at: Set(Utc::now()),
                    };
                    city.insert(&txn).await?;
                }
            }
            count += 1;
        }

        txn.commit().await?;
        Ok(count)
    }

    async fn upsert_pickup_points(
        &self,
        carrier: Carrier,
        warehouses: &[Value],
    ) -> Result<usize, ServiceError> {
        let city_map = self.city_map(carrier).await?;
        let mut count = 0usize;

        // Batched like the city sync, one transaction per chunk, so a huge
        // warehouse list does not hold a single transaction open.
        for chunk in warehouses.chunks(self.page_size.max(1) as usize) {
            let txn = self.db.begin().await?;

            for warehouse in chunk {
                let Some(external_ref) = str_field(warehouse, "Ref") else {
                    warn!("Skipping warehouse without Ref: {:?}", warehouse);
                    continue;
                };
                let Some(city_id) = str_field(warehouse, "CityRef")
                    .and_then(|city_ref| city_map.get(&city_ref).copied())
                else {
                    warn!(
                        "City not found for warehouse {}, skipping",
                        external_ref
                    );
                    continue;
                };
                let address_line = str_field(warehouse, "ShortAddress").unwrap_or_default();
                let description = str_field(warehouse, "Description");
                let office_number = str_field(warehouse, "Number")
                    .and_then(|n| n.parse::<i32>().ok())
                    .unwrap_or(0);
                let phone = str_field(warehouse, "Phone");

                let existing = PickupPoint::find()
                    .filter(pickup_point::Column::Carrier.eq(carrier))
                    .filter(pickup_point::Column::ExternalRef.eq(external_ref.clone()))
                    .one(&txn)
                    .await?;

                match existing {
                    Some(point) => {
                        let mut point: pickup_point::ActiveModel = point.into();
                        point.city_id = Set(city_id);
                        point.address_line = Set(address_line);
                        point.description = Set(description);
                        point.office_number = Set(office_number);
                        point.phone = Set(phone);
                        point.is_active = Set(true);
                        point.updated_at = Set(Utc::now());
                        point.update(&txn).await?;
                    }
                    None => {
                        let point = pickup_point::ActiveModel {
                            id: Set(Uuid::new_v4()),
                            city_id: Set(city_id),
                            carrier: Set(carrier),
                            address_line: Set(address_line),
                            description: Set(description),
                            office_number: Set(office_number),
                            phone: Set(phone),
                            is_active: Set(true),
                            external_ref: Set(external_ref),
                            created_at: Set(Utc::now()),
                            updated_at: Set(Utc::now()),
                        };
                        point.insert(&txn).await?;
                    }
                }
                count += 1;
            }

            txn.commit().await?;
        }

        Ok(count)
    }

    async fn region_map(&self, carrier: Carrier) -> Result<HashMap<String, Uuid>, ServiceError> {
        let regions = CarrierRegion::find()
            .filter(carrier_region::Column::Carrier.eq(carrier))
            .all(&*self.db)
            .await?;
        Ok(regions
            .into_iter()
            .map(|region| (region.external_ref, region.id))
            .collect())
    }

    async fn city_map(&self, carrier: Carrier) -> Result<HashMap<String, Uuid>, ServiceError> {
        let cities = CarrierCity::find()
            .filter(carrier_city::Column::Carrier.eq(carrier))
            .all(&*self.db)
            .await?;
        Ok(cities
            .into_iter()
            .map(|city| (city.external_ref, city.id))
            .collect())
    }
}

/// Spawns the periodic synchronizer task. The first pass runs right away;
/// subsequent passes follow the configured interval regardless of whether
/// the previous one failed.
pub fn spawn_scheduler(
    sync: Arc<ReferenceDataSync>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match sync.run().await {
                Ok(report) => info!(
                    "Reference data sync finished: {} regions, {} cities, {} pickup points",
                    report.regions, report.cities, report.pickup_points
                ),
                Err(e) => error!("Reference data sync failed: {}", e),
            }
        }
    })
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
