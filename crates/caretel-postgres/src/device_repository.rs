use crate::client::PostgresClient;
use async_trait::async_trait;
use caretel_domain::{Device, DeviceResolver, DeviceType, DomainError, DomainResult};
use tokio_postgres::Row;
use tracing::{debug, instrument};

const DEVICE_COLUMNS: &str =
    "device_id, tenant_id, device_type, serial_number, uid, unit_id, room_id";

/// PostgreSQL implementation of the device resolver, backed by
/// read-only lookups against the devices table.
#[derive(Clone)]
pub struct PostgresDeviceRepository {
    client: PostgresClient,
}

impl PostgresDeviceRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }

    async fn query_one_device(
        &self,
        predicate: &str,
        value: &str,
    ) -> DomainResult<Option<Device>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let query = format!(
            "SELECT {} FROM devices WHERE {} AND deleted_at IS NULL",
            DEVICE_COLUMNS, predicate
        );
        let row = conn
            .query_opt(&query, &[&value])
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        row.map(device_from_row).transpose()
    }
}

fn device_from_row(row: Row) -> DomainResult<Device> {
    let device_type: String = row.get(2);
    Ok(Device {
        device_id: row.get(0),
        tenant_id: row.get(1),
        device_type: DeviceType::parse_alias_or_err(&device_type)?,
        serial_number: row.get(3),
        uid: row.get(4),
        unit_id: row.get(5),
        room_id: row.get(6),
    })
}

#[async_trait]
impl DeviceResolver for PostgresDeviceRepository {
    #[instrument(skip(self))]
    async fn resolve_by_serial(&self, serial: &str) -> DomainResult<Option<Device>> {
        let device = self.query_one_device("serial_number = $1", serial).await?;
        debug!(found = device.is_some(), "resolved device by serial");
        Ok(device)
    }

    #[instrument(skip(self))]
    async fn resolve_by_uid(&self, uid: &str) -> DomainResult<Option<Device>> {
        let device = self.query_one_device("uid = $1", uid).await?;
        debug!(found = device.is_some(), "resolved device by uid");
        Ok(device)
    }

    /// Combined lookup for vendors that only expose one opaque code:
    /// serial-number match first, then UID match.
    #[instrument(skip(self))]
    async fn resolve_by_code(&self, code: &str) -> DomainResult<Option<Device>> {
        if let Some(device) = self.resolve_by_serial(code).await? {
            return Ok(Some(device));
        }
        self.resolve_by_uid(code).await
    }

    #[instrument(skip(self))]
    async fn get_device(&self, device_id: &str) -> DomainResult<Option<Device>> {
        self.query_one_device("device_id = $1", device_id).await
    }
}
