use crate::client::PostgresClient;
use async_trait::async_trait;
use caretel_domain::{DomainError, DomainResult, TerminologyCode, TerminologyRepository};
use tracing::{debug, instrument};

/// PostgreSQL implementation of terminology lookups against the
/// terminology_mappings table.
#[derive(Clone)]
pub struct PostgresTerminologyRepository {
    client: PostgresClient,
}

impl PostgresTerminologyRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TerminologyRepository for PostgresTerminologyRepository {
    #[instrument(skip(self))]
    async fn lookup(
        &self,
        mapping_type: &str,
        source_value: &str,
    ) -> DomainResult<Option<TerminologyCode>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let row = conn
            .query_opt(
                "SELECT code, display FROM terminology_mappings
                 WHERE mapping_type = $1 AND source_value = $2 AND firmware_version IS NULL",
                &[&mapping_type, &source_value],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        let mapping = row.map(|row| TerminologyCode {
            code: row.get(0),
            display: row.get(1),
        });
        debug!(found = mapping.is_some(), "terminology lookup");
        Ok(mapping)
    }

    #[instrument(skip(self))]
    async fn lookup_versioned(
        &self,
        mapping_type: &str,
        source_value: &str,
        firmware_version: &str,
    ) -> DomainResult<Option<TerminologyCode>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        // Prefer the firmware-specific mapping, fall back to the
        // unversioned row.
        let row = conn
            .query_opt(
                "SELECT code, display FROM terminology_mappings
                 WHERE mapping_type = $1 AND source_value = $2
                   AND (firmware_version = $3 OR firmware_version IS NULL)
                 ORDER BY firmware_version NULLS LAST
                 LIMIT 1",
                &[&mapping_type, &source_value, &firmware_version],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        Ok(row.map(|row| TerminologyCode {
            code: row.get(0),
            display: row.get(1),
        }))
    }
}
