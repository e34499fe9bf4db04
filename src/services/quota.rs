use crate::entities::{prelude::*, *};
use anyhow::Result;
use async_trait::async_trait;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QuerySelect};

/// Bytes a user has already uploaded, counted against the quota ceiling.
#[async_trait]
pub trait QuotaSource: Send + Sync {
    async fn consumed_bytes(&self, user_id: Option<&str>) -> Result<u64>;
}

/// Sums `uploaded_data.size` over the user's upload history.
pub struct DbQuotaSource {
    db: DatabaseConnection,
}

impl DbQuotaSource {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl QuotaSource for DbQuotaSource {
    async fn consumed_bytes(&self, user_id: Option<&str>) -> Result<u64> {
        // Anonymous uploads are not attributed to anyone
        let Some(user_id) = user_id else {
            return Ok(0);
        };

        let sizes: Vec<Option<i64>> = UploadedData::find()
            .select_only()
            .column(uploaded_data::Column::Size)
            .filter(uploaded_data::Column::UserId.eq(user_id))
            .into_tuple()
            .all(&self.db)
            .await?;

        Ok(total_bytes(sizes.into_iter().flatten()))
    }
}

/// Sums stored sizes, ignoring negative values and saturating at `u64::MAX`.
fn total_bytes(sizes: impl IntoIterator<Item = i64>) -> u64 {
    sizes
        .into_iter()
        .filter_map(|s| u64::try_from(s).ok())
        .fold(0, u64::saturating_add)
}

/// Fixed answer, for callers that already know the figure.
pub struct StaticQuotaSource(pub u64);

#[async_trait]
impl QuotaSource for StaticQuotaSource {
    async fn consumed_bytes(&self, _user_id: Option<&str>) -> Result<u64> {
        Ok(self.0)
    }
}
