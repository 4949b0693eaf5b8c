use crate::database::Database;
use crate::modules::serverstats::database::ServerStatsDatabase;

pub struct Databases {
    pub serverstats: Database<ServerStatsDatabase>,
}

impl Databases {
    pub async fn default() -> Result<Self, crate::database::DbError> {
        Ok(Self {
            serverstats: Database::new("data/serverstats.db").await?,
        })
    }
}
