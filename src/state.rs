use sea_orm::{DatabaseConnection, DbErr};
use std::sync::Arc;
use thiserror::Error;

use crate::{
    gateway::{plaid::PlaidGateway, AggregationGateway, GatewayError},
    repo::{
        accounts::SeaOrmAccountsRepo, credentials::SeaOrmCredentialsRepo,
        transactions::SeaOrmTransactionsRepo, user_tokens::SeaOrmUserTokensRepo,
        users::SeaOrmUsersRepo,
    },
    service::{
        auth::{AuthService, AuthServiceImpl},
        config::ConfigService,
        linking::{LinkingService, LinkingServiceImpl},
        profile::{ProfileService, ProfileServiceImpl},
        query::{QueryService, QueryServiceImpl},
        token::TokenServiceImpl,
        unlink::{UnlinkService, UnlinkServiceImpl},
    },
};

pub trait DatabaseClient: Send + Sync {
    fn conn(&self) -> &DatabaseConnection;
}

pub struct SeaOrmDatabaseClient {
    conn: DatabaseConnection,
}

impl SeaOrmDatabaseClient {
    /// Connects and brings the schema up to date.
    pub async fn connect(url: &str) -> Result<Self, DbErr> {
        let conn = crate::db::connect(url).await?;
        crate::schema::apply(&conn).await?;
        Ok(Self { conn })
    }
}

impl DatabaseClient for SeaOrmDatabaseClient {
    fn conn(&self) -> &DatabaseConnection {
        &self.conn
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("database startup failed: {0}")]
    Database(#[from] DbErr),
    #[error("provider client setup failed: {0}")]
    Gateway(#[from] GatewayError),
}

pub struct AppState {
    db: Arc<dyn DatabaseClient>,
    config: Arc<dyn ConfigService>,
    auth: Arc<dyn AuthService>,
    profile: Arc<dyn ProfileService>,
    linking: Arc<dyn LinkingService>,
    query: Arc<dyn QueryService>,
    unlink: Arc<dyn UnlinkService>,
}

impl AppState {
    pub async fn new(config: Arc<dyn ConfigService>) -> Result<Arc<Self>, StartupError> {
        let db = Arc::new(SeaOrmDatabaseClient::connect(&config.values().database_url).await?);
        let gateway = Arc::new(PlaidGateway::new(config.values())?);
        Ok(Self::with_components(db, config, gateway))
    }

    /// Wires services over an already prepared store and gateway.
    pub fn with_components(
        db: Arc<dyn DatabaseClient>,
        config: Arc<dyn ConfigService>,
        gateway: Arc<dyn AggregationGateway>,
    ) -> Arc<Self> {
        let values = config.values();
        let users_repo = Arc::new(SeaOrmUsersRepo::new(db.clone()));
        let credentials_repo = Arc::new(SeaOrmCredentialsRepo::new(db.clone()));
        let accounts_repo = Arc::new(SeaOrmAccountsRepo::new(db.clone()));
        let transactions_repo = Arc::new(SeaOrmTransactionsRepo::new(db.clone()));

        let tokens = Arc::new(TokenServiceImpl::new(
            Arc::new(SeaOrmUserTokensRepo::new(db.clone())),
            values.access_token_ttl_seconds,
            values.refresh_token_ttl_seconds,
        ));
        let auth = Arc::new(AuthServiceImpl::new(users_repo.clone(), tokens));
        let profile = Arc::new(ProfileServiceImpl::new(users_repo));
        let linking = Arc::new(LinkingServiceImpl::new(
            db.clone(),
            gateway,
            credentials_repo.clone(),
            accounts_repo.clone(),
            transactions_repo.clone(),
            values.transaction_window_days,
        ));
        let query = Arc::new(QueryServiceImpl::new(
            accounts_repo.clone(),
            transactions_repo.clone(),
        ));
        let unlink = Arc::new(UnlinkServiceImpl::new(
            db.clone(),
            credentials_repo,
            accounts_repo,
            transactions_repo,
        ));

        Arc::new(Self {
            db,
            config,
            auth,
            profile,
            linking,
            query,
            unlink,
        })
    }

    pub fn db(&self) -> &dyn DatabaseClient {
        self.db.as_ref()
    }

    pub fn config(&self) -> &dyn ConfigService {
        self.config.as_ref()
    }

    pub fn auth(&self) -> &dyn AuthService {
        self.auth.as_ref()
    }

    pub fn profile(&self) -> &dyn ProfileService {
        self.profile.as_ref()
    }

    pub fn linking(&self) -> &dyn LinkingService {
        self.linking.as_ref()
    }

    pub fn query(&self) -> &dyn QueryService {
        self.query.as_ref()
    }

    pub fn unlink(&self) -> &dyn UnlinkService {
        self.unlink.as_ref()
    }
}
