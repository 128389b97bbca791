use std::sync::Arc;

use crate::auth::session::SessionProvider;
use crate::config::Config;
use crate::email::SystemMailer;
use crate::rate_limit::LoginRateLimiter;
use crate::service::AccountService;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub config: Config,
    pub accounts: AccountService,
    pub sessions: Arc<dyn SessionProvider>,
    pub system_mailer: Option<Arc<SystemMailer>>,
    pub login_limiter: LoginRateLimiter,
}
