use crate::{
    config::Config,
    error::{AppError, Result},
    models::user::UserProfile,
    storage::Store,
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// 用户资料缓存时间
const PROFILE_CACHE_MINUTES: i64 = 5;

/// 身份协作方：Bearer JWT -> 用户资料
#[derive(Clone)]
pub struct AuthService {
    jwt_secret: String,
    store: Arc<dyn Store>,
    user_cache: Arc<RwLock<HashMap<String, CachedUser>>>,
}

#[derive(Debug, Clone)]
struct CachedUser {
    user: UserProfile,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // 用户ID
    pub exp: i64,
    pub iat: i64,
}

impl AuthService {
    pub fn new(config: &Config, store: Arc<dyn Store>) -> Self {
        Self {
            jwt_secret: config.jwt_secret.clone(),
            store,
            user_cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn verify_jwt(&self, token: &str) -> Result<Claims> {
        let decoding_key = DecodingKey::from_secret(self.jwt_secret.as_ref());
        let validation = Validation::new(Algorithm::HS256);

        match decode::<Claims>(token, &decoding_key, &validation) {
            Ok(token_data) => {
                debug!("JWT token verified for user: {}", token_data.claims.sub);
                Ok(token_data.claims)
            }
            Err(e) => {
                warn!("JWT verification failed: {}", e);
                Err(AppError::Authentication("Invalid token".to_string()))
            }
        }
    }

    /// 签发令牌，供本地开发与测试使用
    pub fn issue_token(&self, user_id: &str, ttl: Duration) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        Ok(encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_ref()),
        )?)
    }

    /// 校验令牌并解析出用户资料
    pub async fn resolve_user(&self, token: &str) -> Result<UserProfile> {
        let claims = self.verify_jwt(token)?;

        if let Some(user) = self.get_cached_user(&claims.sub) {
            return Ok(user);
        }

        let user = self
            .store
            .get_user(&claims.sub)
            .await?
            .ok_or_else(|| AppError::Authentication("Unknown user".to_string()))?;

        self.cache_user(user.clone());
        Ok(user)
    }

    fn get_cached_user(&self, user_id: &str) -> Option<UserProfile> {
        let cache = self.user_cache.read();
        cache
            .get(user_id)
            .filter(|cached| cached.expires_at > Utc::now())
            .map(|cached| cached.user.clone())
    }

    fn cache_user(&self, user: UserProfile) {
        let mut cache = self.user_cache.write();
        cache.insert(
            user.id.clone(),
            CachedUser {
                user,
                expires_at: Utc::now() + Duration::minutes(PROFILE_CACHE_MINUTES),
            },
        );
    }

    /// 账号注销后移除缓存，避免旧令牌在缓存期内仍能解析出用户
    pub fn forget_user(&self, user_id: &str) {
        self.user_cache.write().remove(user_id);
    }

    /// 清理过期缓存
    pub fn cleanup_expired_cache(&self) -> usize {
        let now = Utc::now();
        let mut cache = self.user_cache.write();
        let before = cache.len();
        cache.retain(|_, cached| cached.expires_at > now);
        let removed = before - cache.len();
        debug!("Cleaned {} expired user cache entries", removed);
        removed
    }
}
