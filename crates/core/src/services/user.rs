//! User service: registration, login, token refresh, and staff
//! administration.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use hostelhub_common::{config::AuthConfig, AppError, AppResult, Config, IdGenerator};
use hostelhub_db::{
    entities::{
        complaint::ComplaintCategory,
        user::{self, ManagementRole, UserRole},
    },
    repositories::UserRepository,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::{ActiveEnum, ActiveValue::Set};
use serde::{Deserialize, Serialize};
use validator::ValidateEmail;

const MIN_PASSWORD_LEN: usize = 6;

/// Input for registering an account.
#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub email: String,
    pub password: String,
    /// Role wire value: `student` or `management`.
    pub role: String,
    pub hostel: Option<String>,
    pub block: Option<String>,
    pub room_number: Option<String>,
}

/// An access/refresh token pair.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// A verified login or refresh: the user plus fresh tokens.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: user::Model,
    pub tokens: TokenPair,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    /// User id.
    sub: String,
    /// Role wire value, informational.
    role: String,
    iat: i64,
    exp: i64,
}

/// Service for accounts and authentication.
#[derive(Clone)]
pub struct UserService {
    user_repo: UserRepository,
    auth: AuthConfig,
    id_gen: IdGenerator,
}

impl UserService {
    /// Create a new user service.
    #[must_use]
    pub fn new(user_repo: UserRepository, config: &Config) -> Self {
        Self {
            user_repo,
            auth: config.auth.clone(),
            id_gen: IdGenerator::new(),
        }
    }

    // ========== Registration & login ==========

    /// Register a new account.
    ///
    /// Students need their hostel location and are approved immediately;
    /// management accounts await admin approval.
    pub async fn register(&self, input: RegisterInput) -> AppResult<user::Model> {
        let email = input.email.trim().to_lowercase();
        if !email.validate_email() {
            return Err(AppError::Validation("Invalid email address".to_string()));
        }
        if input.password.len() < MIN_PASSWORD_LEN {
            return Err(AppError::Validation(
                "Password must be at least 6 characters".to_string(),
            ));
        }

        let role = UserRole::try_from_value(&input.role)
            .map_err(|_| AppError::BadRequest(format!("Invalid role: {}", input.role)))?;

        let (hostel, block, room_number) = match role {
            UserRole::Student => {
                let hostel = non_empty(input.hostel)
                    .ok_or_else(|| AppError::Validation("Hostel is required".to_string()))?;
                let block = non_empty(input.block)
                    .ok_or_else(|| AppError::Validation("Block is required".to_string()))?;
                let room_number = non_empty(input.room_number)
                    .ok_or_else(|| AppError::Validation("Room number is required".to_string()))?;
                (Some(hostel), Some(block), Some(room_number))
            }
            UserRole::Management => (None, None, None),
        };

        if self.user_repo.find_by_email(&email).await?.is_some() {
            return Err(AppError::BadRequest("Email already registered".to_string()));
        }

        let model = user::ActiveModel {
            id: Set(self.id_gen.generate()),
            email: Set(email),
            password_hash: Set(hash_password(&input.password)?),
            role: Set(role),
            hostel: Set(hostel),
            block: Set(block),
            room_number: Set(room_number),
            is_approved: Set(role == UserRole::Student),
            is_admin: Set(false),
            management_role: Set(None),
            specialization: Set(None),
            refresh_token: Set(None),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        };

        self.user_repo.create(model).await
    }

    /// Verify credentials and issue a token pair.
    pub async fn login(&self, email: &str, password: &str) -> AppResult<LoginOutcome> {
        let email = email.trim().to_lowercase();
        let user = self
            .user_repo
            .find_by_email(&email)
            .await?
            .ok_or(AppError::Unauthorized)?;

        if !verify_password(password, &user.password_hash)? {
            return Err(AppError::Unauthorized);
        }

        if user.role == UserRole::Management && !user.is_approved {
            return Err(AppError::Forbidden(
                "Account is awaiting admin approval".to_string(),
            ));
        }

        self.issue_and_persist(user).await
    }

    /// Rotate a refresh token, issuing a fresh pair.
    ///
    /// The presented token must match the one stored on the user row; a
    /// stale or revoked token fails `Unauthorized`.
    pub async fn refresh(&self, refresh_token: &str) -> AppResult<LoginOutcome> {
        let claims = decode_token(refresh_token, &self.auth.refresh_secret)?;
        let user = self
            .user_repo
            .get_by_id(&claims.sub)
            .await
            .map_err(|_| AppError::Unauthorized)?;

        if user.refresh_token.as_deref() != Some(refresh_token) {
            return Err(AppError::Unauthorized);
        }

        self.issue_and_persist(user).await
    }

    /// Resolve an access token to its verified user row.
    pub async fn authenticate(&self, access_token: &str) -> AppResult<user::Model> {
        let claims = decode_token(access_token, &self.auth.access_secret)?;
        self.user_repo
            .get_by_id(&claims.sub)
            .await
            .map_err(|_| AppError::Unauthorized)
    }

    /// The caller's own record.
    pub async fn get_by_id(&self, id: &str) -> AppResult<user::Model> {
        self.user_repo.get_by_id(id).await
    }

    async fn issue_and_persist(&self, user: user::Model) -> AppResult<LoginOutcome> {
        let access_token = issue_token(
            &user,
            &self.auth.access_secret,
            Duration::minutes(self.auth.access_ttl_minutes),
        )?;
        let refresh_token = issue_token(
            &user,
            &self.auth.refresh_secret,
            Duration::days(self.auth.refresh_ttl_days),
        )?;

        let mut model: user::ActiveModel = user.into();
        model.refresh_token = Set(Some(refresh_token.clone()));
        model.updated_at = Set(Some(Utc::now()));
        let user = self.user_repo.save(model).await?;

        Ok(LoginOutcome {
            user,
            tokens: TokenPair {
                access_token,
                refresh_token,
            },
        })
    }

    // ========== Staff administration ==========

    /// Management accounts awaiting approval.
    pub async fn pending_management(&self) -> AppResult<Vec<user::Model>> {
        self.user_repo.find_pending_management().await
    }

    /// All management accounts.
    pub async fn staff(&self) -> AppResult<Vec<user::Model>> {
        self.user_repo.find_staff().await
    }

    /// Approve a management account.
    pub async fn approve(&self, user_id: &str) -> AppResult<user::Model> {
        let user = self.user_repo.get_by_id(user_id).await?;
        if user.role != UserRole::Management {
            return Err(AppError::BadRequest(
                "Only management accounts need approval".to_string(),
            ));
        }

        let mut model: user::ActiveModel = user.into();
        model.is_approved = Set(true);
        model.updated_at = Set(Some(Utc::now()));
        self.user_repo.save(model).await
    }

    /// Set a management account's sub-role and, for caretakers, their
    /// specialty.
    pub async fn set_role(
        &self,
        user_id: &str,
        role: &str,
        specialization: Option<&str>,
    ) -> AppResult<user::Model> {
        let role = ManagementRole::try_from_value(&role.to_string())
            .map_err(|_| AppError::BadRequest(format!("Invalid management role: {role}")))?;

        let specialization = match (role, specialization) {
            (ManagementRole::Caretaker, Some(value)) => Some(
                ComplaintCategory::try_from_value(&value.to_string())
                    .map_err(|_| AppError::BadRequest(format!("Invalid specialization: {value}")))?,
            ),
            _ => None,
        };

        let user = self.user_repo.get_by_id(user_id).await?;
        if user.role != UserRole::Management {
            return Err(AppError::BadRequest(
                "Roles can only be set on management accounts".to_string(),
            ));
        }

        let mut model: user::ActiveModel = user.into();
        model.management_role = Set(Some(role));
        model.is_admin = Set(role == ManagementRole::Admin);
        model.specialization = Set(specialization);
        model.updated_at = Set(Some(Utc::now()));
        self.user_repo.save(model).await
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Hash a password for storage.
fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {e}")))
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| AppError::Internal(format!("Invalid hash: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

fn issue_token(user: &user::Model, secret: &str, ttl: Duration) -> AppResult<String> {
    let now = Utc::now();
    let claims = Claims {
        sub: user.id.clone(),
        role: user.role.to_value(),
        iat: now.timestamp(),
        exp: (now + ttl).timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Failed to sign token: {e}")))
}

fn decode_token(token: &str, secret: &str) -> AppResult<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::Unauthorized)
}
