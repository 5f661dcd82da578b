//! Auth service.

use async_trait::async_trait;
use mockall::automock;

use crate::{
    auth::{
        ApiToken, AuthServiceError, IssuedApiToken,
        models::{NewApiToken, User, UserRole, UserUuid},
        repository::PgAuthRepository,
    },
    database::Db,
};

#[derive(Debug, Clone)]
pub struct PgAuthService {
    db: Db,
    repository: PgAuthRepository,
}

impl PgAuthService {
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self {
            db,
            repository: PgAuthRepository::new(),
        }
    }

    /// Create a user and issue their first API token.
    ///
    /// # Errors
    ///
    /// Returns an error if the email is malformed or already registered, or storage fails.
    pub async fn create_user(
        &self,
        email: &str,
        role: UserRole,
    ) -> Result<IssuedApiToken, AuthServiceError> {
        let email = normalize_email(email)?;

        let token = ApiToken::generate();

        let mut tx = self.db.begin().await?;

        let user = self
            .repository
            .create_user(&mut tx, UserUuid::new(), &email, role)
            .await?;

        self.repository
            .create_api_token(
                &mut tx,
                &NewApiToken {
                    uuid: token.uuid(),
                    user_uuid: user.uuid,
                    version: token.version(),
                    token_hash: token.verifier(),
                },
            )
            .await?;

        tx.commit().await?;

        tracing::info!(user = %user.uuid, role = %user.role, "user created");

        Ok(IssuedApiToken {
            token: token.to_string(),
            token_uuid: token.uuid(),
            user,
        })
    }
}

#[async_trait]
impl AuthService for PgAuthService {
    async fn authenticate_bearer(&self, bearer_token: &str) -> Result<User, AuthServiceError> {
        let presented = bearer_token
            .parse::<ApiToken>()
            .map_err(|_source| AuthServiceError::NotFound)?;

        let mut tx = self.db.begin().await?;

        let token = self
            .repository
            .find_active_api_token(&mut tx, presented.uuid(), presented.version())
            .await?
            .ok_or(AuthServiceError::NotFound)?;

        if token.version != presented.version() || presented.verifier() != token.token_hash {
            return Err(AuthServiceError::NotFound);
        }

        // Best-effort metadata update; auth success should not depend on this write.
        if let Err(error) = self
            .repository
            .touch_api_token_last_used(&mut tx, presented.uuid())
            .await
        {
            tracing::warn!(%error, "failed to record api token use");
        }

        tx.commit().await?;

        Ok(token.user)
    }
}

#[automock]
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Resolve the user owning a bearer token.
    async fn authenticate_bearer(&self, bearer_token: &str) -> Result<User, AuthServiceError>;
}

/// Trim and lowercase an email address, rejecting obviously malformed ones.
pub fn normalize_email(email: &str) -> Result<String, AuthServiceError> {
    let email = email.trim().to_ascii_lowercase();

    match email.split_once('@') {
        Some((local, domain))
            if !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace) =>
        {
            Ok(email)
        }
        _ => Err(AuthServiceError::InvalidEmail),
    }
}

#[cfg(test)]
mod tests {
    use sqlx::PgPool;
    use testresult::TestResult;

    use crate::test::TestContext;

    use super::*;

    #[test]
    fn normalize_email_lowercases_and_trims() -> TestResult {
        assert_eq!(normalize_email("  Player@Example.COM ")?, "player@example.com");

        Ok(())
    }

    #[test]
    fn normalize_email_rejects_malformed_addresses() {
        for email in ["", "player", "@example.com", "player@localhost", "a b@example.com"] {
            assert!(
                matches!(normalize_email(email), Err(AuthServiceError::InvalidEmail)),
                "{email:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn malformed_bearer_token_is_not_found_without_storage() -> TestResult {
        let pool = PgPool::connect_lazy("postgres://storefront@localhost/unused")?;
        let service = PgAuthService::new(Db::new(pool));

        let result = service.authenticate_bearer("not-a-token").await;

        assert!(
            matches!(result, Err(AuthServiceError::NotFound)),
            "expected NotFound, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn issued_token_authenticates_its_user() -> TestResult {
        let ctx = TestContext::new().await?;

        let issued = ctx
            .auth
            .create_user(" Admin@Example.com ", UserRole::Admin)
            .await?;

        let user = ctx.auth.authenticate_bearer(&issued.token).await?;

        assert_eq!(user.uuid, issued.user.uuid);
        assert_eq!(user.email, "admin@example.com");
        assert_eq!(user.role, UserRole::Admin);

        Ok(())
    }

    #[tokio::test]
    async fn token_with_a_different_secret_is_not_found() -> TestResult {
        let ctx = TestContext::new().await?;

        let issued = ctx
            .auth
            .create_user("player@example.com", UserRole::Customer)
            .await?;

        let mut forged = issued.token.clone();
        let last = forged.pop().ok_or("token should not be empty")?;

        forged.push(if last == '0' { '1' } else { '0' });

        let result = ctx.auth.authenticate_bearer(&forged).await;

        assert!(
            matches!(result, Err(AuthServiceError::NotFound)),
            "expected NotFound, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn email_can_only_register_once() -> TestResult {
        let ctx = TestContext::new().await?;

        ctx.auth
            .create_user("player@example.com", UserRole::Customer)
            .await?;

        let result = ctx
            .auth
            .create_user("PLAYER@example.com", UserRole::Customer)
            .await;

        assert!(
            matches!(result, Err(AuthServiceError::AlreadyExists)),
            "expected AlreadyExists, got {result:?}"
        );

        Ok(())
    }
}
