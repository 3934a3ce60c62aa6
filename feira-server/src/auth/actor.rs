//! The authenticated caller, re-read from storage on every request

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use rust_decimal::Decimal;
use shared::error::{AppError, ErrorCode};
use shared::models::{AddressSnapshot, ProfileAddress, Role};

use super::jwt::{self, JwtError};
use crate::error::ServiceError;
use crate::state::AppState;
use crate::store::ActorRecord;

#[derive(Debug, Clone)]
pub struct CurrentActor {
    pub user_id: i64,
    pub role: Role,
    pub is_available: bool,
    pub pending_balance: Decimal,
    pub address: ProfileAddress,
}

impl From<ActorRecord> for CurrentActor {
    fn from(record: ActorRecord) -> Self {
        Self {
            user_id: record.id,
            role: record.role,
            is_available: record.is_available,
            pending_balance: record.pending_balance,
            address: record.address,
        }
    }
}

impl CurrentActor {
    pub fn require_role(&self, role: Role) -> Result<(), AppError> {
        if self.role == role {
            Ok(())
        } else {
            Err(AppError::with_message(
                ErrorCode::RoleRequired,
                format!("This action requires the {} role", role.as_db()),
            ))
        }
    }

    /// Address snapshot for a new order; every field but `nearby` is mandatory.
    pub fn require_complete_address(&self) -> Result<AddressSnapshot, AppError> {
        self.address.complete().ok_or_else(|| {
            AppError::new(ErrorCode::AddressIncomplete)
                .with_detail("missing", self.address.missing_fields())
        })
    }
}

/// Resolves the bearer token to a fresh [`CurrentActor`] in the request extensions.
pub async fn require_actor(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(header) = req
        .headers()
        .get(http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
    else {
        tracing::debug!(uri = %req.uri(), "Missing Authorization header");
        return Err(AppError::not_authenticated());
    };
    let token = jwt::extract_from_header(header)
        .ok_or_else(|| AppError::invalid_token("Invalid authorization header"))?;

    let user_id = jwt::validate_token(token, &state.jwt_secret).map_err(|e| {
        tracing::warn!(error = %e, uri = %req.uri(), "Token rejected");
        match e {
            JwtError::ExpiredToken => AppError::token_expired(),
            _ => AppError::invalid_token("Invalid token"),
        }
    })?;

    let record = state
        .store
        .load_actor(user_id)
        .await
        .map_err(ServiceError::from)?
        .ok_or_else(|| {
            tracing::warn!(user_id, "Token subject no longer exists");
            AppError::not_authenticated()
        })?;

    req.extensions_mut().insert(CurrentActor::from(record));
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(role: Role, address: ProfileAddress) -> CurrentActor {
        CurrentActor {
            user_id: 1,
            role,
            is_available: true,
            pending_balance: Decimal::ZERO,
            address,
        }
    }

    #[test]
    fn test_require_role() {
        let seller = actor(Role::Seller, ProfileAddress::default());
        assert!(seller.require_role(Role::Seller).is_ok());
        let err = seller.require_role(Role::Courier).unwrap_err();
        assert_eq!(err.code, ErrorCode::RoleRequired);
    }

    #[test]
    fn test_admin_is_not_a_seller() {
        let admin = actor(Role::Admin, ProfileAddress::default());
        assert!(admin.require_role(Role::Seller).is_err());
    }

    #[test]
    fn test_incomplete_address() {
        let buyer = actor(
            Role::Buyer,
            ProfileAddress {
                street: Some("Rua A".into()),
                ..Default::default()
            },
        );
        let err = buyer.require_complete_address().unwrap_err();
        assert_eq!(err.code, ErrorCode::AddressIncomplete);
        assert!(err.details.unwrap().contains_key("missing"));
    }
}
