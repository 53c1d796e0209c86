//! User-facing notification settings.

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use vibecheck_common::{AppError, AppResult};
use vibecheck_db::entities::user;
use vibecheck_db::repositories::UserRepository;

/// Cadence values the settings UI offers.
const VALID_FREQUENCIES: [i32; 4] = [1, 2, 3, 7];

/// Input for updating notification settings.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNotificationSettingsInput {
    /// IANA timezone identifier
    pub timezone: Option<String>,
    /// Personal prompt cadence (1 = daily, 2/3 = every 2/3 days, 7 = weekly)
    pub notification_frequency: Option<i32>,
}

/// Notification settings response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSettingsResponse {
    /// IANA timezone identifier
    pub timezone: String,
    /// Personal prompt cadence
    pub notification_frequency: i32,
    /// Last time a prompt was pushed
    pub last_notified_at: Option<String>,
}

/// User account operations.
#[derive(Clone)]
pub struct UserService {
    users: UserRepository,
}

impl UserService {
    /// Create a new user service.
    #[must_use]
    pub fn new(users: UserRepository) -> Self {
        Self { users }
    }

    /// Resolve an API token to its user.
    pub async fn authenticate_by_token(&self, token: &str) -> AppResult<user::Model> {
        self.users
            .find_by_token(token)
            .await?
            .ok_or(AppError::Unauthorized)
    }

    /// Get a user's notification settings.
    pub async fn notification_settings(
        &self,
        user_id: &str,
    ) -> AppResult<NotificationSettingsResponse> {
        let user = self.users.get_by_id(user_id).await?;
        Ok(to_settings_response(&user))
    }

    /// Update a user's timezone and personal prompt cadence.
    ///
    /// The timezone is validated against the IANA database up front;
    /// letting a bad value through would silently break quiet hours for
    /// this user later.
    pub async fn update_notification_settings(
        &self,
        user_id: &str,
        input: UpdateNotificationSettingsInput,
    ) -> AppResult<NotificationSettingsResponse> {
        if let Some(timezone) = &input.timezone {
            timezone.parse::<Tz>().map_err(|_| {
                AppError::Validation(format!("Unknown timezone identifier: {timezone}"))
            })?;
        }

        if let Some(frequency) = input.notification_frequency {
            if !VALID_FREQUENCIES.contains(&frequency) {
                return Err(AppError::Validation(
                    "notificationFrequency must be 1, 2, 3 or 7".to_string(),
                ));
            }
        }

        let updated = self
            .users
            .update_notification_settings(user_id, input.timezone, input.notification_frequency)
            .await?;

        Ok(to_settings_response(&updated))
    }
}

fn to_settings_response(user: &user::Model) -> NotificationSettingsResponse {
    NotificationSettingsResponse {
        timezone: user.timezone.clone(),
        notification_frequency: user.notification_frequency,
        last_notified_at: user.last_notified_at.map(|dt| dt.to_rfc3339()),
    }
}
