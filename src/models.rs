use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::access::entitlement::Entitlement;

/// Domain suffix used to derive the identity email from a username
pub const SYNTHETIC_EMAIL_DOMAIN: &str = "user.com";

/// Build the identity email the backend signs users in with
pub fn synthetic_email(username: &str) -> String {
    format!("{}@{}", username, SYNTHETIC_EMAIL_DOMAIN)
}

/// Account document stored per user
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    pub uid: String,
    pub username: String,

    #[serde(default)]
    pub is_admin: bool,

    #[serde(default)]
    pub is_approved: bool,

    /// Entitlement length in seconds, counted from the access anchor
    #[serde(default)]
    pub access_duration: Option<i64>,

    /// True account creation time, never rewritten
    pub created_at: DateTime<Utc>,

    /// Anchor of the latest admin grant
    #[serde(default)]
    pub access_granted_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub access_expiration_date: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,
}

impl UserAccount {
    /// Start of the current access window
    ///
    /// Until an admin grants access the window starts at account creation
    /// (the sign-up trial).
    pub fn access_anchor(&self) -> DateTime<Utc> {
        self.access_granted_at.unwrap_or(self.created_at)
    }

    /// End of the current access window, if it has one
    ///
    /// Accounts still on the sign-up trial have no stored expiration; their
    /// window ends at anchor + duration.
    pub fn window_end(&self) -> Option<DateTime<Utc>> {
        self.access_expiration_date.or_else(|| {
            let secs = self.access_duration.filter(|d| *d != 0)?;
            self.access_anchor()
                .checked_add_signed(Duration::try_seconds(secs)?)
        })
    }

    /// Evaluate this account's entitlement at `now`
    pub fn entitlement(&self, now: DateTime<Utc>) -> Entitlement {
        Entitlement::evaluate(self.access_duration, Some(self.access_anchor()), now)
    }

    /// Whether the profile still lacks any of the required fields
    pub fn needs_profile(&self) -> bool {
        match &self.profile {
            Some(profile) => !profile.is_complete(),
            None => true,
        }
    }
}

/// Contact details collected after registration
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Profile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpf: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Profile {
    pub fn is_complete(&self) -> bool {
        self.cpf.is_some() && self.phone.is_some() && self.email.is_some()
    }
}

/// Partial update of an account document
///
/// Outer `None` leaves a field untouched; `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct AccountPatch {
    pub is_approved: Option<bool>,
    pub access_duration: Option<Option<i64>>,
    pub access_granted_at: Option<Option<DateTime<Utc>>>,
    pub access_expiration_date: Option<Option<DateTime<Utc>>>,
    pub profile: Option<Profile>,
}

impl AccountPatch {
    pub fn apply(self, account: &mut UserAccount) {
        if let Some(approved) = self.is_approved {
            account.is_approved = approved;
        }
        if let Some(duration) = self.access_duration {
            account.access_duration = duration;
        }
        if let Some(granted_at) = self.access_granted_at {
            account.access_granted_at = granted_at;
        }
        if let Some(expiration) = self.access_expiration_date {
            account.access_expiration_date = expiration;
        }
        if let Some(profile) = self.profile {
            account.profile = Some(profile);
        }
    }
}

/// Per-user application data, stored apart from the account
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct UserData {
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub categories: Vec<Category>,
}

impl UserData {
    /// Transactions ordered for display (newest date first)
    pub fn sorted_by_date(&self) -> Vec<&Transaction> {
        let mut sorted: Vec<&Transaction> = self.transactions.iter().collect();
        sorted.sort_by(|a, b| b.date.cmp(&a.date));
        sorted
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Income,
    Expense,
    Investment,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub description: String,
    pub amount: f64,
    /// Category name (denormalized)
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_id: Option<String>,
    pub date: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: TransactionType,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub id: String,
    pub name: String,
    pub cnpj: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn make_account() -> UserAccount {
        UserAccount {
            uid: "u1".to_string(),
            username: "maria".to_string(),
            is_admin: false,
            is_approved: true,
            access_duration: Some(86_400),
            created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            access_granted_at: None,
            access_expiration_date: None,
            profile: None,
        }
    }

    #[test]
    fn synthetic_email_uses_fixed_domain() {
        assert_eq!(synthetic_email("maria"), "maria@user.com");
    }

    #[test]
    fn anchor_falls_back_to_creation_time() {
        let account = make_account();
        assert_eq!(account.access_anchor(), account.created_at);
    }

    #[test]
    fn anchor_prefers_grant_time() {
        let mut account = make_account();
        let granted = account.created_at + Duration::days(40);
        account.access_granted_at = Some(granted);
        assert_eq!(account.access_anchor(), granted);
    }

    #[test]
    fn window_end_prefers_stored_expiration() {
        let mut account = make_account();
        let created = account.created_at;
        account.access_duration = Some(2 * 86_400);
        assert_eq!(account.window_end(), Some(created + Duration::days(2)));

        account.access_expiration_date = Some(created + Duration::days(9));
        assert_eq!(account.window_end(), Some(created + Duration::days(9)));

        account.access_expiration_date = None;
        account.access_duration = None;
        assert_eq!(account.window_end(), None);

        account.access_duration = Some(0);
        assert_eq!(account.window_end(), None);
    }

    #[test]
    fn account_serializes_with_camel_case_fields() {
        let json = serde_json::to_string(&make_account()).unwrap();
        assert!(json.contains("\"isApproved\""));
        assert!(json.contains("\"accessDuration\""));
        assert!(json.contains("\"createdAt\""));
        assert!(!json.contains("\"profile\""));
    }

    #[test]
    fn patch_clears_and_sets_fields() {
        let mut account = make_account();
        account.access_expiration_date = Some(account.created_at);

        AccountPatch {
            is_approved: Some(false),
            access_duration: Some(None),
            access_expiration_date: Some(None),
            ..Default::default()
        }
        .apply(&mut account);

        assert!(!account.is_approved);
        assert!(account.access_duration.is_none());
        assert!(account.access_expiration_date.is_none());
        assert_eq!(account.username, "maria");
    }

    #[test]
    fn needs_profile_until_all_fields_present() {
        let mut account = make_account();
        assert!(account.needs_profile());

        account.profile = Some(Profile {
            cpf: Some("52998224725".to_string()),
            phone: None,
            email: Some("maria@example.com".to_string()),
        });
        assert!(account.needs_profile());

        account.profile.as_mut().unwrap().phone = Some("11987654321".to_string());
        assert!(!account.needs_profile());
    }

    #[test]
    fn transactions_sort_newest_first() {
        let base = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let make = |id: &str, offset: i64| Transaction {
            id: id.to_string(),
            description: "x".to_string(),
            amount: 10.0,
            category: "Mercado".to_string(),
            company_id: None,
            date: base + Duration::days(offset),
            kind: TransactionType::Expense,
        };
        let data = UserData {
            transactions: vec![make("a", 0), make("b", 2), make("c", 1)],
            categories: vec![],
        };

        let ids: Vec<&str> = data.sorted_by_date().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[test]
    fn transaction_type_serializes_as_type_field() {
        let tx = Transaction {
            id: "t1".to_string(),
            description: "Salário".to_string(),
            amount: 5000.0,
            category: "Salário".to_string(),
            company_id: None,
            date: Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap(),
            kind: TransactionType::Income,
        };
        let json = serde_json::to_string(&tx).unwrap();
        assert!(json.contains("\"type\":\"income\""));
    }
}
