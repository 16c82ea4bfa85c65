//! Post-login navigation decision.
//!
//! A pure function of the resolved user and the portal selected before
//! login. Keeping this out of the UI layer makes the routing table testable
//! without a renderer.

use serde::{Deserialize, Serialize};

use crate::types::{Portal, Role, User};

/// Where the app routes after a successful login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavTarget {
    /// The main tabbed traveler app.
    MainTabs,
    /// Merchant portal dashboard.
    MerchantDashboard,
    /// Specialist portal dashboard.
    SpecialistDashboard,
    /// Admin portal dashboard.
    AdminDashboard,
    /// Holding screen for merchant/specialist accounts awaiting review.
    PendingApproval,
}

/// Decide the post-login navigation target.
///
/// Super-admin accounts navigate by the selected portal directly, bypassing
/// approval checks. Merchant and specialist accounts that are not yet
/// approved land on the pending-approval screen. Everyone else routes by
/// their effective role, with travelers and guests getting the main tabs.
#[must_use]
pub fn resolve_navigation(user: &User, selected_portal: Portal) -> NavTarget {
    if user.is_super_admin {
        return portal_dashboard(selected_portal);
    }

    match user.effective_role() {
        Role::Merchant => {
            if user.is_approved == Some(false) {
                NavTarget::PendingApproval
            } else {
                NavTarget::MerchantDashboard
            }
        }
        Role::Specialist => {
            if user.is_approved == Some(false) {
                NavTarget::PendingApproval
            } else {
                NavTarget::SpecialistDashboard
            }
        }
        Role::Admin => NavTarget::AdminDashboard,
        Role::Traveler => NavTarget::MainTabs,
    }
}

/// The dashboard a portal maps to, with no approval gating.
#[must_use]
pub const fn portal_dashboard(portal: Portal) -> NavTarget {
    match portal {
        Portal::Traveler => NavTarget::MainTabs,
        Portal::Merchant => NavTarget::MerchantDashboard,
        Portal::Specialist => NavTarget::SpecialistDashboard,
        Portal::Admin => NavTarget::AdminDashboard,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Provider, UserId};

    fn user(role: Role) -> User {
        User {
            id: UserId::new("u-1"),
            name: "Test".to_string(),
            email: None,
            avatar: None,
            first_name: None,
            last_name: None,
            role,
            active_role: None,
            is_approved: None,
            is_super_admin: false,
            accessible_roles: vec![],
            provider: Provider::Email,
            provider_id: None,
        }
    }

    #[test]
    fn test_unapproved_merchant_routes_to_pending() {
        let mut merchant = user(Role::Merchant);
        merchant.is_approved = Some(false);
        assert_eq!(
            resolve_navigation(&merchant, Portal::Merchant),
            NavTarget::PendingApproval
        );
    }

    #[test]
    fn test_approved_merchant_routes_to_dashboard() {
        let mut merchant = user(Role::Merchant);
        merchant.is_approved = Some(true);
        assert_eq!(
            resolve_navigation(&merchant, Portal::Merchant),
            NavTarget::MerchantDashboard
        );
    }

    #[test]
    fn test_merchant_without_approval_flag_routes_to_dashboard() {
        // Absent flag is not the same as rejected
        assert_eq!(
            resolve_navigation(&user(Role::Merchant), Portal::Merchant),
            NavTarget::MerchantDashboard
        );
    }

    #[test]
    fn test_unapproved_specialist_routes_to_pending() {
        let mut specialist = user(Role::Specialist);
        specialist.is_approved = Some(false);
        assert_eq!(
            resolve_navigation(&specialist, Portal::Specialist),
            NavTarget::PendingApproval
        );
    }

    #[test]
    fn test_traveler_routes_to_main_tabs() {
        assert_eq!(
            resolve_navigation(&user(Role::Traveler), Portal::Traveler),
            NavTarget::MainTabs
        );
    }

    #[test]
    fn test_admin_routes_to_admin_dashboard() {
        assert_eq!(
            resolve_navigation(&user(Role::Admin), Portal::Admin),
            NavTarget::AdminDashboard
        );
    }

    #[test]
    fn test_super_admin_bypasses_role_and_approval() {
        let mut account = user(Role::Traveler);
        account.is_super_admin = true;
        account.is_approved = Some(false);
        assert_eq!(
            resolve_navigation(&account, Portal::Admin),
            NavTarget::AdminDashboard
        );
        assert_eq!(
            resolve_navigation(&account, Portal::Merchant),
            NavTarget::MerchantDashboard
        );
    }

    #[test]
    fn test_active_role_drives_routing() {
        let mut account = user(Role::Traveler);
        account.active_role = Some(Role::Specialist);
        assert_eq!(
            resolve_navigation(&account, Portal::Specialist),
            NavTarget::SpecialistDashboard
        );
    }
}
