//! Access control policy.
//!
//! One pure decision function centralizes every rule that used to live in
//! per-route middleware. No side effects, no store access; callers resolve
//! the target article's stored category before asking.

use crate::error::{PortalError, PortalResult};
use crate::types::Role;

/// The authenticated principal, as carried by a verified credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: u64,
    pub role: Role,
}

/// Everything an actor can ask the portal to do.
///
/// `Edit`, `Delete` and `ModerateComment` carry the article's *stored*
/// category; `Create` carries the submitted one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewsAction<'a> {
    ReadNews,
    IncrementViews,
    Like,
    AddComment,
    Create { category: &'a str },
    Edit { category: &'a str },
    Delete { category: &'a str },
    ModerateComment { category: &'a str },
    SetFeatured,
    SetBreakingNews,
    Upload,
    ListUsers,
    ReadSelf,
    DeleteUser { target_id: u64 },
}

/// Evaluate the policy for `actor` attempting `action`.
///
/// Precedence: anonymous engagement rules first, then the chief editor's
/// blanket grant, then sector-scoped rules, then deny. Denial for an
/// authenticated actor is always `Forbidden`, never `NotFound`; resource
/// existence is the caller's concern.
pub fn authorize(actor: Option<&Actor>, action: &NewsAction<'_>) -> PortalResult<()> {
    let actor = match actor {
        Some(actor) => actor,
        None => {
            return match action {
                // Public engagement actions are deliberately un-gated.
                NewsAction::ReadNews
                | NewsAction::IncrementViews
                | NewsAction::Like
                | NewsAction::AddComment => Ok(()),
                _ => Err(PortalError::Authentication(
                    "credential required for this action".to_string(),
                )),
            };
        }
    };

    match &actor.role {
        Role::ChiefEditor => match action {
            NewsAction::DeleteUser { target_id } if *target_id == actor.user_id => Err(
                PortalError::Forbidden("cannot delete your own account".to_string()),
            ),
            _ => Ok(()),
        },
        Role::SectorialEditor { sector } => match action {
            NewsAction::ReadNews
            | NewsAction::IncrementViews
            | NewsAction::Like
            | NewsAction::AddComment
            | NewsAction::Upload
            | NewsAction::ReadSelf => Ok(()),
            NewsAction::Create { category } => {
                if *category == sector.as_str() {
                    Ok(())
                } else {
                    Err(PortalError::Forbidden(format!(
                        "sectorial editors may only create articles in their own sector ({})",
                        sector
                    )))
                }
            }
            NewsAction::Edit { category }
            | NewsAction::Delete { category }
            | NewsAction::ModerateComment { category } => {
                if *category == sector.as_str() {
                    Ok(())
                } else {
                    Err(PortalError::Forbidden(format!(
                        "article belongs to another sector, not {}",
                        sector
                    )))
                }
            }
            NewsAction::SetFeatured => Err(PortalError::Forbidden(
                "only the chief editor may set the featured flag".to_string(),
            )),
            NewsAction::SetBreakingNews => Err(PortalError::Forbidden(
                "only the chief editor may set the breaking-news banner".to_string(),
            )),
            NewsAction::ListUsers | NewsAction::DeleteUser { .. } => Err(PortalError::Forbidden(
                "user administration is restricted to the chief editor".to_string(),
            )),
        },
    }
}
