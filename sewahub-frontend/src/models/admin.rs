use crate::models::user::Role;
use serde::{Deserialize, Serialize};
use validator::Validate;

const DEFAULT_PAGE: u32 = 1;
const DEFAULT_PAGE_SIZE: u32 = 10;
const MAX_VISIBLE_PAGES: u32 = 5;

/// Raw `?page=&size=&search=` parameters as they appear in the URL.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserListParams {
    pub page: Option<String>,
    pub size: Option<String>,
    pub search: Option<String>,
}

/// Normalised user-list query: unparseable or zero values fall back to the
/// defaults instead of failing the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserQuery {
    pub page: u32,
    pub size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

impl From<UserListParams> for UserQuery {
    fn from(params: UserListParams) -> Self {
        let parse = |raw: Option<String>, default: u32| {
            raw.and_then(|v| v.trim().parse::<u32>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(default)
        };
        Self {
            page: parse(params.page, DEFAULT_PAGE),
            size: parse(params.size, DEFAULT_PAGE_SIZE),
            search: params
                .search
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageLink {
    Page(u32),
    Gap,
}

impl Serialize for PageLink {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PageLink::Page(n) => serializer.serialize_u32(*n),
            PageLink::Gap => serializer.serialize_str("..."),
        }
    }
}

/// Page numbers shown under the user table, with `Gap` for elided runs.
pub fn page_window(current: u32, total: u32) -> Vec<PageLink> {
    use PageLink::{Gap, Page};

    if total <= MAX_VISIBLE_PAGES {
        return (1..=total).map(Page).collect();
    }

    let mut pages = Vec::with_capacity(7);
    if current <= 3 {
        pages.extend((1..=4).map(Page));
        pages.extend([Gap, Page(total)]);
    } else if current >= total - 2 {
        pages.extend([Page(1), Gap]);
        pages.extend((total - 3..=total).map(Page));
    } else {
        pages.extend([Page(1), Gap]);
        pages.extend((current - 1..=current + 1).map(Page));
        pages.extend([Gap, Page(total)]);
    }
    pages
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[validate(length(min = 2, message = "Full name must be at least 2 characters"))]
    pub fullname: String,
    #[validate(email(message = "Enter a valid email"))]
    pub email: String,
    pub role: Role,
    #[validate(length(min = 6, message = "Password must be at least 6 characters long"))]
    pub password: String,
    #[serde(skip_serializing)]
    #[validate(must_match(other = "password", message = "Passwords do not match"))]
    pub confirm_password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 2, message = "Full name must be at least 2 characters"))]
    pub fullname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(email(message = "Enter a valid email"))]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}
