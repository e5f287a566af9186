pub mod admin_client;
pub mod api_client;
pub mod endpoints;
pub mod identity_client;

pub use admin_client::AdminUserClient;
pub use api_client::ApiClient;
pub use identity_client::HttpIdentityClient;
