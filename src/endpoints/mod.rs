//! Requests sent to the identity service: the authorization request (as a
//! browser URI), the token request and the userinfo request.
pub mod authorization;
pub mod token;
pub mod userinfo;

pub use authorization::{AuthorizationRequest, authorization_uri};
pub use token::{
	AuthorizationCodeRequest, RefreshTokenRequest, refresh_access_token, request_access_token,
};
pub use userinfo::{UserInfoRequest, fetch_user_info};
